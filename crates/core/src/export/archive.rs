use std::{
    collections::HashSet,
    io::{Cursor, Write},
};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    error::ExportError,
    models::{Card, Category, Subcategory},
    resource::{ResourceLayout, ResourceSource},
    save::CharacterSave,
};

use super::ExportSelection;

/// Name of the save document at the archive root.
pub const SAVE_ENTRY: &str = "personaggio.json";

const UNKNOWN_DOMAIN_DIR: &str = "altro";

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("invalid slug regex"));

/// `(archive entry, resource path)` pairs for every selected card, in print
/// order. Entries that would collide keep the first card.
pub fn archive_paths(selection: &ExportSelection, layout: &ResourceLayout) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    selection
        .cards_in_print_order()
        .iter()
        .filter_map(|card| {
            let entry = format!("{}/{}", folder_for(card), card.image_file_name());
            if seen.insert(entry.clone()) {
                Some((entry, layout.image_path(card)))
            } else {
                debug!(card = %card.id, %entry, "duplicate archive entry skipped");
                None
            }
        })
        .collect()
}

fn folder_for(card: &Card) -> String {
    match card.category {
        Category::Origin => "origine".to_string(),
        Category::Community => "comunita".to_string(),
        Category::Domain => match card.subcategory {
            Some(Subcategory::ClassFeature) => "classi".to_string(),
            _ => format!(
                "abilita/{}",
                card.domain
                    .map(|domain| domain.as_str().to_string())
                    .unwrap_or_else(|| UNKNOWN_DOMAIN_DIR.to_string())
            ),
        },
    }
}

/// Fetch every selected image, then pack them with the save document.
///
/// All fetches complete before the archive is written, so a failure leaves
/// nothing behind and the call can simply be retried.
pub async fn build_archive<S: ResourceSource>(
    source: &S,
    layout: &ResourceLayout,
    save: &CharacterSave,
    selection: &ExportSelection,
) -> Result<Vec<u8>, ExportError> {
    let paths = archive_paths(selection, layout);
    let mut images = Vec::with_capacity(paths.len());
    for (entry, resource) in paths {
        let bytes = source.fetch(&resource).await?;
        images.push((entry, bytes));
    }

    let document = save.to_json()?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file(SAVE_ENTRY, options)?;
    writer.write_all(document.as_bytes())?;

    let stored = options.compression_method(CompressionMethod::Stored);
    for (entry, bytes) in &images {
        writer.start_file(entry.as_str(), stored)?;
        writer.write_all(bytes)?;
    }

    let archive = writer.finish()?.into_inner();
    info!(images = images.len(), bytes = archive.len(), "archive assembled");
    Ok(archive)
}

/// Download name for an archive: the character (or class) slug plus date.
pub fn archive_file_name(save: &CharacterSave) -> String {
    let base = if save.character_name.trim().is_empty() {
        save.class_name.as_deref().unwrap_or("personaggio")
    } else {
        save.character_name.as_str()
    };
    let lowered = base.to_lowercase();
    let slug = SLUG_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "personaggio" } else { slug };
    let date = save.export_date.unwrap_or_else(chrono::Utc::now);
    format!("{slug}_{}.zip", date.format("%Y-%m-%d"))
}
