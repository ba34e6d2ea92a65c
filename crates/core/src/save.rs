//! Character save documents and their on-disk store.
#![allow(missing_docs)]

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::{
    error::MalformedSaveError,
    models::Domain,
    rules::MAX_DOMAINS,
    selection::{SelectionState, SelectionStore},
};

/// Root directory under `~/.config` used for save files.
pub const DEFAULT_SAVE_DIR: &str = "dhtui/personaggi";

/// Format version written by this build.
pub const SAVE_VERSION: u32 = 1;

/// Versioned, id-only snapshot of a [`SelectionState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSave {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Informational; unreadable timestamps load as `None`.
    #[serde(default, deserialize_with = "lenient_date")]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub character_name: String,
    /// Required key; `null` for a selection without a class.
    #[serde(deserialize_with = "Option::deserialize")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub selected_subclass: Option<String>,
    /// Informational: reproducible from the class and the catalog.
    #[serde(default)]
    pub class_card_ids: Vec<String>,
    pub selected_domains: Vec<Domain>,
    pub selected_abilities: Vec<String>,
    #[serde(default)]
    pub selected_origin: Option<String>,
    #[serde(default)]
    pub selected_community: Option<String>,
}

fn default_version() -> u32 {
    SAVE_VERSION
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(text)) => {
            let parsed = parse_export_date(&text);
            if parsed.is_none() {
                warn!(value = %text, "ignoring unreadable exportDate");
            }
            parsed
        }
        _ => None,
    })
}

/// RFC 3339 first, then ISO-8601 without offset (read as UTC), then a bare date.
fn parse_export_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = text.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    text.parse::<NaiveDate>()
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl CharacterSave {
    /// Project `state` into a save stamped with the current time.
    pub fn from_state(state: &SelectionState, class_card_ids: Vec<String>) -> Self {
        Self {
            version: SAVE_VERSION,
            export_date: Some(Utc::now()),
            character_name: state.character_name().to_string(),
            class_name: state.class_name().map(str::to_string),
            selected_subclass: state.selected_subclass().map(str::to_string),
            class_card_ids,
            selected_domains: state.selected_domains().to_vec(),
            selected_abilities: state.selected_abilities().iter().cloned().collect(),
            selected_origin: state.selected_origin().map(str::to_string),
            selected_community: state.selected_community().map(str::to_string),
        }
    }

    /// Snapshot the store, including the ids of the derived class cards.
    pub fn capture(store: &SelectionStore) -> Self {
        let class_card_ids = store
            .class_cards()
            .into_iter()
            .map(|card| card.id.clone())
            .collect();
        Self::from_state(store.state(), class_card_ids)
    }

    /// Parse and structurally validate a save document.
    pub fn parse(text: &str) -> Result<Self, MalformedSaveError> {
        let save: CharacterSave =
            serde_json::from_str(text).map_err(|err| MalformedSaveError::new(err.to_string()))?;
        if save.version != SAVE_VERSION {
            return Err(MalformedSaveError::new(format!(
                "unsupported version {}",
                save.version
            )));
        }
        let distinct: BTreeSet<Domain> = save.selected_domains.iter().copied().collect();
        if distinct.len() > MAX_DOMAINS {
            return Err(MalformedSaveError::new(format!(
                "{} domains selected, at most {MAX_DOMAINS} allowed",
                distinct.len()
            )));
        }
        Ok(save)
    }

    /// Rebuild the selection. Ids are kept verbatim, even when stale.
    pub fn into_state(self) -> SelectionState {
        SelectionState::from_parts(
            self.character_name,
            self.class_name,
            self.selected_subclass,
            self.selected_domains,
            self.selected_abilities.into_iter().collect(),
            self.selected_origin,
            self.selected_community,
        )
    }

    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Serialize a selection into a save document.
pub fn serialize(state: &SelectionState, class_card_ids: Vec<String>) -> CharacterSave {
    CharacterSave::from_state(state, class_card_ids)
}

/// Parse a save document straight into a selection.
pub fn deserialize(text: &str) -> Result<SelectionState, MalformedSaveError> {
    CharacterSave::parse(text).map(CharacterSave::into_state)
}

/// Metadata describing a save file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveEntry {
    /// Absolute path to the save file on disk.
    pub path: PathBuf,
    /// Character name stored in the save.
    pub character_name: String,
    /// Class stored in the save.
    pub class_name: Option<String>,
    /// Export timestamp, falling back to the file's modification time.
    pub updated_at: DateTime<Utc>,
}

impl SaveEntry {
    /// Label for lists: character name, else class, else file name.
    pub fn label(&self) -> String {
        if !self.character_name.trim().is_empty() {
            return self.character_name.clone();
        }
        if let Some(class_name) = &self.class_name {
            return class_name.clone();
        }
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "personaggio".to_string())
    }
}

/// Manager responsible for loading and writing save files.
pub struct SaveManager {
    root: PathBuf,
}

impl SaveManager {
    /// Create a new manager rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location under the user's config directory.
    pub fn default_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_SAVE_DIR)
    }

    /// Directory holding the saves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return all readable saves sorted by timestamp (most recent first).
    pub fn entries(&self) -> Result<Vec<SaveEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root).context("failed to read save directory")? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match self.import(&path) {
                Ok(save) => {
                    let modified = entry
                        .metadata()
                        .and_then(|meta| meta.modified())
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now());
                    entries.push(SaveEntry {
                        path,
                        character_name: save.character_name,
                        class_name: save.class_name,
                        updated_at: save.export_date.unwrap_or(modified),
                    });
                }
                Err(err) => {
                    warn!("Failed to read save {:?}: {err:#}", path);
                }
            }
        }

        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(entries)
    }

    /// Write `save` as a new file and return its entry.
    pub fn create_save(&self, save: &CharacterSave) -> Result<SaveEntry> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;

        let updated_at = save.export_date.unwrap_or_else(Utc::now);
        let stem = if save.character_name.trim().is_empty() {
            save.class_name.as_deref().unwrap_or("personaggio")
        } else {
            save.character_name.as_str()
        };
        let file_name = format!(
            "{}_{}.json",
            sanitize_component(stem),
            updated_at.format("%Y%m%d%H%M%S")
        );
        let path = self.root.join(file_name);
        write_document(&path, save)?;

        Ok(SaveEntry {
            path,
            character_name: save.character_name.clone(),
            class_name: save.class_name.clone(),
            updated_at,
        })
    }

    /// Load the save behind `entry`.
    pub fn load(&self, entry: &SaveEntry) -> Result<CharacterSave> {
        self.import(&entry.path)
    }

    /// Load most recent save entry, if any.
    pub fn latest(&self) -> Result<Option<SaveEntry>> {
        let entries = self.entries()?;
        Ok(entries.into_iter().next())
    }

    /// Read and validate a save document from any path.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<CharacterSave> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let save = CharacterSave::parse(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(save)
    }
}

/// Write a save document to `path`, creating parent directories.
pub fn write_document(path: &Path, save: &CharacterSave) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialised = save.to_json().context("failed to serialize save")?;
    fs::write(path, serialised).with_context(|| format!("failed to write {}", path.display()))
}

/// Reduce free text to a filename-safe component.
pub fn sanitize_component(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
            result.push(ch);
        } else if ch.is_whitespace() && !result.ends_with('_') {
            result.push('_');
        }
    }
    let result = result.trim_matches('_').to_lowercase();
    if result.is_empty() {
        "personaggio".to_string()
    } else {
        result
    }
}
