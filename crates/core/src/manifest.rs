//! Card manifest (`cards/index.json`) as written by the card extractor.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::CatalogLoadError,
    models::{Card, Category, Domain, Subcategory},
};

/// Parse a manifest document into catalog cards.
///
/// Records with an unknown category or a missing id are skipped, as are
/// repeated ids (the first record wins). A document that is not a JSON array
/// of objects fails as a whole.
pub fn parse_manifest(path: &str, bytes: &[u8]) -> Result<Vec<Card>, CatalogLoadError> {
    let records: Vec<RawCard> =
        serde_json::from_slice(bytes).map_err(|err| CatalogLoadError::Parse {
            path: path.to_string(),
            message: err.to_string(),
        })?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut cards = Vec::with_capacity(records.len());
    for (position, record) in records.into_iter().enumerate() {
        match record.into_card(position) {
            Some(card) => {
                if seen.insert(card.id.clone()) {
                    cards.push(card);
                } else {
                    warn!(id = %card.id, "duplicate card id in manifest; keeping first");
                }
            }
            None => warn!(position, "skipping unrecognised manifest record"),
        }
    }
    Ok(cards)
}

#[derive(Debug, Deserialize)]
struct RawCard {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "name")]
    nome: Option<String>,
    #[serde(default, alias = "category")]
    categoria: Option<String>,
    #[serde(default, alias = "domain")]
    dominio: Option<String>,
    #[serde(default, alias = "subcategory")]
    sottocategoria: Option<String>,
    #[serde(default, alias = "cardType")]
    tipo_carta: Option<String>,
    #[serde(default, alias = "level")]
    livello: Option<Value>,
    #[serde(default, alias = "threshold")]
    soglia: Option<Value>,
    #[serde(default, alias = "page")]
    pagina: Option<Value>,
    #[serde(default, alias = "imageRef")]
    img: Option<String>,
    #[serde(default, rename = "json", alias = "dataRef")]
    data: Option<String>,
}

impl RawCard {
    fn into_card(self, position: usize) -> Option<Card> {
        let id = self.id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())?;
        let category = parse_category(self.categoria.as_deref()?)?;
        let subcategory = self.sottocategoria.as_deref().and_then(parse_subcategory);
        let domain = self
            .dominio
            .as_deref()
            .and_then(|value| value.parse::<Domain>().ok());
        let name = self
            .nome
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("carta {}", position + 1));

        Some(Card {
            id,
            name,
            category,
            domain,
            subcategory,
            card_type: self
                .tipo_carta
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty()),
            level: self.livello.as_ref().and_then(value_to_u32),
            threshold: self.soglia.as_ref().and_then(value_to_u32),
            page: self.pagina.as_ref().and_then(value_to_u32).unwrap_or(0),
            image_ref: self.img.unwrap_or_default(),
            data_ref: self.data.unwrap_or_default(),
        })
    }
}

fn parse_category(raw: &str) -> Option<Category> {
    match raw.trim().to_lowercase().as_str() {
        "origine" | "origin" => Some(Category::Origin),
        "comunità" | "comunita" | "community" => Some(Category::Community),
        "dominio" | "domini" | "domain" => Some(Category::Domain),
        _ => None,
    }
}

fn parse_subcategory(raw: &str) -> Option<Subcategory> {
    match raw.trim().to_lowercase().as_str() {
        "classi" | "classe" | "classfeature" | "class_feature" => Some(Subcategory::ClassFeature),
        "abilita" | "abilità" | "ability" => Some(Subcategory::Ability),
        _ => None,
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().trim_end_matches('+').parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extractor_records() {
        let manifest = r#"[
            {"id": "12/270", "nome": "SIGILLO RUNICO", "categoria": "dominio",
             "dominio": "arcano", "sottocategoria": "abilita", "tipo_carta": "Incantesimo",
             "livello": 1, "soglia": 1, "pagina": 10,
             "img": "domini/arcano/abilita/sigillo_runico_001.png",
             "json": "domini/arcano/abilita/sigillo_runico_001.json"},
            {"id": "p7c1", "nome": "Clank", "categoria": "origine", "dominio": null,
             "sottocategoria": null, "tipo_carta": null, "livello": null, "soglia": null,
             "pagina": 7, "img": "origine/clank_001.png", "json": "origine/clank_001.json"},
            {"id": "p9c2", "nome": "Boscaioli", "categoria": "comunità", "pagina": "9",
             "img": "comunità/boscaioli_001.png", "json": "comunità/boscaioli_001.json"}
        ]"#;

        let cards = parse_manifest("cards/index.json", manifest.as_bytes()).expect("manifest");
        assert_eq!(cards.len(), 3);

        let spell = &cards[0];
        assert_eq!(spell.category, Category::Domain);
        assert_eq!(spell.domain, Some(Domain::Arcano));
        assert_eq!(spell.subcategory, Some(Subcategory::Ability));
        assert_eq!(spell.card_type.as_deref(), Some("incantesimo"));
        assert_eq!(spell.level, Some(1));
        assert_eq!(spell.data_ref, "domini/arcano/abilita/sigillo_runico_001.json");

        assert_eq!(cards[1].category, Category::Origin);
        assert_eq!(cards[1].level, None);
        assert_eq!(cards[2].category, Category::Community);
        assert_eq!(cards[2].page, 9);
    }

    #[test]
    fn unknown_domain_degrades_to_none() {
        let manifest = r#"[{"id": "x", "nome": "X", "categoria": "dominio",
            "dominio": "sconosciuto", "sottocategoria": "abilita", "pagina": 12, "img": "x.png"}]"#;
        let cards = parse_manifest("index.json", manifest.as_bytes()).expect("manifest");
        assert_eq!(cards[0].domain, None);
        assert!(cards[0].is_ability());
    }

    #[test]
    fn skips_unknown_categories_and_duplicates() {
        let manifest = r#"[
            {"id": "a", "nome": "First", "categoria": "origine", "pagina": 7},
            {"id": "a", "nome": "Again", "categoria": "origine", "pagina": 7},
            {"id": "b", "nome": "Odd", "categoria": "mistero", "pagina": 8},
            {"nome": "No id", "categoria": "origine", "pagina": 8}
        ]"#;
        let cards = parse_manifest("index.json", manifest.as_bytes()).expect("manifest");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "First");
    }

    #[test]
    fn rejects_non_array_documents() {
        let err = parse_manifest("index.json", br#"{"cards": []}"#).unwrap_err();
        assert!(matches!(err, CatalogLoadError::Parse { .. }));
        assert!(parse_manifest("index.json", b"not json").is_err());
    }
}
