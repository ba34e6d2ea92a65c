#![allow(missing_docs)]

//! Shared domain models.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// One of the nine thematic domains gating ability access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Arcano,
    Lama,
    Osso,
    Codice,
    Grazia,
    Mezzanotte,
    Saggio,
    Splendore,
    Valore,
}

impl Domain {
    /// Every domain, in the order used by the printed card set.
    pub const ALL: [Domain; 9] = [
        Domain::Arcano,
        Domain::Lama,
        Domain::Osso,
        Domain::Codice,
        Domain::Grazia,
        Domain::Mezzanotte,
        Domain::Saggio,
        Domain::Splendore,
        Domain::Valore,
    ];

    /// Wire identifier used in manifests, saves and archive folders.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Arcano => "arcano",
            Domain::Lama => "lama",
            Domain::Osso => "osso",
            Domain::Codice => "codice",
            Domain::Grazia => "grazia",
            Domain::Mezzanotte => "mezzanotte",
            Domain::Saggio => "saggio",
            Domain::Splendore => "splendore",
            Domain::Valore => "valore",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim().to_lowercase();
        Domain::ALL
            .into_iter()
            .find(|domain| domain.as_str() == needle)
            .ok_or_else(|| format!("unknown domain '{value}'"))
    }
}

/// Top-level card grouping as printed on the card face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Origin,
    Community,
    Domain,
}

/// Refinement of [`Category::Domain`] cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Subcategory {
    ClassFeature,
    Ability,
}

/// A single catalog entry. Selections reference cards by [`Card::id`] only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Globally unique identifier (printed collector number or page/cell).
    pub id: String,
    /// Name printed on the card.
    pub name: String,
    pub category: Category,
    /// Domain badge, `None` for origins, communities and unrecognised badges.
    pub domain: Option<Domain>,
    pub subcategory: Option<Subcategory>,
    /// Lowercase type keyword (`privilegio`, `incantesimo`, ...).
    pub card_type: Option<String>,
    pub level: Option<u32>,
    /// Recall cost printed next to the level.
    pub threshold: Option<u32>,
    /// 1-based page of the source PDF.
    pub page: u32,
    /// Image path relative to the cards directory.
    pub image_ref: String,
    /// Metadata path relative to the cards directory.
    pub data_ref: String,
}

impl Card {
    pub fn is_ability(&self) -> bool {
        self.subcategory == Some(Subcategory::Ability)
    }

    pub fn is_class_feature(&self) -> bool {
        self.subcategory == Some(Subcategory::ClassFeature)
    }

    /// Final path segment of [`Card::image_ref`].
    pub fn image_file_name(&self) -> &str {
        self.image_ref
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_domains_case_insensitively() {
        assert_eq!("Grazia".parse::<Domain>(), Ok(Domain::Grazia));
        assert_eq!(" valore ".parse::<Domain>(), Ok(Domain::Valore));
        assert!("sconosciuto".parse::<Domain>().is_err());
    }

    #[test]
    fn image_file_name_uses_last_segment() {
        let card = Card {
            id: "12/270".to_string(),
            name: "Sigillo Runico".to_string(),
            category: Category::Domain,
            domain: Some(Domain::Arcano),
            subcategory: Some(Subcategory::Ability),
            card_type: Some("incantesimo".to_string()),
            level: Some(1),
            threshold: Some(1),
            page: 10,
            image_ref: "domini/arcano/abilita/sigillo_runico_001.png".to_string(),
            data_ref: "domini/arcano/abilita/sigillo_runico_001.json".to_string(),
        };
        assert_eq!(card.image_file_name(), "sigillo_runico_001.png");
        assert!(card.is_ability());
        assert!(!card.is_class_feature());
    }
}
