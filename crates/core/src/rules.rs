//! Compiled-in reference tables for domains, classes and subclasses.
//!
//! Every class owns a fixed pair of domains and every domain is shared by
//! exactly two classes, so walking [`CLASSES`] visits each domain twice.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::models::Domain;

/// Maximum number of domains a character may hold.
pub const MAX_DOMAINS: usize = 2;

/// Number of feature cards printed for one subclass.
pub const SUBCLASS_CARD_LIMIT: usize = 3;

/// `card_type` marking the entry-level feature of a class.
pub const BASE_FEATURE_TAG: &str = "privilegio";

/// Display metadata for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainInfo {
    /// Domain described by this entry.
    pub domain: Domain,
    /// Italian label shown in the UI.
    pub label: &'static str,
    /// Glyph echoing the badge printed on the card.
    pub icon: &'static str,
    /// Badge colour sampled from the printed cards.
    pub color: (u8, u8, u8),
}

impl DomainInfo {
    /// Colour as a `#rrggbb` string.
    pub fn hex_color(&self) -> String {
        let (r, g, b) = self.color;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Domain metadata, in [`Domain::ALL`] order.
pub const DOMAINS: [DomainInfo; 9] = [
    DomainInfo {
        domain: Domain::Arcano,
        label: "Arcano",
        icon: "👁",
        color: (141, 94, 133),
    },
    DomainInfo {
        domain: Domain::Lama,
        label: "Lama",
        icon: "⚔",
        color: (172, 67, 47),
    },
    DomainInfo {
        domain: Domain::Osso,
        label: "Osso",
        icon: "☠",
        color: (231, 211, 139),
    },
    DomainInfo {
        domain: Domain::Codice,
        label: "Codice",
        icon: "📖",
        color: (61, 100, 137),
    },
    DomainInfo {
        domain: Domain::Grazia,
        label: "Grazia",
        icon: "🦢",
        color: (199, 83, 127),
    },
    DomainInfo {
        domain: Domain::Mezzanotte,
        label: "Mezzanotte",
        icon: "☾",
        color: (195, 176, 103),
    },
    DomainInfo {
        domain: Domain::Saggio,
        label: "Saggio",
        icon: "🍃",
        color: (41, 120, 61),
    },
    DomainInfo {
        domain: Domain::Splendore,
        label: "Splendore",
        icon: "☀",
        color: (219, 188, 19),
    },
    DomainInfo {
        domain: Domain::Valore,
        label: "Valore",
        icon: "🛡",
        color: (207, 120, 27),
    },
];

/// Look up display metadata for a domain.
pub fn domain_info(domain: Domain) -> &'static DomainInfo {
    DOMAINS
        .iter()
        .find(|info| info.domain == domain)
        .unwrap_or(&DOMAINS[0])
}

/// Static rule entry for one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassRule {
    /// Canonical class name.
    pub name: &'static str,
    /// The two domains the class draws abilities from; the first is primary.
    pub domains: [Domain; 2],
    /// Canonical names of the two subclasses.
    pub subclasses: [&'static str; 2],
}

impl ClassRule {
    /// Canonical spelling of `name` when it is one of this class's subclasses.
    pub fn subclass(&self, name: &str) -> Option<&'static str> {
        let key = normalize_key(name);
        self.subclasses
            .iter()
            .copied()
            .find(|subclass| normalize_key(subclass) == key)
    }
}

/// Class table.
pub const CLASSES: [ClassRule; 9] = [
    ClassRule {
        name: "Bardo",
        domains: [Domain::Grazia, Domain::Codice],
        subclasses: ["Trovatore", "Oratore"],
    },
    ClassRule {
        name: "Druido",
        domains: [Domain::Saggio, Domain::Arcano],
        subclasses: ["Custode degli Elementi", "Custode del Rinnovamento"],
    },
    ClassRule {
        name: "Guardiano",
        domains: [Domain::Valore, Domain::Lama],
        subclasses: ["Valoroso", "Vendicatore"],
    },
    ClassRule {
        name: "Ranger",
        domains: [Domain::Osso, Domain::Saggio],
        subclasses: ["Ferale", "Apripista"],
    },
    ClassRule {
        name: "Furfante",
        domains: [Domain::Mezzanotte, Domain::Grazia],
        subclasses: ["Ombra Notturna", "Ladro"],
    },
    ClassRule {
        name: "Serafino",
        domains: [Domain::Splendore, Domain::Valore],
        subclasses: ["Emissario Divino", "Sentinella Alata"],
    },
    ClassRule {
        name: "Stregone",
        domains: [Domain::Arcano, Domain::Mezzanotte],
        subclasses: ["Potere Elementale", "Potere Primordiale"],
    },
    ClassRule {
        name: "Guerriero",
        domains: [Domain::Lama, Domain::Osso],
        subclasses: ["Chiamata del Coraggio", "Chiamata dello Sterminatore"],
    },
    ClassRule {
        name: "Mago",
        domains: [Domain::Codice, Domain::Splendore],
        subclasses: ["Scuola della Conoscenza", "Scuola della Guerra"],
    },
];

static CLASS_INDEX: Lazy<HashMap<String, &'static ClassRule>> = Lazy::new(|| {
    CLASSES
        .iter()
        .map(|rule| (normalize_key(rule.name), rule))
        .collect()
});

static SUBCLASS_INDEX: Lazy<HashMap<String, &'static ClassRule>> = Lazy::new(|| {
    CLASSES
        .iter()
        .flat_map(|rule| {
            rule.subclasses
                .iter()
                .map(move |subclass| (normalize_key(subclass), rule))
        })
        .collect()
});

/// Find the rule entry for a class name (case-insensitive).
pub fn class_rule(name: &str) -> Option<&'static ClassRule> {
    CLASS_INDEX.get(&normalize_key(name)).copied()
}

/// Resolve a subclass name to its owning class name.
pub fn class_for_subclass(name: &str) -> Option<&'static str> {
    SUBCLASS_INDEX
        .get(&normalize_key(name))
        .map(|rule| rule.name)
}

/// The two classes sharing `domain`.
pub fn classes_for_domain(domain: Domain) -> Vec<&'static str> {
    CLASSES
        .iter()
        .filter(|rule| rule.domains.contains(&domain))
        .map(|rule| rule.name)
        .collect()
}

/// Case and whitespace insensitive lookup key.
pub fn normalize_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// How a character's domains are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DomainMode {
    /// The user toggles up to [`MAX_DOMAINS`] domains freely.
    Manual,
    /// Domains are the fixed pair of the selected class.
    #[default]
    FromClass,
}

/// Rule variant in force for a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Whether domains are manual or derived from the class.
    pub domain_mode: DomainMode,
    /// Narrow the class cards to the chosen subclass's cards.
    pub bound_subclass_cards: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            domain_mode: DomainMode::FromClass,
            bound_subclass_cards: true,
        }
    }
}

impl RuleSet {
    /// Rule set where domains are picked by hand and class cards are never narrowed.
    pub fn manual() -> Self {
        Self {
            domain_mode: DomainMode::Manual,
            bound_subclass_cards: false,
        }
    }

    /// Domains a freshly selected class starts with.
    pub fn default_domains(&self, class_name: &str) -> Vec<Domain> {
        match self.domain_mode {
            DomainMode::Manual => Vec::new(),
            DomainMode::FromClass => class_rule(class_name)
                .map(|rule| rule.domains.to_vec())
                .unwrap_or_default(),
        }
    }

    /// Whether the user may toggle domains directly.
    pub fn domains_are_manual(&self) -> bool {
        self.domain_mode == DomainMode::Manual
    }
}
