use std::collections::HashMap;

use crate::{
    models::{Card, Category, Domain},
    rules::{self, BASE_FEATURE_TAG},
};

/// Class derived from the class-feature cards of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Class name (canonical table spelling, or the card name when unknown).
    pub name: String,
    /// Primary domain of the class, if known.
    pub primary_domain: Option<Domain>,
    /// Class-feature cards in page order.
    pub cards: Vec<Card>,
    /// Entry-level feature card.
    pub base_card: Card,
}

/// Immutable, fully loaded card catalog with lookup tables.
#[derive(Debug, Clone, Default)]
pub struct CardIndex {
    cards: Vec<Card>,
    by_id: HashMap<String, usize>,
    classes: Vec<ClassInfo>,
}

impl CardIndex {
    /// Build the index; ids are expected to be unique.
    pub fn new(cards: Vec<Card>) -> Self {
        let by_id = cards
            .iter()
            .enumerate()
            .map(|(position, card)| (card.id.clone(), position))
            .collect();
        let classes = derive_classes(&cards);
        Self {
            cards,
            by_id,
            classes,
        }
    }

    /// Every card in manifest order.
    pub fn all_cards(&self) -> &[Card] {
        &self.cards
    }

    /// Resolve a card by id.
    pub fn card(&self, id: &str) -> Option<&Card> {
        self.by_id.get(id).map(|&position| &self.cards[position])
    }

    /// Origin cards in manifest order.
    pub fn origin_cards(&self) -> Vec<&Card> {
        self.by_category(Category::Origin)
    }

    /// Community cards in manifest order.
    pub fn community_cards(&self) -> Vec<&Card> {
        self.by_category(Category::Community)
    }

    /// All ability cards in manifest order.
    pub fn ability_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| card.is_ability())
    }

    /// Derived classes.
    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    /// Look up a derived class by name (case-insensitive).
    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        let key = rules::normalize_key(name);
        self.classes
            .iter()
            .find(|class| rules::normalize_key(&class.name) == key)
    }

    /// Number of cards in the catalog.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the catalog holds no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn by_category(&self, category: Category) -> Vec<&Card> {
        self.cards
            .iter()
            .filter(|card| card.category == category)
            .collect()
    }
}

/// Group class-feature cards by class name.
///
/// Cards are named after their subclass, so the subclass table resolves the
/// class; unknown names form a class of their own. Known classes keep table
/// order and unknown ones follow alphabetically.
pub fn derive_classes(cards: &[Card]) -> Vec<ClassInfo> {
    let mut groups: HashMap<String, Vec<(usize, &Card)>> = HashMap::new();
    for (position, card) in cards.iter().enumerate() {
        if !card.is_class_feature() {
            continue;
        }
        let class_name = rules::class_for_subclass(&card.name)
            .or_else(|| rules::class_rule(&card.name).map(|rule| rule.name))
            .map(str::to_string)
            .unwrap_or_else(|| card.name.trim().to_string());
        groups.entry(class_name).or_default().push((position, card));
    }

    let mut classes: Vec<ClassInfo> = groups
        .into_iter()
        .filter_map(|(name, mut members)| {
            members.sort_by_key(|(position, card)| (card.page, *position));
            let cards: Vec<Card> = members.into_iter().map(|(_, card)| card.clone()).collect();
            let base_card = cards
                .iter()
                .find(|card| card.card_type.as_deref() == Some(BASE_FEATURE_TAG))
                .or_else(|| cards.first())?
                .clone();
            let primary_domain = rules::class_rule(&name)
                .map(|rule| rule.domains[0])
                .or(base_card.domain);
            Some(ClassInfo {
                name,
                primary_domain,
                cards,
                base_card,
            })
        })
        .collect();

    classes.sort_by(|a, b| {
        let rank = |class: &ClassInfo| {
            rules::CLASSES
                .iter()
                .position(|rule| rule.name == class.name)
                .unwrap_or(usize::MAX)
        };
        rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
    });
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ability, class_feature, origin};

    #[test]
    fn groups_subclass_cards_under_their_class() {
        let cards = vec![
            class_feature("c3", "ORATORE", 2, Some("maestria")),
            class_feature("c1", "TROVATORE", 1, Some("privilegio")),
            class_feature("c2", "TROVATORE", 1, Some("specializzazione")),
            class_feature("w1", "SCUOLA DELLA GUERRA", 6, Some("specializzazione")),
            ability("a1", Domain::Grazia, 1),
        ];
        let classes = derive_classes(&cards);

        assert_eq!(classes.len(), 2);
        let bard = &classes[0];
        assert_eq!(bard.name, "Bardo");
        assert_eq!(bard.primary_domain, Some(Domain::Grazia));
        let ids: Vec<_> = bard.cards.iter().map(|card| card.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(bard.base_card.id, "c1");

        let wizard = &classes[1];
        assert_eq!(wizard.name, "Mago");
        assert_eq!(wizard.base_card.id, "w1", "falls back to first card");
    }

    #[test]
    fn unknown_class_names_fall_back_to_card_name() {
        let cards = vec![class_feature("x1", "Eroe Errante", 3, None)];
        let classes = derive_classes(&cards);
        assert_eq!(classes[0].name, "Eroe Errante");
        assert_eq!(classes[0].primary_domain, None);
    }

    #[test]
    fn index_resolves_cards_and_categories() {
        let index = CardIndex::new(vec![
            origin("o1", "Clank"),
            ability("a1", Domain::Arcano, 2),
            class_feature("c1", "TROVATORE", 1, Some("privilegio")),
        ]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.card("a1").map(|card| card.level), Some(Some(2)));
        assert!(index.card("missing").is_none());
        assert_eq!(index.origin_cards().len(), 1);
        assert!(index.community_cards().is_empty());
        assert_eq!(index.ability_cards().count(), 1);
        assert!(index.class("bardo").is_some());
    }
}
