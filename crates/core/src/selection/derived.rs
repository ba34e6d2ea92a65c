//! Views derived from a selection and the catalog. All functions are pure
//! and cheap enough to recompute on every read.

use std::collections::BTreeMap;

use crate::{
    catalog::{CardIndex, ClassInfo},
    models::{Card, Category, Domain},
    rules::{self, RuleSet, SUBCLASS_CARD_LIMIT},
};

use super::state::SelectionState;

/// The catalog class matching the selected class name.
pub fn active_class<'a>(state: &SelectionState, index: &'a CardIndex) -> Option<&'a ClassInfo> {
    state.class_name().and_then(|name| index.class(name))
}

/// Subclass names offered for the selected class.
pub fn subclasses(state: &SelectionState) -> Vec<&'static str> {
    state
        .class_name()
        .and_then(rules::class_rule)
        .map(|rule| rule.subclasses.to_vec())
        .unwrap_or_default()
}

/// Domains the user may pick from under `rules`.
pub fn available_domains(state: &SelectionState, rules: &RuleSet) -> Vec<Domain> {
    if rules.domains_are_manual() {
        Domain::ALL.to_vec()
    } else {
        state
            .class_name()
            .map(|name| rules.default_domains(name))
            .unwrap_or_default()
    }
}

/// Feature cards of the selected class, narrowed to the chosen subclass when
/// the rule set bounds class cards.
pub fn class_cards<'a>(
    state: &SelectionState,
    index: &'a CardIndex,
    rules: &RuleSet,
) -> Vec<&'a Card> {
    let Some(class) = active_class(state, index) else {
        return Vec::new();
    };
    match state.selected_subclass() {
        Some(subclass) if rules.bound_subclass_cards => {
            let key = rules::normalize_key(subclass);
            class
                .cards
                .iter()
                .filter(|card| rules::normalize_key(&card.name) == key)
                .take(SUBCLASS_CARD_LIMIT)
                .collect()
        }
        _ => class.cards.iter().collect(),
    }
}

/// Catalog abilities whose domain is currently selected, in catalog order.
pub fn ability_cards<'a>(state: &SelectionState, index: &'a CardIndex) -> Vec<&'a Card> {
    index
        .ability_cards()
        .filter(|card| {
            card.domain
                .map(|domain| state.selected_domains().contains(&domain))
                .unwrap_or(false)
        })
        .collect()
}

/// [`ability_cards`] grouped per selected domain, in selection order.
pub fn abilities_by_domain<'a>(
    state: &SelectionState,
    index: &'a CardIndex,
) -> Vec<(Domain, Vec<&'a Card>)> {
    let abilities = ability_cards(state, index);
    state
        .selected_domains()
        .iter()
        .map(|&domain| {
            let cards = abilities
                .iter()
                .copied()
                .filter(|card| card.domain == Some(domain))
                .collect();
            (domain, cards)
        })
        .collect()
}

/// [`ability_cards`] partitioned by level; cards without a level land in bucket 0.
pub fn cards_by_level<'a>(
    state: &SelectionState,
    index: &'a CardIndex,
) -> BTreeMap<u32, Vec<&'a Card>> {
    let mut buckets: BTreeMap<u32, Vec<&Card>> = BTreeMap::new();
    for card in ability_cards(state, index) {
        buckets.entry(card.level.unwrap_or(0)).or_default().push(card);
    }
    buckets
}

/// Distinct levels of [`cards_by_level`], ascending.
pub fn levels(state: &SelectionState, index: &CardIndex) -> Vec<u32> {
    cards_by_level(state, index).into_keys().collect()
}

/// Selected abilities that still resolve to catalog cards, in catalog order.
/// Stale ids are skipped.
pub fn selected_ability_cards<'a>(state: &SelectionState, index: &'a CardIndex) -> Vec<&'a Card> {
    index
        .ability_cards()
        .filter(|card| state.selected_abilities().contains(&card.id))
        .collect()
}

pub fn origin_card<'a>(state: &SelectionState, index: &'a CardIndex) -> Option<&'a Card> {
    state
        .selected_origin()
        .and_then(|id| index.card(id))
        .filter(|card| card.category == Category::Origin)
}

pub fn community_card<'a>(state: &SelectionState, index: &'a CardIndex) -> Option<&'a Card> {
    state
        .selected_community()
        .and_then(|id| index.card(id))
        .filter(|card| card.category == Category::Community)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        selection::SelectionStore,
        testing::{ability, sample_index},
    };
    use std::sync::Arc;

    fn ids(cards: &[&Card]) -> Vec<String> {
        cards.iter().map(|card| card.id.clone()).collect()
    }

    #[test]
    fn single_ability_scenario() {
        let index = Arc::new(CardIndex::new(vec![ability("a1", Domain::Arcano, 1)]));
        let mut store = SelectionStore::new(Arc::clone(&index), RuleSet::manual());
        store.toggle_domain(Domain::Arcano);

        let state = store.state();
        assert_eq!(ids(&ability_cards(state, &index)), vec!["a1"]);
        let buckets = cards_by_level(state, &index);
        assert_eq!(buckets.len(), 1);
        assert_eq!(ids(&buckets[&1]), vec!["a1"]);
        assert_eq!(levels(state, &index), vec![1]);
    }

    #[test]
    fn levels_partition_ability_cards() {
        let mut unlevelled = ability("free", Domain::Codice, 0);
        unlevelled.level = None;
        let mut cards: Vec<Card> = sample_index().all_cards().to_vec();
        cards.push(unlevelled);
        let index = Arc::new(CardIndex::new(cards));
        let mut store = SelectionStore::new(Arc::clone(&index), RuleSet::default());
        store.select_class("Bardo");

        let state = store.state();
        let abilities = ability_cards(state, &index);
        let buckets = cards_by_level(state, &index);
        let mut flattened: Vec<String> = buckets.values().flat_map(|cards| ids(cards)).collect();
        let mut expected = ids(&abilities);
        flattened.sort();
        expected.sort();
        assert_eq!(flattened, expected);
        assert_eq!(levels(state, &index), vec![0, 1, 2, 3]);
        assert!(levels(state, &index).windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn subclass_bounds_class_cards() {
        let index = Arc::new(sample_index());
        let mut store = SelectionStore::new(Arc::clone(&index), RuleSet::default());
        store.select_class("Bardo");
        assert_eq!(class_cards(store.state(), &index, store.rules()).len(), 6);

        store.select_subclass(Some("oratore"));
        assert_eq!(
            ids(&class_cards(store.state(), &index, store.rules())),
            vec!["bard-o1", "bard-o2", "bard-o3"]
        );

        let unbounded = RuleSet {
            bound_subclass_cards: false,
            ..RuleSet::default()
        };
        assert_eq!(class_cards(store.state(), &index, &unbounded).len(), 6);
    }

    #[test]
    fn groups_abilities_by_selected_domain() {
        let index = Arc::new(sample_index());
        let mut store = SelectionStore::new(Arc::clone(&index), RuleSet::default());
        store.select_class("Bardo");

        let groups = abilities_by_domain(store.state(), &index);
        assert_eq!(groups[0].0, Domain::Grazia);
        assert_eq!(ids(&groups[0].1), vec!["grazia-1", "grazia-2"]);
        assert_eq!(groups[1].0, Domain::Codice);
        assert_eq!(ids(&groups[1].1), vec!["codice-1", "codice-3"]);
        assert_eq!(
            available_domains(store.state(), store.rules()),
            vec![Domain::Grazia, Domain::Codice]
        );
        assert_eq!(subclasses(store.state()), vec!["Trovatore", "Oratore"]);
    }

    #[test]
    fn stale_ids_are_skipped_by_views() {
        let index = Arc::new(sample_index());
        let mut store = SelectionStore::new(Arc::clone(&index), RuleSet::default());
        store.select_class("Bardo");
        store.toggle_ability("grazia-1");
        store.toggle_ability("ghost");

        assert_eq!(store.state().selected_abilities().len(), 2);
        assert_eq!(ids(&selected_ability_cards(store.state(), &index)), vec!["grazia-1"]);
    }
}
