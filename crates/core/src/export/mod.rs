//! Turning a selection into downloadable artifacts: a zip archive of card
//! images and a 3×3 print layout.
#![allow(missing_docs)]

mod archive;
mod print;

pub use archive::{archive_file_name, archive_paths, build_archive};
pub use print::{
    build_print_layout, open_preview, PrintLayout, PrintOutcome, PrintPage, CARDS_PER_PAGE,
};

use crate::{models::Card, selection::SelectionStore};

/// Cards resolved from a selection, owned so that exports can outlive the
/// store borrow while resources are fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSelection {
    pub origin: Option<Card>,
    pub community: Option<Card>,
    pub class_cards: Vec<Card>,
    pub abilities: Vec<Card>,
}

impl ExportSelection {
    /// Resolve the store's current selection. Stale ability ids are dropped.
    pub fn from_store(store: &SelectionStore) -> Self {
        Self {
            origin: store.origin_card().cloned(),
            community: store.community_card().cloned(),
            class_cards: store.class_cards().into_iter().cloned().collect(),
            abilities: store
                .selected_ability_cards()
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    /// Origin, community, class cards, then abilities.
    pub fn cards_in_print_order(&self) -> Vec<Card> {
        self.origin
            .iter()
            .chain(self.community.iter())
            .chain(self.class_cards.iter())
            .chain(self.abilities.iter())
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.community.is_none()
            && self.class_cards.is_empty()
            && self.abilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rules::RuleSet, testing::sample_index};
    use std::sync::Arc;

    #[test]
    fn print_order_puts_origin_first() {
        let mut store = SelectionStore::new(Arc::new(sample_index()), RuleSet::default());
        assert!(ExportSelection::from_store(&store).is_empty());

        store.select_class("Bardo");
        store.select_subclass(Some("Trovatore"));
        store.toggle_ability("codice-1");
        store.toggle_ability("grazia-1");
        store.select_origin(Some("drakona"));
        store.select_community(Some("boscaioli"));

        let ids: Vec<String> = ExportSelection::from_store(&store)
            .cards_in_print_order()
            .into_iter()
            .map(|card| card.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "drakona", "boscaioli", "bard-t1", "bard-t2", "bard-t3", "grazia-1", "codice-1"
            ]
        );
    }
}
