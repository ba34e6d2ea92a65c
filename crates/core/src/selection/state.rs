use std::{collections::BTreeSet, sync::Arc};

use tokio::sync::watch;
use tracing::debug;

use crate::{
    catalog::{CardIndex, ClassInfo},
    models::{Card, Category, Domain},
    rules::{self, RuleSet, MAX_DOMAINS},
};

use super::derived;

/// The character being assembled. Only [`SelectionStore`] mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    character_name: String,
    class_name: Option<String>,
    selected_subclass: Option<String>,
    selected_domains: Vec<Domain>,
    selected_abilities: BTreeSet<String>,
    selected_origin: Option<String>,
    selected_community: Option<String>,
}

impl SelectionState {
    /// Assemble a state from raw parts, as read back from a save.
    ///
    /// Domains are deduplicated keeping the first occurrence. Card ids are
    /// not checked against any catalog.
    pub(crate) fn from_parts(
        character_name: String,
        class_name: Option<String>,
        selected_subclass: Option<String>,
        selected_domains: Vec<Domain>,
        selected_abilities: BTreeSet<String>,
        selected_origin: Option<String>,
        selected_community: Option<String>,
    ) -> Self {
        let mut domains = Vec::with_capacity(selected_domains.len());
        for domain in selected_domains {
            if !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        Self {
            character_name,
            class_name,
            selected_subclass,
            selected_domains: domains,
            selected_abilities,
            selected_origin,
            selected_community,
        }
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn selected_subclass(&self) -> Option<&str> {
        self.selected_subclass.as_deref()
    }

    /// Selected domains in the order they were picked.
    pub fn selected_domains(&self) -> &[Domain] {
        &self.selected_domains
    }

    pub fn selected_abilities(&self) -> &BTreeSet<String> {
        &self.selected_abilities
    }

    pub fn selected_origin(&self) -> Option<&str> {
        self.selected_origin.as_deref()
    }

    pub fn selected_community(&self) -> Option<&str> {
        self.selected_community.as_deref()
    }

    /// Whether nothing has been chosen yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Owner of the [`SelectionState`]: applies user actions against the
/// catalog and rule set, and publishes a revision number after every change.
///
/// Actions never fail. Input that would break an invariant is ignored and
/// the action reports `false`.
#[derive(Debug)]
pub struct SelectionStore {
    state: SelectionState,
    catalog: Arc<CardIndex>,
    rules: RuleSet,
    revision: watch::Sender<u64>,
}

impl SelectionStore {
    /// Empty selection over `catalog`.
    pub fn new(catalog: Arc<CardIndex>, rules: RuleSet) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: SelectionState::default(),
            catalog,
            rules,
            revision,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn catalog(&self) -> &CardIndex {
        &self.catalog
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Monotonic change counter.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified after every applied change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Swap the catalog. Selections keep their ids; ids missing from the new
    /// catalog simply stop resolving.
    pub fn set_catalog(&mut self, catalog: Arc<CardIndex>) {
        self.catalog = catalog;
        self.bump();
    }

    /// Switch rule variant. Entering class-bound domains re-derives them and
    /// prunes abilities that fall outside; other changes keep the selection.
    pub fn set_rules(&mut self, rules: RuleSet) {
        if self.rules == rules {
            return;
        }
        let mode_changed = self.rules.domain_mode != rules.domain_mode;
        self.rules = rules;
        if mode_changed && !self.rules.domains_are_manual() {
            self.state.selected_domains = self
                .state
                .class_name
                .as_deref()
                .map(|name| self.rules.default_domains(name))
                .unwrap_or_default();
            self.prune_abilities();
        }
        if !self.rules.bound_subclass_cards {
            debug!("subclass bounding disabled");
        }
        self.bump();
    }

    pub fn set_character_name(&mut self, name: &str) -> bool {
        if self.state.character_name == name {
            return false;
        }
        self.state.character_name = name.to_string();
        self.bump();
        true
    }

    /// Select a class, clearing subclass and abilities and resetting domains
    /// to the class default for the rule set in force.
    pub fn select_class(&mut self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return false;
        }
        let canonical = self
            .catalog
            .class(trimmed)
            .map(|class| class.name.clone())
            .or_else(|| rules::class_rule(trimmed).map(|rule| rule.name.to_string()))
            .unwrap_or_else(|| trimmed.to_string());

        debug!(class = %canonical, "class selected");
        self.state.selected_domains = self.rules.default_domains(&canonical);
        self.state.class_name = Some(canonical);
        self.state.selected_subclass = None;
        self.state.selected_abilities.clear();
        self.bump();
        true
    }

    /// Select one of the current class's subclasses, or clear with `None`.
    pub fn select_subclass(&mut self, name: Option<&str>) -> bool {
        let next = match name {
            None => None,
            Some(name) => {
                let Some(subclass) = self
                    .state
                    .class_name
                    .as_deref()
                    .and_then(rules::class_rule)
                    .and_then(|rule| rule.subclass(name))
                else {
                    return false;
                };
                Some(subclass.to_string())
            }
        };
        if self.state.selected_subclass == next {
            return false;
        }
        self.state.selected_subclass = next;
        self.bump();
        true
    }

    /// Add or remove a domain. Removing cascades to abilities of that domain;
    /// adding beyond [`MAX_DOMAINS`] or toggling class-bound domains is ignored.
    pub fn toggle_domain(&mut self, domain: Domain) -> bool {
        if !self.rules.domains_are_manual() {
            return false;
        }
        if let Some(position) = self
            .state
            .selected_domains
            .iter()
            .position(|selected| *selected == domain)
        {
            self.state.selected_domains.remove(position);
            self.prune_abilities();
        } else if self.state.selected_domains.len() < MAX_DOMAINS {
            self.state.selected_domains.push(domain);
        } else {
            return false;
        }
        self.bump();
        true
    }

    /// Flip membership of an ability id.
    ///
    /// The id is not checked against the selected domains: callers offer
    /// only [`SelectionStore::ability_cards`], and domain changes prune.
    pub fn toggle_ability(&mut self, id: &str) -> bool {
        if !self.state.selected_abilities.remove(id) {
            self.state.selected_abilities.insert(id.to_string());
        }
        self.bump();
        true
    }

    /// Select an origin card; selecting the current one clears it.
    pub fn select_origin(&mut self, id: Option<&str>) -> bool {
        let changed = toggle_single(
            &self.catalog,
            &mut self.state.selected_origin,
            id,
            Category::Origin,
        );
        if changed {
            self.bump();
        }
        changed
    }

    /// Select a community card; selecting the current one clears it.
    pub fn select_community(&mut self, id: Option<&str>) -> bool {
        let changed = toggle_single(
            &self.catalog,
            &mut self.state.selected_community,
            id,
            Category::Community,
        );
        if changed {
            self.bump();
        }
        changed
    }

    /// Return to the empty selection.
    pub fn reset(&mut self) {
        self.state = SelectionState::default();
        self.bump();
    }

    /// Replace the whole selection, e.g. with a loaded save.
    pub fn replace(&mut self, state: SelectionState) {
        self.state = state;
        self.bump();
    }

    pub fn active_class(&self) -> Option<&ClassInfo> {
        derived::active_class(&self.state, &self.catalog)
    }

    pub fn subclasses(&self) -> Vec<&'static str> {
        derived::subclasses(&self.state)
    }

    pub fn available_domains(&self) -> Vec<Domain> {
        derived::available_domains(&self.state, &self.rules)
    }

    pub fn class_cards(&self) -> Vec<&Card> {
        derived::class_cards(&self.state, &self.catalog, &self.rules)
    }

    pub fn ability_cards(&self) -> Vec<&Card> {
        derived::ability_cards(&self.state, &self.catalog)
    }

    pub fn abilities_by_domain(&self) -> Vec<(Domain, Vec<&Card>)> {
        derived::abilities_by_domain(&self.state, &self.catalog)
    }

    pub fn cards_by_level(&self) -> std::collections::BTreeMap<u32, Vec<&Card>> {
        derived::cards_by_level(&self.state, &self.catalog)
    }

    pub fn levels(&self) -> Vec<u32> {
        derived::levels(&self.state, &self.catalog)
    }

    pub fn selected_ability_cards(&self) -> Vec<&Card> {
        derived::selected_ability_cards(&self.state, &self.catalog)
    }

    pub fn origin_card(&self) -> Option<&Card> {
        derived::origin_card(&self.state, &self.catalog)
    }

    pub fn community_card(&self) -> Option<&Card> {
        derived::community_card(&self.state, &self.catalog)
    }

    /// Drop resolved ids that are not abilities of a selected domain.
    /// Unresolved ids are kept verbatim.
    fn prune_abilities(&mut self) {
        let catalog = &self.catalog;
        let domains = &self.state.selected_domains;
        self.state
            .selected_abilities
            .retain(|id| match catalog.card(id) {
                Some(card) => {
                    card.is_ability()
                        && card.domain.is_some_and(|domain| domains.contains(&domain))
                }
                None => true,
            });
    }

    fn bump(&mut self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

fn toggle_single(
    catalog: &CardIndex,
    slot: &mut Option<String>,
    id: Option<&str>,
    category: Category,
) -> bool {
    match id {
        None => slot.take().is_some(),
        Some(id) => {
            if catalog.card(id).map(|card| card.category) != Some(category) {
                return false;
            }
            if slot.as_deref() == Some(id) {
                *slot = None;
            } else {
                *slot = Some(id.to_string());
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_index;
    use proptest::prelude::*;

    fn manual_store() -> SelectionStore {
        SelectionStore::new(Arc::new(sample_index()), RuleSet::manual())
    }

    fn assert_invariants(store: &SelectionStore) {
        let state = store.state();
        assert!(state.selected_domains().len() <= MAX_DOMAINS);
        for id in state.selected_abilities() {
            if let Some(card) = store.catalog().card(id) {
                assert!(card.is_ability(), "{id} is not an ability");
                let domain = card.domain.expect("ability domain");
                assert!(state.selected_domains().contains(&domain), "{id} outside domains");
            }
        }
        if let Some(subclass) = state.selected_subclass() {
            assert!(store.subclasses().contains(&subclass));
        }
    }

    #[derive(Debug, Clone)]
    enum Action {
        ToggleDomain(Domain),
        ToggleAbility(usize),
        ToggleStale,
        SelectClass(&'static str),
        SelectSubclass(usize),
        SetManual(bool),
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            4 => prop::sample::select(Domain::ALL.to_vec()).prop_map(Action::ToggleDomain),
            4 => (0usize..8).prop_map(Action::ToggleAbility),
            1 => Just(Action::ToggleStale),
            2 => prop::sample::select(vec!["Bardo", "Furfante", "Guerriero"])
                .prop_map(Action::SelectClass),
            1 => (0usize..3).prop_map(Action::SelectSubclass),
            1 => any::<bool>().prop_map(Action::SetManual),
        ]
    }

    fn apply(store: &mut SelectionStore, action: &Action) {
        match action {
            Action::ToggleDomain(domain) => {
                store.toggle_domain(*domain);
            }
            Action::ToggleAbility(index) => {
                let id = store.ability_cards().get(*index).map(|card| card.id.clone());
                if let Some(id) = id {
                    store.toggle_ability(&id);
                }
            }
            Action::ToggleStale => {
                store.toggle_ability("stale-id");
            }
            Action::SelectClass(name) => {
                store.select_class(name);
            }
            Action::SelectSubclass(index) => {
                let name = store.subclasses().get(*index).copied();
                store.select_subclass(name);
            }
            Action::SetManual(manual) => {
                let rules = if *manual {
                    RuleSet::manual()
                } else {
                    RuleSet::default()
                };
                store.set_rules(rules);
            }
        }
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_action_sequence(
            actions in prop::collection::vec(arb_action(), 0..64)
        ) {
            let mut store = manual_store();
            for action in &actions {
                apply(&mut store, action);
                assert_invariants(&store);
            }
        }

        #[test]
        fn removing_a_domain_drops_exactly_its_abilities(
            actions in prop::collection::vec(arb_action(), 0..32),
            pick in 0usize..2
        ) {
            let mut store = manual_store();
            for action in &actions {
                apply(&mut store, action);
            }
            store.set_rules(RuleSet::manual());
            let Some(&removed) = store.state().selected_domains().get(pick) else {
                return Ok(());
            };
            let before = store.state().selected_abilities().clone();

            prop_assert!(store.toggle_domain(removed));
            let after = store.state().selected_abilities();
            prop_assert!(!store.state().selected_domains().contains(&removed));
            for id in &before {
                let in_removed = store
                    .catalog()
                    .card(id)
                    .and_then(|card| card.domain)
                    == Some(removed);
                prop_assert_eq!(after.contains(id), !in_removed, "{}", id);
            }
        }

        #[test]
        fn selecting_a_class_resets_dependent_choices(
            actions in prop::collection::vec(arb_action(), 0..32),
            class in prop::sample::select(vec!["Bardo", "Furfante", "Guerriero"]),
            manual in any::<bool>()
        ) {
            let mut store = manual_store();
            for action in &actions {
                apply(&mut store, action);
            }
            let rules = if manual { RuleSet::manual() } else { RuleSet::default() };
            store.set_rules(rules);
            let name = store.state().character_name().to_string();
            let origin = store.state().selected_origin().map(str::to_string);

            prop_assert!(store.select_class(class));
            let state = store.state();
            prop_assert_eq!(state.class_name(), Some(class));
            prop_assert_eq!(state.selected_subclass(), None);
            prop_assert!(state.selected_abilities().is_empty());
            prop_assert_eq!(state.selected_domains().to_vec(), store.rules().default_domains(class));
            prop_assert_eq!(state.character_name(), name.as_str());
            prop_assert_eq!(state.selected_origin().map(str::to_string), origin);
        }
    }

    #[test]
    fn third_domain_is_ignored() {
        let mut store = manual_store();
        assert!(store.toggle_domain(Domain::Grazia));
        assert!(store.toggle_domain(Domain::Codice));
        assert!(!store.toggle_domain(Domain::Arcano));
        assert_eq!(store.state().selected_domains(), &[Domain::Grazia, Domain::Codice]);
    }

    #[test]
    fn removing_domain_cascades_to_its_abilities() {
        let mut store = manual_store();
        store.toggle_domain(Domain::Grazia);
        store.toggle_domain(Domain::Codice);
        store.toggle_ability("grazia-1");
        store.toggle_ability("grazia-2");
        store.toggle_ability("codice-1");
        store.toggle_ability("ghost");

        store.toggle_domain(Domain::Grazia);
        let remaining: Vec<_> = store.state().selected_abilities().iter().cloned().collect();
        assert_eq!(remaining, vec!["codice-1".to_string(), "ghost".to_string()]);
        assert_eq!(store.state().selected_domains(), &[Domain::Codice]);
    }

    #[test]
    fn changing_class_resets_dependent_choices() {
        let mut store = SelectionStore::new(Arc::new(sample_index()), RuleSet::default());
        store.select_class("Bardo");
        store.select_subclass(Some("Trovatore"));
        store.toggle_ability("grazia-1");
        assert_eq!(store.state().selected_domains(), &[Domain::Grazia, Domain::Codice]);

        store.select_class("Furfante");
        assert_eq!(store.state().class_name(), Some("Furfante"));
        assert_eq!(store.state().selected_subclass(), None);
        assert!(store.state().selected_abilities().is_empty());
        assert_eq!(
            store.state().selected_domains(),
            &[Domain::Mezzanotte, Domain::Grazia]
        );

        let mut manual = manual_store();
        manual.select_class("Bardo");
        manual.toggle_domain(Domain::Arcano);
        manual.select_class("furfante");
        assert_eq!(manual.state().class_name(), Some("Furfante"));
        assert!(manual.state().selected_domains().is_empty());
    }

    #[test]
    fn class_bound_domains_cannot_be_toggled() {
        let mut store = SelectionStore::new(Arc::new(sample_index()), RuleSet::default());
        store.select_class("Bardo");
        assert!(!store.toggle_domain(Domain::Grazia));
        assert!(!store.toggle_domain(Domain::Arcano));
        assert_eq!(store.state().selected_domains().len(), 2);
    }

    #[test]
    fn subclass_must_belong_to_class() {
        let mut store = manual_store();
        assert!(!store.select_subclass(Some("Trovatore")), "no class yet");
        store.select_class("Bardo");
        assert!(!store.select_subclass(Some("Ladro")));
        assert!(store.select_subclass(Some("trovatore")));
        assert_eq!(store.state().selected_subclass(), Some("Trovatore"));
        assert!(store.select_subclass(None));
        assert_eq!(store.state().selected_subclass(), None);
    }

    #[test]
    fn toggling_ability_twice_is_identity() {
        let mut store = manual_store();
        store.toggle_domain(Domain::Grazia);
        store.toggle_ability("grazia-2");
        let before = store.state().clone();

        store.toggle_ability("x");
        store.toggle_ability("x");
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn origin_and_community_toggle_and_validate_category() {
        let mut store = manual_store();
        assert!(store.select_origin(Some("clank")));
        assert!(store.select_origin(Some("drakona")));
        assert_eq!(store.state().selected_origin(), Some("drakona"));
        assert!(store.select_origin(Some("drakona")));
        assert_eq!(store.state().selected_origin(), None);

        assert!(!store.select_origin(Some("boscaioli")), "community is not an origin");
        assert!(!store.select_community(Some("missing")));
        assert!(store.select_community(Some("boscaioli")));
        assert_eq!(store.community_card().map(|card| card.name.as_str()), Some("Boscaioli"));
        assert!(store.select_community(None));
        assert!(!store.select_community(None));
    }

    #[test]
    fn revision_advances_and_notifies() {
        let mut store = manual_store();
        let receiver = store.subscribe();
        assert_eq!(store.revision(), 0);

        store.set_character_name("Elena");
        assert!(!store.set_character_name("Elena"));
        store.toggle_domain(Domain::Valore);
        assert_eq!(store.revision(), 2);
        assert!(receiver.has_changed().expect("sender alive"));

        store.reset();
        assert!(store.state().is_empty());
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn switching_to_class_domains_prunes_abilities() {
        let mut store = manual_store();
        store.select_class("Bardo");
        store.toggle_domain(Domain::Arcano);
        store.toggle_domain(Domain::Grazia);
        store.toggle_ability("arcano-1");
        store.toggle_ability("grazia-1");

        store.set_rules(RuleSet::default());
        assert_eq!(store.state().selected_domains(), &[Domain::Grazia, Domain::Codice]);
        let abilities: Vec<_> = store.state().selected_abilities().iter().cloned().collect();
        assert_eq!(abilities, vec!["grazia-1".to_string()]);
        assert_invariants(&store);
    }

    #[test]
    fn toggling_subclass_bounding_keeps_loaded_selection() {
        let mut store = SelectionStore::new(Arc::new(sample_index()), RuleSet::default());
        let loaded = SelectionState::from_parts(
            "Elena".to_string(),
            Some("Bardo".to_string()),
            None,
            vec![Domain::Arcano],
            ["arcano-1".to_string()].into_iter().collect(),
            None,
            None,
        );
        store.replace(loaded.clone());
        let revision = store.revision();

        store.set_rules(RuleSet {
            bound_subclass_cards: false,
            ..RuleSet::default()
        });
        assert_eq!(store.state(), &loaded);
        assert!(!store.rules().bound_subclass_cards);
        assert_eq!(store.revision(), revision + 1);

        store.set_rules(RuleSet::default());
        assert_eq!(store.state(), &loaded);
    }

    #[test]
    fn pruning_drops_resolved_cards_without_a_domain() {
        let mut store = manual_store();
        store.toggle_domain(Domain::Grazia);
        store.toggle_domain(Domain::Codice);
        for id in ["grazia-1", "clank", "bard-t1", "ghost"] {
            store.toggle_ability(id);
        }

        store.toggle_domain(Domain::Codice);
        let remaining: Vec<_> = store.state().selected_abilities().iter().cloned().collect();
        assert_eq!(remaining, vec!["ghost".to_string(), "grazia-1".to_string()]);
    }
}
