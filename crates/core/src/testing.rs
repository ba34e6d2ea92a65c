//! Card fixtures shared by the unit tests.

use crate::{
    catalog::CardIndex,
    models::{Card, Category, Domain, Subcategory},
};

fn card(id: &str, name: &str, category: Category, image_ref: String) -> Card {
    Card {
        id: id.to_string(),
        name: name.to_string(),
        category,
        domain: None,
        subcategory: None,
        card_type: None,
        level: None,
        threshold: None,
        page: 0,
        data_ref: image_ref.replace(".png", ".json"),
        image_ref,
    }
}

pub fn origin(id: &str, name: &str) -> Card {
    let mut card = card(id, name, Category::Origin, format!("origine/{id}.png"));
    card.page = 7;
    card
}

pub fn community(id: &str, name: &str) -> Card {
    let mut card = card(id, name, Category::Community, format!("comunità/{id}.png"));
    card.page = 9;
    card
}

pub fn ability(id: &str, domain: Domain, level: u32) -> Card {
    let mut card = card(
        id,
        &id.to_uppercase(),
        Category::Domain,
        format!("domini/{domain}/abilita/{id}.png"),
    );
    card.domain = Some(domain);
    card.subcategory = Some(Subcategory::Ability);
    card.card_type = Some("incantesimo".to_string());
    card.level = Some(level);
    card.page = 10;
    card
}

pub fn class_feature(id: &str, name: &str, page: u32, card_type: Option<&str>) -> Card {
    let mut card = card(id, name, Category::Domain, format!("domini/classi/{id}.png"));
    card.domain = crate::rules::class_for_subclass(name)
        .and_then(crate::rules::class_rule)
        .map(|rule| rule.domains[0]);
    card.subcategory = Some(Subcategory::ClassFeature);
    card.card_type = card_type.map(str::to_string);
    card.page = page;
    card
}

/// Small catalog: two classes with both subclasses, abilities across four
/// domains, two origins and two communities.
pub fn sample_index() -> CardIndex {
    CardIndex::new(vec![
        class_feature("bard-t1", "TROVATORE", 1, Some("privilegio")),
        class_feature("bard-t2", "TROVATORE", 1, Some("specializzazione")),
        class_feature("bard-t3", "TROVATORE", 2, Some("maestria")),
        class_feature("bard-o1", "ORATORE", 2, Some("privilegio")),
        class_feature("bard-o2", "ORATORE", 2, Some("specializzazione")),
        class_feature("bard-o3", "ORATORE", 3, Some("maestria")),
        class_feature("rogue-n1", "OMBRA NOTTURNA", 4, Some("privilegio")),
        class_feature("rogue-n2", "OMBRA NOTTURNA", 4, Some("specializzazione")),
        class_feature("rogue-l1", "LADRO", 5, Some("privilegio")),
        ability("grazia-1", Domain::Grazia, 1),
        ability("grazia-2", Domain::Grazia, 2),
        ability("codice-1", Domain::Codice, 1),
        ability("codice-3", Domain::Codice, 3),
        ability("mezzanotte-1", Domain::Mezzanotte, 1),
        ability("arcano-1", Domain::Arcano, 1),
        origin("clank", "Clank"),
        origin("drakona", "Drakona"),
        community("boscaioli", "Boscaioli"),
        community("marinai", "Marinai"),
    ])
}
