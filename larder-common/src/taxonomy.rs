//! Static taxonomy tables
//!
//! Alimentary groups, regimens, dish types, durations and statuses are
//! immutable reference tables, loaded once at startup and addressed by id.
//! Mutable entities hold ids into these tables; every such id must resolve.

use crate::ids::{DishTypeId, DurationId, GroupId, Identifier, RegimenId, StatusId};
use crate::store::homonym_key;
use crate::{Error, Result};
use serde::Deserialize;

/// One immutable taxonomy record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticEntity<I> {
    pub id: I,
    pub text: String,
    /// Presentation hint for the view layer (colour, icon name)
    pub decoration: String,
}

impl<I> StaticEntity<I> {
    pub fn new(id: I, text: impl Into<String>, decoration: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            decoration: decoration.into(),
        }
    }
}

/// Fixed keyed table, sorted by id and never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTable<I> {
    entries: Vec<StaticEntity<I>>,
}

impl<I: Identifier> StaticTable<I> {
    /// Build a table, rejecting empty tables, invalid ids and duplicate ids
    pub fn new(mut entries: Vec<StaticEntity<I>>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config(format!("{} table is empty", I::TABLE)));
        }
        entries.sort_by_key(|e| e.id);
        for pair in entries.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(Error::Config(format!("duplicate {}", pair[0].id)));
            }
        }
        if let Some(bad) = entries.iter().find(|e| !e.id.is_valid()) {
            return Err(Error::Config(format!("invalid {}", bad.id)));
        }
        Ok(Self { entries })
    }

    pub fn at(&self, id: I) -> Result<&StaticEntity<I>> {
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .map(|pos| &self.entries[pos])
            .map_err(|_| id.not_found())
    }

    pub fn contains(&self, id: I) -> bool {
        self.at(id).is_ok()
    }

    /// Default entry for new entities
    pub fn first(&self) -> &StaticEntity<I> {
        &self.entries[0]
    }

    /// Case-insensitive lookup by display text
    pub fn find_by_text(&self, text: &str) -> Option<&StaticEntity<I>> {
        let key = homonym_key(text);
        self.entries.iter().find(|e| homonym_key(&e.text) == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StaticEntity<I>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The five taxonomy tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    pub groups: StaticTable<GroupId>,
    pub regimens: StaticTable<RegimenId>,
    pub dish_types: StaticTable<DishTypeId>,
    pub durations: StaticTable<DurationId>,
    pub statuses: StaticTable<StatusId>,
}

type RawEntry = (i64, String, String);

#[derive(Deserialize)]
struct TaxonomyDocument {
    groups: Vec<RawEntry>,
    regimens: Vec<RawEntry>,
    dish_types: Vec<RawEntry>,
    durations: Vec<RawEntry>,
    statuses: Vec<RawEntry>,
}

fn table_from_raw<I: Identifier>(raw: Vec<RawEntry>) -> Result<StaticTable<I>> {
    StaticTable::new(
        raw.into_iter()
            .map(|(id, text, decoration)| StaticEntity::new(I::from_raw(id), text, decoration))
            .collect(),
    )
}

fn table_from_static<I: Identifier>(raw: &[(i64, &str, &str)]) -> StaticTable<I> {
    StaticTable {
        entries: raw
            .iter()
            .map(|(id, text, decoration)| StaticEntity::new(I::from_raw(*id), *text, *decoration))
            .collect(),
    }
}

const BUILTIN_GROUPS: &[(i64, &str, &str)] = &[
    (1, "Cereals", "#d9b36c"),
    (2, "Vegetables", "#6aa84f"),
    (3, "Fruits", "#e06666"),
    (4, "Dairy", "#cfe2f3"),
    (5, "Meat", "#a61c00"),
    (6, "Fish", "#3d85c6"),
    (7, "Eggs", "#ffe599"),
    (8, "Sugars", "#f6b26b"),
    (9, "Fats", "#ffd966"),
    (10, "Spices", "#b45f06"),
    (11, "Beverages", "#76a5af"),
    (12, "Other", "#999999"),
];

const BUILTIN_REGIMENS: &[(i64, &str, &str)] = &[
    (1, "Omnivore", ""),
    (2, "Vegetarian", "leaf"),
    (3, "Vegan", "sprout"),
    (4, "Gluten-free", "no-wheat"),
];

const BUILTIN_DISH_TYPES: &[(i64, &str, &str)] = &[
    (1, "Main", ""),
    (2, "Starter", ""),
    (3, "Side", ""),
    (4, "Dessert", ""),
    (5, "Sauce", ""),
    (6, "Bread", ""),
    (7, "Drink", ""),
];

const BUILTIN_DURATIONS: &[(i64, &str, &str)] = &[
    (1, "Quick (< 30 min)", "1"),
    (2, "Medium (30-60 min)", "2"),
    (3, "Long (> 1 h)", "3"),
];

const BUILTIN_STATUSES: &[(i64, &str, &str)] = &[
    (1, "Draft", ""),
    (2, "Tested", ""),
    (3, "Favourite", "star"),
];

impl Taxonomy {
    /// Built-in taxonomy shipped with the application
    pub fn builtin() -> Self {
        Self {
            groups: table_from_static(BUILTIN_GROUPS),
            regimens: table_from_static(BUILTIN_REGIMENS),
            dish_types: table_from_static(BUILTIN_DISH_TYPES),
            durations: table_from_static(BUILTIN_DURATIONS),
            statuses: table_from_static(BUILTIN_STATUSES),
        }
    }

    /// Load a taxonomy from its JSON description
    ///
    /// Each key holds an array of `[id, text, decoration]` triples.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: TaxonomyDocument = serde_json::from_str(json)?;
        Ok(Self {
            groups: table_from_raw(doc.groups)?,
            regimens: table_from_raw(doc.regimens)?,
            dish_types: table_from_raw(doc.dish_types)?,
            durations: table_from_raw(doc.durations)?,
            statuses: table_from_raw(doc.statuses)?,
        })
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_well_formed() {
        let t = Taxonomy::builtin();
        // Re-validate through the checked constructor
        assert!(StaticTable::new(t.groups.iter().cloned().collect()).is_ok());
        assert!(StaticTable::new(t.statuses.iter().cloned().collect()).is_ok());
        assert_eq!(t.regimens.first().id, RegimenId(1));
        assert_eq!(t.dish_types.first().text, "Main");
    }

    #[test]
    fn test_lookup_invalid_and_absent_ids() {
        let t = Taxonomy::builtin();
        assert!(matches!(
            t.groups.at(GroupId(0)),
            Err(Error::NotFound { table: "alimentary group", id: 0 })
        ));
        assert!(t.groups.at(GroupId(999)).is_err());
        assert_eq!(t.groups.at(GroupId(8)).unwrap().text, "Sugars");
    }

    #[test]
    fn test_find_by_text_ignores_case() {
        let t = Taxonomy::builtin();
        assert_eq!(t.groups.find_by_text("  cereals ").unwrap().id, GroupId(1));
        assert!(t.groups.find_by_text("Pasta").is_none());
    }

    #[test]
    fn test_from_json() {
        let json = r##"{
            "groups": [[2, "Sucres", "#fff"], [1, "Céréales", "#000"]],
            "regimens": [[1, "Tout", ""]],
            "dish_types": [[1, "Plat", ""]],
            "durations": [[1, "Rapide", ""]],
            "statuses": [[1, "Brouillon", ""]]
        }"##;
        let t = Taxonomy::from_json(json).unwrap();
        assert_eq!(t.groups.len(), 2);
        assert_eq!(t.groups.first().text, "Céréales");
        assert_eq!(t.groups.at(GroupId(2)).unwrap().text, "Sucres");
    }

    #[test]
    fn test_from_json_rejects_empty_and_duplicate_tables() {
        let empty = r#"{"groups": [], "regimens": [[1,"a",""]], "dish_types": [[1,"a",""]],
                        "durations": [[1,"a",""]], "statuses": [[1,"a",""]]}"#;
        assert!(matches!(Taxonomy::from_json(empty), Err(Error::Config(_))));

        let dup = r#"{"groups": [[1,"a",""],[1,"b",""]], "regimens": [[1,"a",""]],
                      "dish_types": [[1,"a",""]], "durations": [[1,"a",""]], "statuses": [[1,"a",""]]}"#;
        assert!(matches!(Taxonomy::from_json(dup), Err(Error::Config(_))));
    }
}
