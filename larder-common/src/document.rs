//! Persisted document model
//!
//! The book is stored as one JSON tree with four arrays. Units and
//! ingredients are positional arrays, recipes are objects, ingredient-list
//! entries are arrays led by their numeric etype and planning days are
//! `[date, slot0, slot1, slot2]` where a slot item is a number (recipe id) or
//! a string (free text).
//!
//! ```json
//! {
//!   "units": [[1, "g", 2]],
//!   "ingredients": [[1, "Flour", 1, 2]],
//!   "recipes": [{ "id": 1, "ing": [[0, 200.0, 1, 1, "sifted"]], ... }],
//!   "planning": [["2026-10-14", [1], [], ["soup"]]]
//! }
//! ```

use crate::events::EventBus;
use crate::ids::{DishTypeId, DurationId, GroupId, IngredientId, RecipeId, RegimenId, StatusId, UnitId};
use crate::store::{
    Book, Day, IngredientData, ListEntry, PlanItem, PlanningCalendar, Recipe, Slot, Table,
    TaxonomyRefs, UnitData,
};
use crate::taxonomy::Taxonomy;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Ingredient rows persist group id 0 while provisional
pub const PROVISIONAL_GROUP: i64 = 0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookDocument {
    #[serde(default)]
    pub units: Vec<UnitRecord>,
    #[serde(default)]
    pub ingredients: Vec<IngredientRecord>,
    #[serde(default)]
    pub recipes: Vec<RecipeRecord>,
    #[serde(default)]
    pub planning: Vec<DayRecord>,
}

/// `[id, text, used]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord(pub i64, pub String, pub u32);

/// `[id, text, group_id, used]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRecord(pub i64, pub String, pub i64, pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub id: i64,
    #[serde(default)]
    pub used: u32,
    #[serde(default)]
    pub title: String,
    pub regimen: i64,
    pub status: i64,
    #[serde(rename = "type")]
    pub dish_type: i64,
    pub duration: i64,
    #[serde(default)]
    pub basic: bool,
    #[serde(rename = "d-portions", default)]
    pub portions: f64,
    #[serde(rename = "t-portions", default)]
    pub portions_label: String,
    #[serde(rename = "ing", default)]
    pub entries: Vec<EntryRecord>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// Etype-tagged ingredient-list entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRecord {
    /// `[0, amount, unit_id, ingredient_id, qualifier]`
    Ingredient {
        amount: f64,
        unit: i64,
        ingredient: i64,
        qualifier: String,
    },
    /// `[1, recipe_id]`
    SubRecipe { recipe: i64 },
    /// `[2, text]`
    Decoration { text: String },
}

impl Serialize for EntryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            EntryRecord::Ingredient {
                amount,
                unit,
                ingredient,
                qualifier,
            } => (ListEntry::ETYPE_INGREDIENT, amount, unit, ingredient, qualifier)
                .serialize(serializer),
            EntryRecord::SubRecipe { recipe } => {
                (ListEntry::ETYPE_SUB_RECIPE, recipe).serialize(serializer)
            }
            EntryRecord::Decoration { text } => {
                (ListEntry::ETYPE_DECORATION, text).serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for EntryRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let field = |index: usize| values.get(index).unwrap_or(&serde_json::Value::Null);
        let int = |index: usize, what: &str| -> std::result::Result<i64, D::Error> {
            field(index)
                .as_i64()
                .ok_or_else(|| de::Error::custom(format!("entry field {} must be an integer", what)))
        };
        let number = |index: usize| -> std::result::Result<f64, D::Error> {
            field(index)
                .as_f64()
                .ok_or_else(|| de::Error::custom("entry amount must be a number"))
        };
        let text = |index: usize| field(index).as_str().unwrap_or_default().to_string();

        let etype = match field(0).as_u64() {
            Some(etype) => etype,
            None => return Err(de::Error::custom("entry must start with a numeric etype")),
        };
        match u8::try_from(etype) {
            Ok(ListEntry::ETYPE_INGREDIENT) => Ok(EntryRecord::Ingredient {
                amount: number(1)?,
                unit: int(2, "unit")?,
                ingredient: int(3, "ingredient")?,
                qualifier: text(4),
            }),
            Ok(ListEntry::ETYPE_SUB_RECIPE) => Ok(EntryRecord::SubRecipe {
                recipe: int(1, "recipe")?,
            }),
            Ok(ListEntry::ETYPE_DECORATION) => Ok(EntryRecord::Decoration { text: text(1) }),
            _ => Err(de::Error::custom(format!("unknown entry etype {}", etype))),
        }
    }
}

impl From<&ListEntry> for EntryRecord {
    fn from(entry: &ListEntry) -> Self {
        match entry {
            ListEntry::Ingredient(e) => EntryRecord::Ingredient {
                amount: e.amount,
                unit: e.unit.0,
                ingredient: e.ingredient.0,
                qualifier: e.qualifier.clone(),
            },
            ListEntry::SubRecipe(e) => EntryRecord::SubRecipe { recipe: e.recipe.0 },
            ListEntry::Decoration(e) => EntryRecord::Decoration {
                text: e.text.clone(),
            },
        }
    }
}

impl From<EntryRecord> for ListEntry {
    fn from(record: EntryRecord) -> Self {
        match record {
            EntryRecord::Ingredient {
                amount,
                unit,
                ingredient,
                qualifier,
            } => ListEntry::ingredient(amount, UnitId(unit), IngredientId(ingredient), qualifier),
            EntryRecord::SubRecipe { recipe } => ListEntry::sub_recipe(RecipeId(recipe)),
            EntryRecord::Decoration { text } => ListEntry::decoration(text),
        }
    }
}

/// `[date, slot0, slot1, slot2]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord(
    pub NaiveDate,
    pub Vec<PlanRecordItem>,
    pub Vec<PlanRecordItem>,
    pub Vec<PlanRecordItem>,
);

/// Plan item discriminated by its JSON type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanRecordItem {
    Recipe(i64),
    Text(String),
}

impl From<&PlanItem> for PlanRecordItem {
    fn from(item: &PlanItem) -> Self {
        match item {
            PlanItem::Recipe(id) => PlanRecordItem::Recipe(id.0),
            PlanItem::Text(text) => PlanRecordItem::Text(text.clone()),
        }
    }
}

impl From<PlanRecordItem> for PlanItem {
    fn from(item: PlanRecordItem) -> Self {
        match item {
            PlanRecordItem::Recipe(id) => PlanItem::Recipe(RecipeId(id)),
            PlanRecordItem::Text(text) => PlanItem::Text(text),
        }
    }
}

impl DayRecord {
    fn slot(&self, slot: Slot) -> &[PlanRecordItem] {
        match slot {
            Slot::Midday => &self.1,
            Slot::Snack => &self.2,
            Slot::Evening => &self.3,
        }
    }
}

impl BookDocument {
    /// Parse a document; malformed input is a load failure
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Load(format!("malformed document: {}", e)))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Turn a lookup failure during load into a load error naming its context
fn dangling(context: String) -> impl FnOnce(Error) -> Error {
    move |e| Error::Load(format!("{}: {}", context, e))
}

impl Book {
    /// Snapshot of the whole store in its persisted shape
    pub fn to_document(&self) -> BookDocument {
        BookDocument {
            units: self
                .units()
                .iter()
                .map(|u| UnitRecord(u.id.0, u.text.clone(), u.used))
                .collect(),
            ingredients: self
                .ingredients()
                .iter()
                .map(|i| {
                    IngredientRecord(
                        i.id.0,
                        i.text.clone(),
                        i.group.map_or(PROVISIONAL_GROUP, |g| g.0),
                        i.used,
                    )
                })
                .collect(),
            recipes: self
                .recipes()
                .iter()
                .map(|r| RecipeRecord {
                    id: r.id.0,
                    used: r.used,
                    title: r.title.clone(),
                    regimen: r.taxonomy.regimen.0,
                    status: r.taxonomy.status.0,
                    dish_type: r.taxonomy.dish_type.0,
                    duration: r.taxonomy.duration.0,
                    basic: r.basic,
                    portions: r.portions,
                    portions_label: r.portions_label.clone(),
                    entries: r.ingredients.iter().map(EntryRecord::from).collect(),
                    steps: r.steps.clone(),
                    notes: r.notes.clone(),
                })
                .collect(),
            planning: self
                .planning()
                .days()
                .map(|day| {
                    let slot = |s: Slot| day.slot(s).iter().map(PlanRecordItem::from).collect();
                    DayRecord(
                        day.date(),
                        slot(Slot::Midday),
                        slot(Slot::Snack),
                        slot(Slot::Evening),
                    )
                })
                .collect(),
        }
    }

    /// Build a book from a parsed document
    ///
    /// Every ingredient group, recipe taxonomy reference and ingredient-list
    /// reference must resolve. Stored usage counters are taken as they are;
    /// drift is the repair engine's business. Plan items naming a missing
    /// recipe are kept and reported by the repair engine.
    pub fn from_document(doc: BookDocument, taxonomy: Arc<Taxonomy>, events: EventBus) -> Result<Book> {
        let units = Table::from_entries(
            events.clone(),
            doc.units
                .into_iter()
                .map(|UnitRecord(id, text, used)| UnitData {
                    id: UnitId(id),
                    text,
                    used,
                })
                .collect(),
        )?;

        let mut ingredients = Vec::with_capacity(doc.ingredients.len());
        for IngredientRecord(id, text, group, used) in doc.ingredients {
            let id = IngredientId(id);
            let group = match group {
                PROVISIONAL_GROUP => None,
                raw => {
                    let group = GroupId(raw);
                    taxonomy.groups.at(group).map_err(dangling(id.to_string()))?;
                    Some(group)
                }
            };
            let mut row = IngredientData::new(id, text, group);
            row.used = used;
            ingredients.push(row);
        }
        let ingredients = Table::from_entries(events.clone(), ingredients)?;

        let recipe_ids: BTreeSet<RecipeId> = doc.recipes.iter().map(|r| RecipeId(r.id)).collect();
        let mut recipes = Vec::with_capacity(doc.recipes.len());
        for record in doc.recipes {
            let id = RecipeId(record.id);
            let refs = TaxonomyRefs {
                regimen: RegimenId(record.regimen),
                status: StatusId(record.status),
                dish_type: DishTypeId(record.dish_type),
                duration: DurationId(record.duration),
            };
            refs.validate(&taxonomy).map_err(dangling(id.to_string()))?;

            let entries: Vec<ListEntry> = record.entries.into_iter().map(ListEntry::from).collect();
            for entry in &entries {
                match entry {
                    ListEntry::Ingredient(e) => {
                        if !e.amount.is_finite() || e.amount <= 0.0 {
                            return Err(Error::Load(format!(
                                "{}: amount must be a positive number, got {}",
                                id, e.amount
                            )));
                        }
                        units.at(e.unit).map_err(dangling(id.to_string()))?;
                        let ingredient =
                            ingredients.at(e.ingredient).map_err(dangling(id.to_string()))?;
                        if ingredient.is_provisional() {
                            return Err(Error::Load(format!(
                                "{}: {} has no alimentary group",
                                id, e.ingredient
                            )));
                        }
                    }
                    ListEntry::SubRecipe(e) => {
                        if !recipe_ids.contains(&e.recipe) {
                            return Err(Error::Load(format!(
                                "{}: embedded {} does not exist",
                                id, e.recipe
                            )));
                        }
                    }
                    ListEntry::Decoration(_) => {}
                }
            }

            let mut recipe = Recipe::new(id, refs);
            recipe.used = record.used;
            recipe.title = record.title;
            recipe.basic = record.basic;
            recipe.portions = record.portions;
            recipe.portions_label = record.portions_label;
            recipe.ingredients = entries;
            recipe.steps = record.steps;
            recipe.notes = record.notes;
            recipes.push(recipe);
        }
        let recipes = Table::from_entries(events.clone(), recipes)?;

        let mut days = Vec::with_capacity(doc.planning.len());
        for record in doc.planning {
            let mut day = Day::new(record.0);
            for slot in Slot::ALL {
                day.slot_mut(slot)
                    .extend(record.slot(slot).iter().cloned().map(PlanItem::from));
            }
            days.push(day);
        }
        let planning = PlanningCalendar::from_days(events.clone(), days)?;

        debug!(
            units = units.len(),
            ingredients = ingredients.len(),
            recipes = recipes.len(),
            days = planning.len(),
            "Document decoded"
        );
        Ok(Book::from_parts(taxonomy, events, units, ingredients, recipes, planning))
    }

    /// Replace this book's content with a document
    ///
    /// The document is decoded completely before anything changes; on
    /// failure the current store is left as it was.
    pub fn load_document(&mut self, doc: BookDocument) -> Result<()> {
        let book = Book::from_document(doc, self.shared_taxonomy(), self.events().clone())?;
        self.replace_with(book);
        info!("Document loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_encoding_is_etype_tagged() {
        let entries = vec![
            EntryRecord::Ingredient {
                amount: 200.0,
                unit: 1,
                ingredient: 2,
                qualifier: "sifted".into(),
            },
            EntryRecord::SubRecipe { recipe: 3 },
            EntryRecord::Decoration { text: "Dough".into() },
        ];
        let value = serde_json::to_value(&entries).unwrap();
        assert_eq!(value, json!([[0, 200.0, 1, 2, "sifted"], [1, 3], [2, "Dough"]]));
        let back: Vec<EntryRecord> = serde_json::from_value(value).unwrap();
        assert_eq!(back, entries);
    }

    #[test]
    fn test_entry_rejects_unknown_etype() {
        assert!(serde_json::from_value::<EntryRecord>(json!([7, "x"])).is_err());
        assert!(serde_json::from_value::<EntryRecord>(json!(["0", 1.0])).is_err());
    }

    #[test]
    fn test_day_items_discriminated_by_json_type() {
        let day: DayRecord = serde_json::from_value(json!(["2026-10-14", [4, "soup"], [], []])).unwrap();
        assert_eq!(day.0, NaiveDate::from_ymd_opt(2026, 10, 14).unwrap());
        assert_eq!(
            day.1,
            vec![PlanRecordItem::Recipe(4), PlanRecordItem::Text("soup".into())]
        );
    }

    #[test]
    fn test_recipe_record_field_names() {
        let record = RecipeRecord {
            id: 1,
            used: 0,
            title: "Bread".into(),
            regimen: 1,
            status: 1,
            dish_type: 2,
            duration: 1,
            basic: true,
            portions: 4.0,
            portions_label: "slices".into(),
            entries: vec![],
            steps: vec!["Knead".into()],
            notes: String::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], 2);
        assert_eq!(value["d-portions"], 4.0);
        assert_eq!(value["t-portions"], "slices");
        assert!(value["ing"].is_array());
    }

    #[test]
    fn test_malformed_json_is_load_error() {
        assert!(matches!(BookDocument::from_json("{ not json"), Err(Error::Load(_))));
        let empty = BookDocument::from_json("{}").unwrap();
        assert_eq!(empty, BookDocument::default());
    }

    #[test]
    fn test_group_zero_decodes_provisional() {
        let doc = BookDocument {
            ingredients: vec![IngredientRecord(3, "Thing".into(), 0, 0)],
            ..Default::default()
        };
        let book = Book::from_document(doc, Arc::new(Taxonomy::builtin()), EventBus::new(8)).unwrap();
        assert!(book.ingredients().at(IngredientId(3)).unwrap().is_provisional());
        assert_eq!(book.ingredients().next_id(), IngredientId(4));
        assert_eq!(book.to_document().ingredients[0].2, PROVISIONAL_GROUP);
    }
}
