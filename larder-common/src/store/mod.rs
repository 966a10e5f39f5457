//! In-memory recipe book
//!
//! The [`Book`] owns every entity table, the planning calendar and the
//! pending set of provisional ingredient rows. All mutations go through its
//! methods so that usage counters stay in step with the ingredient graph and
//! views are notified once per affected entity.
//!
//! Usage accounting on the edit path is incremental (see [`UsageDelta`]); the
//! repair engine recomputes counts from scratch as the independent auditor.

mod editor;
mod entry;
mod ingredient;
mod planning;
mod recipe;
mod table;
mod unit;

pub use editor::{EditOutcome, EditorSession, EditorState};
pub use entry::{format_amount, DecorationEntry, IngredientEntry, ListEntry, SubRecipeEntry};
pub use ingredient::IngredientData;
pub use planning::{Day, PlanItem, PlanningCalendar, Slot};
pub use recipe::{Recipe, RecipeDraft, TaxonomyRefs, UsageDelta};
pub use table::{DefaultEntity, Entity, Table};
pub use unit::UnitData;

use crate::events::{EventBus, StoreEvent};
use crate::ids::{EntityRef, GroupId, IngredientId, RecipeId, UnitId};
use crate::taxonomy::Taxonomy;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Comparison key for homonym detection: trimmed, whitespace-collapsed,
/// lower-cased text
pub fn homonym_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn require_text(what: &str, text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput(format!("{} text must not be empty", what)));
    }
    Ok(text.to_string())
}

#[derive(Debug, Clone)]
pub struct Book {
    taxonomy: Arc<Taxonomy>,
    units: Table<UnitData>,
    ingredients: Table<IngredientData>,
    recipes: Table<Recipe>,
    planning: PlanningCalendar,
    pending_ingredients: BTreeSet<IngredientId>,
    events: EventBus,
}

impl Book {
    pub fn new(taxonomy: Arc<Taxonomy>, events: EventBus) -> Self {
        Self {
            taxonomy,
            units: Table::new(events.clone()),
            ingredients: Table::new(events.clone()),
            recipes: Table::new(events.clone()),
            planning: PlanningCalendar::new(events.clone()),
            pending_ingredients: BTreeSet::new(),
            events,
        }
    }

    /// Empty book over the built-in taxonomy
    pub fn with_builtin_taxonomy() -> Self {
        Self::new(Arc::new(Taxonomy::builtin()), EventBus::default())
    }

    pub(crate) fn from_parts(
        taxonomy: Arc<Taxonomy>,
        events: EventBus,
        units: Table<UnitData>,
        ingredients: Table<IngredientData>,
        recipes: Table<Recipe>,
        planning: PlanningCalendar,
    ) -> Self {
        let mut book = Self {
            taxonomy,
            units,
            ingredients,
            recipes,
            planning,
            pending_ingredients: BTreeSet::new(),
            events,
        };
        book.refresh_known_units();
        book
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn shared_taxonomy(&self) -> Arc<Taxonomy> {
        Arc::clone(&self.taxonomy)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn units(&self) -> &Table<UnitData> {
        &self.units
    }

    pub fn ingredients(&self) -> &Table<IngredientData> {
        &self.ingredients
    }

    pub fn recipes(&self) -> &Table<Recipe> {
        &self.recipes
    }

    pub fn planning(&self) -> &PlanningCalendar {
        &self.planning
    }

    /// Replace the whole store with `other`, keeping this book's subscribers
    pub fn replace_with(&mut self, mut other: Book) {
        let events = self.events.clone();
        other.units.rebind(events.clone());
        other.ingredients.rebind(events.clone());
        other.recipes.rebind(events.clone());
        other.planning.rebind(events.clone());
        other.events = events;
        *self = other;

        self.events.emit_lossy(StoreEvent::Reset);
        info!(
            units = self.units.len(),
            ingredients = self.ingredients.len(),
            recipes = self.recipes.len(),
            "Book replaced"
        );
    }

    // ----------------------------------------------------------------------
    // Usage counters
    // ----------------------------------------------------------------------

    /// Stored usage counter of an entity
    pub fn usage(&self, entity: EntityRef) -> Result<u32> {
        Ok(match entity {
            EntityRef::Unit(id) => self.units.at(id)?.used,
            EntityRef::Ingredient(id) => self.ingredients.at(id)?.used,
            EntityRef::Recipe(id) => self.recipes.at(id)?.used,
        })
    }

    fn usage_mut(&mut self, entity: EntityRef) -> Result<&mut u32> {
        Ok(match entity {
            EntityRef::Unit(id) => &mut self.units.at_mut(id)?.used,
            EntityRef::Ingredient(id) => &mut self.ingredients.at_mut(id)?.used,
            EntityRef::Recipe(id) => &mut self.recipes.at_mut(id)?.used,
        })
    }

    fn value_modified(&self, entity: EntityRef) {
        match entity {
            EntityRef::Unit(id) => self.units.value_modified(id),
            EntityRef::Ingredient(id) => self.ingredients.value_modified(id),
            EntityRef::Recipe(id) => self.recipes.value_modified(id),
        }
    }

    /// Overwrite a stored usage counter
    ///
    /// Returns true if the value changed. Used by count repair; the edit path
    /// never calls it.
    pub fn overwrite_usage(&mut self, entity: EntityRef, used: u32) -> Result<bool> {
        let slot = self.usage_mut(entity)?;
        if *slot == used {
            return Ok(false);
        }
        *slot = used;
        self.value_modified(entity);
        Ok(true)
    }

    /// Recipes whose ingredient list references `entity`, in id order
    pub fn references_to(&self, entity: EntityRef) -> Vec<RecipeId> {
        self.recipes
            .iter()
            .filter(|recipe| {
                recipe
                    .ingredients
                    .iter()
                    .any(|entry| entry.usage_refs().any(|r| r == entity))
            })
            .map(|recipe| recipe.id)
            .collect()
    }

    fn check_delta(&self, delta: &UsageDelta) -> Result<()> {
        for (entity, _) in delta.iter() {
            self.usage(entity)?;
        }
        Ok(())
    }

    /// Apply a checked delta, notifying each affected entity once
    fn apply_delta(&mut self, delta: &UsageDelta) -> Result<()> {
        for (entity, change) in delta.iter() {
            let slot = self.usage_mut(entity)?;
            let next = i64::from(*slot) + change;
            *slot = if next < 0 {
                warn!(%entity, stored = *slot, change, "Usage counter would go negative; clamping to 0");
                0
            } else {
                u32::try_from(next).unwrap_or(u32::MAX)
            };
            self.value_modified(entity);
        }
        Ok(())
    }

    /// Rebuild every ingredient's set of known units from the recipes
    fn refresh_known_units(&mut self) {
        let mut known: BTreeMap<IngredientId, BTreeSet<UnitId>> = BTreeMap::new();
        for recipe in self.recipes.iter() {
            for entry in &recipe.ingredients {
                if let ListEntry::Ingredient(e) = entry {
                    known.entry(e.ingredient).or_default().insert(e.unit);
                }
            }
        }
        for ingredient in self.ingredients.iter_mut() {
            ingredient.units = known.remove(&ingredient.id).unwrap_or_default();
        }
    }

    // ----------------------------------------------------------------------
    // Units
    // ----------------------------------------------------------------------

    pub fn insert_unit(&mut self, text: &str) -> Result<UnitId> {
        let text = require_text("unit", text)?;
        self.units.insert_with(|id| UnitData::new(id, text))
    }

    /// Unit whose text matches `text` by homonym key, lowest id first
    pub fn find_unit(&self, text: &str) -> Option<UnitId> {
        let key = homonym_key(text);
        self.units
            .iter()
            .find(|unit| homonym_key(&unit.text) == key)
            .map(|unit| unit.id)
    }

    /// Reuse an existing unit of the same name instead of creating a duplicate
    pub fn find_or_insert_unit(&mut self, text: &str) -> Result<UnitId> {
        match self.find_unit(text) {
            Some(id) => Ok(id),
            None => self.insert_unit(text),
        }
    }

    pub fn set_unit_text(&mut self, id: UnitId, text: &str) -> Result<()> {
        let text = require_text("unit", text)?;
        self.units.at_mut(id)?.text = text;
        self.units.value_modified(id);
        Ok(())
    }

    /// Remove a unit no ingredient entry references
    pub fn remove_unit(&mut self, id: UnitId) -> Result<UnitData> {
        self.units.at(id)?;
        let users = self.references_to(EntityRef::Unit(id));
        if !users.is_empty() {
            return Err(Error::IllegalOperation(format!(
                "{} is still used by {} recipe(s)",
                id,
                users.len()
            )));
        }
        self.units.remove(id)
    }

    /// Merge `losers` into `winner`: re-point entries, sum counters, delete losers
    ///
    /// Returns the number of units removed.
    pub fn merge_units(&mut self, winner: UnitId, losers: &[UnitId]) -> Result<usize> {
        let losers: BTreeSet<UnitId> = losers.iter().copied().filter(|l| *l != winner).collect();
        let mut total = self.units.at(winner)?.used;
        for loser in &losers {
            total = total.saturating_add(self.units.at(*loser)?.used);
        }
        if losers.is_empty() {
            return Ok(0);
        }

        let mut touched = Vec::new();
        for recipe in self.recipes.iter_mut() {
            let mut changed = false;
            for entry in recipe.ingredients.iter_mut() {
                if let ListEntry::Ingredient(e) = entry {
                    if losers.contains(&e.unit) {
                        e.unit = winner;
                        changed = true;
                    }
                }
            }
            if changed {
                touched.push(recipe.id);
            }
        }
        for id in touched {
            self.recipes.value_modified(id);
        }

        self.units.at_mut(winner)?.used = total;
        for loser in &losers {
            self.units.remove(*loser)?;
        }
        self.units.value_modified(winner);
        self.refresh_known_units();

        info!(winner = winner.0, merged = losers.len(), used = total, "Units merged");
        Ok(losers.len())
    }

    // ----------------------------------------------------------------------
    // Ingredients
    // ----------------------------------------------------------------------

    pub fn insert_ingredient(&mut self, text: &str, group: GroupId) -> Result<IngredientId> {
        let text = require_text("ingredient", text)?;
        self.taxonomy.groups.at(group)?;
        self.ingredients
            .insert_with(|id| IngredientData::new(id, text, Some(group)))
    }

    /// Insert a placeholder row for inline authoring
    ///
    /// The row has no group and is swept by [`Book::validate_temporary_data`]
    /// unless it is confirmed or promoted first.
    pub fn insert_provisional_ingredient(&mut self, text: &str) -> Result<IngredientId> {
        let text = text.trim().to_string();
        let id = self
            .ingredients
            .insert_with(|id| IngredientData::new(id, text, None))?;
        self.pending_ingredients.insert(id);
        Ok(id)
    }

    pub fn pending_ingredients(&self) -> &BTreeSet<IngredientId> {
        &self.pending_ingredients
    }

    pub fn set_ingredient_text(&mut self, id: IngredientId, text: &str) -> Result<()> {
        let text = require_text("ingredient", text)?;
        self.ingredients.at_mut(id)?.text = text;
        self.ingredients.value_modified(id);
        Ok(())
    }

    /// Set the alimentary group; promotes a provisional row
    pub fn set_ingredient_group(&mut self, id: IngredientId, group: GroupId) -> Result<()> {
        self.taxonomy.groups.at(group)?;
        self.ingredients.at_mut(id)?.group = Some(group);
        self.ingredients.value_modified(id);
        Ok(())
    }

    /// Ingredient matching `(text, group)` by homonym key, lowest id first
    pub fn find_ingredient(&self, text: &str, group: GroupId) -> Option<IngredientId> {
        let key = homonym_key(text);
        self.ingredients
            .iter()
            .find(|i| i.group == Some(group) && homonym_key(&i.text) == key)
            .map(|i| i.id)
    }

    /// Remove an ingredient no ingredient entry references
    pub fn remove_ingredient(&mut self, id: IngredientId) -> Result<IngredientData> {
        self.ingredients.at(id)?;
        let users = self.references_to(EntityRef::Ingredient(id));
        if !users.is_empty() {
            return Err(Error::IllegalOperation(format!(
                "{} is still used by {} recipe(s)",
                id,
                users.len()
            )));
        }
        self.pending_ingredients.remove(&id);
        self.ingredients.remove(id)
    }

    /// Finish an inline-authoring session
    ///
    /// Every pending row that is neither in `confirmed` nor promoted is
    /// removed. A confirmed row that is still provisional is refused before
    /// anything changes. Returns the number of rows removed.
    pub fn validate_temporary_data(&mut self, confirmed: &[IngredientId]) -> Result<usize> {
        let confirmed: BTreeSet<IngredientId> = confirmed.iter().copied().collect();
        for id in confirmed.intersection(&self.pending_ingredients) {
            if self.ingredients.at(*id)?.is_provisional() {
                return Err(Error::IllegalOperation(format!(
                    "{} confirmed without an alimentary group",
                    id
                )));
            }
        }

        let abandoned: Vec<IngredientId> = self
            .pending_ingredients
            .iter()
            .copied()
            .filter(|id| !confirmed.contains(id))
            .filter(|id| self.ingredients.get(*id).is_some_and(IngredientData::is_provisional))
            .collect();

        let mut removed = 0;
        for id in abandoned {
            if !self.references_to(EntityRef::Ingredient(id)).is_empty() {
                warn!(ingredient_id = id.0, "Provisional ingredient is referenced; keeping it");
                continue;
            }
            self.ingredients.remove(id)?;
            removed += 1;
        }
        self.pending_ingredients.clear();

        debug!(removed, confirmed = confirmed.len(), "Temporary ingredient rows validated");
        Ok(removed)
    }

    /// Merge `losers` into `winner`: re-point entries, sum counters, delete losers
    ///
    /// Returns the number of ingredients removed.
    pub fn merge_ingredients(
        &mut self,
        winner: IngredientId,
        losers: &[IngredientId],
    ) -> Result<usize> {
        let losers: BTreeSet<IngredientId> =
            losers.iter().copied().filter(|l| *l != winner).collect();
        let mut total = self.ingredients.at(winner)?.used;
        for loser in &losers {
            total = total.saturating_add(self.ingredients.at(*loser)?.used);
        }
        if losers.is_empty() {
            return Ok(0);
        }

        let mut touched = Vec::new();
        for recipe in self.recipes.iter_mut() {
            let mut changed = false;
            for entry in recipe.ingredients.iter_mut() {
                if let ListEntry::Ingredient(e) = entry {
                    if losers.contains(&e.ingredient) {
                        e.ingredient = winner;
                        changed = true;
                    }
                }
            }
            if changed {
                touched.push(recipe.id);
            }
        }
        for id in touched {
            self.recipes.value_modified(id);
        }

        self.ingredients.at_mut(winner)?.used = total;
        for loser in &losers {
            self.ingredients.remove(*loser)?;
            self.pending_ingredients.remove(loser);
        }
        self.ingredients.value_modified(winner);
        self.refresh_known_units();

        info!(winner = winner.0, merged = losers.len(), used = total, "Ingredients merged");
        Ok(losers.len())
    }

    // ----------------------------------------------------------------------
    // Recipes
    // ----------------------------------------------------------------------

    /// Create an empty recipe with default taxonomy and zero portions
    pub fn create_recipe(&mut self, title: &str) -> Result<RecipeId> {
        let defaults = TaxonomyRefs::defaults(&self.taxonomy);
        let title = title.trim().to_string();
        let id = self.recipes.insert_with(|id| {
            let mut recipe = Recipe::new(id, defaults);
            recipe.title = title;
            recipe
        })?;
        debug!(recipe_id = id.0, "Recipe created");
        Ok(id)
    }

    /// A recipe can be deleted only while no other recipe embeds it
    pub fn can_delete_recipe(&self, id: RecipeId) -> Result<bool> {
        Ok(self.recipes.at(id)?.used == 0)
    }

    /// True if `outer` embeds `inner`, directly or through nested sub-recipes
    pub fn embeds(&self, outer: RecipeId, inner: RecipeId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![outer];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(recipe) = self.recipes.get(current) {
                for sub in recipe.sub_recipes() {
                    if sub == inner {
                        return true;
                    }
                    stack.push(sub);
                }
            }
        }
        false
    }

    fn validate_draft(&self, id: RecipeId, draft: &RecipeDraft) -> Result<()> {
        self.recipes.at(id)?;
        if !draft.portions.is_finite() || draft.portions < 0.0 {
            return Err(Error::InvalidInput(format!(
                "portions must be a non-negative number, got {}",
                draft.portions
            )));
        }
        draft.taxonomy.validate(&self.taxonomy)?;
        for entry in &draft.ingredients {
            entry.validate(self)?;
            if let ListEntry::SubRecipe(e) = entry {
                if e.recipe == id || self.embeds(e.recipe, id) {
                    return Err(Error::IllegalOperation(format!(
                        "{} cannot embed {}: it would contain itself",
                        id, e.recipe
                    )));
                }
            }
        }
        Ok(())
    }

    /// Write an edited recipe through
    ///
    /// Every reference in the draft is checked before anything changes. The
    /// usage counter of each entity touched by the old or new list moves by
    /// its net delta and is notified once; entities with a net-zero change
    /// are left alone.
    pub fn update_recipe(&mut self, id: RecipeId, draft: RecipeDraft) -> Result<UsageDelta> {
        self.validate_draft(id, &draft)?;
        let delta = UsageDelta::between(&self.recipes.at(id)?.ingredients, &draft.ingredients);
        self.check_delta(&delta)?;

        self.apply_delta(&delta)?;
        self.recipes.at_mut(id)?.apply_draft(draft);
        self.refresh_known_units();
        self.recipes.value_modified(id);

        debug!(recipe_id = id.0, changed = delta.len(), "Recipe updated");
        Ok(delta)
    }

    /// Delete a recipe, releasing every usage its ingredient list held
    ///
    /// Refused while the recipe is embedded in another one. Plan items
    /// referencing the recipe are removed too.
    pub fn delete_recipe(&mut self, id: RecipeId) -> Result<Recipe> {
        let recipe = self.recipes.at(id)?;
        if recipe.used > 0 {
            return Err(Error::IllegalOperation(format!(
                "{} is embedded in {} other recipe(s)",
                id, recipe.used
            )));
        }
        let delta = UsageDelta::between(&recipe.ingredients, &[]);
        self.check_delta(&delta)?;

        self.apply_delta(&delta)?;
        let unplanned = self.planning.remove_recipe(id);
        let recipe = self.recipes.remove(id)?;
        self.refresh_known_units();

        info!(recipe_id = id.0, unplanned, "Recipe deleted");
        Ok(recipe)
    }

    /// Copy a recipe under a new id; the copy holds its own usages
    pub fn duplicate_recipe(&mut self, id: RecipeId) -> Result<RecipeId> {
        let source = self.recipes.at(id)?.clone();
        let delta = UsageDelta::between(&[], &source.ingredients);
        self.check_delta(&delta)?;

        let title = format!("{} (copy)", source.title);
        let copy = self.recipes.insert_with(|new_id| Recipe {
            id: new_id,
            used: 0,
            title,
            ..source
        })?;
        self.apply_delta(&delta)?;
        self.refresh_known_units();

        debug!(recipe_id = id.0, copy_id = copy.0, "Recipe duplicated");
        Ok(copy)
    }

    // ----------------------------------------------------------------------
    // Planning
    // ----------------------------------------------------------------------

    /// Plan an item; recipe items must reference a live recipe
    pub fn plan(&mut self, date: NaiveDate, slot: Slot, item: PlanItem) -> Result<bool> {
        match &item {
            PlanItem::Recipe(recipe) => {
                self.recipes.at(*recipe)?;
            }
            PlanItem::Text(text) => {
                require_text("plan item", text)?;
            }
        }
        Ok(self.planning.add_item(date, slot, item))
    }

    pub fn unplan(&mut self, date: NaiveDate, slot: Slot, item: &PlanItem) -> bool {
        self.planning.remove_item(date, slot, item)
    }

    pub fn refresh_planning(&mut self, today: NaiveDate, window_days: u32) -> (usize, usize) {
        self.planning.refresh(today, window_days)
    }
}

/// Books compare by content: tables and planning
impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.units == other.units
            && self.ingredients == other.ingredients
            && self.recipes == other.recipes
            && self.planning == other.planning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homonym_key_folds_case_and_spacing() {
        assert_eq!(homonym_key("  Sucre  "), "sucre");
        assert_eq!(homonym_key("Brown   SUGAR"), "brown sugar");
        assert_eq!(homonym_key("Sucre"), homonym_key("sucre"));
    }

    #[test]
    fn test_find_or_insert_unit_deduplicates() {
        let mut book = Book::with_builtin_taxonomy();
        let g = book.find_or_insert_unit("g").unwrap();
        assert_eq!(book.find_or_insert_unit(" G ").unwrap(), g);
        assert_eq!(book.units().len(), 1);
    }

    #[test]
    fn test_insert_rejects_blank_text_and_unknown_group() {
        let mut book = Book::with_builtin_taxonomy();
        assert!(matches!(book.insert_unit("  "), Err(Error::InvalidInput(_))));
        assert!(matches!(
            book.insert_ingredient("Flour", GroupId(404)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_embeds_is_transitive() {
        let mut book = Book::with_builtin_taxonomy();
        let a = book.create_recipe("A").unwrap();
        let b = book.create_recipe("B").unwrap();
        let c = book.create_recipe("C").unwrap();

        let mut draft = book.recipes().at(b).unwrap().draft();
        draft.ingredients.push(ListEntry::sub_recipe(c));
        book.update_recipe(b, draft).unwrap();
        let mut draft = book.recipes().at(a).unwrap().draft();
        draft.ingredients.push(ListEntry::sub_recipe(b));
        book.update_recipe(a, draft).unwrap();

        assert!(book.embeds(a, c));
        assert!(!book.embeds(c, a));

        // C embedding A would close a cycle
        let mut draft = book.recipes().at(c).unwrap().draft();
        draft.ingredients.push(ListEntry::sub_recipe(a));
        assert!(matches!(
            book.update_recipe(c, draft),
            Err(Error::IllegalOperation(_))
        ));
    }

    #[test]
    fn test_known_units_follow_the_ingredient_graph() {
        let mut book = Book::with_builtin_taxonomy();
        let g = book.insert_unit("g").unwrap();
        let kg = book.insert_unit("kg").unwrap();
        let flour = book.insert_ingredient("Flour", GroupId(1)).unwrap();
        let r = book.create_recipe("Bread").unwrap();

        let mut draft = book.recipes().at(r).unwrap().draft();
        draft.ingredients = vec![
            ListEntry::ingredient(1.0, kg, flour, ""),
            ListEntry::ingredient(20.0, g, flour, ""),
        ];
        book.update_recipe(r, draft.clone()).unwrap();
        let units: Vec<_> = book.ingredients().at(flour).unwrap().units.iter().copied().collect();
        assert_eq!(units, vec![g, kg]);

        draft.ingredients.truncate(1);
        book.update_recipe(r, draft).unwrap();
        let units: Vec<_> = book.ingredients().at(flour).unwrap().units.iter().copied().collect();
        assert_eq!(units, vec![kg]);
    }

    #[test]
    fn test_plan_requires_live_recipe() {
        let mut book = Book::with_builtin_taxonomy();
        let day = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        assert!(book.plan(day, Slot::Midday, PlanItem::Recipe(RecipeId(1))).is_err());
        let r = book.create_recipe("Soup").unwrap();
        assert!(book.plan(day, Slot::Midday, PlanItem::Recipe(r)).unwrap());
        assert!(matches!(
            book.plan(day, Slot::Snack, PlanItem::Text(" ".into())),
            Err(Error::InvalidInput(_))
        ));
    }
}
