//! Recipes and the usage delta of an ingredient-list edit

use super::entry::ListEntry;
use super::table::Entity;
use crate::ids::{DishTypeId, DurationId, EntityRef, RecipeId, RegimenId, StatusId};
use crate::taxonomy::Taxonomy;
use crate::Result;
use std::collections::BTreeMap;

/// Taxonomy references carried by every recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxonomyRefs {
    pub regimen: RegimenId,
    pub status: StatusId,
    pub dish_type: DishTypeId,
    pub duration: DurationId,
}

impl TaxonomyRefs {
    /// First entry of each taxonomy table
    pub fn defaults(taxonomy: &Taxonomy) -> Self {
        Self {
            regimen: taxonomy.regimens.first().id,
            status: taxonomy.statuses.first().id,
            dish_type: taxonomy.dish_types.first().id,
            duration: taxonomy.durations.first().id,
        }
    }

    pub fn validate(&self, taxonomy: &Taxonomy) -> Result<()> {
        taxonomy.regimens.at(self.regimen)?;
        taxonomy.statuses.at(self.status)?;
        taxonomy.dish_types.at(self.dish_type)?;
        taxonomy.durations.at(self.duration)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: RecipeId,
    /// Number of parent recipes embedding this one as a sub-recipe
    pub used: u32,
    pub title: String,
    pub portions: f64,
    pub portions_label: String,
    pub taxonomy: TaxonomyRefs,
    /// Basic recipes are building blocks (doughs, sauces) rather than dishes
    pub basic: bool,
    pub ingredients: Vec<ListEntry>,
    pub steps: Vec<String>,
    pub notes: String,
}

impl Recipe {
    pub fn new(id: RecipeId, taxonomy: TaxonomyRefs) -> Self {
        Self {
            id,
            used: 0,
            title: String::new(),
            portions: 0.0,
            portions_label: String::new(),
            taxonomy,
            basic: false,
            ingredients: Vec::new(),
            steps: Vec::new(),
            notes: String::new(),
        }
    }

    /// Editable copy of this recipe's fields
    pub fn draft(&self) -> RecipeDraft {
        RecipeDraft {
            title: self.title.clone(),
            portions: self.portions,
            portions_label: self.portions_label.clone(),
            taxonomy: self.taxonomy,
            basic: self.basic,
            ingredients: self.ingredients.clone(),
            steps: self.steps.clone(),
            notes: self.notes.clone(),
        }
    }

    pub(crate) fn apply_draft(&mut self, draft: RecipeDraft) {
        self.title = draft.title;
        self.portions = draft.portions;
        self.portions_label = draft.portions_label;
        self.taxonomy = draft.taxonomy;
        self.basic = draft.basic;
        self.ingredients = draft.ingredients;
        self.steps = draft.steps;
        self.notes = draft.notes;
    }

    /// Recipes embedded directly in this one
    pub fn sub_recipes(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.ingredients.iter().filter_map(|entry| match entry {
            ListEntry::SubRecipe(e) => Some(e.recipe),
            _ => None,
        })
    }

    /// Amounts of every entry scaled to `target` portions
    ///
    /// `None` for entries without an amount. Unscaled when the recipe has no
    /// portion count.
    pub fn scaled_amounts(&self, target: f64) -> Vec<Option<f64>> {
        let factor = if self.portions > 0.0 {
            target / self.portions
        } else {
            1.0
        };
        self.ingredients
            .iter()
            .map(|entry| match entry {
                ListEntry::Ingredient(e) => Some(e.amount * factor),
                _ => None,
            })
            .collect()
    }
}

impl Entity for Recipe {
    type Id = RecipeId;

    fn id(&self) -> RecipeId {
        self.id
    }
}

/// Editor-side copy of a recipe's editable fields
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub portions: f64,
    pub portions_label: String,
    pub taxonomy: TaxonomyRefs,
    pub basic: bool,
    pub ingredients: Vec<ListEntry>,
    pub steps: Vec<String>,
    pub notes: String,
}

/// Signed usage change per entity between two ingredient lists
///
/// Only nonzero deltas are kept, so an entity referenced the same number of
/// times before and after an edit does not appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageDelta {
    changes: BTreeMap<EntityRef, i64>,
}

impl UsageDelta {
    pub fn between(old: &[ListEntry], new: &[ListEntry]) -> Self {
        let mut changes: BTreeMap<EntityRef, i64> = BTreeMap::new();
        for entity in old.iter().flat_map(ListEntry::usage_refs) {
            *changes.entry(entity).or_insert(0) -= 1;
        }
        for entity in new.iter().flat_map(ListEntry::usage_refs) {
            *changes.entry(entity).or_insert(0) += 1;
        }
        changes.retain(|_, delta| *delta != 0);
        Self { changes }
    }

    pub fn get(&self, entity: impl Into<EntityRef>) -> i64 {
        self.changes.get(&entity.into()).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityRef, i64)> + '_ {
        self.changes.iter().map(|(entity, delta)| (*entity, *delta))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{IngredientId, UnitId};

    fn flour(amount: f64) -> ListEntry {
        ListEntry::ingredient(amount, UnitId(1), IngredientId(1), "")
    }

    #[test]
    fn test_delta_same_multiset_is_empty() {
        let old = vec![flour(200.0), ListEntry::decoration("Dough")];
        let new = vec![ListEntry::decoration("Pâte"), flour(300.0)];
        assert!(UsageDelta::between(&old, &new).is_empty());
    }

    #[test]
    fn test_delta_counts_occurrences() {
        let sugar = ListEntry::ingredient(10.0, UnitId(1), IngredientId(2), "");
        let old = vec![flour(200.0), ListEntry::sub_recipe(RecipeId(5))];
        let new = vec![flour(100.0), flour(50.0), sugar];
        let delta = UsageDelta::between(&old, &new);

        assert_eq!(delta.get(IngredientId(1)), 1);
        assert_eq!(delta.get(IngredientId(2)), 1);
        assert_eq!(delta.get(UnitId(1)), 2);
        assert_eq!(delta.get(RecipeId(5)), -1);
        assert_eq!(delta.len(), 4);
    }

    #[test]
    fn test_scaled_amounts() {
        let mut recipe = Recipe::new(RecipeId(1), TaxonomyRefs::defaults(&Taxonomy::builtin()));
        recipe.portions = 4.0;
        recipe.ingredients = vec![flour(200.0), ListEntry::decoration("x")];
        assert_eq!(recipe.scaled_amounts(6.0), vec![Some(300.0), None]);

        recipe.portions = 0.0;
        assert_eq!(recipe.scaled_amounts(6.0), vec![Some(200.0), None]);
    }

    #[test]
    fn test_draft_round_trip() {
        let mut recipe = Recipe::new(RecipeId(3), TaxonomyRefs::defaults(&Taxonomy::builtin()));
        recipe.title = "Bread".into();
        recipe.steps = vec!["Knead".into()];
        let mut draft = recipe.draft();
        draft.title = "Sourdough".into();
        recipe.apply_draft(draft);
        assert_eq!(recipe.title, "Sourdough");
        assert_eq!(recipe.steps, vec!["Knead".to_string()]);
        assert_eq!(recipe.id, RecipeId(3));
    }
}
