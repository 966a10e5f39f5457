//! Repair analysis
//!
//! One full pass over the book that audits the stored usage counters against
//! the ingredient graph and reports these finding categories:
//!
//! 1. **Usage drift** for recipes, ingredients and units: stored `used`
//!    differs from the count observed by walking every ingredient list
//! 2. **Homonyms**: ingredients sharing (text, group), units sharing text,
//!    compared by [`homonym_key`]
//! 3. **Dead entities**: ingredients and units with no observed usage
//! 4. **Orphan plan items**: planning entries naming a recipe that no longer
//!    exists
//!
//! Findings are data only. Each category has its own opt-in repair;
//! categories can be applied in any subset and order.
//!
//! Dead entities are computed on pre-merge counts. A merge winner that ends
//! up unreferenced is reported by the next analysis, not swept in this one.

mod apply;

pub use apply::{RepairReport, RepairSelection};

use crate::ids::{EntityRef, GroupId, Identifier, IngredientId, RecipeId, UnitId};
use crate::store::{homonym_key, Book, PlanItem, Slot};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Usage counts recomputed from the ingredient graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedUsage {
    pub recipes: BTreeMap<RecipeId, u32>,
    pub ingredients: BTreeMap<IngredientId, u32>,
    pub units: BTreeMap<UnitId, u32>,
}

impl ObservedUsage {
    pub fn compute(book: &Book) -> Self {
        let mut observed = Self {
            recipes: book.recipes().ids().map(|id| (id, 0)).collect(),
            ingredients: book.ingredients().ids().map(|id| (id, 0)).collect(),
            units: book.units().ids().map(|id| (id, 0)).collect(),
        };
        for recipe in book.recipes().iter() {
            for entity in recipe.ingredients.iter().flat_map(|e| e.usage_refs()) {
                match entity {
                    EntityRef::Unit(id) => *observed.units.entry(id).or_insert(0) += 1,
                    EntityRef::Ingredient(id) => {
                        *observed.ingredients.entry(id).or_insert(0) += 1
                    }
                    EntityRef::Recipe(id) => *observed.recipes.entry(id).or_insert(0) += 1,
                }
            }
        }
        observed
    }

    pub fn get(&self, entity: EntityRef) -> u32 {
        match entity {
            EntityRef::Unit(id) => self.units.get(&id),
            EntityRef::Ingredient(id) => self.ingredients.get(&id),
            EntityRef::Recipe(id) => self.recipes.get(&id),
        }
        .copied()
        .unwrap_or(0)
    }
}

/// Stored counter disagreeing with the observed count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountDrift<I> {
    pub id: I,
    pub declared: u32,
    pub observed: u32,
    /// `observed - declared`
    pub variation: i64,
}

impl<I> CountDrift<I> {
    fn new(id: I, declared: u32, observed: u32) -> Self {
        Self {
            id,
            declared,
            observed,
            variation: i64::from(observed) - i64::from(declared),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomonymMember<I> {
    pub id: I,
    pub text: String,
    /// Stored usage counter at analysis time
    pub used: u32,
    /// Recipes referencing this member; empty for an unused duplicate
    pub referenced_by: Vec<RecipeId>,
}

/// Entities sharing a display identity; members sorted by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomonymGroup<I> {
    pub key: String,
    /// Alimentary group shared by ingredient homonyms; `None` for units
    pub group: Option<GroupId>,
    pub members: Vec<HomonymMember<I>>,
}

impl<I: Identifier> HomonymGroup<I> {
    /// The member that survives a merge: lowest id
    pub fn winner(&self) -> Option<I> {
        self.members.iter().map(|m| m.id).min()
    }

    pub fn member_ids(&self) -> Vec<I> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Sum of the members' stored counters
    pub fn total_used(&self) -> u32 {
        self.members.iter().map(|m| m.used).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanPlanItem {
    pub date: NaiveDate,
    pub slot: Slot,
    pub recipe: RecipeId,
}

/// Number of findings per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub recipe_drift: usize,
    pub ingredient_drift: usize,
    pub unit_drift: usize,
    pub ingredient_homonyms: usize,
    pub unit_homonyms: usize,
    pub dead_ingredients: usize,
    pub dead_units: usize,
    pub orphan_plan_items: usize,
}

impl RepairSummary {
    pub fn total(&self) -> usize {
        self.recipe_drift
            + self.ingredient_drift
            + self.unit_drift
            + self.ingredient_homonyms
            + self.unit_homonyms
            + self.dead_ingredients
            + self.dead_units
            + self.orphan_plan_items
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairAnalysis {
    pub recipe_drift: Vec<CountDrift<RecipeId>>,
    pub ingredient_drift: Vec<CountDrift<IngredientId>>,
    pub unit_drift: Vec<CountDrift<UnitId>>,
    pub ingredient_homonyms: Vec<HomonymGroup<IngredientId>>,
    pub unit_homonyms: Vec<HomonymGroup<UnitId>>,
    pub dead_ingredients: Vec<IngredientId>,
    pub dead_units: Vec<UnitId>,
    pub orphan_plan_items: Vec<OrphanPlanItem>,
}

impl RepairAnalysis {
    /// Audit the whole book
    pub fn run(book: &Book) -> Self {
        let observed = ObservedUsage::compute(book);

        let recipe_drift = book
            .recipes()
            .iter()
            .filter_map(|r| {
                let seen = observed.get(EntityRef::Recipe(r.id));
                (r.used != seen).then(|| CountDrift::new(r.id, r.used, seen))
            })
            .collect();
        let ingredient_drift = book
            .ingredients()
            .iter()
            .filter_map(|i| {
                let seen = observed.get(EntityRef::Ingredient(i.id));
                (i.used != seen).then(|| CountDrift::new(i.id, i.used, seen))
            })
            .collect();
        let unit_drift = book
            .units()
            .iter()
            .filter_map(|u| {
                let seen = observed.get(EntityRef::Unit(u.id));
                (u.used != seen).then(|| CountDrift::new(u.id, u.used, seen))
            })
            .collect();

        let dead_ingredients = book
            .ingredients()
            .ids()
            .filter(|id| observed.get(EntityRef::Ingredient(*id)) == 0)
            .collect();
        let dead_units = book
            .units()
            .ids()
            .filter(|id| observed.get(EntityRef::Unit(*id)) == 0)
            .collect();

        let analysis = Self {
            recipe_drift,
            ingredient_drift,
            unit_drift,
            ingredient_homonyms: ingredient_homonyms(book),
            unit_homonyms: unit_homonyms(book),
            dead_ingredients,
            dead_units,
            orphan_plan_items: orphan_plan_items(book),
        };

        let summary = analysis.summary();
        info!(
            findings = summary.total(),
            drift = summary.recipe_drift + summary.ingredient_drift + summary.unit_drift,
            homonyms = summary.ingredient_homonyms + summary.unit_homonyms,
            dead = summary.dead_ingredients + summary.dead_units,
            orphans = summary.orphan_plan_items,
            "Repair analysis complete"
        );
        analysis
    }

    pub fn summary(&self) -> RepairSummary {
        RepairSummary {
            recipe_drift: self.recipe_drift.len(),
            ingredient_drift: self.ingredient_drift.len(),
            unit_drift: self.unit_drift.len(),
            ingredient_homonyms: self.ingredient_homonyms.len(),
            unit_homonyms: self.unit_homonyms.len(),
            dead_ingredients: self.dead_ingredients.len(),
            dead_units: self.dead_units.len(),
            orphan_plan_items: self.orphan_plan_items.len(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.summary().total() == 0
    }

    pub fn has_drift(&self) -> bool {
        !(self.recipe_drift.is_empty()
            && self.ingredient_drift.is_empty()
            && self.unit_drift.is_empty())
    }
}

fn ingredient_homonyms(book: &Book) -> Vec<HomonymGroup<IngredientId>> {
    // Provisional rows are still being authored and take no part
    let mut by_key: BTreeMap<(GroupId, String), Vec<IngredientId>> = BTreeMap::new();
    for ingredient in book.ingredients().iter() {
        if let Some(group) = ingredient.group {
            by_key
                .entry((group, homonym_key(&ingredient.text)))
                .or_default()
                .push(ingredient.id);
        }
    }

    by_key
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((group, key), ids)| HomonymGroup {
            key,
            group: Some(group),
            members: ids
                .into_iter()
                .filter_map(|id| book.ingredients().get(id))
                .map(|i| HomonymMember {
                    id: i.id,
                    text: i.text.clone(),
                    used: i.used,
                    referenced_by: book.references_to(EntityRef::Ingredient(i.id)),
                })
                .collect(),
        })
        .collect()
}

fn unit_homonyms(book: &Book) -> Vec<HomonymGroup<UnitId>> {
    let mut by_key: BTreeMap<String, Vec<UnitId>> = BTreeMap::new();
    for unit in book.units().iter() {
        by_key.entry(homonym_key(&unit.text)).or_default().push(unit.id);
    }

    by_key
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(key, ids)| HomonymGroup {
            key,
            group: None,
            members: ids
                .into_iter()
                .filter_map(|id| book.units().get(id))
                .map(|u| HomonymMember {
                    id: u.id,
                    text: u.text.clone(),
                    used: u.used,
                    referenced_by: book.references_to(EntityRef::Unit(u.id)),
                })
                .collect(),
        })
        .collect()
}

fn orphan_plan_items(book: &Book) -> Vec<OrphanPlanItem> {
    book.planning()
        .days()
        .flat_map(|day| {
            day.items().filter_map(move |(slot, item)| match item {
                PlanItem::Recipe(recipe) if !book.recipes().contains(*recipe) => {
                    Some(OrphanPlanItem {
                        date: day.date(),
                        slot,
                        recipe: *recipe,
                    })
                }
                _ => None,
            })
        })
        .collect()
}
