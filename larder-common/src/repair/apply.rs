//! Opt-in repair actions
//!
//! Every action is idempotent and re-checks the live book before touching
//! it, so an action still does the right thing after other categories have
//! already been applied.

use super::{ObservedUsage, RepairAnalysis};
use crate::ids::EntityRef;
use crate::store::{Book, PlanItem};
use crate::Result;
use serde::Serialize;
use tracing::info;

/// Which finding categories to repair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairSelection {
    pub counts: bool,
    pub homonyms: bool,
    pub dead: bool,
    pub planning: bool,
}

impl RepairSelection {
    pub fn all() -> Self {
        Self {
            counts: true,
            homonyms: true,
            dead: true,
            planning: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.counts || self.homonyms || self.dead || self.planning)
    }
}

/// What a repair run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub counters_fixed: usize,
    pub entities_merged: usize,
    pub entities_deleted: usize,
    pub plan_items_removed: usize,
}

impl RepairReport {
    pub fn total(&self) -> usize {
        self.counters_fixed + self.entities_merged + self.entities_deleted + self.plan_items_removed
    }
}

impl RepairAnalysis {
    /// Overwrite every stored counter with the count observed now
    ///
    /// The observation is taken at apply time, so this converges whether or
    /// not a homonym merge ran since the analysis.
    pub fn apply_count_repair(&self, book: &mut Book) -> Result<usize> {
        let observed = ObservedUsage::compute(book);
        let entities: Vec<EntityRef> = book
            .units()
            .ids()
            .map(EntityRef::Unit)
            .chain(book.ingredients().ids().map(EntityRef::Ingredient))
            .chain(book.recipes().ids().map(EntityRef::Recipe))
            .collect();

        let mut fixed = 0;
        for entity in entities {
            if book.overwrite_usage(entity, observed.get(entity))? {
                fixed += 1;
            }
        }
        info!(fixed, "Usage counters repaired");
        Ok(fixed)
    }

    /// Merge each homonym group into its lowest-id member
    ///
    /// Counters are summed from the members' stored values. Members deleted
    /// since the analysis are skipped; a group with fewer than two live
    /// members is left alone.
    pub fn apply_homonym_repair(&self, book: &mut Book) -> Result<usize> {
        let mut merged = 0;
        for group in &self.ingredient_homonyms {
            let mut live: Vec<_> = group
                .member_ids()
                .into_iter()
                .filter(|id| book.ingredients().contains(*id))
                .collect();
            live.sort();
            if let [winner, losers @ ..] = live.as_slice() {
                merged += book.merge_ingredients(*winner, losers)?;
            }
        }
        for group in &self.unit_homonyms {
            let mut live: Vec<_> = group
                .member_ids()
                .into_iter()
                .filter(|id| book.units().contains(*id))
                .collect();
            live.sort();
            if let [winner, losers @ ..] = live.as_slice() {
                merged += book.merge_units(*winner, losers)?;
            }
        }
        info!(merged, "Homonyms merged");
        Ok(merged)
    }

    /// Delete dead ingredients and units that are still unreferenced
    pub fn apply_dead_entity_repair(&self, book: &mut Book) -> Result<usize> {
        let mut deleted = 0;
        for id in &self.dead_ingredients {
            if book.ingredients().contains(*id)
                && book.references_to(EntityRef::Ingredient(*id)).is_empty()
            {
                book.remove_ingredient(*id)?;
                deleted += 1;
            }
        }
        for id in &self.dead_units {
            if book.units().contains(*id) && book.references_to(EntityRef::Unit(*id)).is_empty() {
                book.remove_unit(*id)?;
                deleted += 1;
            }
        }
        info!(deleted, "Dead entities removed");
        Ok(deleted)
    }

    /// Remove plan items whose recipe is still missing
    pub fn apply_planning_repair(&self, book: &mut Book) -> Result<usize> {
        let mut removed = 0;
        for orphan in &self.orphan_plan_items {
            if !book.recipes().contains(orphan.recipe)
                && book.unplan(orphan.date, orphan.slot, &PlanItem::Recipe(orphan.recipe))
            {
                removed += 1;
            }
        }
        info!(removed, "Orphan plan items removed");
        Ok(removed)
    }

    /// Apply the selected categories: homonyms, dead entities, counters, planning
    pub fn apply(&self, book: &mut Book, selection: RepairSelection) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        if selection.homonyms {
            report.entities_merged = self.apply_homonym_repair(book)?;
        }
        if selection.dead {
            report.entities_deleted = self.apply_dead_entity_repair(book)?;
        }
        if selection.counts {
            report.counters_fixed = self.apply_count_repair(book)?;
        }
        if selection.planning {
            report.plan_items_removed = self.apply_planning_repair(book)?;
        }
        Ok(report)
    }
}
