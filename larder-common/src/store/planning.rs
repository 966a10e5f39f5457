//! Planning calendar
//!
//! Maps dates to three daily slots, each a sorted set of plan items. The
//! calendar does not take part in usage counting; it only reads recipe ids.

use crate::events::{EventBus, StoreEvent};
use crate::ids::RecipeId;
use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Daily meal slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    Midday,
    Snack,
    Evening,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Midday, Slot::Snack, Slot::Evening];

    pub fn label(self) -> &'static str {
        match self {
            Slot::Midday => "Midday",
            Slot::Snack => "Snack",
            Slot::Evening => "Evening",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slot::Midday => 0,
            Slot::Snack => 1,
            Slot::Evening => 2,
        }
    }
}

/// A planned recipe or a free-text note
///
/// Ordered by kind first (recipes before texts), then by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanItem {
    Recipe(RecipeId),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Day {
    date: NaiveDate,
    slots: [BTreeSet<PlanItem>; 3],
}

impl Day {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            slots: Default::default(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn slot(&self, slot: Slot) -> &BTreeSet<PlanItem> {
        &self.slots[slot.index()]
    }

    pub(crate) fn slot_mut(&mut self, slot: Slot) -> &mut BTreeSet<PlanItem> {
        &mut self.slots[slot.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(BTreeSet::is_empty)
    }

    /// Every item with its slot, in slot order
    pub fn items(&self) -> impl Iterator<Item = (Slot, &PlanItem)> {
        Slot::ALL
            .into_iter()
            .flat_map(move |slot| self.slot(slot).iter().map(move |item| (slot, item)))
    }
}

#[derive(Debug, Clone)]
pub struct PlanningCalendar {
    days: BTreeMap<NaiveDate, Day>,
    events: EventBus,
}

impl PlanningCalendar {
    pub fn new(events: EventBus) -> Self {
        Self {
            days: BTreeMap::new(),
            events,
        }
    }

    /// Rebuild a calendar from deserialized days
    pub fn from_days(events: EventBus, days: Vec<Day>) -> Result<Self> {
        let mut calendar = Self::new(events);
        for day in days {
            let date = day.date;
            if calendar.days.insert(date, day).is_some() {
                return Err(Error::Load(format!("duplicate planning day {}", date)));
            }
        }
        Ok(calendar)
    }

    pub(crate) fn rebind(&mut self, events: EventBus) {
        self.events = events;
    }

    pub fn day(&self, date: NaiveDate) -> Option<&Day> {
        self.days.get(&date)
    }

    /// Days in date order
    pub fn days(&self) -> impl Iterator<Item = &Day> {
        self.days.values()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn items(&self, date: NaiveDate, slot: Slot) -> Option<&BTreeSet<PlanItem>> {
        self.days.get(&date).map(|day| day.slot(slot))
    }

    /// Ensure every date of `[today, today + window_days)` has a day and prune
    /// past days that are empty
    ///
    /// Returns `(added, pruned)`.
    pub fn refresh(&mut self, today: NaiveDate, window_days: u32) -> (usize, usize) {
        let mut added = 0;
        for offset in 0..i64::from(window_days) {
            let date = today + Duration::days(offset);
            if !self.days.contains_key(&date) {
                self.days.insert(date, Day::new(date));
                self.events.emit_lossy(StoreEvent::PlanningChanged { date });
                added += 1;
            }
        }

        let stale: Vec<NaiveDate> = self
            .days
            .range(..today)
            .filter(|(_, day)| day.is_empty())
            .map(|(date, _)| *date)
            .collect();
        for date in &stale {
            self.days.remove(date);
            self.events
                .emit_lossy(StoreEvent::PlanningChanged { date: *date });
        }

        debug!(added, pruned = stale.len(), "Planning window refreshed");
        (added, stale.len())
    }

    /// Add an item, creating the day if needed
    ///
    /// Returns false if the item was already planned in that slot.
    pub fn add_item(&mut self, date: NaiveDate, slot: Slot, item: PlanItem) -> bool {
        let inserted = self
            .days
            .entry(date)
            .or_insert_with(|| Day::new(date))
            .slot_mut(slot)
            .insert(item);
        if inserted {
            self.events.emit_lossy(StoreEvent::PlanningChanged { date });
        }
        inserted
    }

    pub fn remove_item(&mut self, date: NaiveDate, slot: Slot, item: &PlanItem) -> bool {
        let removed = self
            .days
            .get_mut(&date)
            .is_some_and(|day| day.slot_mut(slot).remove(item));
        if removed {
            self.events.emit_lossy(StoreEvent::PlanningChanged { date });
        }
        removed
    }

    /// Every (date, slot) where `recipe` is planned
    pub fn recipe_references(&self, recipe: RecipeId) -> Vec<(NaiveDate, Slot)> {
        let item = PlanItem::Recipe(recipe);
        self.days
            .values()
            .flat_map(|day| {
                Slot::ALL
                    .into_iter()
                    .filter(|slot| day.slot(*slot).contains(&item))
                    .map(move |slot| (day.date, slot))
            })
            .collect()
    }

    /// Remove every plan item referencing `recipe`, returning how many went
    pub fn remove_recipe(&mut self, recipe: RecipeId) -> usize {
        let item = PlanItem::Recipe(recipe);
        let mut removed = 0;
        for day in self.days.values_mut() {
            let before = removed;
            for slot in Slot::ALL {
                if day.slot_mut(slot).remove(&item) {
                    removed += 1;
                }
            }
            if removed > before {
                self.events
                    .emit_lossy(StoreEvent::PlanningChanged { date: day.date });
            }
        }
        removed
    }
}

/// Calendars compare by content; the event channel is ignored
impl PartialEq for PlanningCalendar {
    fn eq(&self, other: &Self) -> bool {
        self.days == other.days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_items_sorted_by_kind_then_value() {
        let mut day = Day::new(date(1));
        let slot = day.slot_mut(Slot::Evening);
        slot.insert(PlanItem::Text("soup".into()));
        slot.insert(PlanItem::Recipe(RecipeId(9)));
        slot.insert(PlanItem::Text("bread".into()));
        slot.insert(PlanItem::Recipe(RecipeId(2)));

        let items: Vec<_> = day.slot(Slot::Evening).iter().cloned().collect();
        assert_eq!(
            items,
            vec![
                PlanItem::Recipe(RecipeId(2)),
                PlanItem::Recipe(RecipeId(9)),
                PlanItem::Text("bread".into()),
                PlanItem::Text("soup".into()),
            ]
        );
    }

    #[test]
    fn test_refresh_populates_window_and_prunes_empty_past() {
        let mut cal = PlanningCalendar::new(EventBus::new(64));
        cal.add_item(date(1), Slot::Midday, PlanItem::Text("leftovers".into()));
        cal.refresh(date(1), 3);
        assert_eq!(cal.len(), 3);

        // Day 1 has content and survives, day 2 is empty and past, so it goes
        let (added, pruned) = cal.refresh(date(3), 2);
        assert_eq!(added, 1);
        assert_eq!(pruned, 1);
        let dates: Vec<_> = cal.days().map(Day::date).collect();
        assert_eq!(dates, vec![date(1), date(3), date(4)]);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut cal = PlanningCalendar::new(EventBus::new(64));
        assert_eq!(cal.refresh(date(5), 7), (7, 0));
        assert_eq!(cal.refresh(date(5), 7), (0, 0));
    }

    #[test]
    fn test_add_remove_and_recipe_references() {
        let mut cal = PlanningCalendar::new(EventBus::new(64));
        assert!(cal.add_item(date(2), Slot::Midday, PlanItem::Recipe(RecipeId(1))));
        assert!(!cal.add_item(date(2), Slot::Midday, PlanItem::Recipe(RecipeId(1))));
        cal.add_item(date(4), Slot::Evening, PlanItem::Recipe(RecipeId(1)));
        cal.add_item(date(4), Slot::Snack, PlanItem::Recipe(RecipeId(2)));

        assert_eq!(
            cal.recipe_references(RecipeId(1)),
            vec![(date(2), Slot::Midday), (date(4), Slot::Evening)]
        );
        assert_eq!(cal.remove_recipe(RecipeId(1)), 2);
        assert!(cal.recipe_references(RecipeId(1)).is_empty());
        assert!(cal.remove_item(date(4), Slot::Snack, &PlanItem::Recipe(RecipeId(2))));
        assert!(cal.day(date(4)).unwrap().is_empty());
    }

    #[test]
    fn test_from_days_rejects_duplicate_dates() {
        let days = vec![Day::new(date(1)), Day::new(date(1))];
        assert!(matches!(
            PlanningCalendar::from_days(EventBus::new(4), days),
            Err(Error::Load(_))
        ));
    }
}
