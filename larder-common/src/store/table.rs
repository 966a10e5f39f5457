//! Generic entity table
//!
//! A keyed collection over one entity type, iterated in id order. The table
//! assigns identifiers from its own monotonically increasing counter and
//! never reuses one within a session. It performs no referential checks:
//! `remove` does not cascade, that is the caller's job.

use crate::events::{EventBus, StoreEvent};
use crate::ids::{EntityRef, Identifier};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// An entry of an entity table
pub trait Entity {
    type Id: Identifier + Into<EntityRef>;

    fn id(&self) -> Self::Id;
}

/// Entities that can be default-constructed from a fresh id
pub trait DefaultEntity: Entity {
    fn with_id(id: Self::Id) -> Self;
}

#[derive(Debug, Clone)]
pub struct Table<T: Entity> {
    entries: BTreeMap<T::Id, T>,
    next_id: i64,
    events: EventBus,
}

impl<T: Entity> Table<T> {
    pub fn new(events: EventBus) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
            events,
        }
    }

    /// Rebuild a table from deserialized entries
    ///
    /// The next-id counter becomes `max(existing ids) + 1`.
    pub fn from_entries(events: EventBus, entries: Vec<T>) -> Result<Self> {
        let mut table = Self::new(events);
        for entry in entries {
            let id = entry.id();
            if !id.is_valid() {
                return Err(Error::Load(format!("invalid identifier {}", id)));
            }
            if table.entries.insert(id, entry).is_some() {
                return Err(Error::Load(format!("duplicate {}", id)));
            }
        }
        table.next_id = table
            .entries
            .keys()
            .next_back()
            .map_or(1, |last| last.raw() + 1);
        Ok(table)
    }

    /// Insert an entry built from the next identifier
    pub fn insert_with(&mut self, build: impl FnOnce(T::Id) -> T) -> Result<T::Id> {
        let id = T::Id::from_raw(self.next_id);
        if self.entries.contains_key(&id) {
            return Err(Error::IllegalOperation(format!(
                "{} table corrupted: next identifier {} already in use",
                T::Id::TABLE,
                self.next_id
            )));
        }
        let entry = build(id);
        debug_assert_eq!(entry.id(), id);
        self.entries.insert(id, entry);
        self.next_id += 1;
        self.events
            .emit_lossy(StoreEvent::Inserted { entity: id.into() });
        Ok(id)
    }

    pub fn at(&self, id: T::Id) -> Result<&T> {
        if !id.is_valid() {
            return Err(id.not_found());
        }
        self.entries.get(&id).ok_or_else(|| id.not_found())
    }

    pub fn at_mut(&mut self, id: T::Id) -> Result<&mut T> {
        if !id.is_valid() {
            return Err(id.not_found());
        }
        self.entries.get_mut(&id).ok_or_else(|| id.not_found())
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.entries.contains_key(&id)
    }

    /// Row position of `id` in iteration order, for view-row mapping
    pub fn index_of(&self, id: T::Id) -> Result<usize> {
        if !self.contains(id) {
            return Err(id.not_found());
        }
        Ok(self.entries.range(..id).count())
    }

    /// Erase an entry without any referential check
    pub fn remove(&mut self, id: T::Id) -> Result<T> {
        if !id.is_valid() {
            return Err(id.not_found());
        }
        let entry = self.entries.remove(&id).ok_or_else(|| id.not_found())?;
        self.events
            .emit_lossy(StoreEvent::Removed { entity: id.into() });
        Ok(entry)
    }

    /// Notify views that a displayed field or usage count of `id` changed
    pub fn value_modified(&self, id: T::Id) {
        self.events
            .emit_lossy(StoreEvent::ValueModified { entity: id.into() });
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Route this table's notifications to another bus
    pub(crate) fn rebind(&mut self, events: EventBus) {
        self.events = events;
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = T::Id> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifier the next insertion will receive
    pub fn next_id(&self) -> T::Id {
        T::Id::from_raw(self.next_id)
    }

    /// Move the id counter forward; it may never fall to or below a live id
    pub fn set_next_id(&mut self, next: i64) -> Result<()> {
        let floor = self.entries.keys().next_back().map_or(1, |last| last.raw() + 1);
        if next < floor {
            return Err(Error::IllegalOperation(format!(
                "{} counter {} would reuse a live identifier (minimum {})",
                T::Id::TABLE,
                next,
                floor
            )));
        }
        self.next_id = next;
        Ok(())
    }
}

impl<T: DefaultEntity> Table<T> {
    /// Insert a default-constructed entry and return its identifier
    pub fn insert(&mut self) -> Result<T::Id> {
        self.insert_with(T::with_id)
    }
}

/// Tables compare by content; the id counter and event channel are ignored
impl<T: Entity + PartialEq> PartialEq for Table<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain;
    use crate::ids::UnitId;
    use crate::store::UnitData;

    fn table() -> Table<UnitData> {
        Table::new(EventBus::new(32))
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let mut t = table();
        assert_eq!(t.insert().unwrap(), UnitId(1));
        assert_eq!(t.insert().unwrap(), UnitId(2));
        assert_eq!(t.at(UnitId(2)).unwrap().used, 0);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut t = table();
        let a = t.insert().unwrap();
        let b = t.insert().unwrap();
        t.remove(b).unwrap();
        assert_eq!(t.insert().unwrap(), UnitId(3));
        t.remove(a).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_at_rejects_invalid_and_absent() {
        let mut t = table();
        t.insert().unwrap();
        assert!(matches!(t.at(UnitId(0)), Err(Error::NotFound { id: 0, .. })));
        assert!(matches!(t.at(UnitId(-1)), Err(Error::NotFound { .. })));
        assert!(matches!(t.at(UnitId(7)), Err(Error::NotFound { id: 7, .. })));
        assert!(t.remove(UnitId(7)).is_err());
    }

    #[test]
    fn test_index_of_follows_id_order() {
        let mut t = table();
        for _ in 0..4 {
            t.insert().unwrap();
        }
        t.remove(UnitId(2)).unwrap();
        assert_eq!(t.index_of(UnitId(1)).unwrap(), 0);
        assert_eq!(t.index_of(UnitId(3)).unwrap(), 1);
        assert_eq!(t.index_of(UnitId(4)).unwrap(), 2);
        assert!(t.index_of(UnitId(2)).is_err());
    }

    #[test]
    fn test_from_entries_recomputes_next_id() {
        let entries = vec![UnitData::new(UnitId(7), "g"), UnitData::new(UnitId(3), "kg")];
        let mut t = Table::from_entries(EventBus::new(4), entries).unwrap();
        assert_eq!(t.next_id(), UnitId(8));
        assert_eq!(t.ids().collect::<Vec<_>>(), vec![UnitId(3), UnitId(7)]);
        assert_eq!(t.insert().unwrap(), UnitId(8));
    }

    #[test]
    fn test_set_next_id_refuses_live_ids() {
        let mut t = table();
        t.insert().unwrap();
        t.insert().unwrap();
        assert!(matches!(t.set_next_id(2), Err(Error::IllegalOperation(_))));
        t.set_next_id(10).unwrap();
        assert_eq!(t.insert().unwrap(), UnitId(10));
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        let entries = vec![UnitData::new(UnitId(1), "g"), UnitData::new(UnitId(1), "kg")];
        assert!(matches!(
            Table::from_entries(EventBus::new(4), entries),
            Err(Error::Load(_))
        ));
    }

    #[test]
    fn test_mutations_emit_events() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let mut t: Table<UnitData> = Table::new(bus);
        let id = t.insert().unwrap();
        t.value_modified(id);
        t.remove(id).unwrap();

        let entity = EntityRef::Unit(id);
        assert_eq!(
            drain(&mut rx),
            vec![
                StoreEvent::Inserted { entity },
                StoreEvent::ValueModified { entity },
                StoreEvent::Removed { entity },
            ]
        );
    }
}
