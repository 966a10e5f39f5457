//! Measurement units

use super::table::{DefaultEntity, Entity};
use crate::ids::UnitId;

#[derive(Debug, Clone, PartialEq)]
pub struct UnitData {
    pub id: UnitId,
    pub text: String,
    /// Number of live ingredient entries measured in this unit
    pub used: u32,
}

impl UnitData {
    pub fn new(id: UnitId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            used: 0,
        }
    }
}

impl Entity for UnitData {
    type Id = UnitId;

    fn id(&self) -> UnitId {
        self.id
    }
}

impl DefaultEntity for UnitData {
    fn with_id(id: UnitId) -> Self {
        Self::new(id, "")
    }
}
