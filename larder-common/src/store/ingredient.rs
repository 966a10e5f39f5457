//! Ingredients

use super::table::{DefaultEntity, Entity};
use crate::ids::{GroupId, IngredientId, UnitId};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientData {
    pub id: IngredientId,
    pub text: String,
    /// Alimentary group; `None` while the row is provisional
    pub group: Option<GroupId>,
    /// Number of live ingredient entries referencing this ingredient
    pub used: u32,
    /// Units this ingredient is currently measured in, derived from recipes
    pub units: BTreeSet<UnitId>,
}

impl IngredientData {
    pub fn new(id: IngredientId, text: impl Into<String>, group: Option<GroupId>) -> Self {
        Self {
            id,
            text: text.into(),
            group,
            used: 0,
            units: BTreeSet::new(),
        }
    }

    /// A provisional row was created during inline authoring and has no group yet
    pub fn is_provisional(&self) -> bool {
        self.group.is_none()
    }
}

impl Entity for IngredientData {
    type Id = IngredientId;

    fn id(&self) -> IngredientId {
        self.id
    }
}

impl DefaultEntity for IngredientData {
    fn with_id(id: IngredientId) -> Self {
        Self::new(id, "", None)
    }
}
