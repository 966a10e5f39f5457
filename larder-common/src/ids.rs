//! Typed identifiers
//!
//! Each entity table and each taxonomy table has its own identifier type, so
//! a unit id is never comparable with an ingredient id. Values `<= 0` are the
//! invalid sentinel.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Behaviour shared by every identifier type
pub trait Identifier: Copy + Ord + Hash + fmt::Debug + fmt::Display {
    /// Human-readable name of the owning table, used in errors and logs
    const TABLE: &'static str;

    fn from_raw(raw: i64) -> Self;

    fn raw(self) -> i64;

    fn is_valid(self) -> bool {
        self.raw() > 0
    }

    /// The NotFound error for this identifier
    fn not_found(self) -> Error {
        Error::NotFound {
            table: Self::TABLE,
            id: self.raw(),
        }
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $table:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl Identifier for $name {
            const TABLE: &'static str = $table;

            fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            fn raw(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} #{}", $table, self.0)
            }
        }
    };
}

define_id!(
    /// Unit table identifier
    UnitId,
    "unit"
);
define_id!(
    /// Ingredient table identifier
    IngredientId,
    "ingredient"
);
define_id!(
    /// Recipe table identifier
    RecipeId,
    "recipe"
);
define_id!(
    /// Alimentary group (taxonomy)
    GroupId,
    "alimentary group"
);
define_id!(RegimenId, "regimen");
define_id!(DishTypeId, "dish type");
define_id!(DurationId, "duration");
define_id!(StatusId, "status");

/// Reference to one entry of a mutable entity table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum EntityRef {
    Unit(UnitId),
    Ingredient(IngredientId),
    Recipe(RecipeId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Unit(id) => id.fmt(f),
            EntityRef::Ingredient(id) => id.fmt(f),
            EntityRef::Recipe(id) => id.fmt(f),
        }
    }
}

impl From<UnitId> for EntityRef {
    fn from(id: UnitId) -> Self {
        EntityRef::Unit(id)
    }
}

impl From<IngredientId> for EntityRef {
    fn from(id: IngredientId) -> Self {
        EntityRef::Ingredient(id)
    }
}

impl From<RecipeId> for EntityRef {
    fn from(id: RecipeId) -> Self {
        EntityRef::Recipe(id)
    }
}
