//! # Larder Common Library
//!
//! Data engine shared by the larder tools:
//! - Typed identifiers and static taxonomy tables
//! - Entity tables (units, ingredients, recipes) with usage counting
//! - Recipe update/delete protocol and editor sessions
//! - Planning calendar
//! - Repair analysis (usage drift, homonyms, dead entities, orphan plan items)
//! - Document (de)serialization and book-file persistence
//! - Configuration loading

pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod ids;
pub mod repair;
pub mod storage;
pub mod store;
pub mod taxonomy;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, StoreEvent};
pub use ids::{
    DishTypeId, DurationId, EntityRef, GroupId, Identifier, IngredientId, RecipeId, RegimenId,
    StatusId, UnitId,
};
pub use repair::{RepairAnalysis, RepairSelection};
pub use storage::BookFile;
pub use store::Book;
pub use taxonomy::Taxonomy;
