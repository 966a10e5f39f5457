//! Ingredient-list entries
//!
//! A recipe's ingredient list is a sequence of three kinds of entries. The
//! ingredient and sub-recipe variants refer to entity-table rows by id; they
//! never own those rows and must never dangle.

use super::Book;
use crate::ids::{EntityRef, IngredientId, RecipeId, UnitId};
use crate::{Error, Result};

/// A measured quantity of an ingredient
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientEntry {
    pub amount: f64,
    pub unit: UnitId,
    pub ingredient: IngredientId,
    /// Free text such as "finely chopped"
    pub qualifier: String,
}

/// Another recipe embedded in this one
#[derive(Debug, Clone, PartialEq)]
pub struct SubRecipeEntry {
    pub recipe: RecipeId,
}

/// Free-text line (section heading, remark)
#[derive(Debug, Clone, PartialEq)]
pub struct DecorationEntry {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    Ingredient(IngredientEntry),
    SubRecipe(SubRecipeEntry),
    Decoration(DecorationEntry),
}

impl ListEntry {
    /// Persisted discriminant (0, 1, 2)
    pub const ETYPE_INGREDIENT: u8 = 0;
    pub const ETYPE_SUB_RECIPE: u8 = 1;
    pub const ETYPE_DECORATION: u8 = 2;

    pub fn ingredient(
        amount: f64,
        unit: UnitId,
        ingredient: IngredientId,
        qualifier: impl Into<String>,
    ) -> Self {
        ListEntry::Ingredient(IngredientEntry {
            amount,
            unit,
            ingredient,
            qualifier: qualifier.into(),
        })
    }

    pub fn sub_recipe(recipe: RecipeId) -> Self {
        ListEntry::SubRecipe(SubRecipeEntry { recipe })
    }

    pub fn decoration(text: impl Into<String>) -> Self {
        ListEntry::Decoration(DecorationEntry { text: text.into() })
    }

    pub fn etype(&self) -> u8 {
        match self {
            ListEntry::Ingredient(_) => Self::ETYPE_INGREDIENT,
            ListEntry::SubRecipe(_) => Self::ETYPE_SUB_RECIPE,
            ListEntry::Decoration(_) => Self::ETYPE_DECORATION,
        }
    }

    /// Entity rows whose usage counter this entry contributes to
    pub fn usage_refs(&self) -> impl Iterator<Item = EntityRef> {
        let refs = match self {
            ListEntry::Ingredient(e) => [
                Some(EntityRef::Ingredient(e.ingredient)),
                Some(EntityRef::Unit(e.unit)),
            ],
            ListEntry::SubRecipe(e) => [Some(EntityRef::Recipe(e.recipe)), None],
            ListEntry::Decoration(_) => [None, None],
        };
        refs.into_iter().flatten()
    }

    /// Check amounts and that every referenced row exists
    ///
    /// A provisional ingredient must be given a group before a recipe can
    /// commit a reference to it.
    pub fn validate(&self, book: &Book) -> Result<()> {
        match self {
            ListEntry::Ingredient(e) => {
                if !e.amount.is_finite() || e.amount <= 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "amount must be a positive number, got {}",
                        e.amount
                    )));
                }
                book.units().at(e.unit)?;
                if book.ingredients().at(e.ingredient)?.is_provisional() {
                    return Err(Error::IllegalOperation(format!(
                        "{} has no alimentary group yet",
                        e.ingredient
                    )));
                }
            }
            ListEntry::SubRecipe(e) => {
                book.recipes().at(e.recipe)?;
            }
            ListEntry::Decoration(_) => {}
        }
        Ok(())
    }

    /// Display text, resolving references through the book
    pub fn describe(&self, book: &Book) -> Result<String> {
        match self {
            ListEntry::Ingredient(e) => {
                let unit = &book.units().at(e.unit)?.text;
                let ingredient = &book.ingredients().at(e.ingredient)?.text;
                let mut line = format_amount(e.amount);
                if !unit.is_empty() {
                    line.push(' ');
                    line.push_str(unit);
                }
                line.push(' ');
                line.push_str(ingredient);
                if !e.qualifier.trim().is_empty() {
                    line.push_str(", ");
                    line.push_str(e.qualifier.trim());
                }
                Ok(line)
            }
            ListEntry::SubRecipe(e) => Ok(format!("→ {}", book.recipes().at(e.recipe)?.title)),
            ListEntry::Decoration(e) => Ok(e.text.clone()),
        }
    }
}

/// Format an amount with at most two decimals and no trailing zeros
pub fn format_amount(amount: f64) -> String {
    let rounded = format!("{:.2}", amount);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
