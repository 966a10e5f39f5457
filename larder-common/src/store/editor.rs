//! Recipe editor session
//!
//! `Viewing → Editing → {Applied | Discarded | Cancelled}`. Applying is the
//! only transition that writes to the book.

use super::recipe::{RecipeDraft, UsageDelta};
use super::Book;
use crate::ids::RecipeId;
use crate::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Viewing,
    Editing,
}

/// Result of leaving (or trying to leave) the editing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Draft written through, back to viewing
    Applied(UsageDelta),
    /// Draft dropped after confirmation, back to viewing
    Discarded,
    /// Discard not confirmed, still editing
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    recipe: RecipeId,
    draft: Option<RecipeDraft>,
}

impl EditorSession {
    pub fn new(recipe: RecipeId) -> Self {
        Self {
            recipe,
            draft: None,
        }
    }

    pub fn recipe(&self) -> RecipeId {
        self.recipe
    }

    pub fn state(&self) -> EditorState {
        if self.draft.is_some() {
            EditorState::Editing
        } else {
            EditorState::Viewing
        }
    }

    /// Enter editing with a fresh copy of the recipe; keeps the current draft
    /// if already editing
    pub fn begin_edit(&mut self, book: &Book) -> Result<&mut RecipeDraft> {
        if self.draft.is_none() {
            self.draft = Some(book.recipes().at(self.recipe)?.draft());
            debug!(recipe_id = self.recipe.0, "Editing started");
        }
        self.draft_mut()
    }

    pub fn draft(&self) -> Option<&RecipeDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Result<&mut RecipeDraft> {
        self.draft
            .as_mut()
            .ok_or_else(|| Error::IllegalOperation("editor is not editing".to_string()))
    }

    /// True when the draft differs from the stored recipe
    pub fn is_dirty(&self, book: &Book) -> Result<bool> {
        match &self.draft {
            Some(draft) => Ok(*draft != book.recipes().at(self.recipe)?.draft()),
            None => Ok(false),
        }
    }

    /// Write the draft through the recipe update protocol
    ///
    /// On failure the session stays in editing with its draft intact.
    pub fn apply(&mut self, book: &mut Book) -> Result<EditOutcome> {
        let draft = self
            .draft
            .take()
            .ok_or_else(|| Error::IllegalOperation("editor is not editing".to_string()))?;
        match book.update_recipe(self.recipe, draft.clone()) {
            Ok(delta) => Ok(EditOutcome::Applied(delta)),
            Err(e) => {
                self.draft = Some(draft);
                Err(e)
            }
        }
    }

    /// Leave editing without writing, if the user confirms
    pub fn discard(&mut self, confirmed: bool) -> EditOutcome {
        if confirmed {
            self.draft = None;
            EditOutcome::Discarded
        } else {
            EditOutcome::Cancelled
        }
    }
}
