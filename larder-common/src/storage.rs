//! Book-file persistence
//!
//! Load reads and decodes the whole document before the store is touched.
//! Save keeps a single-generation backup: the new content goes to a
//! temporary file, the previous backup is dropped, the current primary is
//! copied to `<stem>.backup.<ext>` and the temporary file is renamed over
//! the primary.

use crate::document::BookDocument;
use crate::events::EventBus;
use crate::store::Book;
use crate::taxonomy::Taxonomy;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// `<stem>.backup.<ext>` next to `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.backup.{}", stem, ext.to_string_lossy()),
        None => format!("{}.backup", stem),
    };
    path.with_file_name(name)
}

/// `<name>.tmp` next to `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A recipe book on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFile {
    path: PathBuf,
}

impl BookFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        backup_path(&self.path)
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn read_document(&self) -> Result<BookDocument> {
        let json = tokio::fs::read_to_string(&self.path).await?;
        BookDocument::from_json(&json)
    }

    /// Read and decode a new book
    pub async fn load(&self, taxonomy: Arc<Taxonomy>, events: EventBus) -> Result<Book> {
        let doc = self.read_document().await?;
        let book = Book::from_document(doc, taxonomy, events)?;
        info!(
            path = %self.path.display(),
            recipes = book.recipes().len(),
            "Book loaded"
        );
        Ok(book)
    }

    /// Replace `book` with the file's content; `book` is untouched on failure
    pub async fn load_into(&self, book: &mut Book) -> Result<()> {
        let doc = self.read_document().await?;
        book.load_document(doc)?;
        info!(path = %self.path.display(), "Book reloaded");
        Ok(())
    }

    pub async fn save(&self, book: &Book) -> Result<()> {
        let json = book.to_document().to_json_pretty()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = temp_path(&self.path);
        tokio::fs::write(&temp, json.as_bytes()).await?;

        let backup = self.backup_path();
        if tokio::fs::try_exists(&backup).await? {
            tokio::fs::remove_file(&backup).await?;
        }
        if tokio::fs::try_exists(&self.path).await? {
            tokio::fs::copy(&self.path, &backup).await?;
            debug!(backup = %backup.display(), "Previous book backed up");
        }
        tokio::fs::rename(&temp, &self.path).await?;

        info!(path = %self.path.display(), bytes = json.len(), "Book saved");
        Ok(())
    }
}
