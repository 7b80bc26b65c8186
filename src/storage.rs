use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no document for book {0}")]
    NotFound(String),
    #[error("document i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// File-storage collaborator: loads and persists the plain document text for
/// a book code. Implementations must not leave a partially written document
/// behind on failure.
pub trait DocumentStore {
    fn load(&self, book: &str) -> impl std::future::Future<Output = Result<String, StoreError>>;
    fn save(
        &mut self,
        book: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>>;
}

/// Stores each book as `<dir>/<book>.usfm`.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, book: &str) -> PathBuf {
        self.dir.join(format!("{book}.usfm"))
    }
}

impl DocumentStore for FsStore {
    async fn load(&self, book: &str) -> Result<String, StoreError> {
        let path = self.path_for(book);
        debug!(book, path = %path.display(), "loading document");
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(book.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&mut self, book: &str, text: &str) -> Result<(), StoreError> {
        let path = self.path_for(book);
        debug!(book, path = %path.display(), bytes = text.len(), "saving document");
        // Write to a sibling temp file and rename, so a failed save never
        // clobbers the existing document.
        let tmp = path.with_extension("usfm.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Read a document straight from a path, deriving the book code from the
/// file stem. Used by the CLI driver.
pub async fn read_document(path: &Path) -> Result<(String, String), StoreError> {
    let book = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let text = tokio::fs::read_to_string(path).await?;
    Ok((book, text))
}
