use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{VerseCache, VerseKey};
use crate::marker;
use crate::sections::SectionMap;
use crate::storage::{DocumentStore, StoreError};
use crate::versification::Versification;
use crate::window::{self, ViewGranularity, ViewWindow};

/// Lifecycle of an edit session. Loaded sessions are clean or dirty; a dirty
/// session is saved implicitly before anything changes what is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Clean,
    Dirty,
}

/// Commands dispatched through the single controller entry point.
#[derive(Debug, Clone)]
pub enum Command {
    SetView(ViewGranularity),
    Goto { chapter: u32, verse: u32 },
    ReplaceDisplayed(String),
    Save,
    SwitchBook(String),
    Close,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no document loaded")]
    NotLoaded,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Merge the edited display buffer back between the stored before/after
/// text. Deliberately plain concatenation: the three-way split is the only
/// mechanism preventing cross-window edit collisions.
pub fn reconcile(before: &str, displayed: &str, after: &str) -> String {
    let mut full = String::with_capacity(before.len() + displayed.len() + after.len());
    full.push_str(before);
    full.push_str(displayed);
    full.push_str(after);
    full
}

/// One open document window: the verse cache, the three-part view buffers,
/// and the collaborators derived from the current document text. Owned
/// exclusively by one window controller; cross-window consistency goes
/// through the persisted document only.
pub struct DocumentEditSession<S: DocumentStore> {
    store: S,
    state: SessionState,
    book: String,
    target: VerseKey,
    granularity: ViewGranularity,
    cache: VerseCache,
    versification: Versification,
    external_versification: Option<Versification>,
    sections: SectionMap,
    window: ViewWindow,
}

impl<S: DocumentStore> DocumentEditSession<S> {
    /// Load a book from the store and assemble the initial window.
    pub async fn open(
        store: S,
        book: &str,
        granularity: ViewGranularity,
    ) -> Result<Self, SessionError> {
        Self::open_with(store, book, granularity, None).await
    }

    /// Like [`open`](Self::open), with chapter/verse counts from an external
    /// versification collaborator. External counts widen the window ranges;
    /// counts derived from the cache always apply as a floor, so a data file
    /// that undercounts the document can never lose text on reconcile.
    pub async fn open_with(
        store: S,
        book: &str,
        granularity: ViewGranularity,
        external_versification: Option<Versification>,
    ) -> Result<Self, SessionError> {
        let text = store.load(book).await?;
        let mut session = Self {
            store,
            state: SessionState::Clean,
            book: book.to_string(),
            target: VerseKey::new(book, 1, 1),
            granularity,
            cache: VerseCache::new(),
            versification: Versification::new(),
            external_versification,
            sections: SectionMap::default(),
            window: ViewWindow::default(),
        };
        session.refresh(&text);
        info!(book, %granularity, segments = session.cache.len(), "session opened");
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn target(&self) -> &VerseKey {
        &self.target
    }

    pub fn granularity(&self) -> ViewGranularity {
        self.granularity
    }

    pub fn window(&self) -> &ViewWindow {
        &self.window
    }

    pub fn cache(&self) -> &VerseCache {
        &self.cache
    }

    /// Dispatch one command. Retargeting commands on a dirty session commit
    /// first; edits made outside the next window are never silently lost.
    pub async fn apply(&mut self, command: Command) -> Result<(), SessionError> {
        if self.state == SessionState::Unloaded {
            return Err(SessionError::NotLoaded);
        }
        match command {
            Command::ReplaceDisplayed(text) => {
                self.window.displayed = text;
                self.state = SessionState::Dirty;
            }
            Command::Save => {
                if self.state == SessionState::Dirty {
                    self.commit().await?;
                } else {
                    debug!(book = %self.book, "save skipped, session clean");
                }
            }
            Command::SetView(granularity) => {
                self.commit_if_dirty().await?;
                self.granularity = granularity;
                self.assemble();
            }
            Command::Goto { chapter, verse } => {
                self.commit_if_dirty().await?;
                self.target = VerseKey::new(self.book.as_str(), chapter, verse);
                self.assemble();
            }
            Command::SwitchBook(book) => {
                self.commit_if_dirty().await?;
                let text = self.store.load(&book).await?;
                self.book = book;
                self.target = VerseKey::new(self.book.as_str(), 1, 1);
                self.refresh(&text);
            }
            Command::Close => {
                self.commit_if_dirty().await?;
                self.state = SessionState::Unloaded;
                self.cache = VerseCache::new();
                self.window = ViewWindow::default();
            }
        }
        Ok(())
    }

    /// Reconstructed full document for the current buffers.
    pub fn full_document(&self) -> String {
        reconcile(
            &self.window.before,
            &self.window.displayed,
            &self.window.after,
        )
    }

    async fn commit_if_dirty(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Dirty {
            self.commit().await?;
        }
        Ok(())
    }

    /// Persist the reconciled document, then rebuild the cache from it so
    /// cache and document never diverge. A failed save leaves the session
    /// untouched.
    async fn commit(&mut self) -> Result<(), SessionError> {
        let full = self.full_document();
        self.store.save(&self.book, &full).await?;
        self.refresh(&full);
        info!(book = %self.book, bytes = full.len(), "document committed");
        Ok(())
    }

    fn refresh(&mut self, text: &str) {
        self.cache.rebuild(&self.book, text);
        let lines = marker::parse_document(text);
        self.sections = SectionMap::build(&self.book, &lines);
        let mut versification = Versification::from_cache(&self.cache);
        if let Some(external) = &self.external_versification {
            versification.merge(external.clone());
        }
        self.versification = versification;
        self.state = SessionState::Clean;
        self.assemble();
    }

    fn assemble(&mut self) {
        self.window = window::assemble(
            &self.cache,
            &self.target,
            self.granularity,
            &self.versification,
            &self.sections,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const GEN: &str = "\\id GEN\n\\c 1\n\\v 1 One\n\\v 2 Two\n\\s Heading\n\\v 3 Three\n";
    const EXO: &str = "\\id EXO\n\\c 1\n\\v 1 Moses\n";

    /// In-memory store that records every save for assertions.
    #[derive(Clone, Default)]
    struct MemStore {
        docs: Arc<Mutex<HashMap<String, String>>>,
        saves: Arc<Mutex<Vec<(String, String)>>>,
        fail_saves: bool,
    }

    impl MemStore {
        fn with(docs: &[(&str, &str)]) -> Self {
            let store = Self::default();
            for (book, text) in docs {
                store
                    .docs
                    .lock()
                    .unwrap()
                    .insert(book.to_string(), text.to_string());
            }
            store
        }
    }

    impl DocumentStore for MemStore {
        async fn load(&self, book: &str) -> Result<String, StoreError> {
            self.docs
                .lock()
                .unwrap()
                .get(book)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(book.to_string()))
        }

        async fn save(&mut self, book: &str, text: &str) -> Result<(), StoreError> {
            if self.fail_saves {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.docs
                .lock()
                .unwrap()
                .insert(book.to_string(), text.to_string());
            self.saves
                .lock()
                .unwrap()
                .push((book.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_reconcile_is_plain_concatenation() {
        assert_eq!(reconcile("a\n", "b\n", "c\n"), "a\nb\nc\n");
        assert_eq!(reconcile("", "x", ""), "x");
    }

    #[tokio::test]
    async fn test_round_trip_by_book() {
        let store = MemStore::with(&[("GEN", GEN)]);
        let session = DocumentEditSession::open(store, "GEN", ViewGranularity::Book)
            .await
            .unwrap();
        assert_eq!(session.full_document(), GEN);
        assert_eq!(session.window().before, "");
        assert_eq!(session.window().after, "");
    }

    #[tokio::test]
    async fn test_edit_marks_dirty_and_save_commits() {
        let store = MemStore::with(&[("GEN", GEN)]);
        let saves = store.saves.clone();
        let mut session = DocumentEditSession::open(store, "GEN", ViewGranularity::Verse)
            .await
            .unwrap();
        session
            .apply(Command::Goto {
                chapter: 1,
                verse: 2,
            })
            .await
            .unwrap();
        assert_eq!(session.window().displayed, "\\v 2 Two\n");

        session
            .apply(Command::ReplaceDisplayed("\\v 2 Two, edited\n".to_string()))
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Dirty);

        session.apply(Command::Save).await.unwrap();
        assert_eq!(session.state(), SessionState::Clean);
        let saved = saves.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(
            saved[0].1,
            "\\id GEN\n\\c 1\n\\v 1 One\n\\v 2 Two, edited\n\\s Heading\n\\v 3 Three\n"
        );
    }

    #[tokio::test]
    async fn test_save_on_clean_session_writes_nothing() {
        let store = MemStore::with(&[("GEN", GEN)]);
        let saves = store.saves.clone();
        let mut session = DocumentEditSession::open(store, "GEN", ViewGranularity::Book)
            .await
            .unwrap();
        session.apply(Command::Save).await.unwrap();
        assert!(saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dirty_book_switch_commits_exactly_once() {
        let store = MemStore::with(&[("GEN", GEN), ("EXO", EXO)]);
        let saves = store.saves.clone();
        let mut session = DocumentEditSession::open(store, "GEN", ViewGranularity::Chapter)
            .await
            .unwrap();
        session
            .apply(Command::ReplaceDisplayed(
                "\\c 1\n\\v 1 One, edited\n\\v 2 Two\n\\s Heading\n\\v 3 Three\n".to_string(),
            ))
            .await
            .unwrap();

        session
            .apply(Command::SwitchBook("EXO".to_string()))
            .await
            .unwrap();

        let saved = saves.lock().unwrap();
        assert_eq!(saved.len(), 1, "dirty switch must commit exactly once");
        assert_eq!(saved[0].0, "GEN");
        assert!(saved[0].1.contains("One, edited"));
        drop(saved);

        assert_eq!(session.book(), "EXO");
        assert_eq!(session.state(), SessionState::Clean);
        assert_eq!(
            session.cache().get(&VerseKey::new("EXO", 1, 1)),
            Some("\\v 1 Moses\n")
        );
    }

    #[tokio::test]
    async fn test_dirty_retarget_commits_first() {
        let store = MemStore::with(&[("GEN", GEN)]);
        let saves = store.saves.clone();
        let mut session = DocumentEditSession::open(store, "GEN", ViewGranularity::Verse)
            .await
            .unwrap();
        session
            .apply(Command::Goto {
                chapter: 1,
                verse: 1,
            })
            .await
            .unwrap();
        session
            .apply(Command::ReplaceDisplayed("\\v 1 One, edited\n".to_string()))
            .await
            .unwrap();
        session
            .apply(Command::Goto {
                chapter: 1,
                verse: 3,
            })
            .await
            .unwrap();

        assert_eq!(saves.lock().unwrap().len(), 1);
        // The new window reflects the committed edit in its before text.
        assert!(session.window().before.contains("One, edited"));
        assert_eq!(session.window().displayed, "\\s Heading\n\\v 3 Three\n");
    }

    #[tokio::test]
    async fn test_undercounting_versification_never_loses_text() {
        let store = MemStore::with(&[("GEN", GEN)]);
        // Data file covering only one verse of one chapter: the counts
        // derived from the cache still apply as a floor.
        let mut stub = VerseCache::new();
        stub.rebuild("GEN", "\\c 1\n\\v 1 x\n");
        let external = Versification::from_cache(&stub);

        let session =
            DocumentEditSession::open_with(store, "GEN", ViewGranularity::Book, Some(external))
                .await
                .unwrap();
        assert_eq!(session.full_document(), GEN);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_session_untouched() {
        let mut store = MemStore::with(&[("GEN", GEN)]);
        store.fail_saves = true;
        let mut session = DocumentEditSession::open(store, "GEN", ViewGranularity::Book)
            .await
            .unwrap();
        session
            .apply(Command::ReplaceDisplayed("\\c 1\n\\v 1 Edited\n".to_string()))
            .await
            .unwrap();

        let result = session.apply(Command::Save).await;
        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Dirty);
        assert_eq!(session.window().displayed, "\\c 1\n\\v 1 Edited\n");
    }

    #[tokio::test]
    async fn test_close_unloads_and_blocks_commands() {
        let store = MemStore::with(&[("GEN", GEN)]);
        let mut session = DocumentEditSession::open(store, "GEN", ViewGranularity::Book)
            .await
            .unwrap();
        session.apply(Command::Close).await.unwrap();
        assert_eq!(session.state(), SessionState::Unloaded);
        assert!(session.cache().is_empty());

        let result = session.apply(Command::Save).await;
        assert!(matches!(result, Err(SessionError::NotLoaded)));
    }
}
