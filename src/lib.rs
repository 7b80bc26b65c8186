pub mod cache;
pub mod completion;
pub mod config;
pub mod marker;
pub mod sections;
pub mod segmenter;
pub mod session;
pub mod storage;
pub mod versification;
pub mod window;

// Re-export main types for convenience
pub use cache::{VerseCache, VerseKey};
pub use completion::WordIndex;
pub use config::Config;
pub use marker::{MarkerKind, ParsedLine};
pub use sections::SectionMap;
pub use session::{Command, DocumentEditSession, SessionError, SessionState};
pub use storage::{DocumentStore, FsStore, StoreError};
pub use versification::Versification;
pub use window::{CursorHint, ViewGranularity, ViewWindow};
