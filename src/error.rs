use thiserror::Error;

/// Failures of the persistence layer
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite storage failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not serialize session history: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("embedded catalog file missing: {0}")]
    MissingEmbedded(String),
}

/// Errors surfaced to engine callers.
///
/// Wrong-state calls are reported here. Corrupt persisted data is not: the
/// store recovers from it locally and logs instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no typing session is running")]
    NoActiveSession,
    #[error("a typing session is already running")]
    SessionAlreadyActive,
    #[error("unknown lesson or track: {0}")]
    InvalidLesson(String),
    #[error("target text must not be empty")]
    EmptyText,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
