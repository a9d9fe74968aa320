use std::fmt;

/// Result type for twinraven-store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Underlying SQLite operation failed.
    Database(rusqlite::Error),
    /// Filesystem I/O failed while opening or preparing the store.
    Io(std::io::Error),
    /// A stored row failed to deserialize back into its domain type.
    Decode(String),
    /// Attempted to append an event whose id already exists.
    DuplicateEvent(twinraven_types::EventId),
    /// Lookup found nothing for the requested key.
    NotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "database error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Decode(msg) => write!(f, "decode error: {}", msg),
            Error::DuplicateEvent(id) => write!(f, "duplicate event: {}", id),
            Error::NotFound(what) => write!(f, "not found: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Decode(_) | Error::DuplicateEvent(_) | Error::NotFound(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
