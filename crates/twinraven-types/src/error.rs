use std::fmt;

/// Result type for twinraven-types operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the types layer.
#[derive(Debug)]
pub enum Error {
    /// Attempted to append an event whose identifier already exists.
    DuplicateEvent(EventId),
    /// Generic storage-adjacent I/O failure surfaced while building a value.
    Io(std::io::Error),
    /// A value failed its own structural invariant (e.g. chain length < 2).
    InvalidValue(String),
}

use crate::event::EventId;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateEvent(id) => write!(f, "duplicate event: {}", id),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::InvalidValue(msg) => write!(f, "invalid value: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::DuplicateEvent(_) | Error::InvalidValue(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
