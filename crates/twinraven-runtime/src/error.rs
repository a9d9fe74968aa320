use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Store(twinraven_store::Error),
    Engine(twinraven_engine::Error),
    Core(twinraven_core::Error),
    Io(std::io::Error),
    /// The slug is not present in the registry.
    UnknownTool(String),
    /// The requested lifecycle transition is not allowed from the tool's
    /// current state.
    IllegalTransition { from: String, to: String },
    /// A version document on disk failed to serialize or parse.
    Decode(String),
    /// The backing store did not respond to a health check in time.
    NotInitialized(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "store error: {}", err),
            Error::Engine(err) => write!(f, "engine error: {}", err),
            Error::Core(err) => write!(f, "core error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::UnknownTool(slug) => write!(f, "unknown tool: {}", slug),
            Error::IllegalTransition { from, to } => {
                write!(f, "illegal transition from {} to {}", from, to)
            }
            Error::Decode(msg) => write!(f, "decode error: {}", msg),
            Error::NotInitialized(msg) => write!(f, "not initialized: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::UnknownTool(_)
            | Error::IllegalTransition { .. }
            | Error::Decode(_)
            | Error::NotInitialized(_) => None,
        }
    }
}

impl From<twinraven_store::Error> for Error {
    fn from(err: twinraven_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<twinraven_engine::Error> for Error {
    fn from(err: twinraven_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<twinraven_core::Error> for Error {
    fn from(err: twinraven_core::Error) -> Self {
        Error::Core(err)
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
