use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the session
/// runner can tell fatal transport failures apart from recoverable ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config unreadable: {path}: {reason}")]
    ConfigUnreadable { path: PathBuf, reason: String },

    #[error("config malformed: {path}: {reason}")]
    ConfigMalformed { path: PathBuf, reason: String },

    #[error("could not persist config to {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
