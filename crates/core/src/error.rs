use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config source must be a JSON object")]
    NotAnObject,

    #[error("CSV error in {file}: {reason}")]
    Csv { file: String, reason: String },

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// A channel's configuration could not be turned into usable credentials.
///
/// Lives inside a snapshot, so it only carries owned strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required key {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
