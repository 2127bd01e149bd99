use std::time::Duration;

/// Failure of a single theme fetch.
///
/// Cloneable so every caller coalesced onto the same in-flight resolution
/// observes the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("theme not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Maps an error of the file read capability, keeping the failing location in the message.
    pub fn from_io(location: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(location.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(location.to_string()),
            _ => Self::Io(format!("{location}: {err}")),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::HttpStatus(status.as_u16()),
            None => Self::Network(err.to_string()),
        }
    }
}

/// Outcome of resolving one explicit key through the cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The cache was disposed before the resolution completed.
    #[error("theme cache has been disposed")]
    Disposed,
}

/// The backing resource of a theme can not be watched, the theme stays usable
/// but is never refreshed automatically.
#[derive(Debug, thiserror::Error)]
pub enum WatchSetupError {
    #[error("can not derive a watchable location from {0}")]
    Location(String),

    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),

    #[error(transparent)]
    Notify(#[from] notify::Error),
}

/// Rejection of a stylesheet by the rendering engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("theme css has no `@theme` metadata")]
    MissingThemeName,

    #[error("theme css is empty")]
    EmptyCss,
}
