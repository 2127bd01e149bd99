mod app;
pub mod command;
mod host;
mod logging;

/// Re-exports.
pub use app::{Args, RunCmd};
pub use host::{ConfigWorkspace, LoggingRefresher};
