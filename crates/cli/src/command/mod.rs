pub mod serve;
pub mod themes;

use crate::app::Args;
use crate::host::{ConfigWorkspace, LoggingRefresher};
use marp_themes::{Host, LocalFileSystem, NotifyWatcher, Themes, ThemesOptions};
use std::sync::Arc;
use std::time::Duration;

/// Theme backend of the stand-alone host, everything lives on the local filesystem.
fn local_themes(args: &Args) -> Themes {
    let notifier = Arc::new(NotifyWatcher::default());
    let host = Host {
        workspace: Arc::new(ConfigWorkspace::new(args.workspace.as_deref())),
        fs: Arc::new(LocalFileSystem),
        local_notifier: notifier.clone(),
        virtual_notifier: notifier,
        refresher: Arc::new(LoggingRefresher),
    };
    let options = ThemesOptions {
        fetch_timeout: Duration::from_millis(marp_config::config().themes.fetch_timeout_ms),
    };
    Themes::new(host, options)
}
