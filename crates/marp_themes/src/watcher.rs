//! Change detection for the backing resource of a theme.
//!
//! Local files are watched natively through `notify`, falling back to polling
//! when the native backend is unavailable. Virtual resources are delegated to
//! the host's [`ChangeNotifier`]. Remote themes are never watched.

use crate::error::WatchSetupError;
use crate::host::{ChangeCallback, ChangeKind, ChangeNotifier, WatchSubscription};
use crate::key::{CanonicalKey, SourceKind};
use notify::{Event as NotifyEvent, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use percent_encoding::percent_decode_str;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Active subscription to change/delete events of one theme source.
///
/// Dropping the handle releases the subscription.
pub struct WatchHandle {
    key: CanonicalKey,
    _subscription: Box<dyn WatchSubscription>,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("key", &self.key).finish()
    }
}

/// Splits `uri` into the URI of its parent directory and its final path segment.
fn split_parent(uri: &Url) -> Option<(Url, String)> {
    let file_name = uri.path_segments()?.last().filter(|name| !name.is_empty())?;
    let file_name = percent_decode_str(file_name).decode_utf8().ok()?.into_owned();
    let parent = uri.join("./").ok()?;
    Some((parent, file_name))
}

pub struct ThemeWatcher {
    local: Arc<dyn ChangeNotifier>,
    virtual_fs: Arc<dyn ChangeNotifier>,
}

impl ThemeWatcher {
    pub fn new(local: Arc<dyn ChangeNotifier>, virtual_fs: Arc<dyn ChangeNotifier>) -> Self {
        Self { local, virtual_fs }
    }

    /// Installs a watch for `key`, returns `None` if the source can not be watched.
    pub fn watch(
        &self,
        key: &CanonicalKey,
        kind: SourceKind,
        on_change: ChangeCallback,
    ) -> Option<WatchHandle> {
        let notifier = match kind {
            SourceKind::RemoteUrl => return None,
            SourceKind::LocalFile => &self.local,
            SourceKind::VirtualUri => &self.virtual_fs,
        };

        let Some((dir, file_name)) = key.to_uri().ok().as_ref().and_then(split_parent) else {
            tracing::debug!(%key, "Theme is not watchable, no auto refresh");
            return None;
        };

        match notifier.watch(&dir, &file_name, on_change) {
            Ok(subscription) => {
                tracing::trace!(%key, "Watching theme source");
                Some(WatchHandle {
                    key: key.clone(),
                    _subscription: subscription,
                })
            }
            Err(err) => {
                tracing::warn!(%key, ?err, "Failed to watch theme source, no auto refresh");
                None
            }
        }
    }
}

/// Configuration for the native file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Polling interval in milliseconds for fallback polling mode
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

struct NotifySubscription {
    _watcher: Box<dyn Watcher + Send>,
}

impl WatchSubscription for NotifySubscription {}

/// [`ChangeNotifier`] for `file://` directories backed by `notify`.
///
/// Each watch observes exactly one directory, non-recursively, and filters the
/// events down to the requested file name.
#[derive(Debug, Clone, Default)]
pub struct NotifyWatcher {
    config: WatcherConfig,
}

impl NotifyWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }
}

fn event_handler(
    file_name: OsString,
    on_change: Arc<ChangeCallback>,
) -> impl Fn(Result<NotifyEvent, notify::Error>) + Send + 'static {
    move |res: Result<NotifyEvent, notify::Error>| match res {
        Ok(event) => {
            // Filter events to only our target file
            let is_target_file = event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()));

            if !is_target_file {
                return;
            }

            if event.kind.is_remove() {
                on_change(ChangeKind::Deleted);
            } else if event.kind.is_modify() || event.kind.is_create() {
                on_change(ChangeKind::Changed);
            }
        }
        Err(e) => {
            tracing::error!(?e, "File watcher error");
        }
    }
}

impl ChangeNotifier for NotifyWatcher {
    fn watch(
        &self,
        dir: &Url,
        file_name: &str,
        on_change: ChangeCallback,
    ) -> Result<Box<dyn WatchSubscription>, WatchSetupError> {
        if dir.scheme() != "file" {
            return Err(WatchSetupError::UnsupportedScheme(dir.scheme().to_string()));
        }
        let watch_target = dir
            .to_file_path()
            .map_err(|()| WatchSetupError::Location(dir.to_string()))?;

        let file_name = OsString::from(file_name);
        let on_change = Arc::new(on_change);

        let native = RecommendedWatcher::new(
            event_handler(file_name.clone(), on_change.clone()),
            notify::Config::default(),
        )
        .and_then(|mut watcher| {
            watcher.watch(&watch_target, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });

        let watcher: Box<dyn Watcher + Send> = match native {
            Ok(watcher) => Box::new(watcher),
            Err(err) => {
                tracing::warn!(
                    ?err,
                    path = ?watch_target,
                    "native file watcher failed, falling back to polling"
                );
                let mut watcher = PollWatcher::new(
                    event_handler(file_name, on_change),
                    notify::Config::default()
                        .with_poll_interval(Duration::from_millis(self.config.poll_interval_ms)),
                )?;
                watcher.watch(&watch_target, RecursiveMode::NonRecursive)?;
                Box::new(watcher)
            }
        };

        Ok(Box::new(NotifySubscription { _watcher: watcher }))
    }
}
