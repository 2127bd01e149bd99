//! Reloads the global config whenever `config.toml` changes on disk.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

const DEBOUNCE_DELAY: Duration = Duration::from_millis(10);

/// The fallback for `RecommendedWatcher` polling.
const FALLBACK_POLLING_TIMEOUT: Duration = Duration::from_secs(1);

/// Resolves the path to be compared against incoming events.
///
/// Returns `None` for anything that is not a regular file, e.g. `/dev/null`.
fn watch_target(config_file: &Path) -> Option<PathBuf> {
    // `metadata` follows symlinks.
    if !config_file
        .metadata()
        .map_or(false, |metadata| metadata.file_type().is_file())
    {
        return None;
    }

    // Events carry absolute paths, a symlinked config is watched at its target.
    config_file.canonicalize().ok()
}

fn is_reload_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Other
    )
}

/// Spawns the `config-monitor` thread.
///
/// Each debounced batch of events touching the config file reloads the global
/// config and pings `sender`, so the owner can re-resolve the configured themes.
pub fn watch(sender: Sender<()>) {
    let Some(path) = watch_target(&crate::config_file()) else {
        tracing::debug!("No regular config file to monitor");
        return;
    };

    let (tx, rx) = mpsc::channel();
    let mut watcher = match RecommendedWatcher::new(
        tx,
        Config::default().with_poll_interval(FALLBACK_POLLING_TIMEOUT),
    ) {
        Ok(watcher) => watcher,
        Err(err) => {
            tracing::error!("Unable to watch config file: {err}");
            return;
        }
    };

    let spawn_result = std::thread::Builder::new()
        .name("config-monitor".into())
        .spawn(move || {
            // Watch the parent directory, editors often replace the file on save.
            let watch_dir = path.parent().unwrap_or(&path).to_path_buf();
            if let Err(err) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
                tracing::debug!("Unable to watch config dir {}: {err}", watch_dir.display());
                return;
            }

            let mut debouncing_deadline: Option<Instant> = None;
            let mut pending_reload = false;

            loop {
                let event = match debouncing_deadline {
                    Some(deadline) => {
                        rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    }
                    None => {
                        let event = rx.recv().map_err(Into::into);
                        debouncing_deadline.replace(Instant::now() + DEBOUNCE_DELAY);
                        event
                    }
                };

                match event {
                    Ok(Ok(event)) => {
                        if is_reload_event(&event) && event.paths.iter().any(|p| p == &path) {
                            pending_reload = true;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        debouncing_deadline = None;

                        if std::mem::take(&mut pending_reload)
                            && crate::reload_config(path.clone()).is_none()
                        {
                            tracing::debug!(path = %path.display(), "Config reloaded");
                            if let Err(TrySendError::Closed(())) = sender.try_send(()) {
                                break;
                            }
                        }
                    }
                    Ok(Err(err)) => {
                        tracing::debug!("Config monitor errors: {err:?}");
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        tracing::debug!("Config monitor channel dropped unexpectedly");
                        break;
                    }
                }
            }
        });

    if let Err(err) = spawn_result {
        tracing::error!(?err, "Failed to spawn config-monitor thread");
    }
}
