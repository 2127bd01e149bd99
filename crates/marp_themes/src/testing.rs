//! In-memory host doubles shared by the unit tests.

use crate::error::WatchSetupError;
use crate::host::{
    ChangeCallback, ChangeKind, ChangeNotifier, FileStat, FileSystem, FileType, PreviewRefresher,
    WatchSubscription, Workspace,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use url::Url;

#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<String, Vec<u8>>>,
    reads: Mutex<HashMap<String, usize>>,
    read_delay: Option<Duration>,
}

impl MemoryFileSystem {
    pub fn with_read_delay(read_delay: Duration) -> Self {
        Self {
            read_delay: Some(read_delay),
            ..Default::default()
        }
    }

    pub fn insert(&self, uri: &Url, contents: &str) {
        self.files
            .lock()
            .insert(uri.to_string(), contents.as_bytes().to_vec());
    }

    pub fn remove(&self, uri: &Url) {
        self.files.lock().remove(uri.as_str());
    }

    pub fn reads(&self, uri: &Url) -> usize {
        self.reads.lock().get(uri.as_str()).copied().unwrap_or(0)
    }
}

fn not_found(uri: &Url) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, uri.to_string())
}

#[async_trait::async_trait]
impl FileSystem for MemoryFileSystem {
    async fn stat(&self, uri: &Url) -> std::io::Result<FileStat> {
        let files = self.files.lock();
        if let Some(contents) = files.get(uri.as_str()) {
            return Ok(FileStat {
                size: contents.len() as u64,
                mtime: SystemTime::UNIX_EPOCH,
                file_type: FileType::File,
            });
        }
        let dir_prefix = format!("{}/", uri.as_str().trim_end_matches('/'));
        if files.keys().any(|key| key.starts_with(&dir_prefix)) {
            return Ok(FileStat {
                size: 0,
                mtime: SystemTime::UNIX_EPOCH,
                file_type: FileType::Directory,
            });
        }
        Err(not_found(uri))
    }

    async fn read(&self, uri: &Url) -> std::io::Result<Vec<u8>> {
        *self.reads.lock().entry(uri.to_string()).or_default() += 1;
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.files
            .lock()
            .get(uri.as_str())
            .cloned()
            .ok_or_else(|| not_found(uri))
    }

    async fn write(&self, uri: &Url, contents: &[u8]) -> std::io::Result<()> {
        self.files.lock().insert(uri.to_string(), contents.to_vec());
        Ok(())
    }

    async fn delete(&self, uri: &Url) -> std::io::Result<()> {
        self.files
            .lock()
            .remove(uri.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found(uri))
    }
}

type Watchers = Mutex<HashMap<String, Vec<(usize, Arc<ChangeCallback>)>>>;

/// [`ChangeNotifier`] whose events are fired by hand.
#[derive(Default)]
pub struct ManualNotifier {
    watchers: Arc<Watchers>,
    next_id: AtomicUsize,
}

struct ManualSubscription {
    target: String,
    id: usize,
    watchers: Weak<Watchers>,
}

impl WatchSubscription for ManualSubscription {}

impl Drop for ManualSubscription {
    fn drop(&mut self) {
        if let Some(watchers) = self.watchers.upgrade() {
            if let Some(callbacks) = watchers.lock().get_mut(&self.target) {
                callbacks.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl ManualNotifier {
    /// Number of live subscriptions for `uri`.
    pub fn subscriptions(&self, uri: &Url) -> usize {
        self.watchers
            .lock()
            .get(uri.as_str())
            .map_or(0, |callbacks| callbacks.len())
    }

    pub fn fire(&self, uri: &Url, kind: ChangeKind) {
        let callbacks = self
            .watchers
            .lock()
            .get(uri.as_str())
            .cloned()
            .unwrap_or_default();
        for (_, callback) in callbacks {
            callback(kind);
        }
    }
}

impl ChangeNotifier for ManualNotifier {
    fn watch(
        &self,
        dir: &Url,
        file_name: &str,
        on_change: ChangeCallback,
    ) -> Result<Box<dyn WatchSubscription>, WatchSetupError> {
        let target = dir
            .join(file_name)
            .map_err(|_| WatchSetupError::Location(dir.to_string()))?
            .to_string();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.watchers
            .lock()
            .entry(target.clone())
            .or_default()
            .push((id, Arc::new(on_change)));
        Ok(Box::new(ManualSubscription {
            target,
            id,
            watchers: Arc::downgrade(&self.watchers),
        }))
    }
}

pub struct StaticWorkspace {
    theme_paths: Mutex<Vec<serde_json::Value>>,
    folder: Option<Url>,
}

impl StaticWorkspace {
    pub fn new(theme_paths: Vec<serde_json::Value>, folder: Option<Url>) -> Self {
        Self {
            theme_paths: Mutex::new(theme_paths),
            folder,
        }
    }

    pub fn set_theme_paths(&self, theme_paths: Vec<serde_json::Value>) {
        *self.theme_paths.lock() = theme_paths;
    }
}

impl Workspace for StaticWorkspace {
    fn theme_paths(&self, _scope: &Url) -> Vec<serde_json::Value> {
        self.theme_paths.lock().clone()
    }

    fn workspace_folder(&self, _document: &Url) -> Option<Url> {
        self.folder.clone()
    }
}

#[derive(Default)]
pub struct CountingRefresher(AtomicUsize);

impl CountingRefresher {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl PreviewRefresher for CountingRefresher {
    fn refresh_preview(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}
