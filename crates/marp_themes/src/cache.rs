//! The theme cache.
//!
//! All records and the in-flight table are owned by a single actor task. The
//! [`ThemeCache`] handle, fetch tasks and watcher callbacks only talk to it
//! through messages. After every mutation the actor publishes an immutable
//! snapshot, which is what the synchronous readers see.

use crate::error::{FetchError, ResolveError};
use crate::fetcher::ThemeFetcher;
use crate::host::{ChangeKind, PreviewRefresher};
use crate::key::{CanonicalKey, SourceKind};
use crate::watcher::{ThemeWatcher, WatchHandle};
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::{
    unbounded_channel, UnboundedReceiver, UnboundedSender, WeakUnboundedSender,
};
use tokio::sync::{broadcast, oneshot};

/// A successfully resolved theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRecord {
    pub key: CanonicalKey,
    pub kind: SourceKind,
    pub css: Arc<str>,
    /// Bumped on each resolution of the same key.
    pub generation: u64,
}

/// Notification about a registered theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeEvent {
    /// The theme was re-resolved after a change of its source.
    Changed(CanonicalKey),
    /// The theme is no longer registered.
    Removed(CanonicalKey),
}

type Outcome = Result<Arc<ThemeRecord>, ResolveError>;

type Snapshot = HashMap<CanonicalKey, Arc<ThemeRecord>>;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
enum Command {
    Ensure {
        key: CanonicalKey,
        reply: oneshot::Sender<Outcome>,
    },
    Resolved {
        key: CanonicalKey,
        generation: u64,
        result: Result<String, FetchError>,
    },
    SourceChanged {
        key: CanonicalKey,
        generation: u64,
        kind: ChangeKind,
    },
    Invalidate(CanonicalKey),
    Remove(CanonicalKey),
    Retain(Vec<CanonicalKey>),
    SetFetchTimeout(Duration),
    Dispose(oneshot::Sender<()>),
}

/// Outcome of one [`ThemeCache::ensure`] request.
///
/// Resolves to [`ResolveError::Disposed`] if the cache goes away before the
/// resolution completes.
#[derive(Debug)]
pub struct PendingResolution {
    key: CanonicalKey,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingResolution {
    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }
}

impl Future for PendingResolution {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(ResolveError::Disposed)))
    }
}

/// Handle to the theme cache actor.
///
/// Cloning the handle is cheap. The actor stops once every handle is dropped
/// or [`ThemeCache::dispose`] is called.
#[derive(Debug, Clone)]
pub struct ThemeCache {
    commands: UnboundedSender<Command>,
    snapshot: Arc<ArcSwap<Snapshot>>,
    events: broadcast::Sender<ThemeEvent>,
}

impl ThemeCache {
    /// Spawns the cache actor, must be called within a tokio runtime.
    pub fn new(
        fetcher: ThemeFetcher,
        watcher: ThemeWatcher,
        refresher: Arc<dyn PreviewRefresher>,
    ) -> Self {
        let (commands, rx) = unbounded_channel();
        let snapshot = Arc::new(ArcSwap::from_pointee(Snapshot::new()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = CacheActor {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            next_generation: 0,
            fetcher: Arc::new(fetcher),
            watcher,
            refresher,
            commands: commands.downgrade(),
            snapshot: snapshot.clone(),
            events: events.clone(),
        };

        tokio::spawn(actor.run(rx));

        Self {
            commands,
            snapshot,
            events,
        }
    }

    /// Requests every key to be resolved.
    ///
    /// Registered keys are answered from the cache, keys already being resolved
    /// share the outcome of the in-flight resolution.
    pub fn ensure(&self, keys: impl IntoIterator<Item = CanonicalKey>) -> Vec<PendingResolution> {
        keys.into_iter()
            .map(|key| {
                let (reply, rx) = oneshot::channel();
                // On a closed channel the reply sender is dropped with the
                // command, so the pending resolution reports `Disposed`.
                let _ = self.commands.send(Command::Ensure {
                    key: key.clone(),
                    reply,
                });
                PendingResolution { key, rx }
            })
            .collect()
    }

    /// Resolves every key, leaving out the failed ones.
    pub async fn ensure_all(&self, keys: Vec<CanonicalKey>) -> Vec<Arc<ThemeRecord>> {
        let pending = self.ensure(keys);
        let keys = pending.iter().map(|p| p.key.clone()).collect::<Vec<_>>();

        futures::future::join_all(pending)
            .await
            .into_iter()
            .zip(keys)
            .filter_map(|(outcome, key)| match outcome {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(%key, %err, "Failed to resolve theme");
                    None
                }
            })
            .collect()
    }

    /// Resolves a single key, surfacing its error.
    pub async fn resolve(&self, key: CanonicalKey) -> Outcome {
        match self.ensure([key]).pop() {
            Some(pending) => pending.await,
            None => Err(ResolveError::Disposed),
        }
    }

    /// Drops the record of `key` and resolves it again.
    ///
    /// No-op unless `key` is registered.
    pub fn invalidate(&self, key: CanonicalKey) {
        let _ = self.commands.send(Command::Invalidate(key));
    }

    pub fn remove(&self, key: CanonicalKey) {
        let _ = self.commands.send(Command::Remove(key));
    }

    /// Removes every registered key not in `keys`.
    pub fn retain(&self, keys: Vec<CanonicalKey>) {
        let _ = self.commands.send(Command::Retain(keys));
    }

    /// Applies `timeout` to the remote fetches started from now on.
    pub fn set_fetch_timeout(&self, timeout: Duration) {
        let _ = self.commands.send(Command::SetFetchTimeout(timeout));
    }

    /// Brings the cache in line with a new set of configured keys.
    pub async fn reload(&self, keys: Vec<CanonicalKey>) -> Vec<Arc<ThemeRecord>> {
        self.retain(keys.clone());
        self.ensure_all(keys).await
    }

    pub fn get(&self, key: &CanonicalKey) -> Option<Arc<ThemeRecord>> {
        self.snapshot.load().get(key).cloned()
    }

    /// Registered records of `keys` in the given order, unresolved keys are skipped.
    pub fn registered_styles(&self, keys: &[CanonicalKey]) -> Vec<Arc<ThemeRecord>> {
        let snapshot = self.snapshot.load();
        keys.iter()
            .filter_map(|key| snapshot.get(key).cloned())
            .collect()
    }

    pub fn registered_keys(&self) -> Vec<CanonicalKey> {
        let mut keys = self.snapshot.load().keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThemeEvent> {
        self.events.subscribe()
    }

    /// Releases every watch and clears the cache.
    ///
    /// Further requests resolve to [`ResolveError::Disposed`]. Calling it again is a no-op.
    pub async fn dispose(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Dispose(reply)).is_ok() {
            let _ = rx.await;
        }
    }
}

struct Entry {
    record: Arc<ThemeRecord>,
    _watch: Option<WatchHandle>,
}

struct InFlight {
    generation: u64,
    waiters: Vec<oneshot::Sender<Outcome>>,
    /// Triggered by a change of a registered theme rather than by a request.
    refresh: bool,
    /// The key was removed meanwhile, the outcome is only handed to the waiters.
    discard: bool,
}

struct CacheActor {
    entries: HashMap<CanonicalKey, Entry>,
    in_flight: HashMap<CanonicalKey, InFlight>,
    next_generation: u64,
    fetcher: Arc<ThemeFetcher>,
    watcher: ThemeWatcher,
    refresher: Arc<dyn PreviewRefresher>,
    commands: WeakUnboundedSender<Command>,
    snapshot: Arc<ArcSwap<Snapshot>>,
    events: broadcast::Sender<ThemeEvent>,
}

impl CacheActor {
    async fn run(mut self, mut rx: UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            if self.process(command).is_break() {
                break;
            }
        }
        tracing::debug!(themes = self.entries.len(), "Theme cache actor exited");
    }

    fn process(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Ensure { key, reply } => self.ensure(key, reply),
            Command::Resolved {
                key,
                generation,
                result,
            } => self.on_resolved(key, generation, result),
            Command::SourceChanged {
                key,
                generation,
                kind,
            } => self.on_source_changed(key, generation, kind),
            Command::Invalidate(key) => {
                if self.entries.remove(&key).is_some() {
                    tracing::debug!(%key, "Invalidated theme");
                    self.publish();
                    self.start_fetch(key, true);
                }
            }
            Command::Remove(key) => {
                self.detach(&key);
                self.publish();
            }
            Command::Retain(keys) => {
                let keep = keys.into_iter().collect::<HashSet<_>>();
                let stale = self
                    .entries
                    .keys()
                    .chain(self.in_flight.keys())
                    .filter(|key| !keep.contains(*key))
                    .cloned()
                    .collect::<Vec<_>>();
                for key in &stale {
                    self.detach(key);
                }
                self.publish();
            }
            Command::SetFetchTimeout(timeout) => {
                tracing::debug!(?timeout, "Updated theme fetch timeout");
                self.fetcher = Arc::new(self.fetcher.with_timeout(timeout));
            }
            Command::Dispose(reply) => {
                tracing::debug!(themes = self.entries.len(), "Disposing theme cache");
                self.entries.clear();
                // Pending waiters observe `Disposed` as their senders are dropped.
                self.in_flight.clear();
                self.publish();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn ensure(&mut self, key: CanonicalKey, reply: oneshot::Sender<Outcome>) {
        if let Some(entry) = self.entries.get(&key) {
            let _ = reply.send(Ok(entry.record.clone()));
            return;
        }

        if let Some(in_flight) = self.in_flight.get_mut(&key) {
            in_flight.discard = false;
            in_flight.waiters.push(reply);
            return;
        }

        self.start_fetch(key, false).waiters.push(reply);
    }

    fn start_fetch(&mut self, key: CanonicalKey, refresh: bool) -> &mut InFlight {
        self.next_generation += 1;
        let generation = self.next_generation;

        tracing::trace!(%key, generation, "Resolving theme");

        let fetcher = self.fetcher.clone();
        let commands = self.commands.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            let kind = task_key.source_kind();
            let result = fetcher.fetch(&task_key, kind).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Resolved {
                    key: task_key,
                    generation,
                    result,
                });
            }
        });

        self.in_flight.entry(key).or_insert(InFlight {
            generation,
            waiters: Vec::new(),
            refresh,
            discard: false,
        })
    }

    fn on_resolved(
        &mut self,
        key: CanonicalKey,
        generation: u64,
        result: Result<String, FetchError>,
    ) {
        let Some(in_flight) = self.in_flight.remove(&key) else {
            return;
        };
        if in_flight.generation != generation {
            self.in_flight.insert(key, in_flight);
            return;
        }

        let outcome = match result {
            Ok(css) => {
                let record = Arc::new(ThemeRecord {
                    kind: key.source_kind(),
                    key: key.clone(),
                    css: css.into(),
                    generation,
                });
                if !in_flight.discard {
                    let watch = self.install_watch(&record);
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            record: record.clone(),
                            _watch: watch,
                        },
                    );
                    self.publish();
                }
                Ok(record)
            }
            Err(err) => {
                tracing::debug!(%key, %err, "Theme resolution failed");
                Err(ResolveError::Fetch(err))
            }
        };

        if in_flight.refresh && !in_flight.discard {
            let event = match outcome {
                Ok(_) => ThemeEvent::Changed(key),
                Err(_) => ThemeEvent::Removed(key),
            };
            let _ = self.events.send(event);
            self.refresher.refresh_preview();
        }

        for waiter in in_flight.waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn on_source_changed(&mut self, key: CanonicalKey, generation: u64, kind: ChangeKind) {
        let is_current = self
            .entries
            .get(&key)
            .is_some_and(|entry| entry.record.generation == generation);
        if !is_current {
            tracing::trace!(%key, generation, "Ignored event of a detached watcher");
            return;
        }

        // Dropping the entry detaches its watcher, further events of it are stale.
        self.entries.remove(&key);
        self.publish();

        match kind {
            ChangeKind::Changed => {
                tracing::debug!(%key, "Theme source changed, reloading");
                self.start_fetch(key, true);
            }
            ChangeKind::Deleted => {
                tracing::debug!(%key, "Theme source deleted");
                let _ = self.events.send(ThemeEvent::Removed(key));
            }
        }
    }

    fn install_watch(&self, record: &ThemeRecord) -> Option<WatchHandle> {
        let commands = self.commands.clone();
        let key = record.key.clone();
        let generation = record.generation;
        self.watcher.watch(
            &record.key,
            record.kind,
            Box::new(move |kind| {
                if let Some(commands) = commands.upgrade() {
                    let _ = commands.send(Command::SourceChanged {
                        key: key.clone(),
                        generation,
                        kind,
                    });
                }
            }),
        )
    }

    /// Unregisters `key`, an in-flight resolution still answers its waiters.
    fn detach(&mut self, key: &CanonicalKey) {
        if self.entries.remove(key).is_some() {
            tracing::debug!(%key, "Removed theme");
            let _ = self.events.send(ThemeEvent::Removed(key.clone()));
        }
        if let Some(in_flight) = self.in_flight.get_mut(key) {
            in_flight.discard = true;
        }
    }

    fn publish(&self) {
        let snapshot = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.record.clone()))
            .collect::<Snapshot>();
        self.snapshot.store(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::DEFAULT_FETCH_TIMEOUT;
    use crate::host::LocalFileSystem;
    use crate::testing::{CountingRefresher, ManualNotifier, MemoryFileSystem};
    use crate::watcher::NotifyWatcher;
    use tokio::net::TcpListener;
    use tokio::sync::broadcast::error::TryRecvError;
    use url::Url;

    struct Fixture {
        cache: ThemeCache,
        fs: Arc<MemoryFileSystem>,
        notifier: Arc<ManualNotifier>,
        refresher: Arc<CountingRefresher>,
    }

    fn fixture(fs: MemoryFileSystem) -> Fixture {
        let fs = Arc::new(fs);
        let notifier = Arc::new(ManualNotifier::default());
        let refresher = Arc::new(CountingRefresher::default());
        let cache = ThemeCache::new(
            ThemeFetcher::new(fs.clone(), DEFAULT_FETCH_TIMEOUT),
            ThemeWatcher::new(Arc::new(NotifyWatcher::default()), notifier.clone()),
            refresher.clone(),
        );
        Fixture {
            cache,
            fs,
            notifier,
            refresher,
        }
    }

    fn theme_uri(name: &str) -> Url {
        Url::parse(&format!("memfs:/project/themes/{name}.css")).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let Fixture { cache, fs, .. } = fixture(MemoryFileSystem::default());
        let uri = theme_uri("a");
        fs.insert(&uri, "/* @theme a */");
        let key = CanonicalKey::from_uri(&uri);

        let first = cache.resolve(key.clone()).await.unwrap();
        let second = cache.resolve(key.clone()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fs.reads(&uri), 1);
        assert_eq!(first.kind, SourceKind::VirtualUri);
        assert_eq!(&*first.css, "/* @theme a */");
        assert_eq!(cache.get(&key), Some(first));
    }

    #[tokio::test]
    async fn test_concurrent_ensures_are_coalesced() {
        let Fixture { cache, fs, .. } =
            fixture(MemoryFileSystem::with_read_delay(Duration::from_millis(50)));
        let uri = theme_uri("slow");
        fs.insert(&uri, "/* @theme slow */");
        let key = CanonicalKey::from_uri(&uri);

        let pending = (0..8)
            .flat_map(|_| cache.ensure([key.clone()]))
            .collect::<Vec<_>>();
        let outcomes = futures::future::join_all(pending).await;

        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().all(|outcome| outcome.is_ok()));
        assert_eq!(fs.reads(&uri), 1);
        assert_eq!(cache.registered_keys(), vec![key]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_contained() {
        let Fixture { cache, fs, .. } = fixture(MemoryFileSystem::default());
        let present = theme_uri("present");
        fs.insert(&present, "/* @theme present */");
        let missing = CanonicalKey::from_uri(&theme_uri("missing"));
        let unreachable = CanonicalKey::remote("http://127.0.0.1:1/theme.css");

        let keys = vec![
            missing.clone(),
            CanonicalKey::from_uri(&present),
            unreachable.clone(),
        ];
        let records = cache.ensure_all(keys.clone()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, CanonicalKey::from_uri(&present));

        assert_eq!(
            cache.resolve(missing.clone()).await,
            Err(ResolveError::Fetch(FetchError::NotFound(
                missing.as_str().to_string()
            )))
        );
        assert!(matches!(
            cache.resolve(unreachable).await,
            Err(ResolveError::Fetch(FetchError::Network(_)))
        ));

        assert_eq!(cache.registered_styles(&keys), records);
    }

    #[tokio::test]
    async fn test_change_refreshes_then_delete_removes() {
        let Fixture {
            cache,
            fs,
            notifier,
            refresher,
        } = fixture(MemoryFileSystem::default());
        let uri = theme_uri("live");
        fs.insert(&uri, "/* @theme live */");
        let key = CanonicalKey::from_uri(&uri);
        let mut events = cache.subscribe();

        let before = cache.resolve(key.clone()).await.unwrap();
        assert_eq!(notifier.subscriptions(&uri), 1);

        fs.insert(&uri, "/* @theme live */\nsection { color: red; }");
        notifier.fire(&uri, ChangeKind::Changed);

        assert_eq!(events.recv().await.unwrap(), ThemeEvent::Changed(key.clone()));
        let after = cache.get(&key).unwrap();
        assert!(after.generation > before.generation);
        assert!(after.css.contains("color: red"));
        assert_eq!(refresher.count(), 1);
        assert_eq!(notifier.subscriptions(&uri), 1);
        assert_eq!(fs.reads(&uri), 2);

        fs.remove(&uri);
        notifier.fire(&uri, ChangeKind::Deleted);

        assert_eq!(events.recv().await.unwrap(), ThemeEvent::Removed(key.clone()));
        assert!(cache.get(&key).is_none());
        assert_eq!(notifier.subscriptions(&uri), 0);
        assert_eq!(refresher.count(), 1);
        assert_eq!(fs.reads(&uri), 2);
    }

    #[tokio::test]
    async fn test_local_theme_follows_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.css");
        std::fs::write(&path, "/* @theme live */").unwrap();

        let refresher = Arc::new(CountingRefresher::default());
        let cache = ThemeCache::new(
            ThemeFetcher::new(Arc::new(LocalFileSystem), DEFAULT_FETCH_TIMEOUT),
            ThemeWatcher::new(
                Arc::new(NotifyWatcher::default()),
                Arc::new(ManualNotifier::default()),
            ),
            refresher.clone(),
        );
        let key = CanonicalKey::local(&path).unwrap();
        let mut events = cache.subscribe();

        let before = cache.resolve(key.clone()).await.unwrap();
        assert_eq!(before.kind, SourceKind::LocalFile);

        // Other files of the directory are not tracked.
        std::fs::write(dir.path().join("sibling.css"), "/* @theme sibling */").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(cache.get(&key).unwrap().generation, before.generation);

        // Replace the file in one step so no half-written content is observed.
        let staged = dir.path().join("live.css.tmp");
        std::fs::write(&staged, "/* @theme live */\nsection { color: red; }").unwrap();
        std::fs::rename(&staged, &path).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no change event")
            .unwrap();
        assert_eq!(event, ThemeEvent::Changed(key.clone()));
        let after = cache.get(&key).unwrap();
        assert!(after.generation > before.generation);
        assert!(after.css.contains("color: red"));

        std::fs::remove_file(&path).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no delete event")
            .unwrap();
        assert_eq!(event, ThemeEvent::Removed(key.clone()));
        assert!(cache.get(&key).is_none());
        assert_eq!(refresher.count(), 1);

        // The watch went away with the record.
        std::fs::write(&path, "/* @theme live */").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(cache.get(&key).is_none());
        assert_eq!(refresher.count(), 1);
    }

    #[tokio::test]
    async fn test_remove_during_resolution_answers_without_storing() {
        let Fixture { cache, fs, notifier, .. } =
            fixture(MemoryFileSystem::with_read_delay(Duration::from_millis(50)));
        let uri = theme_uri("slow");
        fs.insert(&uri, "/* @theme slow */");
        let key = CanonicalKey::from_uri(&uri);

        let pending = cache.ensure([key.clone()]);
        cache.remove(key.clone());

        let outcomes = futures::future::join_all(pending).await;
        assert_eq!(outcomes.len(), 1);
        let record = outcomes[0].as_ref().unwrap();
        assert_eq!(&*record.css, "/* @theme slow */");

        assert!(cache.get(&key).is_none());
        assert!(cache.registered_keys().is_empty());
        assert_eq!(notifier.subscriptions(&uri), 0);
    }

    #[tokio::test]
    async fn test_fetch_timeout_can_be_changed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and never answer.
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let Fixture { cache, .. } = fixture(MemoryFileSystem::default());
        let timeout = Duration::from_millis(100);
        cache.set_fetch_timeout(timeout);

        let key = CanonicalKey::remote(format!("http://{addr}/slow.css"));
        assert_eq!(
            cache.resolve(key.clone()).await,
            Err(ResolveError::Fetch(FetchError::Timeout(timeout)))
        );
        assert!(cache.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_invalidate_and_retain() {
        let Fixture {
            cache,
            fs,
            refresher,
            ..
        } = fixture(MemoryFileSystem::default());
        let a = theme_uri("a");
        let b = theme_uri("b");
        fs.insert(&a, "/* @theme a */");
        fs.insert(&b, "/* @theme b */");
        let (key_a, key_b) = (CanonicalKey::from_uri(&a), CanonicalKey::from_uri(&b));
        let mut events = cache.subscribe();

        cache.ensure_all(vec![key_a.clone(), key_b.clone()]).await;

        cache.invalidate(key_a.clone());
        assert_eq!(events.recv().await.unwrap(), ThemeEvent::Changed(key_a.clone()));
        assert_eq!(fs.reads(&a), 2);
        assert_eq!(refresher.count(), 1);

        let records = cache.reload(vec![key_b.clone()]).await;
        assert_eq!(events.recv().await.unwrap(), ThemeEvent::Removed(key_a));
        assert_eq!(records.len(), 1);
        assert_eq!(cache.registered_keys(), vec![key_b]);
        assert_eq!(fs.reads(&b), 1);
    }

    #[tokio::test]
    async fn test_dispose_releases_watches() {
        let Fixture {
            cache,
            fs,
            notifier,
            ..
        } = fixture(MemoryFileSystem::default());
        let uri = theme_uri("a");
        fs.insert(&uri, "/* @theme a */");
        let key = CanonicalKey::from_uri(&uri);

        cache.resolve(key.clone()).await.unwrap();
        assert_eq!(notifier.subscriptions(&uri), 1);

        cache.dispose().await;
        assert_eq!(notifier.subscriptions(&uri), 0);
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.resolve(key).await, Err(ResolveError::Disposed));

        cache.dispose().await;
    }
}
