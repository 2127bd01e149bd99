//! Theme resolution for Marp slide previews.
//!
//! Configured theme references are normalized into canonical keys, fetched
//! from local files, remote URLs or virtual filesystems, kept in a cache that
//! refreshes itself when the sources change, and exposed as theme sets for
//! rendering.

mod cache;
mod engine;
mod error;
mod fetcher;
mod host;
mod key;
mod normalizer;
mod theme_set;
mod themes;
mod watcher;

#[cfg(test)]
mod testing;

pub use self::cache::{PendingResolution, ThemeCache, ThemeEvent, ThemeRecord};
pub use self::engine::{MarpitEngine, ThemeEngine, SIZE_META};
pub use self::error::{EngineError, FetchError, ResolveError, WatchSetupError};
pub use self::fetcher::{ThemeFetcher, DEFAULT_FETCH_TIMEOUT};
pub use self::host::{
    base_directory, ChangeCallback, ChangeKind, ChangeNotifier, FileStat, FileSystem, FileType,
    LocalFileSystem, PreviewRefresher, WatchSubscription, Workspace,
};
pub use self::key::{Base, CanonicalKey, SourceKind};
pub use self::normalizer::normalize;
pub use self::theme_set::{
    apply_size_declarations, build_theme_set, get_size_presets, SizePreset, ThemeSetHandle,
};
pub use self::themes::{Host, Themes, ThemesOptions};
pub use self::watcher::{NotifyWatcher, ThemeWatcher, WatchHandle, WatcherConfig};
