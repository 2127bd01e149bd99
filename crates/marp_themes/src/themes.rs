//! Entry point used by the rendering pipeline.

use crate::cache::{PendingResolution, ThemeCache, ThemeEvent, ThemeRecord};
use crate::engine::MarpitEngine;
use crate::fetcher::{ThemeFetcher, DEFAULT_FETCH_TIMEOUT};
use crate::host::{base_directory, ChangeNotifier, FileSystem, PreviewRefresher, Workspace};
use crate::key::{Base, CanonicalKey};
use crate::normalizer::normalize;
use crate::theme_set::{build_theme_set, get_size_presets, SizePreset, ThemeSetHandle};
use crate::watcher::ThemeWatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;

/// Capabilities of the editor the themes are resolved for.
#[derive(Clone)]
pub struct Host {
    pub workspace: Arc<dyn Workspace>,
    pub fs: Arc<dyn FileSystem>,
    /// Notifier for `file://` sources.
    pub local_notifier: Arc<dyn ChangeNotifier>,
    /// Notifier for sources on virtual filesystems.
    pub virtual_notifier: Arc<dyn ChangeNotifier>,
    pub refresher: Arc<dyn PreviewRefresher>,
}

#[derive(Debug, Clone)]
pub struct ThemesOptions {
    pub fetch_timeout: Duration,
}

impl Default for ThemesOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

pub struct Themes {
    workspace: Arc<dyn Workspace>,
    cache: ThemeCache,
}

impl Themes {
    /// Must be called within a tokio runtime.
    pub fn new(host: Host, options: ThemesOptions) -> Self {
        let fetcher = ThemeFetcher::new(host.fs, options.fetch_timeout);
        let watcher = ThemeWatcher::new(host.local_notifier, host.virtual_notifier);
        Self {
            workspace: host.workspace,
            cache: ThemeCache::new(fetcher, watcher, host.refresher),
        }
    }

    pub fn cache(&self) -> &ThemeCache {
        &self.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThemeEvent> {
        self.cache.subscribe()
    }

    pub fn base_directory(&self, document: &Url) -> Option<Base> {
        base_directory(self.workspace.as_ref(), document)
    }

    /// Canonical keys configured for `scope`.
    ///
    /// Without a base directory only remote themes are available.
    pub fn theme_keys(&self, scope: &Url, base: Option<&Base>) -> Vec<CanonicalKey> {
        normalize(&self.workspace.theme_paths(scope), base)
    }

    /// Starts resolving every theme configured for `base`.
    pub fn load_styles(&self, base: &Base) -> Vec<PendingResolution> {
        self.cache.ensure(self.theme_keys(base.url(), Some(base)))
    }

    /// Resolves the themes of `document`, the failed ones are left out.
    pub async fn load_styles_for(&self, document: &Url) -> Vec<Arc<ThemeRecord>> {
        let base = self.base_directory(document);
        let keys = self.theme_keys(document, base.as_ref());
        self.cache.ensure_all(keys).await
    }

    /// Drops the themes no longer configured for `base` and resolves the rest.
    pub async fn reload_styles(&self, base: &Base) -> Vec<Arc<ThemeRecord>> {
        let keys = self.theme_keys(base.url(), Some(base));
        self.cache.reload(keys).await
    }

    /// Resolved themes configured for `scope`, in configuration order.
    pub fn get_registered_styles(&self, scope: &Url, base: Option<&Base>) -> Vec<Arc<ThemeRecord>> {
        self.cache.registered_styles(&self.theme_keys(scope, base))
    }

    /// Theme set of `document` made of the themes resolved so far.
    pub fn get_marp_theme_set_for(&self, document: &Url) -> ThemeSetHandle<MarpitEngine> {
        let base = self.base_directory(document);
        let styles = self.get_registered_styles(document, base.as_ref());
        build_theme_set(&styles, MarpitEngine::new)
    }

    pub fn get_size_presets(&self, document: &Url, theme_name: Option<&str>) -> Vec<SizePreset> {
        get_size_presets(&self.get_marp_theme_set_for(document), theme_name)
    }

    pub fn set_fetch_timeout(&self, timeout: Duration) {
        self.cache.set_fetch_timeout(timeout);
    }

    pub async fn dispose(&self) {
        self.cache.dispose().await;
    }
}
