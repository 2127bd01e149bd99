//! Narrow interfaces to the editor hosting the preview.
//!
//! The theme cache never talks to the editor directly: documents, folders,
//! configuration, files and change notifications all come in through the
//! traits of this module.

use crate::error::WatchSetupError;
use crate::key::Base;
use std::path::PathBuf;
use std::time::SystemTime;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub mtime: SystemTime,
    pub file_type: FileType,
}

impl FileStat {
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// File capabilities of the host, addressed by URI.
///
/// Virtual filesystems are served through the same interface as the real one.
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync + 'static {
    async fn stat(&self, uri: &Url) -> std::io::Result<FileStat>;

    async fn read(&self, uri: &Url) -> std::io::Result<Vec<u8>>;

    async fn write(&self, uri: &Url, contents: &[u8]) -> std::io::Result<()>;

    async fn delete(&self, uri: &Url) -> std::io::Result<()>;
}

fn to_local_path(uri: &Url) -> std::io::Result<PathBuf> {
    if uri.scheme() != "file" {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("unsupported scheme `{}`", uri.scheme()),
        ));
    }
    uri.to_file_path().map_err(|()| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{uri} is not a valid file path"),
        )
    })
}

/// [`FileSystem`] over `file://` URIs backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait::async_trait]
impl FileSystem for LocalFileSystem {
    async fn stat(&self, uri: &Url) -> std::io::Result<FileStat> {
        let metadata = tokio::fs::metadata(to_local_path(uri)?).await?;
        let file_type = if metadata.is_dir() {
            FileType::Directory
        } else if metadata.is_file() {
            FileType::File
        } else {
            FileType::Other
        };
        Ok(FileStat {
            size: metadata.len(),
            mtime: metadata.modified()?,
            file_type,
        })
    }

    async fn read(&self, uri: &Url) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(to_local_path(uri)?).await
    }

    async fn write(&self, uri: &Url, contents: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(to_local_path(uri)?, contents).await
    }

    async fn delete(&self, uri: &Url) -> std::io::Result<()> {
        tokio::fs::remove_file(to_local_path(uri)?).await
    }
}

/// Kind of a change notification for a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Changed,
    Deleted,
}

pub type ChangeCallback = Box<dyn Fn(ChangeKind) + Send + Sync + 'static>;

/// An active subscription, dropping it disposes the underlying watcher.
pub trait WatchSubscription: Send {}

/// Change notification capability of the host.
pub trait ChangeNotifier: Send + Sync + 'static {
    /// Watches the single entry `file_name` of the directory `dir`.
    fn watch(
        &self,
        dir: &Url,
        file_name: &str,
        on_change: ChangeCallback,
    ) -> Result<Box<dyn WatchSubscription>, WatchSetupError>;
}

/// Configuration and folder structure of the editor workspace.
pub trait Workspace: Send + Sync + 'static {
    /// Configured theme references for the given scope, in order.
    ///
    /// Values are loosely typed, anything but a string is ignored by the normalizer.
    fn theme_paths(&self, scope: &Url) -> Vec<serde_json::Value>;

    /// Root of the workspace folder containing `document`, if any.
    fn workspace_folder(&self, document: &Url) -> Option<Url>;
}

/// Asks the editor to re-render the preview.
pub trait PreviewRefresher: Send + Sync + 'static {
    fn refresh_preview(&self);
}

/// The base directory of a document: its workspace folder if it belongs to one,
/// otherwise the directory containing the document.
pub fn base_directory(workspace: &dyn Workspace, document: &Url) -> Option<Base> {
    let dir = match workspace.workspace_folder(document) {
        Some(folder) => folder,
        None => {
            if document.cannot_be_a_base() {
                return None;
            }
            document.join("./").ok()?
        }
    };
    Base::from_url(dir)
}
