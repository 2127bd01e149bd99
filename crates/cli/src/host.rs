//! Stand-alone host: configuration comes from `config.toml`, workspace folders
//! from `--workspace` or the git root of the document.

use marp_themes::{PreviewRefresher, Workspace};
use paths::AbsPathBuf;
use std::path::Path;
use url::Url;

/// Resolves `path` against the current working directory.
pub fn absolutize(path: &Path) -> anyhow::Result<AbsPathBuf> {
    let path = paths::normalize_lexically(&paths::current_working_dir().join(path));
    AbsPathBuf::try_from(path)
        .map_err(|path| anyhow::anyhow!("{} is not an absolute path", path.display()))
}

pub fn document_url(document: &Path) -> anyhow::Result<Url> {
    let document = absolutize(document)?;
    Url::from_file_path(document.as_path())
        .map_err(|()| anyhow::anyhow!("{document} can not be converted to a file URL"))
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWorkspace {
    folder: Option<Url>,
}

impl ConfigWorkspace {
    pub fn new(folder: Option<&Path>) -> Self {
        Self {
            folder: folder
                .and_then(|folder| absolutize(folder).ok())
                .and_then(|folder| Url::from_directory_path(folder).ok()),
        }
    }
}

impl Workspace for ConfigWorkspace {
    fn theme_paths(&self, _scope: &Url) -> Vec<serde_json::Value> {
        marp_config::config().themes.theme_paths()
    }

    fn workspace_folder(&self, document: &Url) -> Option<Url> {
        if let Some(folder) = &self.folder {
            return document
                .as_str()
                .starts_with(folder.as_str())
                .then(|| folder.clone());
        }

        let path = document.to_file_path().ok()?;
        let git_root = paths::find_git_root(path.parent()?)?;
        Url::from_directory_path(git_root).ok()
    }
}

/// There is no preview to refresh outside of an editor, the request is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRefresher;

impl PreviewRefresher for LoggingRefresher {
    fn refresh_preview(&self) {
        tracing::info!("Preview refresh requested");
    }
}
