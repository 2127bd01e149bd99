//! Identity of theme sources.

use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Where the content of a theme comes from.
///
/// Derived once from a [`CanonicalKey`] and carried along with the resolved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    LocalFile,
    RemoteUrl,
    VirtualUri,
}

impl SourceKind {
    pub fn is_remote_reference(reference: &str) -> bool {
        reference.starts_with("http://") || reference.starts_with("https://")
    }
}

/// Normalized, de-duplicated identity of a theme source, used as the cache index.
///
/// - local file: `file://` URL of an absolute path within the base directory.
/// - remote: the configured `http(s)://` URL, verbatim.
/// - virtual: URL of the virtual base with the reference's path appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn remote(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns `None` if `path` is not absolute.
    pub fn local(path: &Path) -> Option<Self> {
        Url::from_file_path(path).ok().map(|url| Self(url.into()))
    }

    pub fn from_uri(uri: &Url) -> Self {
        Self(uri.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn source_kind(&self) -> SourceKind {
        if SourceKind::is_remote_reference(&self.0) {
            SourceKind::RemoteUrl
        } else if self.0.starts_with("file:") {
            SourceKind::LocalFile
        } else {
            SourceKind::VirtualUri
        }
    }

    pub fn to_uri(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.0)
    }

    /// Filesystem path of a local key.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        match self.source_kind() {
            SourceKind::LocalFile => self.to_uri().ok()?.to_file_path().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory the relative theme references of a document are resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Base {
    /// Directory on the real filesystem.
    FileSystem { root: PathBuf, url: Url },
    /// Directory exposed by the host through a non-`file` scheme.
    Virtual(Url),
}

impl Base {
    pub fn from_path(root: impl Into<PathBuf>) -> Option<Self> {
        let root = root.into();
        let url = Url::from_directory_path(&root).ok()?;
        Some(Self::FileSystem { root, url })
    }

    pub fn from_url(url: Url) -> Option<Self> {
        if url.cannot_be_a_base() {
            return None;
        }

        if url.scheme() == "file" {
            let root = url.to_file_path().ok()?;
            Some(Self::FileSystem { root, url })
        } else {
            Some(Self::Virtual(url))
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            Self::FileSystem { url, .. } => url,
            Self::Virtual(url) => url,
        }
    }
}
