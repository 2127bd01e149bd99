use dirs::Dirs;
use std::convert::TryFrom;
use std::path::{Component, Display, Path, PathBuf, MAIN_SEPARATOR};
use std::sync::OnceLock;

/// Unit type wrapper of [`PathBuf`] that is absolute path.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct AbsPathBuf(PathBuf);

impl AbsPathBuf {
    pub fn display(&self) -> Display<'_> {
        self.0.display()
    }

    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl From<AbsPathBuf> for PathBuf {
    fn from(abs_path_buf: AbsPathBuf) -> PathBuf {
        abs_path_buf.0
    }
}

impl TryFrom<PathBuf> for AbsPathBuf {
    type Error = PathBuf;
    fn try_from(path_buf: PathBuf) -> Result<AbsPathBuf, PathBuf> {
        if path_buf.is_absolute() {
            Ok(Self(path_buf))
        } else {
            path_buf
                .to_str()
                .and_then(|p| {
                    shellexpand::full(p)
                        .map(|p| PathBuf::from(p.to_string()))
                        .ok()
                })
                .filter(|p| p.is_absolute())
                .map(AbsPathBuf)
                .ok_or(path_buf)
        }
    }
}

impl TryFrom<&str> for AbsPathBuf {
    type Error = PathBuf;
    fn try_from(path: &str) -> Result<AbsPathBuf, PathBuf> {
        Self::try_from(PathBuf::from(path))
    }
}

impl std::ops::Deref for AbsPathBuf {
    type Target = PathBuf;
    fn deref(&self) -> &PathBuf {
        &self.0
    }
}

impl AsRef<Path> for AbsPathBuf {
    fn as_ref(&self) -> &Path {
        self.0.as_path()
    }
}

impl std::fmt::Display for AbsPathBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Expands `~` if any.
pub fn expand_tilde(path: impl AsRef<str>) -> PathBuf {
    static HOME_PREFIX: OnceLock<String> = OnceLock::new();

    if let Some(stripped) = path
        .as_ref()
        .strip_prefix(HOME_PREFIX.get_or_init(|| format!("~{MAIN_SEPARATOR}")))
    {
        Dirs::home_dir().join(stripped)
    } else {
        path.as_ref().into()
    }
}

// Get the current working directory.
// This information is managed internally as the call to std::env::current_dir
// might fail if the cwd has been deleted.
pub fn current_working_dir() -> &'static PathBuf {
    static CWD: OnceLock<PathBuf> = OnceLock::new();

    CWD.get_or_init(|| {
        std::env::current_dir()
            .and_then(dunce::canonicalize)
            .expect("Couldn't determine current working directory")
    })
}

/// Normalize a path purely lexically, removing things like `.` and `..`.
///
/// Nothing on disk is consulted, so symlinks are left untouched. A `..` at the
/// root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => unreachable!(),
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }

    ret
}

/// Returns `true` if `path` equals `base` or lives somewhere below it.
///
/// Both paths are compared component-wise after lexical normalization, so
/// `/a/bc` is not considered to be within `/a/b`.
pub fn is_within(base: &Path, path: &Path) -> bool {
    normalize_lexically(path).starts_with(normalize_lexically(base))
}

/// Joins `reference` onto `base` and returns the normalized result if it does
/// not escape `base`.
///
/// Absolute references are kept as is and subject to the same containment check.
pub fn resolve_within(base: &Path, reference: impl AsRef<Path>) -> Option<PathBuf> {
    let resolved = normalize_lexically(&base.join(reference));
    is_within(base, &resolved).then_some(resolved)
}

pub fn find_git_root(start_dir: &Path) -> Option<&Path> {
    upward_search(start_dir, |path| {
        [".git", ".git/"]
            .iter()
            .any(|root_marker| path.join(root_marker).exists())
    })
    .ok()
}

fn upward_search<F>(path: &Path, predicate: F) -> std::io::Result<&Path>
where
    F: Fn(&Path) -> bool,
{
    if predicate(path) {
        return Ok(path);
    }

    let next_path = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "Reached root directory")
    })?;

    upward_search(next_path, predicate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/workspace/project/./themes/../a.css")),
            PathBuf::from("/workspace/project/a.css")
        );
        assert_eq!(
            normalize_lexically(Path::new("/workspace/../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_within() {
        let base = Path::new("/workspace/project");

        assert_eq!(
            resolve_within(base, "themes/custom.css"),
            Some(PathBuf::from("/workspace/project/themes/custom.css"))
        );
        assert_eq!(resolve_within(base, "."), Some(base.to_path_buf()));
        assert_eq!(
            resolve_within(base, "/workspace/project/a.css"),
            Some(PathBuf::from("/workspace/project/a.css"))
        );
        assert_eq!(resolve_within(base, "../../etc/passwd"), None);
        assert_eq!(resolve_within(base, "/etc/passwd"), None);
        assert_eq!(resolve_within(base, "../project-other/a.css"), None);
    }

    #[test]
    fn test_find_git_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("slides").join("deck");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        assert_eq!(find_git_root(&nested), Some(dir.path()));
    }
}
