use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::OnceLock;

pub struct Dirs;

impl Dirs {
    /// Project directory specifically for Marp Preview.
    ///
    /// The default config file lives in its config dir.
    pub fn project() -> &'static ProjectDirs {
        static CELL: OnceLock<ProjectDirs> = OnceLock::new();

        CELL.get_or_init(|| {
            ProjectDirs::from("org", "marp", "Marp Preview")
                .expect("Couldn't create project directory for marp-preview")
        })
    }

    /// Provides access to the standard directories that the operating system uses.
    pub fn base() -> &'static BaseDirs {
        static CELL: OnceLock<BaseDirs> = OnceLock::new();

        CELL.get_or_init(|| BaseDirs::new().expect("Failed to construct BaseDirs"))
    }

    pub fn home_dir() -> PathBuf {
        Self::base().home_dir().to_path_buf()
    }

    /// Default location of `config.toml`.
    ///
    /// - Linux: ~/.config/marppreview/config.toml
    /// - macOS: ~/Library/Application\ Support/org.marp.Marp-Preview/config.toml
    /// - Windows: ~\AppData\Roaming\marp\Marp Preview\config\config.toml
    pub fn default_config_file() -> PathBuf {
        Self::project().config_dir().join("config.toml")
    }
}
