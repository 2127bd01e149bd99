pub mod monitor;

use arc_swap::ArcSwap;
use dirs::Dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

static CONFIG: OnceLock<ArcSwap<ConfigInner>> = OnceLock::new();

#[derive(Debug)]
struct ConfigInner {
    config: Arc<Config>,
    file_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config.toml: {0}")]
    Toml(#[from] toml::de::Error),
}

struct LoadedConfig {
    config: Config,
    file_path: PathBuf,
    maybe_error: Option<ConfigError>,
}

fn load_config(specified_config_file: Option<PathBuf>) -> LoadedConfig {
    let config_file = specified_config_file.unwrap_or_else(Dirs::default_config_file);

    let (config, maybe_error) = match std::fs::read_to_string(&config_file) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => (config, None),
            Err(err) => (Config::default(), Some(ConfigError::Toml(err))),
        },
        // A missing config file simply means the defaults are used.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => (Config::default(), None),
        Err(source) => (
            Config::default(),
            Some(ConfigError::Io {
                path: config_file.clone(),
                source,
            }),
        ),
    };

    LoadedConfig {
        config,
        file_path: config_file,
        maybe_error,
    }
}

fn store(loaded: LoadedConfig) -> Option<ConfigError> {
    let LoadedConfig {
        config,
        file_path,
        maybe_error,
    } = loaded;

    let inner = ConfigInner {
        config: Arc::new(config),
        file_path,
    };

    match CONFIG.get() {
        Some(cell) => cell.store(Arc::new(inner)),
        None => {
            if let Err(cell) = CONFIG.set(ArcSwap::from_pointee(inner)) {
                // Lost a race against another initializer, overwrite its value.
                if let Some(current) = CONFIG.get() {
                    current.store(cell.load_full());
                }
            }
        }
    }

    maybe_error
}

/// Loads the config from `specified_config_file`, or from the default location
/// if none is given, and installs it as the global config.
pub fn load_config_on_startup(
    specified_config_file: Option<PathBuf>,
) -> (Arc<Config>, Option<ConfigError>) {
    let maybe_error = store(load_config(specified_config_file));
    (config(), maybe_error)
}

/// Re-reads the config file, keeping the previous value if the new content is malformed.
pub fn reload_config(config_file: PathBuf) -> Option<ConfigError> {
    let loaded = load_config(Some(config_file));
    if let Some(err) = loaded.maybe_error {
        tracing::warn!(?err, "Ignored the malformed config file on reload");
        return Some(err);
    }
    store(loaded)
}

/// [`Config`] is a global value, explicitly initialized by [`load_config_on_startup`]
/// with an optional custom config file location, otherwise it is lazily loaded
/// from the default config file location on the first access.
pub fn config() -> Arc<Config> {
    CONFIG
        .get_or_init(|| {
            let LoadedConfig {
                config, file_path, ..
            } = load_config(None);
            ArcSwap::from_pointee(ConfigInner {
                config: Arc::new(config),
                file_path,
            })
        })
        .load()
        .config
        .clone()
}

pub fn config_file() -> PathBuf {
    match CONFIG.get() {
        Some(cell) => cell.load().file_path.clone(),
        None => Dirs::default_config_file(),
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LogConfig {
    /// Specify the log file path.
    ///
    /// This path must be an absolute path.
    pub log_file: Option<String>,

    /// Specify the max log level.
    pub max_level: String,

    /// Specify the log target to enable more detailed logging.
    ///
    /// ```toml
    /// [log]
    /// log-target = "marp_themes=trace,marp_proxy=debug"
    /// ```
    pub log_target: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            max_level: "debug".into(),
            log_target: "".into(),
        }
    }
}

/// Custom theme configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ThemesConfig {
    /// List of theme CSS references.
    ///
    /// Each entry is a path relative to the workspace folder, or a remote URL
    /// starting with `http://` or `https://`. Entries that are not strings are ignored.
    pub paths: Vec<toml::Value>,

    /// Timeout in milliseconds for fetching a remote theme.
    pub fetch_timeout_ms: u64,
}

impl Default for ThemesConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            fetch_timeout_ms: 5000,
        }
    }
}

impl ThemesConfig {
    /// Returns the configured references as loosely-typed values, in order.
    pub fn theme_paths(&self) -> Vec<serde_json::Value> {
        self.paths
            .iter()
            .filter_map(|value| match serde_json::to_value(value) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::debug!(?err, ?value, "Dropped unconvertible theme path");
                    None
                }
            })
            .collect()
    }
}

/// Local asset proxy.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Whether to start the proxy in `serve` mode.
    pub enable: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Log configuration.
    pub log: LogConfig,

    /// Theme configuration.
    pub themes: ThemesConfig,

    /// Asset proxy configuration.
    pub proxy: ProxyConfig,
}
