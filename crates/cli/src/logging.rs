use anyhow::{anyhow, Result};
use marp_config::LogConfig;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log files above this size are removed on start-up.
const MAX_LOG_FILE_SIZE: u64 = 8 * 1024 * 1024;

fn log_path(log: Option<PathBuf>, config: &LogConfig) -> Option<PathBuf> {
    if let Some(log_path) = log {
        Some(log_path)
    } else if let Ok(log_path) = std::env::var("MARP_LOG_PATH").map(PathBuf::from) {
        Some(log_path)
    } else {
        config.log_file.as_ref().map(paths::expand_tilde)
    }
}

/// Installs the global subscriber.
///
/// Logs go to the log file if one is configured, to stderr otherwise. The
/// returned guard must be held until exit to flush the writer.
pub fn init(log: Option<PathBuf>, config: &LogConfig) -> Result<WorkerGuard> {
    let max_level = config.max_level.parse().unwrap_or(tracing::Level::DEBUG);

    let (writer, guard, with_ansi) = match log_path(log, config) {
        Some(log_path) => {
            if let Ok(metadata) = std::fs::metadata(&log_path) {
                if log_path.is_file() && metadata.len() > MAX_LOG_FILE_SIZE {
                    std::fs::remove_file(&log_path)?;
                }
            }

            let file_name = log_path
                .file_name()
                .ok_or_else(|| anyhow!("no file name in {log_path:?}"))?;

            let directory = log_path
                .parent()
                .ok_or_else(|| anyhow!("{log_path:?} has no parent"))?;

            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (non_blocking, guard, false)
        }
        None => {
            let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
            (non_blocking, guard, std::io::stderr().is_terminal())
        }
    };

    let builder = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_line_number(true)
        .with_writer(writer)
        .with_ansi(with_ansi);

    if config.log_target.is_empty() {
        tracing::subscriber::set_global_default(builder.finish())?;
    } else {
        let filter = EnvFilter::try_new(&config.log_target)?;
        tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())?;
    }

    Ok(guard)
}
