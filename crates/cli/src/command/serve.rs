use crate::app::Args;
use crate::host::document_url;
use anyhow::Result;
use clap::Parser;
use marp_proxy::ProxyServer;
use marp_themes::{LocalFileSystem, ThemeEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Resolves the themes of a document, keeps them up to date and serves the
/// workspace through the asset proxy until interrupted.
#[derive(Parser, Debug, Clone)]
pub struct Serve {
    /// Markdown document the themes are resolved for.
    document: PathBuf,
}

impl Serve {
    pub async fn run(&self, args: Args) -> Result<()> {
        let document = document_url(&self.document)?;
        let themes = super::local_themes(&args);
        let mut events = themes.subscribe();

        let records = themes.load_styles_for(&document).await;
        tracing::info!(%document, resolved = records.len(), "Loaded themes");

        let proxy = match themes.base_directory(&document) {
            Some(base) if marp_config::config().proxy.enable => {
                let proxy =
                    ProxyServer::start(base.url().clone(), Arc::new(LocalFileSystem)).await?;
                println!("Serving {} at {}", base.url(), proxy.url());
                Some(proxy)
            }
            _ => None,
        };

        let (config_tx, mut config_rx) = tokio::sync::mpsc::channel(1);
        marp_config::monitor::watch(config_tx);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("Interrupted, shutting down");
                    break;
                }
                Some(()) = config_rx.recv() => {
                    themes.set_fetch_timeout(Duration::from_millis(
                        marp_config::config().themes.fetch_timeout_ms,
                    ));
                    let records = match themes.base_directory(&document) {
                        Some(base) => themes.reload_styles(&base).await,
                        None => themes.load_styles_for(&document).await,
                    };
                    tracing::info!(resolved = records.len(), "Reloaded themes after config change");
                }
                event = events.recv() => match event {
                    Ok(ThemeEvent::Changed(key)) => tracing::info!(%key, "Theme changed"),
                    Ok(ThemeEvent::Removed(key)) => tracing::info!(%key, "Theme removed"),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed theme events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        if let Some(proxy) = proxy {
            proxy.shutdown().await?;
        }
        themes.dispose().await;

        Ok(())
    }
}
