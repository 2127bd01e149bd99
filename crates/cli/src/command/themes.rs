use crate::app::Args;
use crate::host::document_url;
use anyhow::Result;
use clap::Parser;
use marp_themes::ThemeEngine;
use serde_json::json;
use std::path::PathBuf;

/// Resolves the configured themes of a document and prints the theme set as JSON.
#[derive(Parser, Debug, Clone)]
pub struct Themes {
    /// Markdown document the themes are resolved for.
    document: PathBuf,

    /// Theme whose size presets are printed, the default theme if omitted or unknown.
    #[clap(long)]
    theme: Option<String>,
}

impl Themes {
    pub async fn run(&self, args: Args) -> Result<()> {
        let document = document_url(&self.document)?;
        let themes = super::local_themes(&args);

        let records = themes.load_styles_for(&document).await;
        tracing::debug!(%document, resolved = records.len(), "Loaded themes");

        let theme_set = themes.get_marp_theme_set_for(&document);
        let registered = theme_set
            .registered()
            .iter()
            .map(|(key, name)| {
                json!({
                    "name": name,
                    "source": key,
                    "kind": key.source_kind(),
                })
            })
            .collect::<Vec<_>>();

        let output = json!({
            "document": document.as_str(),
            "themes": theme_set.engine().theme_names(),
            "registered": registered,
            "sizePresets": theme_set.size_presets(self.theme.as_deref()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);

        themes.dispose().await;

        Ok(())
    }
}
