use crate::command;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub enum RunCmd {
    /// Resolve the themes of a document and print the resulting theme set.
    #[clap(name = "themes")]
    Themes(command::themes::Themes),
    /// Keep the themes of a document up to date and serve its workspace.
    #[clap(name = "serve")]
    Serve(command::serve::Serve),
}

/// Marp theme backend CLI arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Enable the logging system.
    #[clap(long)]
    pub log: Option<PathBuf>,

    /// Specify the path of the config file.
    #[clap(long)]
    pub config_file: Option<PathBuf>,

    /// Workspace folder the documents belong to.
    ///
    /// By default the git root of a document is used, or the directory
    /// containing the document if it is not in a git repository.
    #[clap(long)]
    pub workspace: Option<PathBuf>,
}

impl RunCmd {
    pub async fn run(self, args: Args) -> Result<()> {
        let (config, config_err) = marp_config::load_config_on_startup(args.config_file.clone());

        let _guard = crate::logging::init(args.log.clone(), &config.log)?;

        if let Some(err) = config_err {
            tracing::warn!(?err, "Using the default config");
        }

        match self {
            Self::Themes(themes) => themes.run(args).await,
            Self::Serve(serve) => serve.run(args).await,
        }
    }
}
