use clap::Parser;
use cli::{Args, RunCmd};

#[derive(Parser, Debug)]
pub enum Cmd {
    /// Display the current version.
    #[clap(name = "version")]
    Version,

    /// Run the marp theme backend.
    #[clap(flatten)]
    Run(Box<RunCmd>),
}

#[derive(Parser, Debug)]
#[clap(name = "marp", disable_version_flag = true)]
pub struct Marp {
    #[clap(flatten)]
    pub args: Args,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let marp = Marp::parse();

    match marp.cmd {
        Cmd::Version => {
            println!(
                "version {}, built for {} {}.",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH,
            );
        }
        Cmd::Run(run_cmd) => {
            if let Err(e) = run_cmd.run(marp.args).await {
                eprintln!("error: {e:?}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
