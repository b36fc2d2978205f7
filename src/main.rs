use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    recipebook::logging::init().context("init logging")?;

    let cli = recipebook::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        recipebook::cli::Command::Build(args) => {
            recipebook::build::run(args).await.context("build")?;
        }
        recipebook::cli::Command::Check(args) => {
            recipebook::check::run(args).await.context("check")?;
        }
    }

    Ok(())
}
