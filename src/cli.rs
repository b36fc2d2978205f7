use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::retry::Backoff;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract recipes and package them as an EPUB.
    Build(BuildArgs),
    /// Extract recipes and report per-URL results without writing a book.
    Check(CheckArgs),
}

/// Inputs and retry settings shared by every command that runs a batch.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Recipe URLs (http/https), processed in order.
    pub urls: Vec<String>,

    /// Markdown link list to read URLs from (default: `recipe_links.md` when no URLs are given).
    #[arg(long)]
    pub links: Option<PathBuf>,

    /// YAML run configuration (default: `recipebook.yaml` when present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Attempts per URL, including the first.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds to wait before retrying a transient failure.
    #[arg(long, value_name = "SECS")]
    pub retry_delay: Option<u64>,

    /// Minimum seconds to wait after a rate-limit response.
    #[arg(long, value_name = "SECS")]
    pub rate_limit_delay: Option<u64>,

    /// Seconds to pause between URLs.
    #[arg(long, value_name = "SECS")]
    pub courtesy_delay: Option<u64>,

    #[arg(long, value_enum)]
    pub backoff: Option<Backoff>,

    /// HTTP timeout per request.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Do not download recipe images.
    #[arg(long)]
    pub no_images: bool,

    /// Directory for `extraction_<stamp>.log`.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Directory for `extraction_results_<stamp>.json`.
    #[arg(long)]
    pub results_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Output EPUB path.
    #[arg(long, default_value = "recipes.epub")]
    pub out: PathBuf,

    /// Book title.
    #[arg(long, default_value = "Recipe Book")]
    pub title: String,

    /// Book language (BCP 47).
    #[arg(long, default_value = "en")]
    pub lang: String,

    #[arg(long)]
    pub author: Option<String>,

    /// Overwrite an existing output file.
    #[arg(long)]
    pub force: bool,

    /// Order recipes by detected category and group the table of contents.
    #[arg(long)]
    pub categorize: bool,

    /// Also write the extracted recipes as a markdown link list.
    #[arg(long)]
    pub save_links: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub run: RunArgs,
}
