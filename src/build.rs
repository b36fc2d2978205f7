use anyhow::Context as _;

use crate::cli::BuildArgs;
use crate::epub::{BookOptions, assemble};

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    // Checked again by the assembler; failing here avoids scraping for nothing.
    if args.out.exists() && !args.force {
        anyhow::bail!(
            "epub output already exists: {} (pass --force to overwrite)",
            args.out.display()
        );
    }

    tracing::info!(out = %args.out.display(), "build: extract");
    let run = crate::shell::run_batch(&args.run).await.context("extract")?;
    let records = run.result.records();

    if let Some(path) = &args.save_links {
        if records.is_empty() {
            tracing::warn!(path = %path.display(), "no recipes extracted; link list not written");
        } else {
            crate::links::write_link_list(path, &records).context("save link list")?;
        }
    }

    tracing::info!(recipes = records.len(), "build: assemble epub");
    let options = BookOptions {
        title: args.title,
        lang: args.lang,
        author: args.author,
        force: args.force,
        categorize: args.categorize,
    };
    let summary = match assemble(&records, &args.out, &options) {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(kind = %err.kind(), "{err}");
            return Err(anyhow::Error::new(err).context("assemble epub"));
        }
    };

    println!(
        "Wrote {} ({} recipes, {} images)",
        summary.path.display(),
        summary.chapters,
        summary.images
    );
    Ok(())
}
