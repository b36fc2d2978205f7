use anyhow::Context as _;

use crate::cli::CheckArgs;

/// Extraction-only run; per-URL failures are reported, not returned as errors.
pub async fn run(args: CheckArgs) -> anyhow::Result<()> {
    let run = crate::shell::run_batch(&args.run).await.context("extract")?;
    tracing::info!(
        succeeded = run.result.succeeded(),
        failed = run.result.failed(),
        results = %run.results_path.display(),
        "check finished"
    );
    Ok(())
}
