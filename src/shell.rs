use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;

use crate::attempt_log::JsonlAttemptLog;
use crate::batch::{BatchRunner, Progress, ProgressOutcome};
use crate::cli::RunArgs;
use crate::config::RunConfig;
use crate::error::FailureKind;
use crate::extract::RecipeExtractor;
use crate::formats::{BatchResult, UrlOutcome};
use crate::links::{DEFAULT_LINKS_FILE, read_link_list};
use crate::retry::{RetryController, ThreadSleeper};

#[derive(Debug)]
pub struct BatchRun {
    pub result: BatchResult,
    pub log_path: PathBuf,
    pub results_path: PathBuf,
}

/// Positional URLs followed by `--links` entries; `recipe_links.md` when neither is given.
pub fn resolve_urls(args: &RunArgs) -> anyhow::Result<Vec<String>> {
    let mut urls = args
        .urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();

    if let Some(path) = &args.links {
        urls.extend(read_link_list(path).context("load --links")?);
    } else if urls.is_empty() {
        let fallback = Path::new(DEFAULT_LINKS_FILE);
        if fallback.is_file() {
            urls = read_link_list(fallback).context("load default link list")?;
        }
    }

    if urls.is_empty() {
        anyhow::bail!(
            "no recipe URLs: pass URLs as arguments, use --links, or create {DEFAULT_LINKS_FILE}"
        );
    }
    Ok(urls)
}

/// Run the batch on a blocking worker while this task renders its progress.
///
/// Ctrl-C requests cancellation; the worker stops before the next URL and the partial
/// result is still reported and written.
pub async fn run_batch(args: &RunArgs) -> anyhow::Result<BatchRun> {
    let config = RunConfig::load(args.config.as_deref())
        .context("load config")?
        .with_overrides(args);
    let urls = resolve_urls(args)?;
    let stamp = crate::formats::file_stamp(chrono::Local::now());
    tracing::debug!(?config, count = urls.len(), %stamp, "starting run");

    let cancel = CancellationToken::new();
    let (tx, mut rx) = unbounded_channel();

    let worker = {
        let cancel = cancel.clone();
        let config = config.clone();
        let stamp = stamp.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<(BatchResult, PathBuf)> {
            let extractor =
                RecipeExtractor::new(config.extractor_options()).context("build extractor")?;
            let mut log =
                JsonlAttemptLog::create(&config.log_dir, &stamp).context("open attempt log")?;
            let sleeper = ThreadSleeper;
            let retry = RetryController::new(&extractor, config.retry_policy(), &sleeper);
            let runner = BatchRunner::new(retry, config.courtesy_delay());
            let result = runner.run(&urls, &mut log, &tx, &cancel);
            Ok((result, log.path().to_path_buf()))
        })
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                eprintln!("{}", render_progress(&event));
            }
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        tracing::warn!("interrupt received; stopping after the current URL");
                        cancel.cancel();
                    }
                    Err(err) => tracing::warn!(?err, "listen for ctrl-c"),
                }
            }
        }
    }

    let (result, log_path) = worker.await.context("join batch worker")??;
    let results_path = crate::results::write_results(&config.results_dir, &stamp, &result)
        .context("write results file")?;

    println!("{}", render_summary(&result));
    println!("Log: {}", log_path.display());
    println!("Results: {}", results_path.display());

    Ok(BatchRun {
        result,
        log_path,
        results_path,
    })
}

pub fn render_progress(event: &Progress) -> String {
    match event {
        Progress::Started { total } => format!("Extracting {total} recipe URL(s)"),
        Progress::Processing { index, total, url } => {
            format!("[{}/{total}] {url}", index + 1)
        }
        Progress::Completed {
            index,
            total,
            outcome,
            ..
        } => match outcome {
            ProgressOutcome::Success { title } => format!("[{}/{total}] ok: {title}", index + 1),
            ProgressOutcome::Failure { kind, reason } => {
                format!("[{}/{total}] failed ({kind}): {reason}", index + 1)
            }
        },
        Progress::Cancelled { processed, total } => {
            format!("Cancelled after {processed} of {total} URL(s)")
        }
        Progress::Finished { succeeded, failed } => {
            format!("Finished: {succeeded} succeeded, {failed} failed")
        }
    }
}

/// Per-URL outcome lines followed by the totals.
pub fn render_summary(result: &BatchResult) -> String {
    let mut lines = Vec::with_capacity(result.len() + result.pending.len() + 3);
    for entry in &result.entries {
        let attempts = match entry.attempts {
            1 => "1 attempt".to_owned(),
            n => format!("{n} attempts"),
        };
        lines.push(match &entry.outcome {
            UrlOutcome::Success { recipe } => match &recipe.image_error {
                None => format!("OK       {}  {} ({attempts})", entry.url, recipe.title),
                Some(err) => format!(
                    "OK       {}  {} ({attempts}; {}: {err})",
                    entry.url,
                    recipe.title,
                    FailureKind::ImageFetchFailed
                ),
            },
            UrlOutcome::Failure { kind, reason } => {
                format!("FAILED   {}  {kind}: {reason} ({attempts})", entry.url)
            }
        });
    }
    for url in &result.pending {
        lines.push(format!("PENDING  {url}"));
    }

    lines.push(format!("Succeeded: {}", result.succeeded()));
    lines.push(format!("Failures: {}", result.failed()));
    if result.cancelled {
        lines.push(format!("Cancelled: {} URL(s) not processed", result.pending.len()));
    }
    lines.join("\n")
}
