use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::attempt_log::AttemptLog;
use crate::error::FailureKind;
use crate::formats::{BatchEntry, BatchResult, RecipeRequest, UrlOutcome};
use crate::retry::RetryController;

pub const DEFAULT_COURTESY_DELAY: Duration = Duration::from_secs(10);

/// Events pushed from the batch thread to the presentation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Started {
        total: usize,
    },
    Processing {
        index: usize,
        total: usize,
        url: String,
    },
    Completed {
        index: usize,
        total: usize,
        url: String,
        outcome: ProgressOutcome,
    },
    Cancelled {
        processed: usize,
        total: usize,
    },
    Finished {
        succeeded: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    Success { title: String },
    Failure { kind: FailureKind, reason: String },
}

impl From<&UrlOutcome> for ProgressOutcome {
    fn from(outcome: &UrlOutcome) -> Self {
        match outcome {
            UrlOutcome::Success { recipe } => Self::Success {
                title: recipe.title.clone(),
            },
            UrlOutcome::Failure { kind, reason } => Self::Failure {
                kind: *kind,
                reason: reason.clone(),
            },
        }
    }
}

pub type ProgressSender = UnboundedSender<Progress>;

/// Sequential driver over a URL list.
pub struct BatchRunner<'a> {
    retry: RetryController<'a>,
    courtesy_delay: Duration,
}

impl<'a> BatchRunner<'a> {
    pub fn new(retry: RetryController<'a>, courtesy_delay: Duration) -> Self {
        Self {
            retry,
            courtesy_delay,
        }
    }

    /// Process every URL in order, duplicates included.
    ///
    /// Per-URL failures are recorded and never stop the batch. `cancel` is checked before
    /// each URL; once set, the remaining URLs are returned as pending.
    pub fn run(
        &self,
        urls: &[String],
        log: &mut dyn AttemptLog,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let total = urls.len();
        let mut result = BatchResult::default();
        emit(progress, Progress::Started { total });
        tracing::info!(total, "starting batch");

        for (index, url) in urls.iter().enumerate() {
            if index > 0 {
                self.retry.sleeper().sleep(self.courtesy_delay);
            }
            if cancel.is_cancelled() {
                result.cancelled = true;
                result.pending = urls[index..].to_vec();
                tracing::warn!(processed = index, total, "batch cancelled");
                emit(
                    progress,
                    Progress::Cancelled {
                        processed: index,
                        total,
                    },
                );
                break;
            }

            emit(
                progress,
                Progress::Processing {
                    index,
                    total,
                    url: url.clone(),
                },
            );

            let mut request = RecipeRequest::new(url.clone());
            let outcome = match self.retry.run(&mut request, log) {
                Ok(recipe) => UrlOutcome::Success { recipe },
                Err(err) => UrlOutcome::Failure {
                    kind: err.kind(),
                    reason: err.to_string(),
                },
            };

            emit(
                progress,
                Progress::Completed {
                    index,
                    total,
                    url: url.clone(),
                    outcome: ProgressOutcome::from(&outcome),
                },
            );
            result.entries.push(BatchEntry {
                index,
                url: request.url,
                attempts: request.attempts,
                outcome,
            });
        }

        let (succeeded, failed) = (result.succeeded(), result.failed());
        tracing::info!(succeeded, failed, cancelled = result.cancelled, "batch finished");
        emit(progress, Progress::Finished { succeeded, failed });
        result
    }
}

fn emit(progress: &ProgressSender, event: Progress) {
    if progress.send(event).is_err() {
        tracing::debug!("progress receiver closed");
    }
}
