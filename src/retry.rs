use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::attempt_log::AttemptLog;
use crate::error::{ExtractError, FailureKind};
use crate::extract::Extract;
use crate::formats::{AttemptOutcome, ExtractionLogEntry, RecipeRecord, RecipeRequest};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(30);
/// Upper bound on a server's `Retry-After` hint unless `rate_limit_delay` is larger.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt.
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub rate_limit_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

impl RetryPolicy {
    /// Attempts per URL; a configured zero still makes one attempt.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn decide(&self, err: &ExtractError, attempt: u32) -> RetryDecision {
        if !err.is_transient() || attempt >= self.attempts() {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay_for(err, attempt))
    }

    /// Wait before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, err: &ExtractError, attempt: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.retry_delay,
            Backoff::Exponential => {
                let exponent = attempt.saturating_sub(1).min(16);
                self.retry_delay.saturating_mul(1 << exponent)
            }
        };
        match err {
            ExtractError::RateLimited { retry_after } => {
                // The worker cannot be cancelled mid-sleep.
                let hint = retry_after
                    .unwrap_or_default()
                    .min(MAX_RETRY_AFTER.max(self.rate_limit_delay));
                base.max(self.rate_limit_delay).max(hint)
            }
            _ => base,
        }
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread; the batch runs on a dedicated blocking worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Bounded retries around a single extractor call.
pub struct RetryController<'a> {
    extractor: &'a dyn Extract,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> RetryController<'a> {
    pub fn new(extractor: &'a dyn Extract, policy: RetryPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            extractor,
            policy,
            sleeper,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &'a dyn Sleeper {
        self.sleeper
    }

    /// Run attempts until success, a permanent failure, or the attempt budget is spent.
    ///
    /// Every attempt is appended to `log`; a log write failure is reported but never fails
    /// the URL.
    pub fn run(
        &self,
        request: &mut RecipeRequest,
        log: &mut dyn AttemptLog,
    ) -> Result<RecipeRecord, ExtractError> {
        let max_attempts = self.policy.attempts();
        loop {
            request.attempts += 1;
            let attempt = request.attempts;

            let started = Instant::now();
            let result = self.extractor.extract(&request.url);
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let err = match result {
                Ok(record) => {
                    request.last_error = None;
                    let mut success = entry(request, AttemptOutcome::Success, None, elapsed_ms);
                    if let Some(detail) = &record.image_error {
                        success.kind = Some(FailureKind::ImageFetchFailed);
                        success.error = Some(detail.clone());
                    }
                    append(log, success);
                    tracing::info!(url = %request.url, attempt, title = %record.title, "extracted");
                    return Ok(record);
                }
                Err(err) => err,
            };

            request.last_error = Some(err.to_string());
            match self.policy.decide(&err, attempt) {
                RetryDecision::Retry(delay) => {
                    append(
                        log,
                        entry(request, AttemptOutcome::Retrying, Some(&err), elapsed_ms),
                    );
                    tracing::warn!(
                        url = %request.url,
                        attempt,
                        max_attempts,
                        kind = %err.kind(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "attempt failed; retrying: {err}"
                    );
                    self.sleeper.sleep(delay);
                }
                RetryDecision::GiveUp => {
                    append(
                        log,
                        entry(request, AttemptOutcome::Failed, Some(&err), elapsed_ms),
                    );
                    tracing::warn!(
                        url = %request.url,
                        attempt,
                        kind = %err.kind(),
                        "giving up: {err}"
                    );
                    return Err(err);
                }
            }
        }
    }
}

fn entry(
    request: &RecipeRequest,
    outcome: AttemptOutcome,
    err: Option<&ExtractError>,
    elapsed_ms: u64,
) -> ExtractionLogEntry {
    ExtractionLogEntry {
        timestamp: chrono::Utc::now(),
        url: request.url.clone(),
        attempt: request.attempts,
        outcome,
        kind: err.map(ExtractError::kind),
        elapsed_ms,
        error: err.map(ToString::to_string),
    }
}

fn append(log: &mut dyn AttemptLog, entry: ExtractionLogEntry) {
    if let Err(err) = log.append(entry) {
        tracing::warn!(?err, "append attempt log entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSleeper, ScriptedExtractor, sample_record};

    const URL: &str = "https://sitea.com/r1";

    fn run_once(
        extractor: &ScriptedExtractor,
        policy: RetryPolicy,
        sleeper: &RecordingSleeper,
    ) -> (
        RecipeRequest,
        Vec<ExtractionLogEntry>,
        Result<RecipeRecord, ExtractError>,
    ) {
        let mut request = RecipeRequest::new(URL);
        let mut log = Vec::new();
        let result = RetryController::new(extractor, policy, sleeper).run(&mut request, &mut log);
        (request, log, result)
    }

    #[test]
    fn transient_failures_use_every_attempt() {
        let extractor =
            ScriptedExtractor::default().script(URL, [Err(ExtractError::network("timed out"))]);
        let sleeper = RecordingSleeper::default();

        let (request, log, result) = run_once(&extractor, RetryPolicy::default(), &sleeper);

        let err = result.expect_err("exhausted");
        assert_eq!(err.kind(), FailureKind::NetworkError);
        assert_eq!(request.attempts, 3);
        assert_eq!(extractor.calls_for(URL), 3);
        assert_eq!(request.last_error.as_deref(), Some("network error: timed out"));
        assert_eq!(sleeper.slept(), vec![DEFAULT_RETRY_DELAY; 2]);

        let outcomes = log.iter().map(|e| e.outcome).collect::<Vec<_>>();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::Retrying,
                AttemptOutcome::Retrying,
                AttemptOutcome::Failed
            ]
        );
        assert!(log.iter().all(|e| e.kind == Some(FailureKind::NetworkError)));
        assert_eq!(
            log.iter().map(|e| e.attempt).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        for err in [
            ExtractError::unsupported("no recipe data"),
            ExtractError::HttpStatus { status: 404 },
            ExtractError::MalformedUrl {
                url: "x".to_owned(),
                reason: "relative".to_owned(),
            },
        ] {
            let extractor = ScriptedExtractor::default().script(URL, [Err(err.clone())]);
            let sleeper = RecordingSleeper::default();

            let (request, log, result) = run_once(&extractor, RetryPolicy::default(), &sleeper);

            assert_eq!(result.expect_err("permanent"), err);
            assert_eq!(request.attempts, 1);
            assert!(sleeper.slept().is_empty());
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].outcome, AttemptOutcome::Failed);
        }
    }

    #[test]
    fn rate_limit_waits_longer_then_succeeds() {
        let extractor = ScriptedExtractor::default().script(
            URL,
            [
                Err(ExtractError::RateLimited { retry_after: None }),
                Err(ExtractError::RateLimited {
                    retry_after: Some(Duration::from_secs(45)),
                }),
                Ok(sample_record(URL, "Bread")),
            ],
        );
        let sleeper = RecordingSleeper::default();

        let (request, log, result) = run_once(&extractor, RetryPolicy::default(), &sleeper);

        assert_eq!(result.expect("success").title, "Bread");
        assert_eq!(request.attempts, 3);
        assert_eq!(request.last_error, None);
        assert_eq!(
            sleeper.slept(),
            vec![DEFAULT_RATE_LIMIT_DELAY, Duration::from_secs(45)]
        );
        assert_eq!(log.last().map(|e| e.outcome), Some(AttemptOutcome::Success));
        assert_eq!(log.last().and_then(|e| e.kind), None);
    }

    #[test]
    fn retry_after_hints_are_capped() {
        let policy = RetryPolicy::default();
        let day = ExtractError::RateLimited {
            retry_after: Some(Duration::from_secs(86_400)),
        };
        assert_eq!(policy.delay_for(&day, 1), MAX_RETRY_AFTER);

        let patient = RetryPolicy {
            rate_limit_delay: Duration::from_secs(600),
            ..RetryPolicy::default()
        };
        assert_eq!(patient.delay_for(&day, 1), Duration::from_secs(600));
    }

    #[test]
    fn image_failures_are_logged_on_the_successful_attempt() {
        let mut record = sample_record(URL, "Bread");
        record.image_error = Some("GET https://sitea.com/img.jpg: HTTP status 404".to_owned());
        let extractor = ScriptedExtractor::default().script(URL, [Ok(record)]);
        let sleeper = RecordingSleeper::default();

        let (_, log, result) = run_once(&extractor, RetryPolicy::default(), &sleeper);

        assert!(result.is_ok());
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].outcome, AttemptOutcome::Success);
        assert_eq!(log[0].kind, Some(FailureKind::ImageFetchFailed));
        assert!(log[0].error.as_deref().is_some_and(|e| e.contains("404")));
    }

    #[test]
    fn exponential_backoff_doubles_the_delay() {
        let extractor =
            ScriptedExtractor::default().script(URL, [Err(ExtractError::network("reset"))]);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 4,
            retry_delay: Duration::from_secs(2),
            backoff: Backoff::Exponential,
            ..RetryPolicy::default()
        };

        let (request, _, _) = run_once(&extractor, policy, &sleeper);

        assert_eq!(request.attempts, 4);
        assert_eq!(
            sleeper.slept(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn zero_max_attempts_still_tries_once() {
        let extractor =
            ScriptedExtractor::default().script(URL, [Err(ExtractError::network("down"))]);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };

        let (request, log, result) = run_once(&extractor, policy, &sleeper);

        assert!(result.is_err());
        assert_eq!(request.attempts, 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn incomplete_pages_are_retried_and_reported_as_unknown() {
        let extractor = ScriptedExtractor::default().script(
            URL,
            [Err(ExtractError::Incomplete {
                reason: "no instructions found".to_owned(),
            })],
        );
        let sleeper = RecordingSleeper::default();

        let (request, _, result) = run_once(&extractor, RetryPolicy::default(), &sleeper);

        assert_eq!(result.expect_err("incomplete").kind(), FailureKind::Unknown);
        assert_eq!(request.attempts, 3);
    }
}
