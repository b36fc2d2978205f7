use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_COURTESY_DELAY;
use crate::cli::RunArgs;
use crate::extract::ExtractorOptions;
use crate::retry::{
    Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_DELAY, DEFAULT_RETRY_DELAY, RetryPolicy,
};

pub const DEFAULT_CONFIG_FILE: &str = "recipebook.yaml";

/// Settings for one extraction run: YAML file values, then command-line overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub rate_limit_delay_secs: u64,
    pub courtesy_delay_secs: u64,
    pub backoff: Backoff,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub fetch_images: bool,
    pub log_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        let extractor = ExtractorOptions::default();
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            rate_limit_delay_secs: DEFAULT_RATE_LIMIT_DELAY.as_secs(),
            courtesy_delay_secs: DEFAULT_COURTESY_DELAY.as_secs(),
            backoff: Backoff::Fixed,
            timeout_secs: extractor.timeout.as_secs(),
            user_agent: None,
            fetch_images: extractor.fetch_images,
            log_dir: PathBuf::from("logs"),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl RunConfig {
    /// Read `explicit`, or `recipebook.yaml` in the working directory when present.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&yaml)
            .with_context(|| format!("parse config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn with_overrides(mut self, args: &RunArgs) -> Self {
        if let Some(v) = args.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = args.retry_delay {
            self.retry_delay_secs = v;
        }
        if let Some(v) = args.rate_limit_delay {
            self.rate_limit_delay_secs = v;
        }
        if let Some(v) = args.courtesy_delay {
            self.courtesy_delay_secs = v;
        }
        if let Some(v) = args.backoff {
            self.backoff = v;
        }
        if let Some(v) = args.timeout {
            self.timeout_secs = v;
        }
        if let Some(v) = &args.user_agent {
            self.user_agent = Some(v.clone());
        }
        if args.no_images {
            self.fetch_images = false;
        }
        if let Some(v) = &args.log_dir {
            self.log_dir = v.clone();
        }
        if let Some(v) = &args.results_dir {
            self.results_dir = v.clone();
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            rate_limit_delay: Duration::from_secs(self.rate_limit_delay_secs),
            backoff: self.backoff,
        }
    }

    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_secs(self.courtesy_delay_secs)
    }

    pub fn extractor_options(&self) -> ExtractorOptions {
        let defaults = ExtractorOptions::default();
        ExtractorOptions {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            fetch_images: self.fetch_images,
            max_image_bytes: defaults.max_image_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;
    use crate::cli::{Cli, Command};

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).expect("parse cli");
        match cli.command {
            Command::Check(args) => args.run,
            Command::Build(args) => args.run,
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RunConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(3));
        assert_eq!(policy.rate_limit_delay, Duration::from_secs(30));
        assert_eq!(policy.backoff, Backoff::Fixed);
        assert_eq!(config.courtesy_delay(), Duration::from_secs(10));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.results_dir, PathBuf::from("results"));
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("recipebook.yaml");
        std::fs::write(&path, "max_attempts: 5\nbackoff: exponential\nfetch_images: false\n")?;

        let config = RunConfig::load(Some(&path))?;
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff, Backoff::Exponential);
        assert!(!config.fetch_images);
        assert_eq!(config.retry_delay_secs, 3);
        assert!(!config.extractor_options().fetch_images);

        std::fs::write(&path, "max_atempts: 5\n")?;
        let err = RunConfig::load(Some(&path)).expect_err("unknown field");
        assert!(format!("{err:#}").contains("max_atempts"));

        assert!(RunConfig::load(Some(&dir.path().join("missing.yaml"))).is_err());
        Ok(())
    }

    #[test]
    fn command_line_overrides_file_values() {
        let file = RunConfig {
            max_attempts: 5,
            courtesy_delay_secs: 20,
            ..RunConfig::default()
        };
        let args = run_args(&[
            "recipebook",
            "check",
            "--max-attempts",
            "2",
            "--retry-delay",
            "0",
            "--backoff",
            "exponential",
            "--no-images",
            "--results-dir",
            "out/results",
            "https://sitea.com/r1",
        ]);

        let config = file.with_overrides(&args);
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.retry_delay_secs, 0);
        assert_eq!(config.courtesy_delay_secs, 20);
        assert_eq!(config.backoff, Backoff::Exponential);
        assert!(!config.fetch_images);
        assert_eq!(config.results_dir, PathBuf::from("out/results"));
        assert_eq!(args.urls, vec!["https://sitea.com/r1"]);
    }
}
