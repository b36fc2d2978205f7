use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::Serializer;

use crate::formats::{BatchEntry, BatchResult, UrlOutcome};

#[derive(Debug, Serialize)]
struct ResultsFile<'a> {
    generated_at: DateTime<Utc>,
    total: usize,
    succeeded: usize,
    failed: usize,
    cancelled: bool,
    pending: &'a [String],
    results: KeyedEntries<'a>,
}

#[derive(Debug, Serialize)]
struct ResultValue<'a> {
    index: usize,
    attempts: u32,
    #[serde(flatten)]
    outcome: &'a UrlOutcome,
}

/// Entries as a map keyed by URL; the n-th repeat of a URL is keyed `"<url> (#n)"`.
#[derive(Debug)]
struct KeyedEntries<'a>(&'a [BatchEntry]);

impl Serialize for KeyedEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keys = result_keys(self.0);
        serializer.collect_map(keys.into_iter().zip(self.0.iter().map(|entry| {
            ResultValue {
                index: entry.index,
                attempts: entry.attempts,
                outcome: &entry.outcome,
            }
        })))
    }
}

pub fn result_keys(entries: &[BatchEntry]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    entries
        .iter()
        .map(|entry| {
            let count = seen.entry(entry.url.as_str()).or_default();
            *count += 1;
            if *count == 1 {
                entry.url.clone()
            } else {
                format!("{} (#{count})", entry.url)
            }
        })
        .collect()
}

/// Write `extraction_results_<stamp>.json` into `dir` and return its path.
pub fn write_results(dir: &Path, stamp: &str, result: &BatchResult) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create results dir: {}", dir.display()))?;
    let path = dir.join(format!("extraction_results_{stamp}.json"));

    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("create results file: {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let doc = ResultsFile {
        generated_at: Utc::now(),
        total: result.len() + result.pending.len(),
        succeeded: result.succeeded(),
        failed: result.failed(),
        cancelled: result.cancelled,
        pending: &result.pending,
        results: KeyedEntries(&result.entries),
    };
    serde_json::to_writer_pretty(&mut out, &doc).context("write results json")?;
    out.write_all(b"\n").context("write results newline")?;
    out.flush()
        .with_context(|| format!("flush results file: {}", path.display()))?;

    tracing::info!(path = %path.display(), "wrote results file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::test_support::sample_record;

    fn entry(index: usize, url: &str, outcome: UrlOutcome) -> BatchEntry {
        BatchEntry {
            index,
            url: url.to_owned(),
            attempts: 1,
            outcome,
        }
    }

    #[test]
    fn repeated_urls_get_numbered_keys() {
        let ok = || UrlOutcome::Success {
            recipe: sample_record("https://a.test/1", "Bread"),
        };
        let entries = vec![
            entry(0, "https://a.test/1", ok()),
            entry(1, "https://b.test/2", ok()),
            entry(2, "https://a.test/1", ok()),
            entry(3, "https://a.test/1", ok()),
        ];
        assert_eq!(
            result_keys(&entries),
            vec![
                "https://a.test/1",
                "https://b.test/2",
                "https://a.test/1 (#2)",
                "https://a.test/1 (#3)",
            ]
        );
    }

    #[test]
    fn results_file_is_keyed_by_url() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = BatchResult {
            entries: vec![
                entry(
                    0,
                    "https://sitea.com/r1",
                    UrlOutcome::Success {
                        recipe: sample_record("https://sitea.com/r1", "Bread"),
                    },
                ),
                entry(
                    1,
                    "https://badsite.com/x",
                    UrlOutcome::Failure {
                        kind: FailureKind::UnsupportedSite,
                        reason: "site not supported: no recipe data found on page".to_owned(),
                    },
                ),
            ],
            cancelled: true,
            pending: vec!["https://later.test/3".to_owned()],
        };

        let path = write_results(&dir.path().join("results"), "20240101_000000", &result)?;
        assert!(path.ends_with("extraction_results_20240101_000000.json"));

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(value["total"], 3);
        assert_eq!(value["succeeded"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["cancelled"], true);
        assert_eq!(value["pending"][0], "https://later.test/3");

        let results = &value["results"];
        assert_eq!(results["https://sitea.com/r1"]["status"], "success");
        assert_eq!(results["https://sitea.com/r1"]["recipe"]["title"], "Bread");
        assert_eq!(results["https://badsite.com/x"]["status"], "failure");
        assert_eq!(results["https://badsite.com/x"]["kind"], "unsupported-site");
        assert_eq!(results["https://badsite.com/x"]["attempts"], 1);
        Ok(())
    }
}
