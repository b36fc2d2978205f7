use std::fs::{File, OpenOptions};
use std::io::{BufRead as _, BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::ExtractionLogEntry;

/// Append-only sink for per-attempt log entries.
pub trait AttemptLog {
    fn append(&mut self, entry: ExtractionLogEntry) -> anyhow::Result<()>;
}

impl AttemptLog for Vec<ExtractionLogEntry> {
    fn append(&mut self, entry: ExtractionLogEntry) -> anyhow::Result<()> {
        self.push(entry);
        Ok(())
    }
}

/// `extraction_<stamp>.log`: one JSON object per line, flushed after every entry so an
/// interrupted run keeps what it logged.
pub struct JsonlAttemptLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlAttemptLog {
    pub fn create(dir: &Path, stamp: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create log dir: {}", dir.display()))?;

        let path = dir.join(format!("extraction_{stamp}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open attempt log: {}", path.display()))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AttemptLog for JsonlAttemptLog {
    fn append(&mut self, entry: ExtractionLogEntry) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, &entry).context("write attempt log entry")?;
        self.writer
            .write_all(b"\n")
            .context("write attempt log newline")?;
        self.writer.flush().context("flush attempt log")?;
        Ok(())
    }
}

pub fn read_entries(path: &Path) -> anyhow::Result<Vec<ExtractionLogEntry>> {
    let file =
        File::open(path).with_context(|| format!("open attempt log: {}", path.display()))?;
    let mut entries = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read attempt log: {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line)
            .with_context(|| format!("parse attempt log line {}", idx + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}
