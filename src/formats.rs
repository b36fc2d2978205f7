use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// `YYYYmmdd_HHMMSS` stamp shared by a run's log and results file names.
pub fn file_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// One URL on its way through the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRequest {
    pub url: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl RecipeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempts: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub source_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,

    /// Why the referenced image could not be downloaded; the recipe is kept without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,

    /// Downloaded image bytes for embedding; `None` when there is no image or the fetch failed.
    #[serde(skip)]
    pub image: Option<RecipeImage>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct RecipeImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl RecipeImage {
    /// File extension for the EPUB asset, or `None` for media types readers cannot show.
    pub fn extension(&self) -> Option<&'static str> {
        let media_type = self
            .media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            "image/svg+xml" => Some("svg"),
            _ => None,
        }
    }

    /// Guess the media type from magic bytes when the server did not send a usable one.
    pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some("image/png")
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some("image/jpeg")
        } else if bytes.starts_with(b"GIF8") {
            Some("image/gif")
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some("image/webp")
        } else {
            None
        }
    }
}

impl std::fmt::Debug for RecipeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeImage")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Retrying,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UrlOutcome {
    Success { recipe: RecipeRecord },
    Failure { kind: FailureKind, reason: String },
}

impl UrlOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn recipe(&self) -> Option<&RecipeRecord> {
        match self {
            Self::Success { recipe } => Some(recipe),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub index: usize,
    pub url: String,
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: UrlOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<String>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    /// First outcome recorded for `url`.
    pub fn get(&self, url: &str) -> Option<&UrlOutcome> {
        self.entries
            .iter()
            .find(|e| e.url == url)
            .map(|e| &e.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.outcome.is_success())
    }

    /// Successful records in batch order.
    pub fn records(&self) -> Vec<RecipeRecord> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.recipe().cloned())
            .collect()
    }
}
