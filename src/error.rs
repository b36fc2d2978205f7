use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by the attempt log, the results file and the shell summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    MalformedUrl,
    UnsupportedSite,
    NetworkError,
    RateLimited,
    ImageFetchFailed,
    AssemblyFailed,
    Unknown,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedUrl => "malformed-url",
            Self::UnsupportedSite => "unsupported-site",
            Self::NetworkError => "network-error",
            Self::RateLimited => "rate-limited",
            Self::ImageFetchFailed => "image-fetch-failed",
            Self::AssemblyFailed => "assembly-failed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single URL could not be turned into a recipe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("malformed url {url:?}: {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("site not supported: {reason}")]
    UnsupportedSite { reason: String },

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },

    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("incomplete recipe: {reason}")]
    Incomplete { reason: String },
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedUrl { .. } => FailureKind::MalformedUrl,
            Self::UnsupportedSite { .. } => FailureKind::UnsupportedSite,
            Self::Network { .. } => FailureKind::NetworkError,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::HttpStatus { .. } | Self::Incomplete { .. } => FailureKind::Unknown,
        }
    }

    /// Transient failures are worth another attempt; everything else fails the URL at once.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::RateLimited { .. } | Self::Incomplete { .. }
        )
    }

    pub(crate) fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedSite {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("no recipes to assemble")]
    Empty,

    #[error("epub output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("write epub {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write epub archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl AssembleError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::AssemblyFailed
    }
}
