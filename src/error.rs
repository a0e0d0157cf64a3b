//! Error types and failure classification for vidfetch
//!
//! Three layers:
//! - [`FetchFailure`] — the tagged error every sub-fetcher returns. Replaces
//!   an exception hierarchy with a single enum so classification stays
//!   exhaustive.
//! - [`FetchErrorCode`] + [`classify`] — maps any `FetchFailure` to a closed,
//!   machine-readable code; retryability is derived from the code, never set
//!   ad hoc.
//! - [`FetchError`] — the immutable per-phase error record stored in
//!   `ItemResult.errors`.
//!
//! A separate crate-level [`Error`] covers fatal conditions (bad
//! configuration, summary write failures) that are allowed to propagate to
//! the caller; everything upstream-related becomes data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::{FetchPhase, ItemId};

/// Result type alias for fatal vidfetch operations
pub type Result<T> = std::result::Result<T, self::Error>;

/// Fatal error type for vidfetch
///
/// Only conditions that make the run itself impossible use this type;
/// per-item upstream failures are converted to [`FetchError`] records
/// inside the pipeline and never propagate this way.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description of the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g. "workers")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Machine-readable classification of a fetch failure
///
/// The enumeration is closed: every upstream failure maps to exactly one of
/// these, defaulting to [`Unknown`](FetchErrorCode::Unknown). Codes fall into
/// three groups with fixed retry semantics:
///
/// - content-unavailable (the item itself cannot yield this output) — never
///   retried,
/// - infrastructure (transient upstream or network trouble) — retried with
///   backoff,
/// - client-side (caller misuse or missing local dependency) — never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorCode {
    /// The item does not exist upstream (removed or never existed)
    VideoNotFound,
    /// The item exists but is private
    VideoPrivate,
    /// The item was deleted by its owner
    VideoDeleted,
    /// Access restricted (age gate, region lock, members-only)
    AccessRestricted,
    /// Captions are disabled for the item
    TranscriptsDisabled,
    /// No transcript exists in any acceptable language
    TranscriptNotFound,

    /// Upstream asked us to slow down (HTTP 429)
    RateLimited,
    /// Upstream server-side failure (HTTP 5xx)
    ServiceError,
    /// Connection-level network failure
    NetworkError,
    /// The operation exceeded its deadline
    Timeout,

    /// Caller provided invalid input
    InvalidInput,
    /// A required local tool or library is missing (e.g. ffmpeg)
    MissingDependency,
    /// The resolved configuration is unusable
    ConfigError,

    /// Anything that matched no other rule
    Unknown,
}

impl FetchErrorCode {
    /// Whether failures with this code are worth retrying after backoff
    ///
    /// True exactly for the infrastructure group. Derived here, once, so
    /// retryability can never drift from the code.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchErrorCode::RateLimited
                | FetchErrorCode::ServiceError
                | FetchErrorCode::NetworkError
                | FetchErrorCode::Timeout
        )
    }

    /// The machine-readable string form used in persisted artifacts and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorCode::VideoNotFound => "video_not_found",
            FetchErrorCode::VideoPrivate => "video_private",
            FetchErrorCode::VideoDeleted => "video_deleted",
            FetchErrorCode::AccessRestricted => "access_restricted",
            FetchErrorCode::TranscriptsDisabled => "transcripts_disabled",
            FetchErrorCode::TranscriptNotFound => "transcript_not_found",
            FetchErrorCode::RateLimited => "rate_limited",
            FetchErrorCode::ServiceError => "service_error",
            FetchErrorCode::NetworkError => "network_error",
            FetchErrorCode::Timeout => "timeout",
            FetchErrorCode::InvalidInput => "invalid_input",
            FetchErrorCode::MissingDependency => "missing_dependency",
            FetchErrorCode::ConfigError => "config_error",
            FetchErrorCode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FetchErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifiable failure returned by every sub-fetcher
///
/// Known upstream failure kinds get their own variant so classification can
/// match on type first; everything the upstream reports only as text lands in
/// [`Other`](FetchFailure::Other) and goes through the message heuristics.
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// The item does not exist upstream
    #[error("content not found: {0}")]
    NotFound(String),

    /// The item is private
    #[error("content is private: {0}")]
    Private(String),

    /// The item was deleted
    #[error("content was deleted: {0}")]
    Deleted(String),

    /// Access is restricted (age gate, region lock)
    #[error("access restricted: {0}")]
    AccessRestricted(String),

    /// Captions are disabled for the item
    #[error("captions are disabled: {0}")]
    CaptionsDisabled(String),

    /// No transcript in any acceptable language
    #[error("no transcript in requested languages: {requested:?}")]
    LanguageUnavailable {
        /// Languages the caller asked for
        requested: Vec<String>,
        /// Languages the upstream actually offers
        available: Vec<String>,
    },

    /// HTTP-level failure from the upstream with an explicit status
    #[error("upstream returned HTTP {status}: {message}")]
    Http {
        /// The HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Transport-level failure from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O failure while reading or writing an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation exceeded its deadline
    #[error("operation timed out")]
    Timeout,

    /// A required local tool is missing
    #[error("required tool not found: {0}")]
    MissingTool(String),

    /// Caller-supplied input was invalid
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The resolved configuration is unusable for this operation
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization failure on a cached artifact
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream failure known only by its message text
    #[error("{0}")]
    Other(String),
}

/// Classify an arbitrary sub-fetcher failure into a [`FetchErrorCode`]
///
/// Pure and total — every input produces some code. First match wins, in
/// this order, because upstream failure representations are unreliable:
///
/// 1. by failure type (the enum variant),
/// 2. by HTTP status where one is carried,
/// 3. by message-text substrings as a last resort.
pub fn classify(failure: &FetchFailure) -> FetchErrorCode {
    match failure {
        // 1. By failure type
        FetchFailure::NotFound(_) => FetchErrorCode::VideoNotFound,
        FetchFailure::Private(_) => FetchErrorCode::VideoPrivate,
        FetchFailure::Deleted(_) => FetchErrorCode::VideoDeleted,
        FetchFailure::AccessRestricted(_) => FetchErrorCode::AccessRestricted,
        FetchFailure::CaptionsDisabled(_) => FetchErrorCode::TranscriptsDisabled,
        FetchFailure::LanguageUnavailable { .. } => FetchErrorCode::TranscriptNotFound,
        FetchFailure::Timeout => FetchErrorCode::Timeout,
        FetchFailure::MissingTool(_) => FetchErrorCode::MissingDependency,
        FetchFailure::InvalidInput(_) => FetchErrorCode::InvalidInput,
        FetchFailure::Config(_) => FetchErrorCode::ConfigError,
        FetchFailure::Serialization(_) => FetchErrorCode::InvalidInput,
        FetchFailure::Io(e) => classify_io_kind(e.kind()),
        FetchFailure::Network(e) => classify_reqwest(e),

        // 2. By status code
        FetchFailure::Http { status, message } => {
            classify_status(*status).unwrap_or_else(|| classify_message(message))
        }

        // 3. By message text
        FetchFailure::Other(message) => classify_message(message),
    }
}

fn classify_io_kind(kind: std::io::ErrorKind) -> FetchErrorCode {
    match kind {
        std::io::ErrorKind::TimedOut => FetchErrorCode::Timeout,
        std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::Interrupted => FetchErrorCode::NetworkError,
        _ => FetchErrorCode::Unknown,
    }
}

fn classify_reqwest(e: &reqwest::Error) -> FetchErrorCode {
    if e.is_timeout() {
        return FetchErrorCode::Timeout;
    }
    if let Some(status) = e.status()
        && let Some(code) = classify_status(status.as_u16())
    {
        return code;
    }
    if e.is_connect() || e.is_request() {
        return FetchErrorCode::NetworkError;
    }
    FetchErrorCode::NetworkError
}

/// Map an HTTP status to a code, or `None` when the status alone is not
/// conclusive (4xx other than 429 can mean many things)
fn classify_status(status: u16) -> Option<FetchErrorCode> {
    match status {
        429 => Some(FetchErrorCode::RateLimited),
        404 | 410 => Some(FetchErrorCode::VideoNotFound),
        500..=599 => Some(FetchErrorCode::ServiceError),
        _ => None,
    }
}

/// Last-resort substring heuristics over the failure message
///
/// Fragile by nature — each rule here has a dedicated unit test so a
/// reordering or wording change cannot silently flip a classification.
fn classify_message(message: &str) -> FetchErrorCode {
    let text = message.to_lowercase();

    if text.contains("private") {
        FetchErrorCode::VideoPrivate
    } else if text.contains("deleted") || text.contains("removed") {
        FetchErrorCode::VideoDeleted
    } else if text.contains("not found") || text.contains("unavailable") {
        FetchErrorCode::VideoNotFound
    } else if text.contains("disabled") {
        FetchErrorCode::TranscriptsDisabled
    } else if text.contains("age") || text.contains("restricted") || text.contains("sign in") {
        FetchErrorCode::AccessRestricted
    } else if text.contains("429") || text.contains("too many requests") {
        FetchErrorCode::RateLimited
    } else if text.contains("timeout") || text.contains("timed out") {
        FetchErrorCode::Timeout
    } else if text.contains("connection") || text.contains("network") {
        FetchErrorCode::NetworkError
    } else {
        FetchErrorCode::Unknown
    }
}

/// Immutable error record for one phase failure of one item
///
/// Built once at the failure site via [`FetchError::classify`] (or
/// [`FetchError::new`] when the code is already known) and never mutated
/// afterwards. `retryable` always equals `code.is_retryable()`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchError {
    /// Machine-readable failure code
    pub code: FetchErrorCode,
    /// The phase that failed
    pub phase: FetchPhase,
    /// Human-readable description
    pub message: String,
    /// Whether this failure was transient; derived from `code`
    pub retryable: bool,
    /// The item being processed when the failure occurred
    pub item_id: ItemId,
    /// Optional structured context (e.g. `available_languages`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, serde_json::Value>>,
}

impl FetchError {
    /// Build a record with an already-known code
    pub fn new(
        item_id: ItemId,
        phase: FetchPhase,
        code: FetchErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            phase,
            message: message.into(),
            retryable: code.is_retryable(),
            item_id,
            details: None,
        }
    }

    /// Classify a sub-fetcher failure and build the record for it
    pub fn classify(item_id: ItemId, phase: FetchPhase, failure: &FetchFailure) -> Self {
        let code = classify(failure);
        Self::new(item_id, phase, code, failure.to_string())
    }

    /// Attach one structured detail entry, consuming and returning self
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} phase for {}: {}",
            self.code, self.phase, self.item_id, self.message
        )
    }
}
