//! Core types for vidfetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FetchError;

/// Opaque identifier for one unit of work (one remote content item)
///
/// The string is assumed to be already validated by the caller; this crate
/// never parses or inspects it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the three retrieval phases performed for an item
///
/// Phases always execute in this order within an item; they never run
/// concurrently because the transcript and media writers assume the item's
/// output folder created by the metadata phase already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    /// Title, channel, duration and other descriptive fields
    Metadata,
    /// Timed caption segments
    Transcript,
    /// Downloaded media files
    Media,
}

impl std::fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchPhase::Metadata => write!(f, "metadata"),
            FetchPhase::Transcript => write!(f, "transcript"),
            FetchPhase::Media => write!(f, "media"),
        }
    }
}

/// Media download mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// Skip the media phase entirely
    #[default]
    None,
    /// Video (with audio)
    Video,
    /// Audio only
    Audio,
    /// Both a video file and a separate audio file
    Both,
}

/// Descriptive metadata for one item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// The item this metadata belongs to
    pub item_id: ItemId,
    /// Canonical URL of the item on the upstream platform
    pub source_url: String,
    /// Item title
    #[serde(default)]
    pub title: Option<String>,
    /// Display name of the publishing channel
    #[serde(default)]
    pub channel_title: Option<String>,
    /// Upstream channel identifier
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Upload date in `YYYY-MM-DD` form when the upstream provides one
    #[serde(default)]
    pub upload_date: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Item description text
    #[serde(default)]
    pub description: Option<String>,
    /// Upstream tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// View count at fetch time
    #[serde(default)]
    pub view_count: Option<u64>,
    /// Like count at fetch time
    #[serde(default)]
    pub like_count: Option<u64>,
    /// When this record was fetched
    pub fetched_at: DateTime<Utc>,
    /// Which backend produced this record (e.g. "yt-dlp")
    pub metadata_source: String,
    /// Raw upstream payload, kept for downstream consumers
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
}

/// One timed caption segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment start offset in seconds
    pub start: f64,
    /// Segment duration in seconds
    pub duration: f64,
    /// Caption text
    pub text: String,
}

/// A full transcript for one item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// The item this transcript belongs to
    pub item_id: ItemId,
    /// Language code of the selected transcript
    pub language: String,
    /// Whether the selected transcript was auto-generated
    #[serde(default)]
    pub is_generated: Option<bool>,
    /// Timed segments in playback order
    pub segments: Vec<TranscriptSegment>,
    /// When this record was fetched
    pub fetched_at: DateTime<Utc>,
    /// Which backend produced this record
    pub transcript_source: String,
    /// Every language the upstream offered at fetch time
    #[serde(default)]
    pub available_languages: Vec<String>,
}

/// Result of processing one item through all phases
///
/// Created empty when item processing starts; each phase populates its field
/// as it completes (from network or from cache) and appends to `errors` on
/// failure. Sealed once returned to the batch scheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemResult {
    /// The item that was processed
    pub item_id: ItemId,
    /// Whether the critical (metadata) phase succeeded
    ///
    /// Transcript and media failures are recorded in `errors` without
    /// flipping this to `false`.
    pub success: bool,
    /// Metadata, from network or cache
    #[serde(default)]
    pub metadata: Option<Metadata>,
    /// Transcript, from network or cache
    #[serde(default)]
    pub transcript: Option<Transcript>,
    /// Location of the persisted metadata artifact
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
    /// Location of the persisted transcript artifact
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    /// Locations of downloaded media files
    #[serde(default)]
    pub media_refs: Vec<PathBuf>,
    /// Every failure encountered, in phase order; never dropped silently
    #[serde(default)]
    pub errors: Vec<FetchError>,
}

impl ItemResult {
    /// Create an empty result for an item about to be processed
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            success: true,
            metadata: None,
            transcript: None,
            metadata_path: None,
            transcript_path: None,
            media_refs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Whether any failure was recorded for the given phase
    pub fn phase_failed(&self, phase: FetchPhase) -> bool {
        self.errors.iter().any(|e| e.phase == phase)
    }
}

/// Aggregated result of a batch run
///
/// `succeeded + failed == total` always holds; `total` counts the results
/// actually included (fail-fast may drop not-yet-dispatched items).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchResult {
    /// Number of item results included
    pub total: usize,
    /// Items whose critical phase succeeded
    pub succeeded: usize,
    /// Items whose critical phase failed
    pub failed: usize,
    /// Per-item results, in input (post-dedup) order
    pub results: Vec<ItemResult>,
}

impl BatchResult {
    /// Build a batch result from per-item results, deriving the counts
    pub fn from_results(results: Vec<ItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}
