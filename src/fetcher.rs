//! Sub-fetcher trait seams
//!
//! The pipeline consumes the upstream platform only through these three
//! traits. Concrete backends (an extractor binary, a caption API client)
//! live outside this crate; tests inject mocks the same way.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::{FetchConfig, ToolFallback};
use crate::error::FetchFailure;
use crate::types::{DownloadMode, ItemId, Metadata, Transcript};

/// Transcript selection preferences handed to the transcript fetcher
#[derive(Clone, Debug)]
pub struct TranscriptPrefs {
    /// Preferred language codes, in order
    pub languages: Vec<String>,
    /// Accept auto-generated transcripts
    pub allow_generated: bool,
    /// Fall back to any available language
    pub allow_any_language: bool,
}

impl TranscriptPrefs {
    /// Extract the transcript-relevant slice of a resolved config
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            allow_generated: config.allow_generated,
            allow_any_language: config.allow_any_language,
        }
    }
}

/// Media format preferences handed to the media fetcher
#[derive(Clone, Debug)]
pub struct MediaPrefs {
    /// Maximum video height in pixels (None = best available)
    pub max_height: Option<u32>,
    /// Video format preference
    pub video_format: String,
    /// Audio format preference
    pub audio_format: String,
    /// What to do when the conversion tool is missing
    pub tool_fallback: ToolFallback,
}

impl MediaPrefs {
    /// Extract the media-relevant slice of a resolved config
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_height: config.max_height,
            video_format: config.video_format.clone(),
            audio_format: config.audio_format.clone(),
            tool_fallback: config.tool_fallback,
        }
    }
}

/// Fetches descriptive metadata for one item
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetch metadata, failing with a classifiable error
    async fn fetch(&self, item_id: &ItemId) -> Result<Metadata, FetchFailure>;
}

/// Fetches transcripts and enumerates available languages
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch the best transcript under the given preferences
    async fn fetch(
        &self,
        item_id: &ItemId,
        prefs: &TranscriptPrefs,
    ) -> Result<Transcript, FetchFailure>;

    /// List the language codes the upstream offers for this item
    ///
    /// Used as a probe after a language-unavailable failure so the caller
    /// learns what it could have asked for.
    async fn available_languages(&self, item_id: &ItemId) -> Result<Vec<String>, FetchFailure>;
}

/// Downloads media files for one item
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download media into `dest_dir` and return the written file locations
    ///
    /// Implementations honoring [`ToolFallback::Skip`] return an empty list
    /// instead of failing when the conversion tool is absent.
    async fn fetch(
        &self,
        item_id: &ItemId,
        mode: DownloadMode,
        prefs: &MediaPrefs,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, FetchFailure>;
}

/// Locate the media conversion tool on the system
///
/// Backends call this before attempting a download that needs conversion;
/// the result feeds the [`ToolFallback`] policy.
pub fn find_conversion_tool() -> Result<PathBuf, FetchFailure> {
    which::which("ffmpeg").map_err(|_| FetchFailure::MissingTool("ffmpeg".to_string()))
}
