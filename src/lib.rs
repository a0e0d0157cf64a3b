//! # vidfetch
//!
//! Async fetch-orchestration core for retrieving metadata, transcripts and
//! media for remote content items. The crate owns the control plane:
//! failure classification, retry with exponential backoff, shared
//! rate limiting, per-phase caching, per-item phase ordering, and bounded
//! concurrent batch scheduling. The data plane (how bytes are actually
//! fetched from a platform) is injected through the [`fetcher`] traits.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vidfetch::{FetchConfig, FsCache, ItemId, Pipeline};
//! # use vidfetch::{MetadataFetcher, TranscriptFetcher, MediaFetcher};
//! # fn backends() -> (Arc<dyn MetadataFetcher>, Arc<dyn TranscriptFetcher>, Arc<dyn MediaFetcher>) { unimplemented!() }
//!
//! # async fn run() -> Result<(), vidfetch::Error> {
//! let config = FetchConfig::default();
//! let cache = Arc::new(FsCache::new(&config.out_dir));
//! let (metadata, transcript, media) = backends();
//!
//! let pipeline = Pipeline::new(config, metadata, transcript, media, cache)?;
//! let batch = pipeline
//!     .process_batch(&[ItemId::from("dQw4w9WgXcQ")])
//!     .await;
//! println!("{} ok, {} failed", batch.succeeded, batch.failed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod rate_limit;
pub mod retry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use cache::{FsCache, PhaseCache};
pub use config::{FetchConfig, ForceFlags, RetryConfig, ToolFallback};
pub use error::{Error, FetchError, FetchErrorCode, FetchFailure, Result, classify};
pub use fetcher::{
    MediaFetcher, MediaPrefs, MetadataFetcher, TranscriptFetcher, TranscriptPrefs,
    find_conversion_tool,
};
pub use pipeline::Pipeline;
pub use rate_limit::RateLimiter;
pub use retry::fetch_with_retry;
pub use types::{
    BatchResult, DownloadMode, FetchPhase, ItemId, ItemResult, Metadata, Transcript,
    TranscriptSegment,
};
