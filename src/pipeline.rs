//! Per-item orchestration across the three fetch phases
//!
//! [`Pipeline`] owns the wiring: sub-fetchers behind trait objects, a
//! [`PhaseCache`], the shared [`RateLimiter`], and the resolved
//! [`FetchConfig`]. [`Pipeline::process_item`] runs metadata, transcript and
//! media in order for one item and returns an [`ItemResult`] that is complete
//! whether each phase was served from cache or fetched fresh.
//!
//! Failure handling is asymmetric on purpose. Metadata is the critical
//! phase: when it fails the item fails and the remaining phases are skipped,
//! since neither could produce meaningful output for an item whose identity
//! could not be established. Transcript and media failures are recorded and
//! processing continues.

use std::sync::Arc;

use crate::cache::PhaseCache;
use crate::config::FetchConfig;
use crate::error::{Error, FetchError, FetchFailure};
use crate::fetcher::{MediaFetcher, MediaPrefs, MetadataFetcher, TranscriptFetcher, TranscriptPrefs};
use crate::rate_limit::RateLimiter;
use crate::retry::fetch_with_retry;
use crate::types::{DownloadMode, FetchPhase, ItemId, ItemResult};

/// Orchestrates all fetch phases for individual items
///
/// Cheap to clone; clones share the rate limiter bucket and the sub-fetcher
/// instances, which is what the batch scheduler relies on.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<FetchConfig>,
    metadata: Arc<dyn MetadataFetcher>,
    transcript: Arc<dyn TranscriptFetcher>,
    media: Arc<dyn MediaFetcher>,
    cache: Arc<dyn PhaseCache>,
    limiter: RateLimiter,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build a pipeline from a config and concrete backends
    ///
    /// Validates the config and resolves it (force flags expanded) once;
    /// nothing re-reads mutable settings mid-run.
    pub fn new(
        config: FetchConfig,
        metadata: Arc<dyn MetadataFetcher>,
        transcript: Arc<dyn TranscriptFetcher>,
        media: Arc<dyn MediaFetcher>,
        cache: Arc<dyn PhaseCache>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let config = config.resolved();
        let limiter = RateLimiter::new(config.rate_limit_rps);
        Ok(Self {
            config: Arc::new(config),
            metadata,
            transcript,
            media,
            cache,
            limiter,
        })
    }

    /// The resolved configuration this pipeline runs with
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Process one item through every applicable phase
    ///
    /// Never returns an error: every failure becomes a [`FetchError`] record
    /// inside the returned [`ItemResult`].
    pub async fn process_item(&self, item_id: &ItemId) -> ItemResult {
        let mut result = ItemResult::new(item_id.clone());
        tracing::info!(item = %item_id, "processing item");

        self.metadata_phase(item_id, &mut result).await;
        if !result.success {
            tracing::warn!(
                item = %item_id,
                "metadata failed, skipping transcript and media phases"
            );
            return result;
        }

        self.transcript_phase(item_id, &mut result).await;

        if self.config.download != DownloadMode::None {
            self.media_phase(item_id, &mut result).await;
        }

        result
    }

    async fn metadata_phase(&self, item_id: &ItemId, result: &mut ItemResult) {
        let phase = FetchPhase::Metadata;

        if let Some((metadata, path)) = self.cached_metadata(item_id).await {
            result.metadata = Some(metadata);
            result.metadata_path = Some(path);
            return;
        }

        self.limiter.acquire().await;
        let fetched = fetch_with_retry(&self.config.retry, || self.metadata.fetch(item_id)).await;

        match fetched {
            Ok(metadata) => {
                match self.cache.write_metadata(&metadata).await {
                    Ok(path) => result.metadata_path = Some(path),
                    // The fetch itself succeeded; a persistence failure is a
                    // partial error, not a critical one
                    Err(failure) => {
                        tracing::error!(item = %item_id, error = %failure, "failed to persist metadata");
                        result
                            .errors
                            .push(FetchError::classify(item_id.clone(), phase, &failure));
                    }
                }
                result.metadata = Some(metadata);
            }
            Err(failure) => {
                let error = FetchError::classify(item_id.clone(), phase, &failure);
                tracing::error!(item = %item_id, code = %error.code, "metadata phase failed");
                result.errors.push(error);
                result.success = false;
            }
        }
    }

    /// Cached metadata, or `None` on a miss, a force flag, or a corrupt
    /// artifact (which is logged and treated as a miss)
    async fn cached_metadata(
        &self,
        item_id: &ItemId,
    ) -> Option<(crate::types::Metadata, std::path::PathBuf)> {
        let phase = FetchPhase::Metadata;
        if self.config.force.for_phase(phase) || !self.cache.exists(item_id, phase).await {
            return None;
        }
        match self.cache.read_metadata(item_id).await {
            Ok(hit) => {
                tracing::debug!(item = %item_id, "metadata served from cache");
                Some(hit)
            }
            Err(failure) => {
                tracing::warn!(
                    item = %item_id,
                    error = %failure,
                    "cached metadata unreadable, re-fetching"
                );
                None
            }
        }
    }

    async fn transcript_phase(&self, item_id: &ItemId, result: &mut ItemResult) {
        let phase = FetchPhase::Transcript;

        if !self.config.force.for_phase(phase) && self.cache.exists(item_id, phase).await {
            match self.cache.read_transcript(item_id).await {
                Ok((transcript, path)) => {
                    tracing::debug!(item = %item_id, "transcript served from cache");
                    result.transcript = Some(transcript);
                    result.transcript_path = Some(path);
                    return;
                }
                Err(failure) => {
                    tracing::warn!(
                        item = %item_id,
                        error = %failure,
                        "cached transcript unreadable, re-fetching"
                    );
                }
            }
        }

        let prefs = TranscriptPrefs::from_config(&self.config);
        self.limiter.acquire().await;
        let fetched =
            fetch_with_retry(&self.config.retry, || self.transcript.fetch(item_id, &prefs)).await;

        match fetched {
            Ok(transcript) => {
                match self.cache.write_transcript(&transcript).await {
                    Ok(path) => result.transcript_path = Some(path),
                    Err(failure) => {
                        tracing::error!(item = %item_id, error = %failure, "failed to persist transcript");
                        result
                            .errors
                            .push(FetchError::classify(item_id.clone(), phase, &failure));
                    }
                }
                result.transcript = Some(transcript);
            }
            Err(failure) => {
                let error = self.transcript_error(item_id, &failure).await;
                tracing::warn!(item = %item_id, code = %error.code, "transcript phase failed");
                result.errors.push(error);
            }
        }
    }

    /// Build the transcript failure record, enriching language failures with
    /// what the upstream actually offers
    async fn transcript_error(&self, item_id: &ItemId, failure: &FetchFailure) -> FetchError {
        let error = FetchError::classify(item_id.clone(), FetchPhase::Transcript, failure);

        if let FetchFailure::LanguageUnavailable {
            requested,
            available,
        } = failure
        {
            let available = if available.is_empty() {
                // The fetcher did not know; ask the upstream directly
                self.transcript
                    .available_languages(item_id)
                    .await
                    .unwrap_or_default()
            } else {
                available.clone()
            };
            return error
                .with_detail("requested_languages", serde_json::json!(requested))
                .with_detail("available_languages", serde_json::json!(available));
        }

        error
    }

    async fn media_phase(&self, item_id: &ItemId, result: &mut ItemResult) {
        let phase = FetchPhase::Media;

        if !self.config.force.for_phase(phase) && self.cache.exists(item_id, phase).await {
            match self.cache.read_media_refs(item_id).await {
                Ok(refs) => {
                    tracing::debug!(item = %item_id, files = refs.len(), "media served from cache");
                    result.media_refs = refs;
                    return;
                }
                Err(failure) => {
                    tracing::warn!(
                        item = %item_id,
                        error = %failure,
                        "cached media unreadable, re-downloading"
                    );
                }
            }
        }

        let dest_dir = match self.cache.prepare_media_dir(item_id).await {
            Ok(dir) => dir,
            Err(failure) => {
                result
                    .errors
                    .push(FetchError::classify(item_id.clone(), phase, &failure));
                return;
            }
        };

        let prefs = MediaPrefs::from_config(&self.config);
        let mode = self.config.download;
        self.limiter.acquire().await;
        let fetched = fetch_with_retry(&self.config.retry, || {
            self.media.fetch(item_id, mode, &prefs, &dest_dir)
        })
        .await;

        match fetched {
            Ok(refs) => {
                if refs.is_empty() {
                    tracing::warn!(item = %item_id, "media phase produced no files");
                }
                result.media_refs = refs;
            }
            Err(failure) => {
                let error = FetchError::classify(item_id.clone(), phase, &failure);
                tracing::warn!(item = %item_id, code = %error.code, "media phase failed");
                result.errors.push(error);
            }
        }
    }
}
