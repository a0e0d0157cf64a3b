//! Shared fixtures for unit tests: programmable mock fetchers and an
//! in-memory cache backend

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::cache::PhaseCache;
use crate::error::FetchFailure;
use crate::fetcher::{MediaFetcher, MediaPrefs, MetadataFetcher, TranscriptFetcher, TranscriptPrefs};
use crate::types::{DownloadMode, FetchPhase, ItemId, Metadata, Transcript, TranscriptSegment};

pub fn sample_metadata(id: &str) -> Metadata {
    Metadata {
        item_id: ItemId::from(id),
        source_url: format!("https://example.com/watch?v={id}"),
        title: Some(format!("Title of {id}")),
        channel_title: Some("Test Channel".into()),
        channel_id: Some("chan1".into()),
        upload_date: Some("2024-05-01".into()),
        duration_seconds: Some(120.0),
        description: None,
        tags: vec![],
        view_count: Some(42),
        like_count: None,
        fetched_at: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
        metadata_source: "mock".into(),
        raw: None,
    }
}

pub fn sample_transcript(id: &str) -> Transcript {
    Transcript {
        item_id: ItemId::from(id),
        language: "en".into(),
        is_generated: Some(false),
        segments: vec![TranscriptSegment {
            start: 0.0,
            duration: 2.0,
            text: "hello".into(),
        }],
        fetched_at: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
        transcript_source: "mock".into(),
        available_languages: vec!["en".into()],
    }
}

type MetadataHandler = Box<dyn Fn(&ItemId) -> Result<Metadata, FetchFailure> + Send + Sync>;

/// Metadata fetcher driven by a closure, counting invocations
pub struct MockMetadata {
    pub calls: AtomicU32,
    handler: MetadataHandler,
}

impl MockMetadata {
    pub fn new(
        handler: impl Fn(&ItemId) -> Result<Metadata, FetchFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicU32::new(0),
            handler: Box::new(handler),
        }
    }

    /// A fetcher that always succeeds with sample metadata
    pub fn ok() -> Self {
        Self::new(|id| Ok(sample_metadata(id.as_str())))
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataFetcher for MockMetadata {
    async fn fetch(&self, item_id: &ItemId) -> Result<Metadata, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(item_id)
    }
}

type TranscriptHandler = Box<dyn Fn(&ItemId) -> Result<Transcript, FetchFailure> + Send + Sync>;

/// Transcript fetcher driven by a closure, counting fetch and probe calls
pub struct MockTranscript {
    pub calls: AtomicU32,
    pub probe_calls: AtomicU32,
    handler: TranscriptHandler,
    probe_languages: Vec<String>,
}

impl MockTranscript {
    pub fn new(
        handler: impl Fn(&ItemId) -> Result<Transcript, FetchFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicU32::new(0),
            probe_calls: AtomicU32::new(0),
            handler: Box::new(handler),
            probe_languages: vec!["en".into()],
        }
    }

    pub fn ok() -> Self {
        Self::new(|id| Ok(sample_transcript(id.as_str())))
    }

    pub fn with_probe_languages(mut self, languages: Vec<String>) -> Self {
        self.probe_languages = languages;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptFetcher for MockTranscript {
    async fn fetch(
        &self,
        item_id: &ItemId,
        _prefs: &TranscriptPrefs,
    ) -> Result<Transcript, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(item_id)
    }

    async fn available_languages(&self, _item_id: &ItemId) -> Result<Vec<String>, FetchFailure> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probe_languages.clone())
    }
}

type MediaHandler =
    Box<dyn Fn(&ItemId, &Path) -> Result<Vec<PathBuf>, FetchFailure> + Send + Sync>;

/// Media fetcher driven by a closure, counting invocations
pub struct MockMedia {
    pub calls: AtomicU32,
    handler: MediaHandler,
}

impl MockMedia {
    pub fn new(
        handler: impl Fn(&ItemId, &Path) -> Result<Vec<PathBuf>, FetchFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicU32::new(0),
            handler: Box::new(handler),
        }
    }

    /// A fetcher that pretends to download a single file
    pub fn ok() -> Self {
        Self::new(|id, dest| Ok(vec![dest.join(format!("{id}.mp4"))]))
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for MockMedia {
    async fn fetch(
        &self,
        item_id: &ItemId,
        _mode: DownloadMode,
        _prefs: &MediaPrefs,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(item_id, dest_dir)
    }
}

/// In-memory [`PhaseCache`] with synthetic paths
///
/// Set `corrupt_metadata` to make metadata reads fail while `exists` still
/// reports a hit, simulating a damaged artifact on disk.
#[derive(Default)]
pub struct MemCache {
    metadata: Mutex<HashMap<ItemId, Metadata>>,
    transcripts: Mutex<HashMap<ItemId, Transcript>>,
    media: Mutex<HashMap<ItemId, Vec<PathBuf>>>,
    pub corrupt_metadata: Mutex<Vec<ItemId>>,
    pub metadata_writes: AtomicU32,
    pub transcript_writes: AtomicU32,
}

impl MemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_metadata(&self, metadata: Metadata) {
        self.metadata
            .lock()
            .unwrap()
            .insert(metadata.item_id.clone(), metadata);
    }

    pub fn seed_transcript(&self, transcript: Transcript) {
        self.transcripts
            .lock()
            .unwrap()
            .insert(transcript.item_id.clone(), transcript);
    }

    pub fn seed_media(&self, item_id: ItemId, refs: Vec<PathBuf>) {
        self.media.lock().unwrap().insert(item_id, refs);
    }

    pub fn mark_metadata_corrupt(&self, item_id: ItemId) {
        self.corrupt_metadata.lock().unwrap().push(item_id);
    }

    fn metadata_path(item_id: &ItemId) -> PathBuf {
        PathBuf::from(format!("mem/{item_id}/metadata.json"))
    }

    fn transcript_path(item_id: &ItemId) -> PathBuf {
        PathBuf::from(format!("mem/{item_id}/transcript.json"))
    }
}

#[async_trait]
impl PhaseCache for MemCache {
    async fn exists(&self, item_id: &ItemId, phase: FetchPhase) -> bool {
        match phase {
            FetchPhase::Metadata => {
                self.metadata.lock().unwrap().contains_key(item_id)
                    || self.corrupt_metadata.lock().unwrap().contains(item_id)
            }
            FetchPhase::Transcript => self.transcripts.lock().unwrap().contains_key(item_id),
            FetchPhase::Media => self
                .media
                .lock()
                .unwrap()
                .get(item_id)
                .is_some_and(|refs| !refs.is_empty()),
        }
    }

    async fn read_metadata(&self, item_id: &ItemId) -> Result<(Metadata, PathBuf), FetchFailure> {
        if self.corrupt_metadata.lock().unwrap().contains(item_id) {
            return Err(FetchFailure::Other("corrupt artifact".into()));
        }
        let metadata = self
            .metadata
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| FetchFailure::Other("metadata not cached".into()))?;
        Ok((metadata, Self::metadata_path(item_id)))
    }

    async fn read_transcript(
        &self,
        item_id: &ItemId,
    ) -> Result<(Transcript, PathBuf), FetchFailure> {
        let transcript = self
            .transcripts
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| FetchFailure::Other("transcript not cached".into()))?;
        Ok((transcript, Self::transcript_path(item_id)))
    }

    async fn read_media_refs(&self, item_id: &ItemId) -> Result<Vec<PathBuf>, FetchFailure> {
        Ok(self
            .media
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn write_metadata(&self, metadata: &Metadata) -> Result<PathBuf, FetchFailure> {
        self.metadata_writes.fetch_add(1, Ordering::SeqCst);
        let id = metadata.item_id.clone();
        self.corrupt_metadata.lock().unwrap().retain(|c| *c != id);
        self.metadata.lock().unwrap().insert(id.clone(), metadata.clone());
        Ok(Self::metadata_path(&id))
    }

    async fn write_transcript(&self, transcript: &Transcript) -> Result<PathBuf, FetchFailure> {
        self.transcript_writes.fetch_add(1, Ordering::SeqCst);
        let id = transcript.item_id.clone();
        self.transcripts
            .lock()
            .unwrap()
            .insert(id.clone(), transcript.clone());
        Ok(Self::transcript_path(&id))
    }

    async fn prepare_media_dir(&self, item_id: &ItemId) -> Result<PathBuf, FetchFailure> {
        Ok(PathBuf::from(format!("mem/{item_id}/media")))
    }
}
