//! Per-item, per-phase artifact cache
//!
//! The pipeline never inspects raw storage. It asks the [`PhaseCache`]
//! whether output already exists for a phase and, on a hit, reads the
//! artifact back into the same in-memory shape a fresh fetch would produce.
//! That identity is the load-bearing property here: a cached run and a
//! freshly-fetched run must populate identical structures, never a hollowed
//! result with `None` fields.
//!
//! [`FsCache`] is the bundled filesystem backend:
//!
//! ```text
//! <root>/<item_id>/metadata.json
//! <root>/<item_id>/transcript.json   (+ .txt / .vtt / .srt sidecars)
//! <root>/<item_id>/media/
//! <root>/summary.json
//! ```
//!
//! Writes go to a temp file in the destination directory and are renamed
//! into place, so readers never observe a half-written artifact.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::FetchFailure;
use crate::types::{BatchResult, FetchPhase, ItemId, Metadata, Transcript};

/// Storage contract consumed by the item orchestrator
#[async_trait]
pub trait PhaseCache: Send + Sync {
    /// Whether persisted output already exists for this phase of this item
    async fn exists(&self, item_id: &ItemId, phase: FetchPhase) -> bool;

    /// Read cached metadata and the location it was read from
    async fn read_metadata(&self, item_id: &ItemId) -> Result<(Metadata, PathBuf), FetchFailure>;

    /// Read a cached transcript and the location it was read from
    async fn read_transcript(
        &self,
        item_id: &ItemId,
    ) -> Result<(Transcript, PathBuf), FetchFailure>;

    /// List previously downloaded media files for this item
    async fn read_media_refs(&self, item_id: &ItemId) -> Result<Vec<PathBuf>, FetchFailure>;

    /// Persist metadata, returning the written location
    async fn write_metadata(&self, metadata: &Metadata) -> Result<PathBuf, FetchFailure>;

    /// Persist a transcript, returning the written location
    async fn write_transcript(&self, transcript: &Transcript) -> Result<PathBuf, FetchFailure>;

    /// Create (if needed) and return the media destination directory
    async fn prepare_media_dir(&self, item_id: &ItemId) -> Result<PathBuf, FetchFailure>;
}

/// Filesystem-backed [`PhaseCache`]
#[derive(Clone, Debug)]
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    /// Create a cache rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_dir(&self, item_id: &ItemId) -> PathBuf {
        self.root.join(item_id.as_str())
    }

    fn metadata_path(&self, item_id: &ItemId) -> PathBuf {
        self.item_dir(item_id).join("metadata.json")
    }

    fn transcript_path(&self, item_id: &ItemId) -> PathBuf {
        self.item_dir(item_id).join("transcript.json")
    }

    fn media_dir(&self, item_id: &ItemId) -> PathBuf {
        self.item_dir(item_id).join("media")
    }

    /// Persist a batch summary as `summary.json` at the output root
    pub async fn write_summary(&self, batch: &BatchResult) -> crate::error::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let dest = self.root.join("summary.json");
        let json = serde_json::to_vec_pretty(batch)?;
        atomic_write(&dest, &json).await?;
        Ok(dest)
    }
}

#[async_trait]
impl PhaseCache for FsCache {
    async fn exists(&self, item_id: &ItemId, phase: FetchPhase) -> bool {
        match phase {
            FetchPhase::Metadata => self.metadata_path(item_id).is_file(),
            FetchPhase::Transcript => self.transcript_path(item_id).is_file(),
            // An empty media directory is not a hit; a crashed run may have
            // created the directory without finishing any download
            FetchPhase::Media => match std::fs::read_dir(self.media_dir(item_id)) {
                Ok(mut entries) => entries.next().is_some(),
                Err(_) => false,
            },
        }
    }

    async fn read_metadata(&self, item_id: &ItemId) -> Result<(Metadata, PathBuf), FetchFailure> {
        let path = self.metadata_path(item_id);
        let bytes = tokio::fs::read(&path).await?;
        let metadata: Metadata = serde_json::from_slice(&bytes)?;
        Ok((metadata, path))
    }

    async fn read_transcript(
        &self,
        item_id: &ItemId,
    ) -> Result<(Transcript, PathBuf), FetchFailure> {
        let path = self.transcript_path(item_id);
        let bytes = tokio::fs::read(&path).await?;
        let transcript: Transcript = serde_json::from_slice(&bytes)?;
        Ok((transcript, path))
    }

    async fn read_media_refs(&self, item_id: &ItemId) -> Result<Vec<PathBuf>, FetchFailure> {
        let dir = self.media_dir(item_id);
        let mut refs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(refs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            refs.push(entry.path());
        }
        refs.sort();
        Ok(refs)
    }

    async fn write_metadata(&self, metadata: &Metadata) -> Result<PathBuf, FetchFailure> {
        let dir = self.item_dir(&metadata.item_id);
        tokio::fs::create_dir_all(&dir).await?;
        let dest = dir.join("metadata.json");
        atomic_write(&dest, &serde_json::to_vec_pretty(metadata)?).await?;
        Ok(dest)
    }

    async fn write_transcript(&self, transcript: &Transcript) -> Result<PathBuf, FetchFailure> {
        let dir = self.item_dir(&transcript.item_id);
        tokio::fs::create_dir_all(&dir).await?;

        let dest = dir.join("transcript.json");
        atomic_write(&dest, &serde_json::to_vec_pretty(transcript)?).await?;

        // Sidecar renditions for human consumers; transcript.json stays the
        // artifact of record that cache hits read back
        atomic_write(&dir.join("transcript.txt"), format_txt(transcript).as_bytes()).await?;
        atomic_write(&dir.join("transcript.vtt"), format_vtt(transcript).as_bytes()).await?;
        atomic_write(&dir.join("transcript.srt"), format_srt(transcript).as_bytes()).await?;

        Ok(dest)
    }

    async fn prepare_media_dir(&self, item_id: &ItemId) -> Result<PathBuf, FetchFailure> {
        let dir = self.media_dir(item_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

/// Write bytes to a temp file in the destination directory, then rename
async fn atomic_write(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let tmp = parent.join(format!(
        ".vidfetch-{}.tmp",
        dest.file_name().and_then(|n| n.to_str()).unwrap_or("artifact")
    ));
    tokio::fs::write(&tmp, bytes).await?;
    match tokio::fs::rename(&tmp, dest).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            Err(e)
        }
    }
}

fn format_txt(transcript: &Transcript) -> String {
    let mut out = String::new();
    for segment in &transcript.segments {
        out.push_str(&segment.text);
        out.push('\n');
    }
    out
}

fn format_vtt(transcript: &Transcript) -> String {
    let mut parts = vec!["WEBVTT".to_string(), String::new()];
    for segment in &transcript.segments {
        parts.push(format!(
            "{} --> {}",
            seconds_to_vtt(segment.start),
            seconds_to_vtt(segment.start + segment.duration)
        ));
        parts.push(segment.text.clone());
        parts.push(String::new());
    }
    parts.join("\n")
}

fn format_srt(transcript: &Transcript) -> String {
    let mut parts = Vec::new();
    for (i, segment) in transcript.segments.iter().enumerate() {
        parts.push((i + 1).to_string());
        parts.push(format!(
            "{} --> {}",
            seconds_to_srt(segment.start),
            seconds_to_srt(segment.start + segment.duration)
        ));
        parts.push(segment.text.clone());
        parts.push(String::new());
    }
    parts.join("\n")
}

/// Format seconds as a WebVTT timestamp, `HH:MM:SS.mmm`
fn seconds_to_vtt(seconds: f64) -> String {
    let (h, m, s, ms) = split_timestamp(seconds);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Format seconds as an SRT timestamp, `HH:MM:SS,mmm`
fn seconds_to_srt(seconds: f64) -> String {
    let (h, m, s, ms) = split_timestamp(seconds);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn split_timestamp(seconds: f64) -> (u64, u64, u64, u64) {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60, ms)
}
