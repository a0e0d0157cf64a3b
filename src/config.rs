//! Configuration types for vidfetch
//!
//! The pipeline accepts a single resolved, immutable [`FetchConfig`]. Flag
//! and environment precedence is the caller's concern; nothing here re-reads
//! global state mid-run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
use crate::types::{DownloadMode, FetchPhase};

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts (default: 3)
    ///
    /// 3 means the operation runs at most 3 times. 0 makes the retry wrapper
    /// a pass-through: exactly one attempt, no delay — for callers that own
    /// their own retry policy.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_base_delay", with = "duration_secs")]
    pub base_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter as a fraction of the delay (default: 0.25 = ±25%)
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            multiplier: default_multiplier(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

/// Cache-override flags, one global plus one per phase
///
/// The global flag is expanded into the per-phase flags once, at
/// configuration-resolution time, via [`ForceFlags::resolved`]; the pipeline
/// only ever consults the per-phase flags.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ForceFlags {
    /// Re-fetch everything regardless of cache state
    #[serde(default)]
    pub all: bool,
    /// Re-fetch metadata even when cached
    #[serde(default)]
    pub metadata: bool,
    /// Re-fetch the transcript even when cached
    #[serde(default)]
    pub transcript: bool,
    /// Re-download media even when cached
    #[serde(default)]
    pub media: bool,
}

impl ForceFlags {
    /// Expand the global flag into the per-phase flags
    pub fn resolved(self) -> Self {
        Self {
            all: self.all,
            metadata: self.metadata || self.all,
            transcript: self.transcript || self.all,
            media: self.media || self.all,
        }
    }

    /// Whether the given phase must bypass the cache
    pub fn for_phase(&self, phase: FetchPhase) -> bool {
        match phase {
            FetchPhase::Metadata => self.metadata,
            FetchPhase::Transcript => self.transcript,
            FetchPhase::Media => self.media,
        }
    }
}

/// Policy when the media conversion tool (ffmpeg) is missing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFallback {
    /// Fail the media phase
    #[default]
    Error,
    /// Skip media download with a warning
    Skip,
}

/// Resolved configuration for a fetch run
///
/// Built once by the caller and treated as immutable for the whole run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Output root directory (default: "./out")
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Preferred transcript languages, in order (default: ["en"])
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Accept auto-generated transcripts (default: true)
    #[serde(default = "default_true")]
    pub allow_generated: bool,

    /// Fall back to any available language when none of the preferred ones
    /// exist (default: false)
    #[serde(default)]
    pub allow_any_language: bool,

    /// Media download mode (default: none)
    #[serde(default)]
    pub download: DownloadMode,

    /// Maximum video height in pixels (None = best available)
    #[serde(default)]
    pub max_height: Option<u32>,

    /// Video format preference (default: "best")
    #[serde(default = "default_format")]
    pub video_format: String,

    /// Audio format preference (default: "best")
    #[serde(default = "default_format")]
    pub audio_format: String,

    /// Policy when the conversion tool is missing
    #[serde(default)]
    pub tool_fallback: ToolFallback,

    /// Cache-override flags
    #[serde(default)]
    pub force: ForceFlags,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Shared request budget in requests per second; 0 disables throttling
    /// (default: 2.0)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,

    /// Number of concurrent item workers in a batch (default: 3)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Stop dispatching new items after the first critical failure
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            languages: default_languages(),
            allow_generated: true,
            allow_any_language: false,
            download: DownloadMode::None,
            max_height: None,
            video_format: default_format(),
            audio_format: default_format(),
            tool_fallback: ToolFallback::default(),
            force: ForceFlags::default(),
            retry: RetryConfig::default(),
            rate_limit_rps: default_rate_limit(),
            workers: default_workers(),
            fail_fast: false,
        }
    }
}

impl FetchConfig {
    /// Validate the configuration, returning the first problem found
    pub fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::Config {
                message: "workers must be at least 1".to_string(),
                key: Some("workers".to_string()),
            });
        }
        if self.languages.is_empty() && !self.allow_any_language {
            return Err(Error::Config {
                message: "languages must not be empty unless allow_any_language is set"
                    .to_string(),
                key: Some("languages".to_string()),
            });
        }
        if self.rate_limit_rps < 0.0 {
            return Err(Error::Config {
                message: "rate_limit_rps must not be negative".to_string(),
                key: Some("rate_limit_rps".to_string()),
            });
        }
        if self.retry.multiplier < 1.0 {
            return Err(Error::Config {
                message: "retry multiplier must be at least 1.0".to_string(),
                key: Some("retry.multiplier".to_string()),
            });
        }
        if !(0.0..1.0).contains(&self.retry.jitter_fraction) {
            return Err(Error::Config {
                message: "retry jitter_fraction must be in [0, 1)".to_string(),
                key: Some("retry.jitter_fraction".to_string()),
            });
        }
        Ok(())
    }

    /// Copy of this config with the force flags resolved (global expanded
    /// into per-phase), done once before the run starts
    pub fn resolved(mut self) -> Self {
        self.force = self.force.resolved();
        self
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./out")
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_format() -> String {
    "best".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.25
}

fn default_rate_limit() -> f64 {
    2.0
}

fn default_workers() -> usize {
    3
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = FetchConfig::default();
        assert_eq!(config.out_dir, PathBuf::from("./out"));
        assert_eq!(config.languages, vec!["en".to_string()]);
        assert!(config.allow_generated);
        assert!(!config.allow_any_language);
        assert_eq!(config.download, DownloadMode::None);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.retry.jitter_fraction, 0.25);
        assert_eq!(config.rate_limit_rps, 2.0);
        assert_eq!(config.workers, 3);
        assert!(!config.fail_fast);
    }

    #[test]
    fn default_config_validates() {
        FetchConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: FetchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.languages, vec!["en".to_string()]);
    }

    #[test]
    fn global_force_expands_into_per_phase_flags() {
        let force = ForceFlags {
            all: true,
            ..Default::default()
        }
        .resolved();

        assert!(force.metadata);
        assert!(force.transcript);
        assert!(force.media);
        for phase in [
            FetchPhase::Metadata,
            FetchPhase::Transcript,
            FetchPhase::Media,
        ] {
            assert!(force.for_phase(phase), "{phase} should be forced");
        }
    }

    #[test]
    fn per_phase_force_stays_scoped() {
        let force = ForceFlags {
            metadata: true,
            ..Default::default()
        }
        .resolved();

        assert!(force.for_phase(FetchPhase::Metadata));
        assert!(!force.for_phase(FetchPhase::Transcript));
        assert!(!force.for_phase(FetchPhase::Media));
    }

    #[test]
    fn resolved_config_expands_global_force_once() {
        let config = FetchConfig {
            force: ForceFlags {
                all: true,
                ..Default::default()
            },
            ..Default::default()
        }
        .resolved();

        assert!(config.force.metadata);
        assert!(config.force.transcript);
        assert!(config.force.media);
    }

    #[test]
    fn zero_workers_fails_validation_with_key() {
        let config = FetchConfig {
            workers: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("workers")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn empty_languages_without_any_language_fails_validation() {
        let config = FetchConfig {
            languages: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FetchConfig {
            languages: vec![],
            allow_any_language: true,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn negative_rate_fails_validation() {
        let config = FetchConfig {
            rate_limit_rps: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_jitter_fails_validation() {
        let config = FetchConfig {
            retry: RetryConfig {
                jitter_fraction: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_config_round_trips_through_json() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            multiplier: 3.0,
            jitter_fraction: 0.1,
        };
        let json = serde_json::to_string(&retry).unwrap();
        let back: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_attempts, 5);
        assert_eq!(back.base_delay, Duration::from_millis(500));
        assert_eq!(back.multiplier, 3.0);
    }
}
