//! Delegated extraction engine
//!
//! The engine does all site-specific work: metadata extraction, format
//! negotiation, downloading and muxing. The rest of the crate only builds an
//! [`EngineRequest`], invokes the engine once per persona, and interprets
//! the outcome.

pub mod classify;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ytdlp;

pub use classify::*;
#[cfg(any(test, feature = "mock"))]
pub use mock::*;
pub use ytdlp::*;

use crate::core::{FormatSelection, Persona, PersonaProfile};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Complete configuration for one engine invocation
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Persona this request impersonates
    pub persona: Persona,
    /// Headers and client hint derived from the persona
    pub profile: PersonaProfile,
    /// Format selection, only set for downloads
    pub format: Option<FormatSelection>,
    /// Output path template with an `%(ext)s` placeholder
    pub output_template: Option<PathBuf>,
    /// Socket connect/read timeout
    pub socket_timeout: Duration,
    /// Hard limit on the whole invocation
    pub invocation_timeout: Duration,
    /// Engine-level retries for network errors
    pub retries: u32,
    /// Download throughput limit in bytes per second
    pub rate_limit_bps: Option<u64>,
    /// Cookie file consumed read-only by the engine
    pub cookie_file: Option<PathBuf>,
}

/// Metadata reported by the engine for a media URL
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Length in seconds, fractional for some extractors
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
}

impl MediaMetadata {
    /// Title, or a placeholder when the extractor found none
    pub fn title_or_default(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or("Untitled")
    }

    /// Channel name, falling back to the uploader
    pub fn channel_or_default(&self) -> &str {
        self.channel
            .as_deref()
            .or(self.uploader.as_deref())
            .filter(|channel| !channel.trim().is_empty())
            .unwrap_or("Unknown channel")
    }

    /// Whole seconds, rounded
    pub fn duration_seconds(&self) -> u64 {
        self.duration
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| secs.round() as u64)
            .unwrap_or(0)
    }
}

/// Result of a successful download invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Final path printed by the engine after post-processing, if any
    pub reported_path: Option<PathBuf>,
}

/// Failure of a single engine invocation
#[derive(Debug, Error)]
pub enum EngineFailure {
    #[error("{0}")]
    Reported(String),

    #[error("engine timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("failed to run engine: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine returned unreadable output: {0}")]
    Output(String),
}

/// External extraction/download engine
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Fetch metadata without downloading
    async fn probe(&self, url: &str, request: &EngineRequest)
        -> Result<MediaMetadata, EngineFailure>;

    /// Download into `request.output_template`
    async fn fetch(&self, url: &str, request: &EngineRequest)
        -> Result<FetchOutcome, EngineFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let meta = MediaMetadata::default();
        assert_eq!(meta.title_or_default(), "Untitled");
        assert_eq!(meta.channel_or_default(), "Unknown channel");
        assert_eq!(meta.duration_seconds(), 0);
    }

    #[test]
    fn test_metadata_from_engine_json() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "duration": 212.4,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "uploader": "Rick Astley",
            "view_count": 1500000000,
            "formats": []
        }"#;

        let meta: MediaMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.title_or_default(), "Never Gonna Give You Up");
        assert_eq!(meta.channel_or_default(), "Rick Astley");
        assert_eq!(meta.duration_seconds(), 212);
        assert_eq!(meta.view_count, Some(1_500_000_000));
    }

    #[test]
    fn test_failure_display() {
        let failure = EngineFailure::TimedOut(Duration::from_secs(180));
        assert_eq!(failure.to_string(), "engine timed out after 180s");
    }
}
