//! Requested format/quality and the static selector table

use crate::error::ServiceError;
use serde::Serialize;
use std::str::FromStr;

/// Kind of media the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Video,
    Audio,
}

/// Requested quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

/// Audio post-processing requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: &'static str,
    pub bitrate_kbps: u32,
}

/// Concrete engine format selection for a format/quality pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSelection {
    pub selector: &'static str,
    pub merge_output: Option<&'static str>,
    pub audio: Option<AudioExtraction>,
}

const MP3_192: AudioExtraction = AudioExtraction {
    codec: "mp3",
    bitrate_kbps: 192,
};

impl MediaFormat {
    /// Extension the finished file is expected to carry
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Video => "mp4",
            MediaFormat::Audio => "mp3",
        }
    }
}

impl Default for MediaFormat {
    fn default() -> Self {
        MediaFormat::Video
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Medium
    }
}

impl FromStr for MediaFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" | "video" => Ok(MediaFormat::Video),
            "mp3" | "audio" => Ok(MediaFormat::Audio),
            other => Err(ServiceError::InvalidInput(format!(
                "Unsupported format: {}",
                other
            ))),
        }
    }
}

impl FromStr for Quality {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(ServiceError::InvalidInput(format!(
                "Unsupported quality: {}",
                other
            ))),
        }
    }
}

/// Map a requested tier to the engine's format expression
pub fn format_selection(format: MediaFormat, quality: Quality) -> FormatSelection {
    match (format, quality) {
        (MediaFormat::Video, Quality::High) => FormatSelection {
            selector: "bestvideo[ext=mp4][height<=1080]+bestaudio[ext=m4a]/best[ext=mp4][height<=1080]",
            merge_output: Some("mp4"),
            audio: None,
        },
        (MediaFormat::Video, Quality::Medium) => FormatSelection {
            selector: "bestvideo[ext=mp4][height<=720]+bestaudio[ext=m4a]/best[ext=mp4][height<=720]",
            merge_output: Some("mp4"),
            audio: None,
        },
        (MediaFormat::Video, Quality::Low) => FormatSelection {
            selector: "bestvideo[ext=mp4][height<=480]+bestaudio[ext=m4a]/best[ext=mp4][height<=480]",
            merge_output: Some("mp4"),
            audio: None,
        },
        (MediaFormat::Audio, _) => FormatSelection {
            selector: "bestaudio/best",
            merge_output: None,
            audio: Some(MP3_192),
        },
    }
}
