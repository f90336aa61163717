use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod timedtext;
pub mod youtube;

pub use youtube::YoutubeCaptionFetcher;

use crate::net::Transport;

/// Caption language requested from the upstream
pub const DEFAULT_LANGUAGE: &str = "en";

/// One timed caption line as delivered by the upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    /// Caption text
    pub text: String,

    /// Offset from the start of the video, in seconds
    pub start: f64,

    /// Display duration, in seconds
    pub duration: f64,
}

impl CaptionSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Why a caption fetch failed.
///
/// The `Display` text is what callers classify, so the wording of each
/// variant carries meaning.
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    #[error("Could not retrieve a transcript for video {video_id}: YouTube is blocking requests from your IP ({reason})")]
    RequestBlocked { video_id: String, reason: String },

    #[error("Could not retrieve a transcript for video {video_id}: too many requests from your IP, YouTube has blocked this client")]
    TooManyRequests { video_id: String },

    #[error("Transcript not available because video {video_id} is unavailable: {reason}")]
    VideoUnavailable { video_id: String, reason: String },

    #[error("Transcripts are disabled for video {video_id}")]
    TranscriptsDisabled { video_id: String },

    #[error("Transcript not available for video {video_id} in language '{language}' (available: {available})")]
    NoTranscriptFound {
        video_id: String,
        language: String,
        available: String,
    },

    #[error("YouTube {endpoint} request failed with HTTP {status}")]
    HttpStatus { endpoint: &'static str, status: u16 },

    #[error("Failed to parse YouTube response: {0}")]
    Parse(String),

    #[error("Network request failed: {0}")]
    Network(reqwest::Error),
}

impl From<reqwest::Error> for CaptionError {
    fn from(e: reqwest::Error) -> Self {
        // Signed caption URLs carry query parameters that must not leak into messages
        CaptionError::Network(e.without_url())
    }
}

/// Source of caption segments for a video.
///
/// All network access goes through the supplied [`Transport`], which decides
/// whether the request is direct or relayed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionFetcher: Send + Sync {
    /// Fetch the ordered caption segments for `video_id`
    async fn fetch(
        &self,
        video_id: &str,
        transport: &Transport,
    ) -> Result<Vec<CaptionSegment>, CaptionError>;
}
