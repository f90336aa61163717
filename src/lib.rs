//! Transcript Relay - YouTube transcript retrieval with relay fallback
//!
//! Fetches caption transcripts directly from YouTube and, when the service's
//! own address is blocked, retries through public HTTP relays collected from
//! free proxy lists. Results are shaped into chunked JSON for downstream
//! search and embedding pipelines.

pub mod captions;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod net;
pub mod output;
pub mod relay;
pub mod server;
pub mod utils;

pub use captions::{CaptionError, CaptionFetcher, CaptionSegment, YoutubeCaptionFetcher};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use fetch::{FetchOrchestrator, FetchOutcome, FetchSettings};
pub use output::TranscriptResponse;
pub use relay::{RelayAddress, RelayPool};
pub use server::{router, ApiError, AppState};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
