use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::captions::CaptionSegment;
use crate::utils::format_timestamp;

pub mod chunks;

pub use chunks::{build_chunks, join_text, Chunk, ChunkAnalytics, ChunkTimestamp};

/// Shaping needs at least one segment
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Transcript contained no caption segments")]
    Empty,
}

/// Successful `/transcript` body
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResponse {
    pub success: bool,
    pub data: TranscriptData,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptData {
    pub video_id: String,
    pub metadata: TranscriptMetadata,
    pub transcript: TranscriptBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptMetadata {
    pub total_segments: usize,
    pub total_chunks: usize,
    /// Last segment's start plus its duration, in seconds
    pub duration: f64,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptBody {
    pub full_text: String,
    pub segments: Vec<SegmentEntry>,
    pub chunks: Vec<Chunk>,
}

/// Per-segment listing with its own timestamp
#[derive(Debug, Clone, Serialize)]
pub struct SegmentEntry {
    pub id: usize,
    pub text: String,
    pub start: f64,
    pub duration: f64,
    pub timestamp: SegmentTimestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentTimestamp {
    pub seconds: u64,
    pub formatted: String,
}

/// Turn fetched segments into the response document
pub fn shape_transcript(
    video_id: &str,
    language: &str,
    segments: &[CaptionSegment],
) -> Result<TranscriptResponse, ShapeError> {
    let last = segments.last().ok_or(ShapeError::Empty)?;
    let chunks = build_chunks(segments);

    let entries = segments
        .iter()
        .enumerate()
        .map(|(id, segment)| SegmentEntry {
            id,
            text: segment.text.clone(),
            start: segment.start,
            duration: segment.duration,
            timestamp: SegmentTimestamp {
                seconds: segment.start.max(0.0) as u64,
                formatted: format_timestamp(segment.start),
            },
        })
        .collect();

    Ok(TranscriptResponse {
        success: true,
        data: TranscriptData {
            video_id: video_id.to_string(),
            metadata: TranscriptMetadata {
                total_segments: segments.len(),
                total_chunks: chunks.len(),
                duration: last.end(),
                language: language.to_string(),
            },
            transcript: TranscriptBody {
                full_text: join_text(segments),
                segments: entries,
                chunks,
            },
        },
    })
}

/// Render the response as JSON
pub fn format_as_json(response: &TranscriptResponse, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    Ok(json)
}

/// Render the chunks as timestamped plain text, one chunk per line
pub fn format_as_text(response: &TranscriptResponse) -> String {
    response
        .data
        .transcript
        .chunks
        .iter()
        .map(|chunk| format!("[{}] {}", chunk.timestamp.formatted, chunk.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render(response: &TranscriptResponse, format: &OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Json => format_as_json(response, pretty),
        OutputFormat::Text => Ok(format_as_text(response)),
    }
}

/// Save transcript to file
pub fn save_to_file(
    response: &TranscriptResponse,
    path: &Path,
    format: &OutputFormat,
    pretty: bool,
) -> Result<()> {
    fs_err::write(path, render(response, format, pretty)?)?;
    Ok(())
}

/// Print transcript to console
pub fn print_to_console(response: &TranscriptResponse, format: &OutputFormat, pretty: bool) -> Result<()> {
    println!("{}", render(response, format, pretty)?);
    Ok(())
}
