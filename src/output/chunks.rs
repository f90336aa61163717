use serde::Serialize;

use crate::captions::CaptionSegment;
use crate::utils::{format_timestamp, round2};

/// A chunk is flushed once its segments add up to this many seconds
pub const TARGET_CHUNK_SECONDS: f64 = 30.0;

/// ...or once it holds this many segments
pub const MAX_SEGMENTS_PER_CHUNK: usize = 5;

/// Consecutive segments merged into one time-ranged unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
    pub timestamp: ChunkTimestamp,
    pub analytics: ChunkAnalytics,
    pub embedding_text: String,
    #[serde(skip)]
    pub segment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkTimestamp {
    /// Whole seconds
    pub start: u64,
    /// Whole seconds
    pub end: u64,
    pub duration: f64,
    /// `MM:SS - MM:SS`
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkAnalytics {
    pub word_count: usize,
    /// Words per second, 0 for zero-length chunks
    pub speaking_rate: f64,
}

/// Group consecutive segments into chunks.
///
/// Segments accumulate until their summed duration reaches
/// [`TARGET_CHUNK_SECONDS`], [`MAX_SEGMENTS_PER_CHUNK`] have been collected, or
/// the last segment is reached.
pub fn build_chunks(segments: &[CaptionSegment]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut group_start = 0;
    let mut group_duration = 0.0;

    for (i, segment) in segments.iter().enumerate() {
        group_duration += segment.duration;
        let group_len = i + 1 - group_start;
        let is_last = i + 1 == segments.len();

        if group_duration >= TARGET_CHUNK_SECONDS || group_len >= MAX_SEGMENTS_PER_CHUNK || is_last {
            chunks.push(make_chunk(chunks.len(), &segments[group_start..=i]));
            group_start = i + 1;
            group_duration = 0.0;
        }
    }

    chunks
}

fn make_chunk(id: usize, group: &[CaptionSegment]) -> Chunk {
    let text = join_text(group);
    let start = group.first().map(|s| s.start).unwrap_or(0.0);
    let end = group.last().map(CaptionSegment::end).unwrap_or(start);
    let duration = end - start;

    let start_formatted = format_timestamp(start);
    let end_formatted = format_timestamp(end);
    let word_count = text.split_whitespace().count();
    let speaking_rate = if duration > 0.0 {
        round2(word_count as f64 / duration)
    } else {
        0.0
    };

    Chunk {
        id,
        embedding_text: format!("At {} to {}: {}", start_formatted, end_formatted, text),
        timestamp: ChunkTimestamp {
            start: start.max(0.0) as u64,
            end: end.max(0.0) as u64,
            duration: round2(duration),
            formatted: format!("{} - {}", start_formatted, end_formatted),
        },
        analytics: ChunkAnalytics {
            word_count,
            speaking_rate,
        },
        text,
        segment_count: group.len(),
    }
}

/// Segment texts joined by single spaces
pub fn join_text(segments: &[CaptionSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
