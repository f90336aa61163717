use axum::extract::{RawQuery, State};
use axum::Json;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use super::error::ApiError;
use super::retrieve_transcript;
use super::state::AppState;
use crate::output::TranscriptResponse;
use crate::relay::PoolSnapshot;

/// Service description
pub async fn home() -> Json<Value> {
    Json(json!({
        "message": "YouTube Transcript API Service",
        "usage": "/transcript?video_id=YOUR_VIDEO_ID",
        "endpoints": {
            "/transcript": "Chunked transcript for a video id or YouTube URL",
            "/health": "Service health",
            "/proxy-status": "Relay pool size, refresh times and a probed sample",
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: String,
    timestamp: DateTime<Utc>,
    uptime_secs: i64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "healthy",
        service: state.config.server.service_name.clone(),
        timestamp: now,
        uptime_secs: (now - state.started_at).num_seconds(),
    })
}

/// First non-empty `video_id` pair in the query string; repeated keys keep the first value
fn first_video_id(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "video_id")
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| !id.is_empty())
}

pub async fn transcript(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let raw = first_video_id(query.as_deref()).ok_or(ApiError::MissingParameter)?;

    let span = tracing::info_span!("transcript", request_id = %Uuid::new_v4(), video = %raw);
    let response = retrieve_transcript(&state.orchestrator, &raw).instrument(span).await?;

    Ok(Json(response))
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayCheck {
    relay: String,
    working: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyStatusResponse {
    #[serde(flatten)]
    pool: PoolSnapshot,
    sample_size: usize,
    working_sample: usize,
    sample: Vec<RelayCheck>,
    timestamp: DateTime<Utc>,
}

/// Refresh the pool if stale, then probe a random sample against the target site
pub async fn proxy_status(State(state): State<AppState>) -> Json<ProxyStatusResponse> {
    let pool = state.pool();
    pool.ensure_fresh().await;

    let sample = pool.sample(state.config.validator.status_sample_size).await;
    let probe = &state.probe;
    let checks = join_all(sample.into_iter().map(|relay| async move {
        RelayCheck {
            relay: relay.to_string(),
            working: probe.is_compatible_with_target(&relay).await,
        }
    }))
    .await;

    let working_sample = checks.iter().filter(|c| c.working).count();
    tracing::info!(sampled = checks.len(), working = working_sample, "relay sample probed");

    Json(ProxyStatusResponse {
        pool: pool.snapshot().await,
        sample_size: checks.len(),
        working_sample,
        sample: checks,
        timestamp: Utc::now(),
    })
}
