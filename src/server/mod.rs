//! HTTP surface.
//!
//! - `GET /` - Service description
//! - `GET /health` - Health check
//! - `GET /transcript?video_id=<id>` - Chunked transcript
//! - `GET /proxy-status` - Relay pool status with a probed sample

mod error;
mod handlers;
mod state;

pub use error::ApiError;
pub use state::AppState;

use anyhow::Context;
use axum::http::Request;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::captions::DEFAULT_LANGUAGE;
use crate::fetch::{FetchOrchestrator, FetchOutcome};
use crate::output::{shape_transcript, TranscriptResponse};
use crate::utils::normalize_video_id;

/// Build the complete router with tracing and CORS
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/transcript", get(handlers::transcript))
        .route("/proxy-status", get(handlers::proxy_status))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    query = request.uri().query().unwrap_or("")
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Fetch a transcript for a raw id or URL and shape it, mapping each outcome to its API error
pub async fn retrieve_transcript(
    orchestrator: &FetchOrchestrator,
    raw_video: &str,
) -> Result<TranscriptResponse, ApiError> {
    let video_id = normalize_video_id(raw_video);

    match orchestrator.fetch_with_fallback(&video_id).await {
        FetchOutcome::Success(segments) => shape_transcript(&video_id, DEFAULT_LANGUAGE, &segments)
            .map_err(|e| ApiError::Internal {
                video_id,
                message: e.to_string(),
            }),
        FetchOutcome::Blocked {
            relays_tried,
            pool_size,
            last_error,
        } => Err(ApiError::Blocked {
            video_id,
            proxies_tried: relays_tried,
            pool_size,
            details: last_error,
        }),
        FetchOutcome::Unavailable(message) => Err(ApiError::Unavailable { video_id, message }),
        FetchOutcome::OtherError(message) => Err(ApiError::Fetch { video_id, message }),
    }
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, bind_addr: &str) -> crate::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!(addr = %bind_addr, "starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::{CaptionError, CaptionSegment, MockCaptionFetcher};
    use crate::config::Config;
    use crate::fetch::FetchSettings;
    use crate::relay::source::MockRelaySource;
    use crate::relay::validator::MockRelayProbe;
    use crate::relay::RelayPool;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn settings() -> FetchSettings {
        FetchSettings {
            max_relay_attempts: 3,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            validate_against_target: false,
        }
    }

    fn state_with(
        fetcher: MockCaptionFetcher,
        relays: &'static [&'static str],
        probe: MockRelayProbe,
    ) -> AppState {
        let mut source = MockRelaySource::new();
        source
            .expect_collect()
            .returning(move || relays.iter().map(|a| a.parse().unwrap()).collect());
        let pool = Arc::new(RelayPool::new(
            Arc::new(source),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        ));

        let probe: Arc<dyn crate::relay::RelayProbe> = Arc::new(probe);
        let orchestrator =
            FetchOrchestrator::new(Arc::new(fetcher), pool, probe.clone(), settings()).unwrap();
        AppState::new(orchestrator, probe, Config::default())
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn blocked() -> CaptionError {
        CaptionError::RequestBlocked {
            video_id: "dQw4w9WgXcQ".to_string(),
            reason: "Sign in to confirm you're not a bot".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_video_id_is_a_bad_request() {
        let mut fetcher = MockCaptionFetcher::new();
        fetcher.expect_fetch().never();
        let state = state_with(fetcher, &[], MockRelayProbe::new());

        let (status, body) = get(state.clone(), "/transcript").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing video_id parameter");

        let (status, _) = get(state, "/transcript?video_id=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn successful_fetch_returns_the_shaped_transcript() {
        let mut fetcher = MockCaptionFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|video_id, _| video_id.to_string() == "dQw4w9WgXcQ")
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    CaptionSegment::new("a", 0.0, 10.0),
                    CaptionSegment::new("b", 10.0, 10.0),
                    CaptionSegment::new("c", 20.0, 15.0),
                ])
            });
        let state = state_with(fetcher, &[], MockRelayProbe::new());

        let (status, body) = get(state, "/transcript?video_id=https%3A%2F%2Fyoutu.be%2FdQw4w9WgXcQ").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["video_id"], "dQw4w9WgXcQ");
        assert_eq!(body["data"]["metadata"]["total_chunks"], 1);
        assert_eq!(body["data"]["transcript"]["chunks"][0]["timestamp"]["formatted"], "00:00 - 00:35");
    }

    #[tokio::test]
    async fn repeated_video_id_uses_the_first_value() {
        let mut fetcher = MockCaptionFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|video_id, _| video_id.to_string() == "dQw4w9WgXcQ")
            .times(1)
            .returning(|_, _| Ok(vec![CaptionSegment::new("a", 0.0, 5.0)]));
        let state = state_with(fetcher, &[], MockRelayProbe::new());

        let (status, body) = get(state, "/transcript?video_id=dQw4w9WgXcQ&video_id=other").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["video_id"], "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn malformed_query_is_a_json_bad_request() {
        let mut fetcher = MockCaptionFetcher::new();
        fetcher.expect_fetch().never();
        let state = state_with(fetcher, &[], MockRelayProbe::new());

        for uri in ["/transcript?video_id", "/transcript?other=1&&=", "/transcript?video_id=%20%20"] {
            let (status, body) = get(state.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], false);
            assert_eq!(body["error"], "Missing video_id parameter");
        }
    }

    #[tokio::test]
    async fn unavailable_transcript_is_not_found() {
        let mut fetcher = MockCaptionFetcher::new();
        fetcher.expect_fetch().times(1).returning(|id, _| {
            Err(CaptionError::TranscriptsDisabled {
                video_id: id.to_string(),
            })
        });
        let state = state_with(fetcher, &[], MockRelayProbe::new());

        let (status, body) = get(state, "/transcript?video_id=dQw4w9WgXcQ").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["video_id"], "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn other_failures_are_internal_errors() {
        let mut fetcher = MockCaptionFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(CaptionError::HttpStatus { endpoint: "watch page", status: 500 }));
        let state = state_with(fetcher, &[], MockRelayProbe::new());

        let (status, body) = get(state, "/transcript?video_id=dQw4w9WgXcQ").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn exhausted_relays_are_service_unavailable() {
        let mut fetcher = MockCaptionFetcher::new();
        fetcher.expect_fetch().returning(|_, _| Err(blocked()));

        let mut probe = MockRelayProbe::new();
        probe.expect_is_reachable().returning(|_| false);

        let state = state_with(fetcher, &["1.1.1.1:80", "2.2.2.2:80"], probe);

        let (status, body) = get(state, "/transcript?video_id=dQw4w9WgXcQ").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["proxies_tried"], 2);
        assert_eq!(body["pool_size"], 2);
        assert!(body["suggestion"].is_string());
    }

    #[tokio::test]
    async fn health_reports_the_service_name() {
        let state = state_with(MockCaptionFetcher::new(), &[], MockRelayProbe::new());

        let (status, body) = get(state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "youtube-transcript-api");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn home_describes_usage() {
        let state = state_with(MockCaptionFetcher::new(), &[], MockRelayProbe::new());

        let (status, body) = get(state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["usage"], "/transcript?video_id=YOUR_VIDEO_ID");
    }

    #[tokio::test]
    async fn proxy_status_probes_a_sample() {
        let mut probe = MockRelayProbe::new();
        probe
            .expect_is_compatible_with_target()
            .returning(|relay| relay.to_string() == "1.1.1.1:80");

        let state = state_with(MockCaptionFetcher::new(), &["1.1.1.1:80", "2.2.2.2:80"], probe);

        let (status, body) = get(state, "/proxy-status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pool_size"], 2);
        assert_eq!(body["sample_size"], 2);
        assert_eq!(body["working_sample"], 1);
        assert_eq!(body["refresh_interval_secs"], 3600);
        assert!(body["last_refresh"].is_string());
        assert!(body["next_refresh"].is_string());
    }
}
