//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::captions::YoutubeCaptionFetcher;
use crate::config::Config;
use crate::fetch::{FetchOrchestrator, FetchSettings};
use crate::relay::{HttpRelaySource, HttpRelayValidator, RelayPool, RelayProbe};

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FetchOrchestrator>,
    pub probe: Arc<dyn RelayProbe>,
    pub config: Arc<Config>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: FetchOrchestrator, probe: Arc<dyn RelayProbe>, config: Config) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            probe,
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }

    /// Wire the production services from configuration
    pub fn from_config(config: Config) -> crate::Result<Self> {
        let source = HttpRelaySource::from_config(&config.relays)?;
        let pool = Arc::new(RelayPool::new(
            Arc::new(source),
            Duration::from_secs(config.relays.refresh_interval_secs),
            Duration::from_secs(config.relays.empty_retry_secs),
        ));
        let probe: Arc<dyn RelayProbe> = Arc::new(HttpRelayValidator::from_config(&config.validator));

        let orchestrator = FetchOrchestrator::new(
            Arc::new(YoutubeCaptionFetcher::new()),
            pool,
            probe.clone(),
            FetchSettings::from(&config.fetch),
        )?;

        Ok(Self::new(orchestrator, probe, config))
    }

    pub fn pool(&self) -> &Arc<RelayPool> {
        self.orchestrator.pool()
    }
}
