//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use vgate_analysis::{AnalysisConfig, AnalysisPipeline};
use vgate_recognizer::{HttpRecognizer, Recognizer};
use vgate_store::{InMemoryStore, VideoStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: AnalysisPipeline,
}

impl AppState {
    /// Build state around injected collaborators.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn VideoStore>,
        recognizer: Arc<dyn Recognizer>,
        analysis: AnalysisConfig,
    ) -> Self {
        Self {
            config,
            pipeline: AnalysisPipeline::new(store, recognizer, analysis),
        }
    }

    /// Build state from environment variables.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let store = match &config.seed_file {
            Some(path) => InMemoryStore::load_seed(path)
                .await
                .with_context(|| format!("Failed to load seed file {}", path))?,
            None => {
                info!("No seed file configured, starting with an empty store");
                InMemoryStore::new()
            }
        };

        let recognizer = HttpRecognizer::from_env().context("Failed to create recognizer client")?;
        let analysis = AnalysisConfig::from_env();
        info!(
            concurrency = analysis.dispatch_concurrency,
            max_attempts = analysis.backoff.max_attempts,
            chunk_timeout_secs = analysis.chunk_timeout.as_secs(),
            "Analysis config loaded"
        );

        Ok(Self::new(config, Arc::new(store), Arc::new(recognizer), analysis))
    }
}
