//! Recognizer HTTP client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{RecognizerError, RecognizerResult};
use crate::types::{HealthResponse, RawDetection, RecognizeRequest, RecognizeResponse};
use crate::Recognizer;

/// Recognizer call latency histogram.
pub const RECOGNIZER_LATENCY_SECONDS: &str = "vgate_recognizer_latency_seconds";

/// Configuration for the recognizer client.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Base URL of the recognition service
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Bearer token, if the service requires one
    pub api_key: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            api_key: None,
        }
    }
}

impl RecognizerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("RECOGNIZER_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("RECOGNIZER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            api_key: std::env::var("RECOGNIZER_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

/// HTTP client for the face-recognition service.
pub struct HttpRecognizer {
    http: Client,
    config: RecognizerConfig,
}

impl HttpRecognizer {
    pub fn new(config: RecognizerConfig) -> RecognizerResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RecognizerError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> RecognizerResult<Self> {
        Self::new(RecognizerConfig::from_env())
    }

    fn map_send_error(&self, e: reqwest::Error) -> RecognizerError {
        if e.is_timeout() {
            RecognizerError::Timeout(self.config.timeout.as_secs())
        } else {
            RecognizerError::Network(e)
        }
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, request: &RecognizeRequest) -> RecognizerResult<Vec<RawDetection>> {
        let url = format!("{}/detect", self.config.base_url);

        debug!(
            video_id = %request.video_id,
            chunk_id = %request.chunk_id,
            "Sending recognition request to {}", url
        );

        let mut builder = self.http.post(&url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let start = Instant::now();
        let result = builder.send().await;
        histogram!(RECOGNIZER_LATENCY_SECONDS).record(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| secs * 1000);
            let body = response.text().await.unwrap_or_default();
            return Err(RecognizerError::from_status(status, body, retry_after_ms));
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let parsed: RecognizeResponse = serde_json::from_str(&body)
            .map_err(|e| RecognizerError::InvalidResponse(e.to_string()))?;

        Ok(parsed.detections)
    }

    async fn health_check(&self) -> RecognizerResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Recognizer health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Recognizer health check error: {}", e);
                Ok(false)
            }
        }
    }
}
