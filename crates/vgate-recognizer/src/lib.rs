//! Client for the external face-recognition service.
//!
//! The recognizer is an opaque capability: given a chunk's media reference it
//! returns zero or more face detections, or an error classified as transient
//! or permanent. Retry policy lives with the caller.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

use async_trait::async_trait;

pub use client::{HttpRecognizer, RecognizerConfig};
pub use error::{ErrorClass, RecognizerError, RecognizerResult};
pub use types::{RawDetection, RecognizeRequest, RecognizeResponse};

/// Face-recognition capability invoked once per chunk attempt.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Analyze one chunk.
    async fn recognize(&self, request: &RecognizeRequest) -> RecognizerResult<Vec<RawDetection>>;

    /// Check if the service is reachable.
    async fn health_check(&self) -> RecognizerResult<bool> {
        Ok(true)
    }
}
