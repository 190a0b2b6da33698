//! In-process recognizer with scripted per-chunk outcomes.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RecognizerError, RecognizerResult};
use crate::types::{RawDetection, RecognizeRequest};
use crate::Recognizer;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    Detections(Vec<RawDetection>),
    Transient,
    Permanent,
}

impl Scripted {
    fn into_result(self) -> RecognizerResult<Vec<RawDetection>> {
        match self {
            Scripted::Detections(d) => Ok(d),
            Scripted::Transient => Err(RecognizerError::unavailable("scripted outage")),
            Scripted::Permanent => Err(RecognizerError::rejected("scripted rejection")),
        }
    }
}

/// Recognizer whose replies are queued per chunk ID.
///
/// When a chunk's queue is drained, its fallback (or the global fallback) is
/// repeated. Unknown chunks get an empty detection list.
#[derive(Default)]
pub struct ScriptedRecognizer {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallback: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<HashMap<String, u32>>,
    delay: Option<Duration>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a one-shot reply for a chunk.
    pub fn push(self, chunk_id: &str, reply: Scripted) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(chunk_id.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for a chunk once its queue is empty.
    pub fn always(self, chunk_id: &str, reply: Scripted) -> Self {
        self.fallback
            .lock()
            .unwrap()
            .insert(chunk_id.to_string(), reply);
        self
    }

    /// Number of recognize calls made for a chunk.
    pub fn calls(&self, chunk_id: &str) -> u32 {
        self.calls.lock().unwrap().get(chunk_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, request: &RecognizeRequest) -> RecognizerResult<Vec<RawDetection>> {
        let key = request.chunk_id.as_str().to_string();
        *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|q| q.pop_front());
        let reply = next
            .or_else(|| self.fallback.lock().unwrap().get(&key).cloned())
            .unwrap_or(Scripted::Detections(Vec::new()));

        reply.into_result()
    }
}
