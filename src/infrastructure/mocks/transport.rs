//! Mock transport for testing.

use crate::application::ports::{Transport, TransportRequest, TransportResponse};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Body of the default scripted answer.
pub const MOCK_NOTICE_BODY: &str = r#"{"id":"mock-notice"}"#;

#[derive(Debug, Default)]
struct State {
    scripted: VecDeque<Result<TransportResponse, TransportError>>,
    requests: Vec<TransportRequest>,
}

/// Transport that answers from a script and records every request.
///
/// Scripted answers are consumed in order; once the script is empty every
/// request gets `201 {"id":"mock-notice"}`. Clones share the script and the
/// recorded requests.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
    delay: Option<Duration>,
    hang: bool,
}

impl MockTransport {
    /// A transport that accepts every notice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A transport that records requests but never answers.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a response.
    pub fn push_response(&self, response: TransportResponse) {
        self.state().scripted.push_back(Ok(response));
    }

    /// Queue a network-level failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.state()
            .scripted
            .push_back(Err(TransportError::new(message)));
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state().requests.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Request bodies parsed as JSON, in arrival order.
    pub fn notices(&self) -> Vec<serde_json::Value> {
        self.state()
            .requests
            .iter()
            .filter_map(|request| serde_json::from_str(&request.body).ok())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let answer = {
            let mut state = self.state();
            state.requests.push(request);
            state.scripted.pop_front()
        };

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        answer.unwrap_or_else(|| Ok(TransportResponse::new(201).with_body(MOCK_NOTICE_BODY)))
    }
}
