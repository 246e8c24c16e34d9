//! Delivery of serialized notices and the offline queue.
//!
//! [`DeliveryQueue`] sends one notice per call, refusing early while the
//! collector's rate limit is in effect, and maps the collector's answer to an
//! outcome. [`OfflineQueue`] buffers notify calls while the host is offline.

use crate::application::ports::{Clock, Transport, TransportRequest, TransportResponse};
use crate::application::rate_limiter::RateLimiter;
use crate::application::scope::Scope;
use crate::domain::notice::Notice;
use crate::domain::report::Report;
use crate::error::NotifyError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Header carrying the collector's backoff in seconds.
pub const RATE_LIMIT_DELAY_HEADER: &str = "X-RateLimit-Delay";

/// Default capacity of the offline queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Sends notices to one collector endpoint.
#[derive(Debug)]
pub struct DeliveryQueue {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    rate_limiter: RateLimiter,
    url: String,
    timeout: Duration,
}

impl DeliveryQueue {
    /// Create a delivery queue for `url`.
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let rate_limiter = RateLimiter::new(clock.now());
        Self {
            transport,
            clock,
            rate_limiter,
            url: url.into(),
            timeout,
        }
    }

    /// The shared rate-limit state.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send `body` and record the outcome on `notice`.
    pub async fn deliver(&self, mut notice: Notice, body: String) -> Notice {
        match self.send(body).await {
            Ok(id) => notice.id = id,
            Err(error) => notice.error = Some(error),
        }
        notice
    }

    /// Send `body`, returning the collector's notice id if it assigned one.
    ///
    /// # Errors
    /// `RateLimited` without calling the transport while the rate limit is in
    /// effect; otherwise the outcome mapped from the collector's answer.
    pub async fn send(&self, body: String) -> Result<Option<String>, NotifyError> {
        if self.rate_limiter.is_blocked(self.clock.now()) {
            tracing::debug!(reset_at = ?self.rate_limiter.reset_at(), "delivery refused, rate limited");
            return Err(NotifyError::RateLimited);
        }

        let request = TransportRequest {
            method: "POST",
            url: self.url.clone(),
            body,
            timeout: self.timeout,
        };
        let response = self.transport.send(request).await?;
        self.interpret(response)
    }

    fn interpret(&self, response: TransportResponse) -> Result<Option<String>, NotifyError> {
        match response.status {
            401 => Err(NotifyError::Unauthorized),
            429 => {
                let delay = response
                    .header(RATE_LIMIT_DELAY_HEADER)
                    .and_then(|value| value.trim().parse::<i64>().ok())
                    .filter(|&secs| secs > 0);
                if let Some(secs) = delay {
                    self.rate_limiter
                        .advance_by(self.clock.now(), Duration::from_secs(secs.unsigned_abs()));
                    tracing::warn!(delay_secs = secs, "collector rate limit in effect");
                }
                Err(NotifyError::RateLimited)
            }
            204 => Ok(None),
            404 => Err(NotifyError::NotFound),
            200..=299 => {
                let json = parse_body(&response.body)?;
                Ok(match json.get("id") {
                    Some(serde_json::Value::String(id)) => Some(id.clone()),
                    Some(serde_json::Value::Number(id)) => Some(id.to_string()),
                    _ => None,
                })
            }
            400..=499 => {
                let json = parse_body(&response.body)?;
                let message = json
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| response.body.trim().to_string(), str::to_string);
                Err(NotifyError::ServerRejected { message })
            }
            status => Err(NotifyError::UnexpectedResponse {
                status,
                body: response.body.trim().to_string(),
            }),
        }
    }
}

fn parse_body(body: &str) -> Result<serde_json::Value, NotifyError> {
    serde_json::from_str(body).map_err(|e| NotifyError::InvalidResponse {
        reason: e.to_string(),
    })
}

/// A notify call parked while offline.
#[derive(Debug)]
pub struct DeliveryJob {
    report: Report,
    scope: Option<Scope>,
    responder: oneshot::Sender<Notice>,
}

impl DeliveryJob {
    /// Create a job and the receiver its outcome is delivered on.
    pub fn new(report: Report, scope: Option<Scope>) -> (Self, oneshot::Receiver<Notice>) {
        let (responder, receiver) = oneshot::channel();
        (
            Self {
                report,
                scope,
                responder,
            },
            receiver,
        )
    }

    /// Complete the job with `notice`. A dropped receiver is ignored.
    pub fn resolve(self, notice: Notice) {
        let _ = self.responder.send(notice);
    }

    /// Split the job into its report, optional isolated scope, and responder.
    pub fn into_parts(self) -> (Report, Option<Scope>, oneshot::Sender<Notice>) {
        (self.report, self.scope, self.responder)
    }
}

/// Bounded FIFO of notify calls made while offline.
///
/// The offline flag lives under the same lock as the jobs, so a job is
/// either parked before the queue goes online and drained with it, or
/// refused and handed back to the caller.
#[derive(Debug)]
pub struct OfflineQueue {
    state: Mutex<OfflineState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct OfflineState {
    offline: bool,
    jobs: VecDeque<DeliveryJob>,
}

impl OfflineQueue {
    /// Create an online queue holding at most `capacity` jobs.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(OfflineState::default()),
            capacity,
        }
    }

    fn state(&self) -> MutexGuard<'_, OfflineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while notify calls are being parked.
    pub fn is_offline(&self) -> bool {
        self.state().offline
    }

    /// Start parking jobs. Returns false if the queue was already offline.
    pub fn go_offline(&self) -> bool {
        let mut state = self.state();
        !std::mem::replace(&mut state.offline, true)
    }

    /// Stop parking jobs and take every parked job in enqueue order.
    ///
    /// Returns `None` if the queue was already online.
    pub fn go_online(&self) -> Option<Vec<DeliveryJob>> {
        let mut state = self.state();
        if !std::mem::replace(&mut state.offline, false) {
            return None;
        }
        Some(state.jobs.drain(..).collect())
    }

    /// Park a job, evicting from the front past capacity.
    ///
    /// Evicted jobs are resolved with `QueueOverflow`. Returns how many were
    /// evicted, or the job itself if the queue is online.
    pub fn enqueue(&self, job: DeliveryJob) -> Result<usize, DeliveryJob> {
        let evicted: Vec<DeliveryJob> = {
            let mut state = self.state();
            if !state.offline {
                return Err(job);
            }
            state.jobs.push_back(job);
            let excess = state.jobs.len().saturating_sub(self.capacity);
            state.jobs.drain(..excess).collect()
        };

        let count = evicted.len();
        if count > 0 {
            tracing::warn!(
                evicted = count,
                capacity = self.capacity,
                "offline queue is too large, dropping oldest notices"
            );
        }
        for job in evicted {
            job.resolve(Notice::failed(NotifyError::QueueOverflow));
        }
        Ok(count)
    }

    /// Number of parked jobs.
    pub fn len(&self) -> usize {
        self.state().jobs.len()
    }

    /// True if no job is parked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of parked jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notice::ErrorReport;
    use crate::infrastructure::mocks::{MockClock, MockTransport};
    use std::time::Instant;

    fn queue(transport: &MockTransport, clock: &MockClock) -> DeliveryQueue {
        DeliveryQueue::new(
            Arc::new(transport.clone()),
            Arc::new(clock.clone()),
            "https://collector.test/api/v3/projects/1/notices?key=k",
            Duration::from_secs(10),
        )
    }

    fn notice() -> Notice {
        Notice::new(ErrorReport::new("E", "m"))
    }

    #[tokio::test]
    async fn test_success_sets_id() {
        let transport = MockTransport::new();
        transport.push_response(TransportResponse::new(201).with_body(r#"{"id":"abc"}"#));
        let clock = MockClock::new(Instant::now());

        let out = queue(&transport, &clock).deliver(notice(), "{}".into()).await;
        assert_eq!(out.id.as_deref(), Some("abc"));
        assert!(out.is_delivered());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].body, "{}");
        assert_eq!(requests[0].timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_numeric_id_and_no_content() {
        let transport = MockTransport::new();
        transport.push_response(TransportResponse::new(200).with_body(r#"{"id":12}"#));
        transport.push_response(TransportResponse::new(204));
        let clock = MockClock::new(Instant::now());
        let queue = queue(&transport, &clock);

        assert_eq!(queue.send("{}".into()).await, Ok(Some("12".to_string())));
        assert_eq!(queue.send("{}".into()).await, Ok(None));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let transport = MockTransport::new();
        transport.push_response(TransportResponse::new(401));
        transport.push_response(TransportResponse::new(404));
        transport.push_response(
            TransportResponse::new(400).with_body(r#"{"message":"invalid notice"}"#),
        );
        transport.push_response(TransportResponse::new(503).with_body(" unavailable \n"));
        transport.push_response(TransportResponse::new(201).with_body("not json"));
        let clock = MockClock::new(Instant::now());
        let queue = queue(&transport, &clock);

        assert_eq!(queue.send("{}".into()).await, Err(NotifyError::Unauthorized));
        assert_eq!(queue.send("{}".into()).await, Err(NotifyError::NotFound));
        assert_eq!(
            queue.send("{}".into()).await,
            Err(NotifyError::ServerRejected {
                message: "invalid notice".to_string()
            })
        );
        assert_eq!(
            queue.send("{}".into()).await,
            Err(NotifyError::UnexpectedResponse {
                status: 503,
                body: "unavailable".to_string()
            })
        );
        assert!(matches!(
            queue.send("{}".into()).await,
            Err(NotifyError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_without_transport_call() {
        let transport = MockTransport::new();
        transport.push_response(TransportResponse::new(429).with_header("x-ratelimit-delay", "5"));
        let clock = MockClock::new(Instant::now());
        let queue = queue(&transport, &clock);

        assert_eq!(queue.send("{}".into()).await, Err(NotifyError::RateLimited));
        assert_eq!(transport.request_count(), 1);

        clock.advance(Duration::from_secs(4));
        assert_eq!(queue.send("{}".into()).await, Err(NotifyError::RateLimited));
        assert_eq!(transport.request_count(), 1);

        clock.advance(Duration::from_secs(1));
        assert!(queue.send("{}".into()).await.is_ok());
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_huge_rate_limit_delay_does_not_overflow() {
        let transport = MockTransport::new();
        transport.push_response(
            TransportResponse::new(429).with_header(RATE_LIMIT_DELAY_HEADER, i64::MAX.to_string()),
        );
        let clock = MockClock::new(Instant::now());
        let queue = queue(&transport, &clock);

        assert_eq!(queue.send("{}".into()).await, Err(NotifyError::RateLimited));

        clock.advance(Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(queue.send("{}".into()).await, Err(NotifyError::RateLimited));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_without_usable_delay() {
        let transport = MockTransport::new();
        transport.push_response(TransportResponse::new(429));
        transport.push_response(TransportResponse::new(429).with_header(RATE_LIMIT_DELAY_HEADER, "soon"));
        transport.push_response(TransportResponse::new(429).with_header(RATE_LIMIT_DELAY_HEADER, "0"));
        let clock = MockClock::new(Instant::now());
        let queue = queue(&transport, &clock);

        for _ in 0..3 {
            assert_eq!(queue.send("{}".into()).await, Err(NotifyError::RateLimited));
        }
        assert_eq!(transport.request_count(), 3);
        assert!(!queue.rate_limiter().is_blocked(clock.now()));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = MockTransport::new();
        transport.push_error("connection refused");
        let clock = MockClock::new(Instant::now());

        let out = queue(&transport, &clock).deliver(notice(), "{}".into()).await;
        assert_eq!(
            out.error.map(|e| e.to_string()).as_deref(),
            Some("transport error: connection refused")
        );
    }

    fn job(message: &str) -> (DeliveryJob, oneshot::Receiver<Notice>) {
        DeliveryJob::new(Report::structured(ErrorReport::new("E", message)), None)
    }

    fn message(job: DeliveryJob) -> String {
        match job.into_parts().0.error {
            crate::domain::report::ReportedError::Structured(report) => report.message,
            _ => String::new(),
        }
    }

    #[tokio::test]
    async fn test_offline_queue_overflow_resolves_oldest() {
        let queue = OfflineQueue::new(2);
        queue.go_offline();
        let mut receivers = Vec::new();
        for i in 0..3 {
            let (job, receiver) = job(&format!("m{}", i));
            receivers.push(receiver);
            assert!(queue.enqueue(job).is_ok());
        }

        assert_eq!(queue.len(), 2);
        let first = receivers.remove(0).await.unwrap();
        assert_eq!(first.error, Some(NotifyError::QueueOverflow));

        let remaining: Vec<_> = queue
            .go_online()
            .unwrap_or_default()
            .into_iter()
            .map(message)
            .collect();
        assert_eq!(remaining, vec!["m1", "m2"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_online_queue_hands_job_back() {
        let queue = OfflineQueue::default();
        let (job, _receiver) = job("late");

        let refused = queue.enqueue(job).unwrap_err();
        assert_eq!(message(refused), "late");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_job_parked_before_going_online_is_drained() {
        let queue = Arc::new(OfflineQueue::default());
        queue.go_offline();

        let parker = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let (job, _receiver) = job("racing");
                queue.enqueue(job).is_ok()
            })
        };
        let drained = queue.go_online().unwrap_or_default();
        let parked = parker.join().unwrap();

        // Either the job made it in before the switch and was drained, or it
        // was handed back; it is never left behind in an online queue.
        assert_eq!(parked, drained.len() == 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_offline_transitions() {
        let queue = OfflineQueue::default();
        assert!(!queue.is_offline());
        assert!(queue.go_online().is_none());
        assert!(queue.go_offline());
        assert!(!queue.go_offline());
        assert!(queue.is_offline());
        assert!(queue.go_online().is_some_and(|jobs| jobs.is_empty()));
        assert!(!queue.is_offline());
        assert_eq!(queue.capacity(), DEFAULT_QUEUE_CAPACITY);
    }
}
