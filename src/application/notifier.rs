//! The notifier: the public error-reporting pipeline.
//!
//! A notify call runs:
//! 1. offline check (parks the call while offline)
//! 2. structuring through the [`Processor`] and notice assembly from the scope
//! 3. the [`FilterChain`]
//! 4. the [`SizeReducer`]
//! 5. the [`DeliveryQueue`]
//!
//! Every outcome is a [`Notice`]. Failures are recorded on `notice.error`.

use crate::application::delivery::{DeliveryJob, DeliveryQueue, OfflineQueue, DEFAULT_QUEUE_CAPACITY};
use crate::application::filters::{Filter, FilterChain, PlatformFilter};
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, PlatformAdapter, Processor, Transport};
use crate::application::scope::Scope;
use crate::application::size_reducer::{SizeReducer, DEFAULT_MAX_LENGTH};
use crate::domain::blacklist::{KeyBlacklist, KeyPattern};
use crate::domain::history::HistoryEntry;
use crate::domain::notice::Notice;
use crate::domain::report::{short_type_name, Report, ReportedError};
use crate::domain::value::{Map, Value};
use crate::error::{BuildError, NotifyError};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::platform::ServerPlatform;
use crate::infrastructure::processor::DisplayProcessor;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};

/// Default collector base URL.
pub const DEFAULT_HOST: &str = "https://api.airbrake.io";

/// Default time budget for one delivery.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest polling interval used by [`Notifier::flush`].
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

const NOTIFIER_NAME: &str = env!("CARGO_PKG_NAME");
const NOTIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");
const NOTIFIER_URL: &str = "https://crates.io/crates/error-notifier";
const LANGUAGE: &str = "Rust";

/// Validated notifier settings.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    project_id: u64,
    project_key: String,
    host: String,
    timeout: Duration,
    environment: Option<String>,
    max_length: usize,
    offline_queue_capacity: usize,
    keys_blacklist: KeyBlacklist,
}

impl NotifierConfig {
    /// Project id.
    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    /// Project key.
    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    /// Collector base URL, without a trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Time budget for one delivery.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Environment name, if configured.
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Byte budget for a serialized notice.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Maximum number of notify calls parked while offline.
    pub fn offline_queue_capacity(&self) -> usize {
        self.offline_queue_capacity
    }

    /// Keys whose values are filtered.
    pub fn keys_blacklist(&self) -> &KeyBlacklist {
        &self.keys_blacklist
    }

    /// Notice endpoint: `<host>/api/v3/projects/<id>/notices?key=<key>`.
    pub fn notices_url(&self) -> String {
        format!(
            "{}/api/v3/projects/{}/notices?key={}",
            self.host, self.project_id, self.project_key
        )
    }
}

/// Builder for [`Notifier`].
#[derive(Debug)]
pub struct NotifierBuilder {
    project_id: u64,
    project_key: String,
    host: String,
    timeout: Duration,
    environment: Option<String>,
    max_length: usize,
    offline_queue_capacity: usize,
    keys_blacklist: Option<Vec<String>>,
    transport: Option<Arc<dyn Transport>>,
    processor: Option<Arc<dyn Processor>>,
    platform: Option<Arc<dyn PlatformAdapter>>,
    clock: Option<Arc<dyn Clock>>,
}

impl NotifierBuilder {
    fn new(project_id: u64, project_key: impl Into<String>) -> Self {
        Self {
            project_id,
            project_key: project_key.into(),
            host: DEFAULT_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
            environment: None,
            max_length: DEFAULT_MAX_LENGTH,
            offline_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keys_blacklist: None,
            transport: None,
            processor: None,
            platform: None,
            clock: None,
        }
    }

    /// Set the collector base URL. A trailing `/` is ignored.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the time budget for one delivery.
    ///
    /// Default: 10 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the key blacklist.
    ///
    /// Entries written as `/expr/` are regular expressions, anything else must
    /// match a key exactly. Patterns are compiled when `build()` is called.
    ///
    /// Default: `/password/` and `/secret/`
    pub fn with_keys_blacklist<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys_blacklist = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the environment name stamped into every notice.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the byte budget for a serialized notice.
    ///
    /// Default: 64000
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set how many notify calls are parked while offline.
    ///
    /// Default: 100
    pub fn with_offline_queue_capacity(mut self, capacity: usize) -> Self {
        self.offline_queue_capacity = capacity;
        self
    }

    /// Set the transport used to reach the collector.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the processor that structures native errors.
    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Set the platform adapter.
    ///
    /// Default: [`ServerPlatform::detect`]
    pub fn with_platform(mut self, platform: Arc<dyn PlatformAdapter>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the notifier.
    ///
    /// # Errors
    /// Returns a `BuildError` if a credential is missing, a limit is zero,
    /// a blacklist pattern does not compile, or no transport is available.
    pub fn build(self) -> Result<Notifier, BuildError> {
        if self.project_id == 0 {
            return Err(BuildError::MissingProjectId);
        }
        if self.project_key.is_empty() {
            return Err(BuildError::MissingProjectKey);
        }
        if self.max_length == 0 {
            return Err(BuildError::ZeroMaxLength);
        }
        if self.offline_queue_capacity == 0 {
            return Err(BuildError::ZeroQueueCapacity);
        }

        let keys_blacklist = match self.keys_blacklist {
            None => KeyBlacklist::default(),
            Some(patterns) => patterns
                .into_iter()
                .map(|pattern| {
                    pattern
                        .parse::<KeyPattern>()
                        .map_err(|e| BuildError::InvalidKeyPattern {
                            pattern: pattern.clone(),
                            reason: e.to_string(),
                        })
                })
                .collect::<Result<KeyBlacklist, _>>()?,
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let processor = self
            .processor
            .unwrap_or_else(|| Arc::new(DisplayProcessor::new()));
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(ServerPlatform::detect()));

        let config = NotifierConfig {
            project_id: self.project_id,
            project_key: self.project_key,
            host: self.host.trim_end_matches('/').to_string(),
            timeout: self.timeout,
            environment: self.environment,
            max_length: self.max_length,
            offline_queue_capacity: self.offline_queue_capacity,
            keys_blacklist,
        };

        let mut filters = FilterChain::with_builtin(Arc::clone(&clock), config.environment());
        filters.push(PlatformFilter::new(Arc::clone(&platform)));

        let delivery = DeliveryQueue::new(
            transport,
            Arc::clone(&clock),
            config.notices_url(),
            config.timeout,
        );

        Ok(Notifier {
            inner: Arc::new(Inner {
                reducer: SizeReducer::new(config.max_length, config.keys_blacklist.clone()),
                offline: OfflineQueue::new(config.offline_queue_capacity),
                config,
                processor,
                platform,
                clock,
                filters: RwLock::new(filters),
                scope: Mutex::new(Scope::new()),
                delivery,
                metrics: Metrics::new(),
                in_flight: AtomicUsize::new(0),
            }),
        })
    }
}

#[cfg(feature = "reqwest-transport")]
fn default_transport() -> Result<Arc<dyn Transport>, BuildError> {
    crate::infrastructure::reqwest_transport::ReqwestTransport::new()
        .map(|transport| Arc::new(transport) as Arc<dyn Transport>)
        .map_err(|e| BuildError::Transport(e.to_string()))
}

#[cfg(not(feature = "reqwest-transport"))]
fn default_transport() -> Result<Arc<dyn Transport>, BuildError> {
    Err(BuildError::MissingTransport)
}

#[derive(Debug)]
struct Inner {
    config: NotifierConfig,
    processor: Arc<dyn Processor>,
    platform: Arc<dyn PlatformAdapter>,
    clock: Arc<dyn Clock>,
    filters: RwLock<FilterChain>,
    scope: Mutex<Scope>,
    reducer: SizeReducer,
    delivery: DeliveryQueue,
    offline: OfflineQueue,
    metrics: Metrics,
    in_flight: AtomicUsize,
}

/// Counts a delivery as in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Error-reporting pipeline.
///
/// Cheap to clone; clones share the scope, filters, rate limit, offline
/// queue and metrics.
///
/// # Example
///
/// ```no_run
/// use error_notifier::{Notifier, Report, Transport};
/// use std::sync::Arc;
///
/// # async fn run(transport: Arc<dyn Transport>) -> Result<(), Box<dyn std::error::Error>> {
/// let notifier = Notifier::builder(1, "project-key")
///     .with_environment("production")
///     .with_transport(transport)
///     .build()?;
///
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// let notice = notifier.notify(Report::new(err).with_param("path", "/var/log")).await;
/// if let Some(error) = &notice.error {
///     eprintln!("notice not delivered: {}", error);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    /// Start building a notifier for a project.
    pub fn builder(project_id: u64, project_key: impl Into<String>) -> NotifierBuilder {
        NotifierBuilder::new(project_id, project_key)
    }

    /// Report an error against the shared scope.
    pub async fn notify(&self, report: impl Into<Report>) -> Notice {
        self.dispatch(report.into(), None).await
    }

    /// Report an error against an isolated scope instead of the shared one.
    pub async fn notify_with_scope(&self, scope: &Scope, report: impl Into<Report>) -> Notice {
        self.dispatch(report.into(), Some(scope.clone())).await
    }

    /// Run `f` and report its error, if any.
    ///
    /// The error is handed back to the caller unchanged once the notice has
    /// resolved.
    ///
    /// ```no_run
    /// # use error_notifier::Notifier;
    /// # async fn run(notifier: &Notifier) -> Result<u16, std::num::ParseIntError> {
    /// let port = notifier.call(|| "80a".parse::<u16>()).await?;
    /// # Ok(port)
    /// # }
    /// ```
    pub async fn call<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: StdError + 'static,
    {
        self.call_with_arguments(Vec::new(), f).await
    }

    /// Like [`Notifier::call`], recording `arguments` as
    /// `params.arguments` on the notice.
    pub async fn call_with_arguments<T, E, F>(&self, arguments: Vec<Value>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: StdError + 'static,
    {
        let result = f();
        if let Err(error) = &result {
            self.notify_call_failure(error, arguments).await;
        }
        result
    }

    /// Await `future` and report its error, if any.
    pub async fn call_async<T, E, Fut>(&self, future: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        let result = future.await;
        if let Err(error) = &result {
            self.notify_call_failure(error, Vec::new()).await;
        }
        result
    }

    async fn notify_call_failure<E>(&self, error: &E, arguments: Vec<Value>) -> Notice
    where
        E: StdError + 'static,
    {
        let type_name = short_type_name(std::any::type_name::<E>());
        let mut report = Report::structured(self.inner.processor.process(type_name, error));
        if !arguments.is_empty() {
            report = report.with_param("arguments", Value::array(arguments));
        }
        self.dispatch(report, None).await
    }

    async fn dispatch(&self, report: Report, scope: Option<Scope>) -> Notice {
        let (report, scope) = if self.inner.offline.is_offline() {
            let (job, receiver) = DeliveryJob::new(report, scope);
            match self.inner.offline.enqueue(job) {
                Ok(evicted) => return self.await_replay(evicted, receiver).await,
                // Went online since the check: deliver now.
                Err(job) => {
                    let (report, scope, _) = job.into_parts();
                    (report, scope)
                }
            }
        } else {
            (report, scope)
        };

        let _in_flight = InFlight::enter(&self.inner.in_flight);
        self.process(report, scope.as_ref()).await
    }

    async fn await_replay(&self, evicted: usize, receiver: oneshot::Receiver<Notice>) -> Notice {
        self.inner.metrics.record_queued();
        if evicted > 0 {
            self.inner.metrics.record_evicted(evicted as u64);
        }
        tracing::debug!(queued = self.inner.offline.len(), "offline, notice queued");

        receiver
            .await
            .unwrap_or_else(|_| Notice::failed(NotifyError::Cancelled))
    }

    async fn process(&self, report: Report, scope: Option<&Scope>) -> Notice {
        let notice = self.assemble(report, scope);
        let errors = notice.errors.clone();

        let filters = self
            .inner
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(mut notice) = filters.apply(notice) else {
            tracing::debug!("notice filtered");
            self.inner.metrics.record_filtered();
            return Notice {
                errors,
                error: Some(NotifyError::Filtered),
                ..Notice::default()
            };
        };

        notice
            .context
            .insert("language".to_string(), Value::from(LANGUAGE));
        notice
            .context
            .insert("notifier".to_string(), notifier_info());

        let body = match self.inner.reducer.reduce(&mut notice) {
            Ok(reduced) => reduced.body,
            Err(error) => {
                tracing::warn!(%error, "notice dropped");
                self.inner.metrics.record_failed();
                notice.error = Some(error);
                return notice;
            }
        };

        let notice = self.inner.delivery.deliver(notice, body).await;
        match &notice.error {
            None => self.inner.metrics.record_sent(),
            Some(error) => {
                tracing::warn!(%error, "notice delivery failed");
                self.inner.metrics.record_failed();
            }
        }
        notice
    }

    fn assemble(&self, report: Report, scope: Option<&Scope>) -> Notice {
        let Report {
            error,
            context,
            params,
            environment,
            session,
        } = report;

        let error = match error {
            ReportedError::Native { type_name, error } => {
                self.inner.processor.process(&type_name, &*error)
            }
            ReportedError::Structured(error) => error,
        };

        let scope_context = match scope {
            Some(scope) => scope.context(),
            None => self.lock_scope().context(),
        };

        let mut notice = Notice::new(error);
        notice
            .context
            .insert("severity".to_string(), Value::from("error"));
        notice.context.extend(scope_context);
        notice.context.extend(context);
        notice.params = params;
        notice.environment = environment;
        notice.session = session;
        notice
    }

    fn lock_scope(&self) -> MutexGuard<'_, Scope> {
        self.inner.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a filter after the built-in and platform filters.
    pub fn add_filter(&self, filter: impl Filter + 'static) {
        self.inner
            .filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(filter);
    }

    /// Merge keys into the shared scope's context.
    pub fn set_context(&self, context: Map) {
        self.lock_scope().set_context(context);
    }

    /// Set one key of the shared scope's context.
    pub fn set_context_value(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock_scope().set_context_value(key, value);
    }

    /// Record a breadcrumb in the shared scope.
    pub fn push_history(&self, entry: HistoryEntry) {
        let now = self.inner.clock.utc_now();
        self.lock_scope().push_history_at(entry, now);
    }

    /// An isolated copy of the shared scope.
    pub fn scope(&self) -> Scope {
        self.lock_scope().clone()
    }

    /// Stop delivering; notify calls are parked until [`on_online`](Self::on_online).
    pub fn on_offline(&self) {
        if self.inner.offline.go_offline() {
            tracing::debug!("notifier offline");
            self.inner.platform.on_offline();
        }
    }

    /// Resume delivering and replay parked notify calls in order.
    pub async fn on_online(&self) {
        let Some(jobs) = self.inner.offline.go_online() else {
            return;
        };
        self.inner.platform.on_online();

        if !jobs.is_empty() {
            tracing::debug!(jobs = jobs.len(), "notifier online, replaying queued notices");
        }
        for job in jobs {
            let (report, scope, responder) = job.into_parts();
            let notice = {
                let _in_flight = InFlight::enter(&self.inner.in_flight);
                self.process(report, scope.as_ref()).await
            };
            let _ = responder.send(notice);
        }
    }

    /// True while notify calls are being parked.
    pub fn is_offline(&self) -> bool {
        self.inner.offline.is_offline()
    }

    /// Number of parked notify calls.
    pub fn queued(&self) -> usize {
        self.inner.offline.len()
    }

    /// Number of notify calls currently being delivered.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Wait for in-flight deliveries to finish.
    ///
    /// Polls every `timeout / 100` (at least 10ms) on a fixed schedule. Returns
    /// true once nothing is in flight, false at the first poll at or past
    /// `timeout`. Deliveries are not cancelled either way.
    pub async fn flush(&self, timeout: Duration) -> bool {
        if self.in_flight() == 0 || timeout.is_zero() {
            return true;
        }

        let period = (timeout / 100).max(MIN_FLUSH_INTERVAL);
        let start = time::Instant::now();
        let deadline = start + timeout;
        let mut ticks = time::interval_at(start + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let tick = ticks.tick().await;
            if self.in_flight() == 0 {
                return true;
            }
            if tick >= deadline {
                tracing::warn!(
                    in_flight = self.in_flight(),
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "flush timed out"
                );
                return false;
            }
        }
    }

    /// Delivery outcome counters.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// The validated configuration.
    pub fn config(&self) -> &NotifierConfig {
        &self.inner.config
    }

    /// The notice endpoint URL.
    pub fn url(&self) -> &str {
        self.inner.delivery.url()
    }
}

fn notifier_info() -> Value {
    let mut info = Map::new();
    info.insert("name".to_string(), Value::from(NOTIFIER_NAME));
    info.insert("version".to_string(), Value::from(NOTIFIER_VERSION));
    info.insert("url".to_string(), Value::from(NOTIFIER_URL));
    Value::object(info)
}
