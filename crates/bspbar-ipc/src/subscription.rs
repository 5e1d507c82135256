//! bspwm report subscription
//!
//! `ReportSubscriber` owns the socket and the current report. It runs a
//! single read loop through the states
//!
//! ```text
//! Disconnected -> Connecting -> Subscribed
//!      ^              |              |
//!      +--- backoff --+-- EOF/error -+
//! ```
//!
//! Each complete line is decoded, parsed and reconciled against the last
//! report; the new snapshot is swapped into a `watch` channel and the
//! resulting event is delivered to every listener before the next line is
//! read. A line that fails to parse is published as
//! `SubscriptionEvent::ParseError` and skipped; it never ends the
//! subscription.
//!
//! ## Reconnection
//!
//! - Connect failures and EOF/I/O errors while subscribed schedule a
//!   reconnect after a delay
//! - The delay starts at `RetryPolicy::initial_delay`, doubles on every
//!   consecutive failure, and is capped at `RetryPolicy::max_delay`
//! - A successful subscribe resets the delay and the failure count
//! - With `max_retries` set, the run ends with `MaxRetriesExceeded` once
//!   that many consecutive reconnects have failed
//!
//! Listeners stay registered across reconnects, and the first report after
//! a reconnect is diffed against the last one seen.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::client::{write_command, Transport};
use super::codec::SUBSCRIBE_REPORT;
use super::parser::parse_report_line;
use super::reconcile::{reconcile, ReportChange};
use super::types::Report;
use super::BspwmError;

/// Default per-listener event queue depth
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// Initial delay before reconnecting (1 second)
const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// Maximum delay between reconnect attempts (10 seconds)
const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 10_000;

/// Lower bound on any reconnect delay
const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Reconnect backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed reconnects tolerated; `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    fn first_delay(&self) -> Duration {
        self.initial_delay.max(MIN_RETRY_DELAY)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .min(self.max_delay.max(self.first_delay()))
    }
}

/// Settings for a `ReportSubscriber`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberConfig {
    pub retry: RetryPolicy,
    pub channel_buffer: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
        }
    }
}

/// Where the read loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Connection signal published to listeners
///
/// While the last signal is not `Connected`, the last report is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Error(String),
}

/// Event delivered to every listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Connection {
        state: ConnectionState,
    },
    Report {
        report: Arc<Report>,
        changes: Vec<ReportChange>,
    },
    /// A line or token was skipped
    ParseError {
        line: String,
        reason: String,
    },
}

/// Receiving end of a listener registration
pub type EventReceiver = mpsc::Receiver<SubscriptionEvent>;

/// State shared between the read loop and its handle
#[derive(Debug)]
struct Shared {
    /// `None` once the read loop has ended
    listeners: Mutex<Option<Vec<mpsc::Sender<SubscriptionEvent>>>>,
    buffer: usize,
    state: watch::Sender<SubscriptionState>,
    report: watch::Sender<Option<Arc<Report>>>,
}

impl Shared {
    fn new(buffer: usize) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Disconnected);
        let (report, _) = watch::channel(None);
        Self {
            listeners: Mutex::new(Some(Vec::new())),
            buffer: buffer.max(1),
            state,
            report,
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Option<Vec<mpsc::Sender<SubscriptionEvent>>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listen(&self) -> EventReceiver {
        let (sender, receiver) = mpsc::channel(self.buffer);
        // After the loop ended the sender is dropped here and the receiver
        // yields `None` straight away.
        if let Some(listeners) = self.lock_listeners().as_mut() {
            listeners.push(sender);
        }
        receiver
    }

    /// Deliver `event` to every listener, waiting for queue space
    async fn publish(&self, event: SubscriptionEvent) {
        let senders: Vec<_> = self.lock_listeners().iter().flatten().cloned().collect();

        for sender in &senders {
            if sender.send(event.clone()).await.is_err() {
                trace!("Listener dropped, removing");
            }
        }

        if let Some(listeners) = self.lock_listeners().as_mut() {
            listeners.retain(|s| !s.is_closed());
        }
    }

    fn close(&self) {
        self.lock_listeners().take();
    }

    fn set_state(&self, state: SubscriptionState) {
        self.state.send_replace(state);
    }
}

/// How a subscribed read loop ended
enum ReadEnd {
    Cancelled,
    Closed(String),
}

/// Subscribes to bspwm reports and publishes model updates
///
/// # Example
///
/// ```ignore
/// let transport = UnixTransport::new(get_socket_path(None)?);
/// let subscriber = ReportSubscriber::new(transport, SubscriberConfig::default());
/// let mut events = subscriber.listen();
/// let handle = subscriber.spawn(&tokio::runtime::Handle::current());
///
/// while let Some(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// handle.shutdown().await?;
/// ```
#[derive(Debug)]
pub struct ReportSubscriber<T: Transport> {
    transport: T,
    retry: RetryPolicy,
    shared: Arc<Shared>,
}

impl<T: Transport> ReportSubscriber<T> {
    pub fn new(transport: T, config: SubscriberConfig) -> Self {
        Self {
            transport,
            retry: config.retry,
            shared: Arc::new(Shared::new(config.channel_buffer)),
        }
    }

    /// Register a listener before the loop starts
    pub fn listen(&self) -> EventReceiver {
        self.shared.listen()
    }

    /// Run the read loop as a task on `runtime`
    pub fn spawn(self, runtime: &Handle) -> SubscriptionHandle {
        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let task = runtime.spawn(self.run(cancel.clone()));

        SubscriptionHandle {
            shared,
            cancel,
            task,
        }
    }

    /// Run the read loop until `cancel` fires or retries are exhausted
    ///
    /// On return the socket is closed, the state is `Disconnected` and all
    /// listener channels are closed.
    ///
    /// # Errors
    ///
    /// Returns `BspwmError::MaxRetriesExceeded` if the retry policy has a
    /// limit and it was reached. Cancellation returns `Ok(())`.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), BspwmError> {
        let result = self.run_loop(&cancel).await;
        self.shared.set_state(SubscriptionState::Disconnected);
        self.shared.close();
        result
    }

    async fn run_loop(&self, cancel: &CancellationToken) -> Result<(), BspwmError> {
        let mut last: Option<Arc<Report>> = None;
        let mut delay = self.retry.first_delay();
        let mut failures: u32 = 0;

        loop {
            self.shared.set_state(SubscriptionState::Connecting);

            let connected = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = self.subscribe() => result,
            };

            match connected {
                Ok(stream) => {
                    if failures > 0 {
                        info!(attempts = failures + 1, "bspwm subscription restored");
                    } else {
                        info!(socket = %self.transport.describe(), "Subscribed to bspwm reports");
                    }
                    failures = 0;
                    delay = self.retry.first_delay();

                    self.shared.set_state(SubscriptionState::Subscribed);
                    let event = SubscriptionEvent::Connection {
                        state: ConnectionState::Connected,
                    };
                    if !self.publish(event, cancel).await {
                        return Ok(());
                    }

                    match self.read_reports(stream, &mut last, cancel).await {
                        ReadEnd::Cancelled => return Ok(()),
                        ReadEnd::Closed(reason) => {
                            warn!(reason = %reason, "bspwm report stream ended, reconnecting");
                            self.shared.set_state(SubscriptionState::Disconnected);
                            let event = SubscriptionEvent::Connection {
                                state: ConnectionState::Disconnected,
                            };
                            if !self.publish(event, cancel).await {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    self.shared.set_state(SubscriptionState::Disconnected);
                    let event = SubscriptionEvent::Connection {
                        state: ConnectionState::Error(e.to_string()),
                    };
                    if !self.publish(event, cancel).await {
                        return Ok(());
                    }

                    if let Some(max_retries) = self.retry.max_retries {
                        if failures > max_retries {
                            warn!(
                                attempts = failures,
                                last_error = %e,
                                "Failed to subscribe to bspwm after all retry attempts"
                            );
                            return Err(BspwmError::MaxRetriesExceeded { attempts: failures });
                        }
                    }

                    warn!(
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "bspwm subscription failed, retrying..."
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = sleep(delay) => {}
            }
            if failures > 0 {
                delay = self.retry.next_delay(delay);
            }
        }
    }

    /// Open a connection and send `subscribe report`
    async fn subscribe(&self) -> Result<T::Stream, BspwmError> {
        let mut stream = self.transport.connect().await?;
        write_command(&mut stream, &SUBSCRIBE_REPORT).await?;
        Ok(stream)
    }

    async fn read_reports(
        &self,
        stream: T::Stream,
        last: &mut Option<Arc<Report>>,
        cancel: &CancellationToken,
    ) -> ReadEnd {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => return ReadEnd::Cancelled,
                read = reader.read_until(b'\n', &mut line) => read,
            };

            match read {
                Ok(0) => return ReadEnd::Closed("end of stream".to_string()),
                Ok(n) if line.last() != Some(&b'\n') => {
                    debug!(bytes = n, "Discarding partial report line at end of stream");
                    return ReadEnd::Closed("end of stream".to_string());
                }
                Ok(_) => {}
                Err(e) => return ReadEnd::Closed(BspwmError::ReceiveFailed(e).to_string()),
            }

            if !self.handle_line(&line, last, cancel).await {
                return ReadEnd::Cancelled;
            }
        }
    }

    /// Parse, reconcile and publish one line; `false` if cancelled meanwhile
    async fn handle_line(
        &self,
        line: &[u8],
        last: &mut Option<Arc<Report>>,
        cancel: &CancellationToken,
    ) -> bool {
        let parsed = match parse_report_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Skipping malformed bspwm report line");
                let event = SubscriptionEvent::ParseError {
                    line: String::from_utf8_lossy(line).trim_end().to_string(),
                    reason: e.to_string(),
                };
                return self.publish(event, cancel).await;
            }
        };

        for issue in parsed.issues {
            debug!(%issue, "Skipped out-of-order report token");
            let event = SubscriptionEvent::ParseError {
                line: String::from_utf8_lossy(line).trim_end().to_string(),
                reason: issue.into_error().to_string(),
            };
            if !self.publish(event, cancel).await {
                return false;
            }
        }

        if last.as_deref() == Some(&parsed.report) {
            trace!("Report unchanged");
            return true;
        }
        let changes = reconcile(last.as_deref(), &parsed.report);

        let report = Arc::new(parsed.report);
        self.shared.report.send_replace(Some(Arc::clone(&report)));
        *last = Some(Arc::clone(&report));

        debug!(
            monitors = report.monitors.len(),
            changes = changes.len(),
            "Publishing bspwm report"
        );
        self.publish(SubscriptionEvent::Report { report, changes }, cancel)
            .await
    }

    async fn publish(&self, event: SubscriptionEvent, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.shared.publish(event) => true,
        }
    }
}

/// Handle to a spawned subscription
///
/// Dropping the handle does not stop the task; call `shutdown()`.
#[derive(Debug)]
pub struct SubscriptionHandle {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), BspwmError>>,
}

impl SubscriptionHandle {
    /// Register a listener; it stays registered across reconnects
    pub fn listen(&self) -> EventReceiver {
        self.shared.listen()
    }

    pub fn state(&self) -> SubscriptionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.shared.state.subscribe()
    }

    /// The latest published report
    ///
    /// Stale unless `state()` is `Subscribed`.
    pub fn current_report(&self) -> Option<Arc<Report>> {
        self.shared.report.borrow().clone()
    }

    pub fn watch_report(&self) -> watch::Receiver<Option<Arc<Report>>> {
        self.shared.report.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the read loop, release the socket and wait for the task
    pub async fn shutdown(self) -> Result<(), BspwmError> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the read loop to end on its own
    pub async fn join(self) -> Result<(), BspwmError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Ok(()),
        }
    }
}
