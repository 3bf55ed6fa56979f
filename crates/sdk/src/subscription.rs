use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    sync::{Notify, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::{
    channel::{ChannelConnection, ChannelEventKind, ChannelListeners, ChannelSignal},
    error::{PhaJayError, Result},
    listeners::panic_message,
    transport::{ChannelTarget, ChannelTransport, SseTransport},
    types::{
        PaymentEvent, PaymentStatus, SubscriptionState, Termination, WatchOutcome, defaults,
    },
};

pub type PaymentCallback = Arc<dyn Fn(&PaymentEvent) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&PhaJayError) + Send + Sync>;
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Configuration for one transaction watch
///
/// All callbacks are optional, but a subscription without
/// `on_payment_received` can only be observed through
/// [`SubscriptionService::watch`].
#[derive(Clone)]
pub struct SubscriptionConfig {
    /// Base URL of the real-time channel
    pub channel_url: String,

    /// Merchant secret key, sent as `Basic base64(secret_key)`
    pub secret_key: String,

    /// Transaction to watch
    pub transaction_id: String,

    /// How long to wait for a terminal event after connecting
    pub fallback_timeout: Duration,

    on_payment_received: Option<PaymentCallback>,
    on_error: Option<ErrorCallback>,
    on_connect: Option<LifecycleCallback>,
    on_disconnect: Option<LifecycleCallback>,
}

impl std::fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("channel_url", &self.channel_url)
            .field("transaction_id", &self.transaction_id)
            .field("fallback_timeout", &self.fallback_timeout)
            .finish_non_exhaustive()
    }
}

impl SubscriptionConfig {
    pub fn new(
        channel_url: impl Into<String>,
        secret_key: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self {
            channel_url: channel_url.into(),
            secret_key: secret_key.into(),
            transaction_id: transaction_id.into(),
            fallback_timeout: Duration::from_secs(defaults::FALLBACK_TIMEOUT_SECS),
            on_payment_received: None,
            on_error: None,
            on_connect: None,
            on_disconnect: None,
        }
    }

    /// Set the fallback timeout
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    /// Called once with the successful (or fallback) payment event
    pub fn on_payment_received(
        mut self,
        callback: impl Fn(&PaymentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_payment_received = Some(Arc::new(callback));
        self
    }

    /// Called on connection failures and on a failed payment
    pub fn on_error(mut self, callback: impl Fn(&PhaJayError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_connect(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(callback));
        self
    }

    pub fn on_disconnect(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(callback));
        self
    }
}

/// Progress published to `watch()` callers
#[derive(Debug, Clone)]
enum Progress {
    Pending,
    Done(WatchOutcome),
    Lost(String),
}

struct Inner {
    state: SubscriptionState,

    /// Bumped on every connect attempt; signals from older attempts are ignored
    epoch: u64,

    connection: Option<ChannelConnection>,
    timer: Option<JoinHandle<()>>,
}

impl Inner {
    /// Cancel the fallback timer and close the connection
    fn release(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

struct Shared {
    config: SubscriptionConfig,
    inner: Mutex<Inner>,
    progress: watch::Sender<Progress>,

    /// Woken when a handshake leaves `Connecting`
    handshake: Notify,
}

/// Real-time watch of one transaction's payment status
///
/// Opens the gateway's event channel for the configured transaction and
/// delivers at most one terminal outcome:
///
/// - a `success` event invokes `on_payment_received`,
/// - a `failed` event invokes `on_error` with [`PhaJayError::PaymentFailed`],
/// - silence for `fallback_timeout` after connecting invokes
///   `on_payment_received` with a synthesized event
///   ([`PaymentEvent::synthesized`] is set). The fallback is a convenience for
///   sandboxes without settlement callbacks and does not prove the payment settled.
///
/// After the terminal outcome the connection and timer are released and
/// `on_disconnect` fires. Events for other transactions and `pending`
/// events are ignored.
///
/// # Example
///
/// ```ignore
/// use phajay_sdk::{SubscriptionConfig, SubscriptionService};
///
/// let config = SubscriptionConfig::new("https://payment-gateway.phajay.co", "secret", "TX1")
///     .on_payment_received(|event| println!("paid: {}", event.transaction_id))
///     .on_error(|error| eprintln!("payment error: {}", error));
///
/// let subscription = SubscriptionService::new(config);
/// subscription.connect().await?;
/// ```
pub struct SubscriptionService {
    shared: Arc<Shared>,
    transport: Arc<dyn ChannelTransport>,
}

impl SubscriptionService {
    /// Create a subscription using the Server-Sent Events transport
    pub fn new(config: SubscriptionConfig) -> Self {
        Self::with_transport(config, Arc::new(SseTransport::new()))
    }

    /// Create a subscription over a custom channel transport
    pub fn with_transport(config: SubscriptionConfig, transport: Arc<dyn ChannelTransport>) -> Self {
        let (progress, _) = watch::channel(Progress::Pending);

        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    state: SubscriptionState::Idle,
                    epoch: 0,
                    connection: None,
                    timer: None,
                }),
                progress,
                handshake: Notify::new(),
            }),
            transport,
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.shared.config.transaction_id
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> SubscriptionState {
        self.shared.inner.lock().state
    }

    /// Open the channel and start watching
    ///
    /// Configuration problems are returned without attempting a connection.
    /// A failed open is reported through `on_error` as well as returned, and
    /// leaves the subscription idle so `connect()` can be retried.
    ///
    /// A call made while another handshake is in flight waits for that
    /// handshake and reports its result.
    pub async fn connect(&self) -> Result<()> {
        let config = &self.shared.config;
        let target = ChannelTarget::new(
            &config.channel_url,
            &config.secret_key,
            &config.transaction_id,
        )?;

        let handshake = self.shared.handshake.notified();
        let epoch = {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                SubscriptionState::Connected => return Ok(()),
                SubscriptionState::Terminated(_) => return Err(PhaJayError::SubscriptionClosed),
                SubscriptionState::Connecting => None,
                SubscriptionState::Idle => {
                    inner.state = SubscriptionState::Connecting;
                    inner.epoch += 1;
                    Some(inner.epoch)
                }
            }
        };
        let Some(epoch) = epoch else {
            handshake.await;
            return match self.state() {
                SubscriptionState::Idle => Err(PhaJayError::Connection(
                    "Channel handshake failed".to_string(),
                )),
                SubscriptionState::Terminated(Termination::Disconnected) => {
                    Err(PhaJayError::SubscriptionClosed)
                }
                _ => Ok(()),
            };
        };
        drop(handshake);
        self.shared.progress.send_replace(Progress::Pending);

        info!(
            transaction_id = %target.transaction_id,
            url = %target.url,
            "Connecting to payment channel"
        );

        let stream = match self.transport.open(&target).await {
            Ok(stream) => stream,
            Err(e) => {
                let error = match e {
                    PhaJayError::Connection(reason) => PhaJayError::Connection(reason),
                    other => PhaJayError::Connection(other.to_string()),
                };

                let back_to_idle = {
                    let mut inner = self.shared.inner.lock();
                    let current = inner.epoch == epoch
                        && inner.state == SubscriptionState::Connecting;
                    if current {
                        inner.state = SubscriptionState::Idle;
                    }
                    current
                };
                self.shared.handshake.notify_waiters();

                error!(
                    transaction_id = %target.transaction_id,
                    error = %error,
                    "Failed to connect to payment channel"
                );
                if back_to_idle {
                    self.shared.notify_error(&error);
                }
                return Err(error);
            }
        };

        let connected = {
            let mut inner = self.shared.inner.lock();
            let current =
                inner.epoch == epoch && inner.state == SubscriptionState::Connecting;
            if current {
                inner.state = SubscriptionState::Connected;
            }
            current
        };
        self.shared.handshake.notify_waiters();
        if !connected {
            debug!(
                transaction_id = %target.transaction_id,
                "Subscription ended during handshake, dropping channel"
            );
            return Ok(());
        }

        info!(transaction_id = %target.transaction_id, "Connected to payment channel");
        self.shared.notify_connect();

        // Armed only after on_connect; no terminal callback may precede it
        let listeners = self.shared.channel_listeners(epoch);
        let mut inner = self.shared.inner.lock();
        if inner.epoch != epoch || inner.state != SubscriptionState::Connected {
            return Ok(());
        }
        inner.connection = Some(ChannelConnection::spawn(
            target.transaction_id.clone(),
            stream,
            listeners,
        ));
        inner.timer = Some(spawn_fallback_timer(
            Arc::downgrade(&self.shared),
            epoch,
            self.shared.config.fallback_timeout,
        ));

        Ok(())
    }

    /// Stop watching. Idempotent, and safe before `connect()`.
    ///
    /// No callback other than `on_disconnect` fires afterwards; `on_disconnect`
    /// fires only if the channel was connected.
    pub fn disconnect(&self) {
        let was_connected = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_terminated() {
                return;
            }
            let was_connected = inner.state == SubscriptionState::Connected;
            inner.state = SubscriptionState::Terminated(Termination::Disconnected);
            inner.release();
            was_connected
        };

        info!(transaction_id = %self.transaction_id(), "Disconnected from payment channel");
        self.shared
            .progress
            .send_replace(Progress::Done(WatchOutcome::Cancelled));
        if was_connected {
            self.shared.notify_disconnect();
        }
    }

    /// Connect (if needed) and wait for the outcome
    ///
    /// A lost connection resolves to [`PhaJayError::ConnectionLost`]; the
    /// subscription is then idle and `watch()` may be called again.
    pub async fn watch(&self) -> Result<WatchOutcome> {
        let mut progress = self.shared.progress.subscribe();
        self.connect().await?;

        let progress = progress
            .wait_for(|p| !matches!(p, Progress::Pending))
            .await
            .map_err(|_| PhaJayError::SubscriptionClosed)?
            .clone();

        match progress {
            Progress::Done(outcome) => Ok(outcome),
            Progress::Lost(reason) => Err(PhaJayError::ConnectionLost(reason)),
            Progress::Pending => Err(PhaJayError::SubscriptionClosed),
        }
    }
}

impl Drop for SubscriptionService {
    fn drop(&mut self) {
        // Release resources without callbacks
        self.shared.inner.lock().release();
    }
}

impl Shared {
    /// Listeners routing channel signals of connection `epoch` back into the state machine
    fn channel_listeners(self: &Arc<Self>, epoch: u64) -> Arc<ChannelListeners> {
        let listeners = Arc::new(ChannelListeners::new());

        let weak = Arc::downgrade(self);
        listeners.on(
            ChannelEventKind::Payment,
            Arc::new(move |signal: &ChannelSignal| {
                if let (Some(shared), ChannelSignal::Payment(event)) = (weak.upgrade(), signal) {
                    shared.handle_payment(epoch, event);
                }
            }),
        );

        let weak = Arc::downgrade(self);
        listeners.once(
            ChannelEventKind::Closed,
            Arc::new(move |signal: &ChannelSignal| {
                if let (Some(shared), ChannelSignal::Closed(reason)) = (weak.upgrade(), signal) {
                    shared.handle_closed(epoch, reason);
                }
            }),
        );

        listeners
    }

    fn handle_payment(&self, epoch: u64, event: &PaymentEvent) {
        let transaction_id = &self.config.transaction_id;
        if &event.transaction_id != transaction_id {
            debug!(
                transaction_id = %transaction_id,
                event_transaction_id = %event.transaction_id,
                "Ignoring event for another transaction"
            );
            return;
        }

        if !event.is_terminal() {
            debug!(
                transaction_id = %transaction_id,
                status = %event.status,
                "Ignoring non-terminal payment event"
            );
            return;
        }

        if event.status == PaymentStatus::Success {
            self.finish(
                epoch,
                Termination::Success,
                WatchOutcome::Received(event.clone()),
            );
        } else {
            self.finish(epoch, Termination::Error, WatchOutcome::Failed(event.clone()));
        }
    }

    fn handle_closed(&self, epoch: u64, reason: &str) {
        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || inner.state != SubscriptionState::Connected {
                return;
            }
            inner.state = SubscriptionState::Idle;
            inner.release();
        }

        warn!(
            transaction_id = %self.config.transaction_id,
            reason = %reason,
            "Payment channel lost"
        );
        self.progress
            .send_replace(Progress::Lost(reason.to_string()));
        self.notify_error(&PhaJayError::ConnectionLost(reason.to_string()));
    }

    fn handle_timeout(&self, epoch: u64) -> bool {
        self.finish(
            epoch,
            Termination::Timeout,
            WatchOutcome::TimedOut(PaymentEvent::fallback_success(
                self.config.transaction_id.clone(),
            )),
        )
    }

    /// First terminal transition wins; later ones are no-ops.
    /// Returns whether this call performed the transition.
    fn finish(&self, epoch: u64, termination: Termination, outcome: WatchOutcome) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || inner.state != SubscriptionState::Connected {
                return false;
            }
            inner.state = SubscriptionState::Terminated(termination);
            inner.release();
        }

        let transaction_id = &self.config.transaction_id;
        match &outcome {
            WatchOutcome::Received(event) => {
                info!(transaction_id = %transaction_id, "Payment received");
                self.notify_payment(event)
            }
            WatchOutcome::TimedOut(event) => {
                warn!(
                    transaction_id = %transaction_id,
                    timeout_secs = self.config.fallback_timeout.as_secs_f64(),
                    "No payment event before fallback timeout, reporting a synthesized success (not a gateway confirmation)"
                );
                self.notify_payment(event)
            }
            WatchOutcome::Failed(event) => {
                warn!(transaction_id = %transaction_id, "Payment failed");
                self.notify_error(&PhaJayError::PaymentFailed(event.clone()))
            }
            WatchOutcome::Cancelled => {}
        }
        self.progress.send_replace(Progress::Done(outcome));
        self.notify_disconnect();
        true
    }

    fn notify_payment(&self, event: &PaymentEvent) {
        if let Some(callback) = &self.config.on_payment_received {
            guarded("on_payment_received", || callback(event));
        }
    }

    fn notify_error(&self, error: &PhaJayError) {
        if let Some(callback) = &self.config.on_error {
            guarded("on_error", || callback(error));
        }
    }

    fn notify_connect(&self) {
        if let Some(callback) = &self.config.on_connect {
            guarded("on_connect", || callback());
        }
    }

    fn notify_disconnect(&self) {
        if let Some(callback) = &self.config.on_disconnect {
            guarded("on_disconnect", || callback());
        }
    }
}

/// The deadline is fixed when the timer is armed, not when the task first runs
fn spawn_fallback_timer(shared: Weak<Shared>, epoch: u64, timeout: Duration) -> JoinHandle<()> {
    let deadline = Instant::now() + timeout;
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        if let Some(shared) = shared.upgrade() {
            shared.handle_timeout(epoch);
        }
    })
}

/// Run a caller-supplied callback; a panic is logged and swallowed
fn guarded(callback: &'static str, f: impl FnOnce()) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(f)) {
        error!(
            callback = callback,
            error = %panic_message(&panic),
            "Subscription callback panicked"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::channel::mpsc;

    use super::*;
    use crate::transport::ChannelStream;

    #[derive(Debug, Clone, PartialEq)]
    enum Observed {
        Connect,
        Payment(PaymentEvent),
        Error(String),
        Disconnect,
    }

    /// In-memory transport; every `open` creates a fresh channel the test can push into
    #[derive(Default)]
    struct ScriptedTransport {
        channels: Mutex<Vec<mpsc::UnboundedSender<Result<PaymentEvent>>>>,
        refuse: Mutex<Option<String>>,
        opened: AtomicUsize,
        /// When set, `open` waits for a permit before answering
        gate: Mutex<Option<Arc<Notify>>>,
    }

    impl ScriptedTransport {
        fn refusing(reason: &str) -> Self {
            let transport = Self::default();
            *transport.refuse.lock() = Some(reason.to_string());
            transport
        }

        fn gated(gate: &Arc<Notify>) -> Self {
            let transport = Self::default();
            *transport.gate.lock() = Some(Arc::clone(gate));
            transport
        }

        fn accept(&self) {
            *self.refuse.lock() = None;
        }

        fn push(&self, transaction_id: &str, status: PaymentStatus) {
            let event = PaymentEvent::new(transaction_id, status, serde_json::json!({}));
            if let Some(tx) = self.channels.lock().last() {
                let _ = tx.unbounded_send(Ok(event));
            }
        }

        fn drop_connection(&self, reason: &str) {
            if let Some(tx) = self.channels.lock().last() {
                let _ = tx.unbounded_send(Err(PhaJayError::ConnectionLost(reason.to_string())));
            }
        }

        fn is_closed(&self) -> bool {
            self.channels
                .lock()
                .last()
                .map(|tx| tx.is_closed())
                .unwrap_or(true)
        }
    }

    #[async_trait]
    impl ChannelTransport for ScriptedTransport {
        async fn open(&self, _target: &ChannelTarget) -> Result<ChannelStream> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let refused = self.refuse.lock().clone();
            if let Some(reason) = refused {
                return Err(PhaJayError::Connection(reason));
            }
            let (tx, rx) = mpsc::unbounded();
            self.channels.lock().push(tx);
            Ok(Box::pin(rx))
        }
    }

    fn recorded_config(
        transaction_id: &str,
        log: &Arc<Mutex<Vec<Observed>>>,
    ) -> SubscriptionConfig {
        let (on_connect, on_payment, on_error, on_disconnect) = (
            Arc::clone(log),
            Arc::clone(log),
            Arc::clone(log),
            Arc::clone(log),
        );
        SubscriptionConfig::new("https://rt.example.com", "secret", transaction_id)
            .on_connect(move || on_connect.lock().push(Observed::Connect))
            .on_payment_received(move |event| on_payment.lock().push(Observed::Payment(event.clone())))
            .on_error(move |error| on_error.lock().push(Observed::Error(error.to_string())))
            .on_disconnect(move || on_disconnect.lock().push(Observed::Disconnect))
    }

    fn setup(
        transaction_id: &str,
        transport: ScriptedTransport,
    ) -> (SubscriptionService, Arc<ScriptedTransport>, Arc<Mutex<Vec<Observed>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(transport);
        let service = SubscriptionService::with_transport(
            recorded_config(transaction_id, &log),
            Arc::clone(&transport) as Arc<dyn ChannelTransport>,
        );
        (service, transport, log)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn payments(log: &Arc<Mutex<Vec<Observed>>>) -> Vec<PaymentEvent> {
        log.lock()
            .iter()
            .filter_map(|o| match o {
                Observed::Payment(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(log: &Arc<Mutex<Vec<Observed>>>, observed: &Observed) -> usize {
        log.lock().iter().filter(|o| *o == observed).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_then_failed_is_ignored() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();
        assert_eq!(service.state(), SubscriptionState::Connected);

        transport.push("TX1", PaymentStatus::Success);
        settle().await;
        transport.push("TX1", PaymentStatus::Failed);
        settle().await;

        let received = payments(&log);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].transaction_id, "TX1");
        assert_eq!(received[0].status, PaymentStatus::Success);
        assert!(!received[0].synthesized);
        assert_eq!(
            *log.lock(),
            vec![
                Observed::Connect,
                Observed::Payment(received[0].clone()),
                Observed::Disconnect
            ]
        );
        assert_eq!(
            service.state(),
            SubscriptionState::Terminated(Termination::Success)
        );
        assert!(transport.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_payment_reports_error_once() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();

        transport.push("TX1", PaymentStatus::Failed);
        settle().await;
        transport.push("TX1", PaymentStatus::Success);
        settle().await;
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;

        assert!(payments(&log).is_empty());
        let errors: Vec<_> = log
            .lock()
            .iter()
            .filter(|o| matches!(o, Observed::Error(_)))
            .cloned()
            .collect();
        assert_eq!(
            errors,
            vec![Observed::Error("Payment failed for transaction TX1".to_string())]
        );
        assert_eq!(
            service.state(),
            SubscriptionState::Terminated(Termination::Error)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_reports_error_and_stays_idle() {
        let (service, transport, log) =
            setup("TX1", ScriptedTransport::refusing("connection refused"));

        let result = service.connect().await;
        assert!(matches!(result, Err(PhaJayError::Connection(_))));
        assert_eq!(service.state(), SubscriptionState::Idle);
        assert_eq!(
            *log.lock(),
            vec![Observed::Error("Connection error: connection refused".to_string())]
        );

        // No automatic retry, but the caller may connect again
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(transport.opened.load(Ordering::SeqCst), 1);

        transport.accept();
        service.connect().await.unwrap();
        assert_eq!(service.state(), SubscriptionState::Connected);
        assert_eq!(count(&log, &Observed::Connect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_timeout_synthesizes_success() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        settle().await;
        assert!(payments(&log).is_empty());

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;

        let received = payments(&log);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].transaction_id, "TX1");
        assert_eq!(received[0].status, PaymentStatus::Success);
        assert!(received[0].synthesized);
        assert_eq!(
            service.state(),
            SubscriptionState::Terminated(Termination::Timeout)
        );
        assert_eq!(count(&log, &Observed::Disconnect), 1);
        assert!(transport.is_closed());

        // A late real event changes nothing
        transport.push("TX1", PaymentStatus::Success);
        settle().await;
        assert_eq!(payments(&log).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_matching_events_are_ignored() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();

        transport.push("TX2", PaymentStatus::Success);
        transport.push("TX2", PaymentStatus::Failed);
        transport.push("TX1", PaymentStatus::Pending);
        settle().await;

        assert_eq!(*log.lock(), vec![Observed::Connect]);
        assert_eq!(service.state(), SubscriptionState::Connected);
        assert!(!transport.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_prevents_terminal_callbacks() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();

        service.disconnect();
        service.disconnect();
        transport.push("TX1", PaymentStatus::Success);
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;

        assert_eq!(*log.lock(), vec![Observed::Connect, Observed::Disconnect]);
        assert_eq!(
            service.state(),
            SubscriptionState::Terminated(Termination::Disconnected)
        );
        assert!(transport.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_before_connect() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());

        service.disconnect();
        service.disconnect();
        assert!(log.lock().is_empty());

        let result = service.connect().await;
        assert!(matches!(result, Err(PhaJayError::SubscriptionClosed)));
        assert_eq!(transport.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_secret_is_reported_synchronously() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport::default());
        let mut config = recorded_config("TX1", &log);
        config.secret_key = String::new();
        let service = SubscriptionService::with_transport(
            config,
            Arc::clone(&transport) as Arc<dyn ChannelTransport>,
        );

        let result = service.connect().await;
        assert!(matches!(result, Err(PhaJayError::Configuration(_))));
        assert_eq!(transport.opened.load(Ordering::SeqCst), 0);
        assert!(log.lock().is_empty());
        assert_eq!(service.state(), SubscriptionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_twice_opens_once() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();
        service.connect().await.unwrap();

        assert_eq!(transport.opened.load(Ordering::SeqCst), 1);
        assert_eq!(count(&log, &Observed::Connect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_lost_returns_to_idle() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();

        transport.drop_connection("reset by peer");
        settle().await;

        assert_eq!(service.state(), SubscriptionState::Idle);
        assert_eq!(
            *log.lock(),
            vec![
                Observed::Connect,
                Observed::Error("Connection lost: reset by peer".to_string())
            ]
        );

        // The old fallback timer was cancelled with the connection
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert!(payments(&log).is_empty());

        service.connect().await.unwrap();
        transport.push("TX1", PaymentStatus::Success);
        settle().await;
        assert_eq!(payments(&log).len(), 1);
        assert_eq!(transport.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_does_not_break_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport::default());
        let on_disconnect = Arc::clone(&log);
        let config = SubscriptionConfig::new("https://rt.example.com", "secret", "TX1")
            .on_payment_received(|_| panic!("consumer bug"))
            .on_disconnect(move || on_disconnect.lock().push(Observed::Disconnect));
        let service = SubscriptionService::with_transport(
            config,
            Arc::clone(&transport) as Arc<dyn ChannelTransport>,
        );

        service.connect().await.unwrap();
        transport.push("TX1", PaymentStatus::Success);
        settle().await;

        assert_eq!(
            service.state(),
            SubscriptionState::Terminated(Termination::Success)
        );
        assert_eq!(*log.lock(), vec![Observed::Disconnect]);
        assert!(transport.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_subscriptions() {
        let (first, first_transport, first_log) = setup("TX1", ScriptedTransport::default());
        let (second, second_transport, second_log) = setup("TX2", ScriptedTransport::default());
        first.connect().await.unwrap();
        second.connect().await.unwrap();

        second_transport.push("TX2", PaymentStatus::Success);
        settle().await;

        assert_eq!(payments(&second_log).len(), 1);
        assert!(payments(&first_log).is_empty());
        assert_eq!(first.state(), SubscriptionState::Connected);
        assert!(!first_transport.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_received() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = SubscriptionService::with_transport(
            SubscriptionConfig::new("https://rt.example.com", "secret", "TX1"),
            Arc::clone(&transport) as Arc<dyn ChannelTransport>,
        );

        let pusher = Arc::clone(&transport);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            pusher.push("TX1", PaymentStatus::Success);
        });

        match service.watch().await.unwrap() {
            WatchOutcome::Received(event) => assert_eq!(event.transaction_id, "TX1"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_timed_out() {
        let service = SubscriptionService::with_transport(
            SubscriptionConfig::new("https://rt.example.com", "secret", "TX1")
                .with_fallback_timeout(Duration::from_secs(3)),
            Arc::new(ScriptedTransport::default()),
        );

        match service.watch().await.unwrap() {
            WatchOutcome::TimedOut(event) => {
                assert_eq!(event.transaction_id, "TX1");
                assert!(event.synthesized);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_connection_lost() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = SubscriptionService::with_transport(
            SubscriptionConfig::new("https://rt.example.com", "secret", "TX1"),
            Arc::clone(&transport) as Arc<dyn ChannelTransport>,
        );

        let dropper = Arc::clone(&transport);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            dropper.drop_connection("gone");
        });

        let result = service.watch().await;
        assert!(matches!(result, Err(PhaJayError::ConnectionLost(_))));
        assert_eq!(service.state(), SubscriptionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connect_waits_for_handshake() {
        let gate = Arc::new(Notify::new());
        let (service, transport, log) = setup("TX1", ScriptedTransport::gated(&gate));

        let (first, (second, state_after_second), _) = tokio::join!(
            service.connect(),
            async {
                settle().await;
                assert_eq!(service.state(), SubscriptionState::Connecting);
                let result = service.connect().await;
                (result, service.state())
            },
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                gate.notify_one();
            }
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(state_after_second, SubscriptionState::Connected);
        assert_eq!(transport.opened.load(Ordering::SeqCst), 1);
        assert_eq!(count(&log, &Observed::Connect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connect_reports_failed_handshake() {
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport::gated(&gate);
        *transport.refuse.lock() = Some("connection refused".to_string());
        let (service, _transport, log) = setup("TX1", transport);

        let (first, second, _) = tokio::join!(
            service.connect(),
            async {
                settle().await;
                service.connect().await
            },
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                gate.notify_one();
            }
        );

        assert!(matches!(first, Err(PhaJayError::Connection(_))));
        assert!(matches!(second, Err(PhaJayError::Connection(_))));
        assert_eq!(service.state(), SubscriptionState::Idle);
        // Only the attempt that owned the handshake reports through on_error
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_deadline_starts_at_connect() {
        let (service, _transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();

        // The clock moves before the timer task ever runs
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(payments(&log).len(), 1);
        assert!(payments(&log)[0].synthesized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_timeout_after_payment_is_ignored() {
        let (service, transport, log) = setup("TX1", ScriptedTransport::default());
        service.connect().await.unwrap();
        let epoch = service.shared.inner.lock().epoch;

        transport.push("TX1", PaymentStatus::Success);
        settle().await;

        assert!(!service.shared.handle_timeout(epoch));
        let received = payments(&log);
        assert_eq!(received.len(), 1);
        assert!(!received[0].synthesized);
        assert_eq!(
            service.state(),
            SubscriptionState::Terminated(Termination::Success)
        );
    }

    #[tokio::test]
    async fn test_silent_channel_handshake_fails_connect() {
        use wiremock::{
            Mock, MockServer, ResponseTemplate,
            matchers::{method, path},
        };

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/TX1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("", "text/event-stream")
                    .set_delay(Duration::from_secs(120)),
            )
            .mount(&server)
            .await;

        let log = Arc::new(Mutex::new(Vec::new()));
        let on_error = Arc::clone(&log);
        let config = SubscriptionConfig::new(server.uri(), "secret", "TX1")
            .with_fallback_timeout(Duration::from_secs(1))
            .on_error(move |error| on_error.lock().push(Observed::Error(error.to_string())));
        let service = SubscriptionService::with_transport(
            config,
            Arc::new(SseTransport::new().with_handshake_timeout(Duration::from_millis(200))),
        );

        let result = tokio::time::timeout(Duration::from_secs(10), service.watch())
            .await
            .expect("watch should not hang on a silent channel");
        assert!(matches!(result, Err(PhaJayError::Connection(_))));
        assert_eq!(service.state(), SubscriptionState::Idle);
        assert_eq!(log.lock().len(), 1);
    }
}
