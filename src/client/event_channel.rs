//! Client connection manager.
//!
//! One supervisor task per channel owns the push connection: it opens the
//! stream, flushes queued events, pumps inbound frames into the
//! [`EventBus`], and retries with capped exponential backoff when the
//! stream fails or closes. Only `disconnect()` stops it, so at most one
//! reconnect is ever pending.
//!
//! ```text
//! Disconnected ─connect()─► Connecting ─open ok─► Connected
//!                              ▲                    │ lost / flush failed
//!                              └── Reconnecting ◄───┘
//!                                  (sleep delay(n))
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::event_bus::EventBus;
use crate::domain::foundation::{ClientId, Timestamp};
use crate::domain::sync::{
    BackoffPolicy, ClientSession, ConnectionState, EventKind, PendingEvent, PushMessage,
};
use crate::ports::{Clock, EventSender, FrameStream, PushTransport, TransportError};

/// Channel tuning.
#[derive(Debug, Clone, Default)]
pub struct ChannelSettings {
    pub backoff: BackoffPolicy,
    /// Drop-oldest bound on the outbound queue; `None` is unbounded.
    pub max_queue_len: Option<usize>,
}

/// What happened to one `send_event` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered immediately.
    Sent,
    /// Held in the outbound queue until the next flush.
    Queued,
    /// Not delivered and not queued: the server refused it for good, or
    /// it was a leaving notice with no channel up.
    Dropped,
}

pub struct EventChannel {
    inner: Arc<Inner>,
    supervisor: Mutex<Option<Supervisor>>,
}

struct Supervisor {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Inner {
    session: Mutex<ClientSession>,
    transport: Arc<dyn PushTransport>,
    sender: Arc<dyn EventSender>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    backoff: BackoffPolicy,
    state_tx: watch::Sender<ConnectionState>,
    send_failed: Notify,
}

impl EventChannel {
    pub fn new(
        client_id: ClientId,
        transport: Arc<dyn PushTransport>,
        sender: Arc<dyn EventSender>,
        clock: Arc<dyn Clock>,
        settings: ChannelSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let bus = Arc::new(EventBus::new(client_id.clone()));
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(ClientSession::new(client_id, settings.max_queue_len)),
                transport,
                sender,
                bus,
                clock,
                backoff: settings.backoff,
                state_tx,
                send_failed: Notify::new(),
            }),
            supervisor: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.inner.session().client_id().clone()
    }

    /// Listener registry for inbound messages and `connection/status`.
    pub fn bus(&self) -> Arc<EventBus> {
        self.inner.bus.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.session().state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Resolves once the channel reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) {
        let mut rx = self.subscribe_state();
        // Sender lives in `inner`, so this only errs if the channel is gone.
        let _ = rx.wait_for(|state| *state == target).await;
    }

    pub fn queued_len(&self) -> usize {
        self.inner.session().queued_len()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.session().reconnect_attempts()
    }

    /// When the last inbound frame arrived, if any.
    pub fn last_event_at(&self) -> Option<Timestamp> {
        self.inner.session().last_event_at()
    }

    /// Start the supervisor. No-op while one is running.
    pub fn connect(&self) {
        let mut supervisor = lock(&self.supervisor);
        if let Some(running) = supervisor.as_ref() {
            if !running.task.is_finished() {
                tracing::debug!("connect() ignored, channel already active");
                return;
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run(shutdown_rx).await });
        *supervisor = Some(Supervisor { shutdown, task });
    }

    /// Stop reconnecting, close the channel and announce the departure.
    ///
    /// The leaving notice is best effort: it is sent only if the channel
    /// was up and is never queued.
    pub async fn disconnect(&self) {
        let running = lock(&self.supervisor).take();
        if let Some(supervisor) = running {
            supervisor.shutdown.send_replace(true);
            // Waits out an in-flight flush so its batch is not lost.
            if let Err(e) = supervisor.task.await {
                tracing::warn!(error = %e, "Channel supervisor ended abnormally");
            }
        }

        let was_connected = self.state() == ConnectionState::Connected;
        self.inner.apply(|s| s.transition(ConnectionState::Disconnected));

        if was_connected {
            let event = self.inner.pending(EventKind::ClientLeaving, json!({}));
            if let Err(e) = self.inner.sender.send(&event).await {
                tracing::debug!(error = %e, "Leaving notice lost");
            }
        }
    }

    /// Submit an event. Never fails; undeliverable events are queued.
    pub async fn send_event(&self, kind: EventKind, data: Value) -> SendOutcome {
        self.inner.send_event(kind, data).await
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        if let Some(supervisor) = lock(&self.supervisor).take() {
            supervisor.task.abort();
        }
    }
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, ClientSession> {
        lock(&self.session)
    }

    fn pending(&self, kind: EventKind, data: Value) -> PendingEvent {
        let client_id = self.session().client_id().clone();
        PendingEvent::new(kind, client_id, self.clock.now(), data)
    }

    /// Run a session mutation and announce any state change it made.
    fn apply<F>(&self, f: F)
    where
        F: FnOnce(&mut ClientSession) -> Option<ConnectionState>,
    {
        let (previous, current, client_id) = {
            let mut session = self.session();
            let previous = f(&mut session);
            (previous, session.state(), session.client_id().clone())
        };
        let Some(previous) = previous else {
            return;
        };

        self.state_tx.send_replace(current);
        tracing::info!(client_id = %client_id, from = %previous, to = %current, "Connection state changed");

        let status = PushMessage::new(
            EventKind::ConnectionStatus,
            json!({ "clientId": client_id, "state": current, "previous": previous }),
            self.clock.now(),
        )
        .echo_to_sender();
        self.bus.dispatch(&status);
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            self.apply(|s| s.transition(ConnectionState::Connecting));

            let client_id = self.session().client_id().clone();
            let opened = tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                opened = self.transport.open(&client_id) => opened,
            };

            match opened {
                Ok(stream) => {
                    self.apply(|s| s.mark_connected());
                    let reason = match self.flush().await {
                        Ok(()) => self.pump(stream, &mut shutdown).await,
                        Err(e) => Some(e),
                    };
                    match reason {
                        Some(e) => tracing::warn!(client_id = %client_id, error = %e, "Push channel lost"),
                        None => return,
                    }
                }
                Err(e) => tracing::warn!(client_id = %client_id, error = %e, "Push channel failed to open"),
            }

            let (delay, attempt) = {
                let mut session = self.session();
                let delay = session.schedule_retry(&self.backoff);
                (delay, session.reconnect_attempts())
            };
            self.apply(|s| s.transition(ConnectionState::Reconnecting));
            tracing::info!(
                client_id = %client_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );

            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Forward frames until the stream ends (`Some(reason)`) or shutdown (`None`).
    async fn pump(
        &self,
        mut stream: FrameStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<TransportError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return None,
                _ = self.send_failed.notified() => {
                    // A permit left over from before the last flush has nothing to retry.
                    if self.session().queued_len() > 0 {
                        return Some(TransportError::Send("immediate send failed".to_string()));
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => return Some(e),
                    None => return Some(TransportError::Closed),
                },
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        self.session().record_event(self.clock.now());
        let message = match PushMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unparseable push frame");
                return;
            }
        };
        if message.kind == EventKind::Connected {
            tracing::debug!(payload = %message.payload, "Server greeting");
        }
        self.bus.dispatch_inbound(&message);
    }

    /// Send everything queued, in order, until the queue stays empty.
    ///
    /// A transport failure puts the whole batch back at the front.
    async fn flush(&self) -> Result<(), TransportError> {
        loop {
            let Some(batch) = self.session().begin_flush() else {
                return Ok(());
            };

            tracing::info!(count = batch.len(), "Flushing queued events");
            let mut failure = None;
            for event in &batch {
                match self.sender.send(event).await {
                    Ok(()) => {}
                    Err(e) if is_permanent(&e) => {
                        tracing::warn!(event_type = %event.kind, error = %e, "Server refused queued event, dropping");
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            let mut session = self.session();
            if let Some(e) = failure {
                let dropped = session.requeue_front(batch);
                session.end_flush();
                if !dropped.is_empty() {
                    tracing::warn!(count = dropped.len(), "Outbound queue full, dropped oldest events");
                }
                return Err(e);
            }
            session.end_flush();
        }
    }

    async fn send_event(&self, kind: EventKind, data: Value) -> SendOutcome {
        let event = self.pending(kind, data);

        if kind == EventKind::ClientLeaving {
            if !self.session().can_send_immediately() {
                return SendOutcome::Dropped;
            }
            return match self.sender.send(&event).await {
                Ok(()) => SendOutcome::Sent,
                Err(_) => SendOutcome::Dropped,
            };
        }

        // Decide and enqueue under one lock so a flush cannot finish in between.
        let event = {
            let mut session = self.session();
            if !session.can_send_immediately() {
                tracing::debug!(event_type = %kind, state = %session.state(), "Queueing event");
                log_dropped(session.enqueue(event));
                return SendOutcome::Queued;
            }
            event
        };

        match self.sender.send(&event).await {
            Ok(()) => SendOutcome::Sent,
            Err(e) if is_permanent(&e) => {
                tracing::warn!(event_type = %kind, error = %e, "Server refused event");
                SendOutcome::Dropped
            }
            Err(e) => {
                tracing::warn!(event_type = %kind, error = %e, "Immediate send failed, queueing");
                log_dropped(self.session().enqueue(event));
                // Stores a permit if the supervisor is not waiting yet.
                self.send_failed.notify_one();
                SendOutcome::Queued
            }
        }
    }
}

fn log_dropped(dropped: Option<PendingEvent>) {
    if let Some(dropped) = dropped {
        tracing::warn!(event_type = %dropped.kind, "Outbound queue full, dropped oldest event");
    }
}

/// A 4xx rejection will fail the same way on every retry.
fn is_permanent(error: &TransportError) -> bool {
    matches!(error, TransportError::Rejected { status, .. } if (400..500).contains(status))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::event_bus::{EventListener, ListenerError};
    use crate::ports::ManualClock;
    use async_trait::async_trait;
    use futures::channel::mpsc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    type FrameTx = mpsc::UnboundedSender<Result<String, TransportError>>;

    /// Push transport whose streams the test drives by hand.
    #[derive(Default)]
    struct FakeTransport {
        opens: AtomicUsize,
        fail_first: AtomicUsize,
        links: Mutex<Vec<FrameTx>>,
    }

    impl FakeTransport {
        fn failing_first(n: usize) -> Self {
            let transport = Self::default();
            transport.fail_first.store(n, Ordering::SeqCst);
            transport
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        fn push(&self, frame: &str) {
            let links = self.links.lock().unwrap();
            links.last().unwrap().unbounded_send(Ok(frame.to_string())).unwrap();
        }

        /// Server side closes the current stream.
        fn drop_link(&self) {
            self.links.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn open(&self, _client_id: &ClientId) -> Result<FrameStream, TransportError> {
            let attempt = self.opens.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first.load(Ordering::SeqCst) {
                return Err(TransportError::Connect("refused".to_string()));
            }
            let (tx, rx) = mpsc::unbounded();
            self.links.lock().unwrap().push(tx);
            Ok(rx.boxed())
        }
    }

    #[derive(Default)]
    struct FakeSender {
        sent: Mutex<Vec<PendingEvent>>,
        fail: AtomicBool,
        reject: AtomicBool,
    }

    impl FakeSender {
        fn sent_kinds(&self) -> Vec<EventKind> {
            self.sent.lock().unwrap().iter().map(|e| e.kind).collect()
        }

        fn sent_seq(&self) -> Vec<u64> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| e.data["n"].as_u64())
                .collect()
        }
    }

    #[async_trait]
    impl EventSender for FakeSender {
        async fn send(&self, event: &PendingEvent) -> Result<(), TransportError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Send("unreachable".to_string()));
            }
            if self.reject.load(Ordering::SeqCst) {
                return Err(TransportError::Rejected {
                    status: 400,
                    body: "bad".to_string(),
                });
            }
            self.sent.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Harness {
        channel: EventChannel,
        transport: Arc<FakeTransport>,
        sender: Arc<FakeSender>,
    }

    fn harness_with(transport: FakeTransport, max_queue_len: Option<usize>) -> Harness {
        let transport = Arc::new(transport);
        let sender = Arc::new(FakeSender::default());
        let channel = EventChannel::new(
            "client-me".parse().unwrap(),
            transport.clone(),
            sender.clone(),
            Arc::new(ManualClock::default()),
            ChannelSettings {
                backoff: BackoffPolicy::default(),
                max_queue_len,
            },
        );
        Harness {
            channel,
            transport,
            sender,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeTransport::default(), None)
    }

    fn recorder(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<PushMessage>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Arc<dyn EventListener> =
            Arc::new(move |msg: &PushMessage| -> Result<(), ListenerError> {
                sink.lock().unwrap().push(msg.clone());
                Ok(())
            });
        bus.on(kind, listener);
        seen
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_reaches_connected_and_is_idempotent() {
        let h = harness();
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        h.channel.connect();
        settle().await;

        assert_eq!(h.transport.opens(), 1);
        assert_eq!(h.channel.reconnect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn events_queued_offline_flush_in_submission_order() {
        let h = harness();
        for n in 1..=3 {
            let outcome = h.channel.send_event(EventKind::PumpUpdate, json!({ "n": n })).await;
            assert_eq!(outcome, SendOutcome::Queued);
        }
        assert_eq!(h.channel.queued_len(), 3);

        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;
        eventually(|| h.sender.sent_seq().len() == 3).await;

        assert_eq!(h.sender.sent_seq(), vec![1, 2, 3]);
        assert_eq!(h.channel.queued_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn connected_sends_go_out_immediately() {
        let h = harness();
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        let outcome = h.channel.send_event(EventKind::ValveUpdate, json!({"n": 9})).await;

        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(h.sender.sent_seq(), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_opens_back_off_exponentially() {
        let h = harness_with(FakeTransport::failing_first(3), None);
        let started = tokio::time::Instant::now();

        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        // 1s + 2s + 4s
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(7), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(8), "waited {:?}", waited);
        assert_eq!(h.transport.opens(), 4);
        assert_eq!(h.channel.reconnect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_stream_reconnects_and_reports_status() {
        let h = harness();
        let statuses = recorder(&h.channel.bus(), EventKind::ConnectionStatus);
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        h.transport.drop_link();
        eventually(|| h.transport.opens() == 2 && h.channel.state() == ConnectionState::Connected)
            .await;

        let states: Vec<String> = statuses
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.payload["state"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            states,
            vec!["connecting", "connected", "reconnecting", "connecting", "connected"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn own_echoes_are_not_dispatched() {
        let h = harness();
        let pumps = recorder(&h.channel.bus(), EventKind::PumpUpdate);
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        h.transport.push(r#"{"channel":"pump","action":"update","payload":{"n":1},"clientId":"client-me"}"#);
        h.transport.push(r#"{"channel":"pump","action":"update","payload":{"n":2},"clientId":"client-other"}"#);
        h.transport.push("not json at all");
        h.transport.push(
            r#"{"channel":"pump","action":"update","payload":{"n":3},"clientId":"client-me","broadcastToSelf":true}"#,
        );
        eventually(|| pumps.lock().unwrap().len() == 2).await;

        let seen: Vec<u64> = pumps
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(seen, vec![2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_immediate_send_is_queued_and_redelivered() {
        let h = harness();
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        h.sender.fail.store(true, Ordering::SeqCst);
        let outcome = h.channel.send_event(EventKind::TankUpdate, json!({"n": 5})).await;
        assert_eq!(outcome, SendOutcome::Queued);

        h.sender.fail.store(false, Ordering::SeqCst);
        eventually(|| h.sender.sent_seq() == vec![5]).await;
        assert_eq!(h.channel.queued_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_before_pump_starts_still_forces_retry() {
        let h = harness();
        h.channel.inner.apply(|s| s.mark_connected());
        h.sender.fail.store(true, Ordering::SeqCst);
        let outcome = h.channel.send_event(EventKind::TankUpdate, json!({"n": 7})).await;
        assert_eq!(outcome, SendOutcome::Queued);

        let (_link, frames) = mpsc::unbounded::<Result<String, TransportError>>();
        let (_shutdown, mut shutdown_rx) = watch::channel(false);
        let reason = tokio::time::timeout(
            Duration::from_secs(5),
            h.channel.inner.pump(frames.boxed(), &mut shutdown_rx),
        )
        .await
        .expect("pump should stop for the queued event");
        assert!(matches!(reason, Some(TransportError::Send(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_signal_already_flushed_keeps_stream_up() {
        let h = harness();
        h.channel.inner.apply(|s| s.mark_connected());
        h.sender.fail.store(true, Ordering::SeqCst);
        h.channel.send_event(EventKind::TankUpdate, json!({"n": 7})).await;
        h.sender.fail.store(false, Ordering::SeqCst);
        h.channel.inner.flush().await.unwrap();
        assert_eq!(h.sender.sent_seq(), vec![7]);

        let (_link, frames) = mpsc::unbounded::<Result<String, TransportError>>();
        let (_shutdown, mut shutdown_rx) = watch::channel(false);
        let pumped = tokio::time::timeout(
            Duration::from_secs(5),
            h.channel.inner.pump(frames.boxed(), &mut shutdown_rx),
        )
        .await;
        assert!(pumped.is_err(), "pump ended: {:?}", pumped);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_frames_update_last_event_time() {
        let h = harness();
        assert!(h.channel.last_event_at().is_none());
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        h.transport.push(r#"{"channel":"tank","action":"update","payload":{}}"#);
        eventually(|| h.channel.last_event_at().is_some()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn refused_events_are_dropped_not_retried() {
        let h = harness();
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;
        h.sender.reject.store(true, Ordering::SeqCst);

        let outcome = h.channel.send_event(EventKind::PumpUpdate, json!({"n": 1})).await;

        assert_eq!(outcome, SendOutcome::Dropped);
        assert_eq!(h.channel.queued_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_sends_leaving_once_and_stops_retrying() {
        let h = harness();
        h.channel.connect();
        h.channel.wait_for_state(ConnectionState::Connected).await;

        h.channel.disconnect().await;
        assert_eq!(h.channel.state(), ConnectionState::Disconnected);
        assert_eq!(h.sender.sent_kinds(), vec![EventKind::ClientLeaving]);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.transport.opens(), 1);
        assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_is_never_queued() {
        let h = harness();
        let outcome = h.channel.send_event(EventKind::ClientLeaving, json!({})).await;
        assert_eq!(outcome, SendOutcome::Dropped);
        assert_eq!(h.channel.queued_len(), 0);

        h.channel.disconnect().await;
        assert!(h.sender.sent_kinds().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_backoff_cancels_the_retry() {
        let h = harness_with(FakeTransport::failing_first(usize::MAX), None);
        h.channel.connect();
        eventually(|| h.channel.state() == ConnectionState::Reconnecting).await;

        h.channel.disconnect().await;
        let opens = h.transport.opens();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(h.transport.opens(), opens);
        assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_queue_keeps_newest() {
        let h = harness_with(FakeTransport::default(), Some(2));
        for n in 1..=4 {
            h.channel.send_event(EventKind::PumpUpdate, json!({ "n": n })).await;
        }
        assert_eq!(h.channel.queued_len(), 2);

        h.channel.connect();
        eventually(|| h.sender.sent_seq().len() == 2).await;
        assert_eq!(h.sender.sent_seq(), vec![3, 4]);
    }

    #[test]
    fn only_client_errors_are_permanent() {
        assert!(is_permanent(&TransportError::Rejected {
            status: 422,
            body: String::new()
        }));
        assert!(!is_permanent(&TransportError::Rejected {
            status: 503,
            body: String::new()
        }));
        assert!(!is_permanent(&TransportError::Closed));
    }
}
