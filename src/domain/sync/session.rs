//! Per-session connection bookkeeping.
//!
//! `ClientSession` is plain data: the async channel owns it behind a
//! mutex and drives it. Every transition is decided here so the rules can
//! be tested without a runtime.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::BackoffPolicy;
use super::event::PendingEvent;
use crate::domain::foundation::{ClientId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ClientSession {
    client_id: ClientId,
    state: ConnectionState,
    reconnect_attempts: u32,
    last_event_at: Option<Timestamp>,
    queue: VecDeque<PendingEvent>,
    queue_paused: bool,
    max_queue_len: Option<usize>,
}

impl ClientSession {
    pub fn new(client_id: ClientId, max_queue_len: Option<usize>) -> Self {
        Self {
            client_id,
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            last_event_at: None,
            queue: VecDeque::new(),
            queue_paused: false,
            max_queue_len: max_queue_len.filter(|n| *n > 0),
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn last_event_at(&self) -> Option<Timestamp> {
        self.last_event_at
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Move to `next`; returns the previous state when it actually changed.
    pub fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if self.state == next {
            return None;
        }
        let previous = self.state;
        self.state = next;
        Some(previous)
    }

    /// Channel opened: connected, attempt counter reset.
    pub fn mark_connected(&mut self) -> Option<ConnectionState> {
        self.reconnect_attempts = 0;
        self.transition(ConnectionState::Connected)
    }

    /// Channel lost or failed to open; returns the delay before the next try.
    pub fn schedule_retry(&mut self, policy: &BackoffPolicy) -> Duration {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        policy.delay(self.reconnect_attempts)
    }

    pub fn record_event(&mut self, at: Timestamp) {
        self.last_event_at = Some(at);
    }

    /// An immediate send keeps FIFO order only when nothing is waiting.
    pub fn can_send_immediately(&self) -> bool {
        self.state == ConnectionState::Connected && !self.queue_paused && self.queue.is_empty()
    }

    /// Append in submission order; returns the event dropped by the bound.
    pub fn enqueue(&mut self, event: PendingEvent) -> Option<PendingEvent> {
        self.queue.push_back(event);
        self.enforce_bound()
    }

    /// Put a failed batch back ahead of anything queued since.
    pub fn requeue_front(&mut self, batch: Vec<PendingEvent>) -> Vec<PendingEvent> {
        for event in batch.into_iter().rev() {
            self.queue.push_front(event);
        }
        let mut dropped = Vec::new();
        while let Some(event) = self.enforce_bound() {
            dropped.push(event);
        }
        dropped
    }

    /// Take the whole queue for a flush.
    ///
    /// `None` while another flush runs or when there is nothing to send; an
    /// empty queue is never paused, so a concurrent send is not held back.
    pub fn begin_flush(&mut self) -> Option<Vec<PendingEvent>> {
        if self.queue_paused || self.queue.is_empty() {
            return None;
        }
        self.queue_paused = true;
        Some(self.queue.drain(..).collect())
    }

    pub fn end_flush(&mut self) {
        self.queue_paused = false;
    }

    fn enforce_bound(&mut self) -> Option<PendingEvent> {
        match self.max_queue_len {
            Some(max) if self.queue.len() > max => self.queue.pop_front(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sync::event::EventKind;
    use serde_json::json;

    fn session(max: Option<usize>) -> ClientSession {
        ClientSession::new("client-test".parse().unwrap(), max)
    }

    fn event(n: u64) -> PendingEvent {
        PendingEvent::new(
            EventKind::PumpUpdate,
            "client-test".parse().unwrap(),
            Timestamp::from_unix_millis(n as i64),
            json!({ "n": n }),
        )
    }

    fn order(events: &[PendingEvent]) -> Vec<u64> {
        events.iter().map(|e| e.data["n"].as_u64().unwrap()).collect()
    }

    #[test]
    fn starts_disconnected_with_empty_queue() {
        let s = session(None);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.queued_len(), 0);
        assert!(!s.can_send_immediately());
    }

    #[test]
    fn retry_counter_grows_and_resets_on_connect() {
        let mut s = session(None);
        let policy = BackoffPolicy::default();
        assert_eq!(s.schedule_retry(&policy), Duration::from_secs(1));
        assert_eq!(s.schedule_retry(&policy), Duration::from_secs(2));
        assert_eq!(s.reconnect_attempts(), 2);

        assert_eq!(s.mark_connected(), Some(ConnectionState::Disconnected));
        assert_eq!(s.reconnect_attempts(), 0);
        assert_eq!(s.mark_connected(), None);
    }

    #[test]
    fn flush_is_exclusive() {
        let mut s = session(None);
        s.enqueue(event(1));
        let batch = s.begin_flush().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(s.begin_flush().is_none());

        s.enqueue(event(2));
        assert_eq!(s.queued_len(), 1);
        s.end_flush();
        assert_eq!(s.begin_flush().map(|b| b.len()), Some(1));
    }

    #[test]
    fn paused_queue_blocks_immediate_send() {
        let mut s = session(None);
        s.enqueue(event(1));
        s.mark_connected();
        let _batch = s.begin_flush().unwrap();
        assert_eq!(s.queued_len(), 0);
        assert!(!s.can_send_immediately());
        s.end_flush();
        assert!(s.can_send_immediately());
    }

    #[test]
    fn empty_flush_leaves_queue_open() {
        let mut s = session(None);
        s.mark_connected();
        assert!(s.begin_flush().is_none());
        assert!(s.can_send_immediately());

        s.enqueue(event(1));
        assert_eq!(s.begin_flush().map(|b| b.len()), Some(1));
    }

    #[test]
    fn failed_batch_goes_back_ahead_of_newer_events() {
        let mut s = session(None);
        s.enqueue(event(1));
        s.enqueue(event(2));
        let batch = s.begin_flush().unwrap();
        s.enqueue(event(3));
        s.requeue_front(batch);
        s.end_flush();

        let all = s.begin_flush().unwrap();
        assert_eq!(order(&all), vec![1, 2, 3]);
    }

    #[test]
    fn bounded_queue_drops_oldest() {
        let mut s = session(Some(2));
        assert!(s.enqueue(event(1)).is_none());
        assert!(s.enqueue(event(2)).is_none());
        let dropped = s.enqueue(event(3)).unwrap();
        assert_eq!(order(&[dropped]), vec![1]);
        assert_eq!(order(&s.begin_flush().unwrap()), vec![2, 3]);
    }
}
