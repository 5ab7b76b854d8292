//! In-process transport pair.
//!
//! Implements both client ports directly against a [`PushHub`] and a
//! [`SubmitEventHandler`], so a full client/server round trip runs inside
//! one runtime without sockets. The link can be taken down and brought
//! back up to exercise reconnect and queueing.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, watch};

use crate::adapters::websocket::PushHub;
use crate::application::handlers::{SubmitEventCommand, SubmitEventError, SubmitEventHandler};
use crate::domain::foundation::{ClientId, Timestamp};
use crate::domain::sync::{PendingEvent, PushMessage};
use crate::ports::{EventSender, FrameStream, PushTransport, TransportError};

pub struct LoopbackTransport {
    hub: Arc<PushHub>,
    submit: Arc<SubmitEventHandler>,
    online: watch::Sender<bool>,
    delivered: Mutex<Vec<PendingEvent>>,
}

impl LoopbackTransport {
    pub fn new(hub: Arc<PushHub>, submit: Arc<SubmitEventHandler>) -> Self {
        let (online, _) = watch::channel(true);
        Self {
            hub,
            submit,
            online,
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Drop the link: open push streams end, sends and opens fail.
    pub fn go_offline(&self) {
        self.online.send_replace(false);
    }

    pub fn go_online(&self) {
        self.online.send_replace(true);
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Events the server accepted, in arrival order.
    pub fn delivered(&self) -> Vec<PendingEvent> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Hub registration of one open stream; leaves the hub when dropped.
struct Membership {
    hub: Arc<PushHub>,
    client_id: ClientId,
}

impl Drop for Membership {
    fn drop(&mut self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let hub = self.hub.clone();
            let client_id = self.client_id.clone();
            handle.spawn(async move { hub.leave(&client_id).await });
        }
    }
}

struct Live {
    rx: broadcast::Receiver<PushMessage>,
    online: watch::Receiver<bool>,
    _membership: Membership,
}

#[async_trait]
impl PushTransport for LoopbackTransport {
    async fn open(&self, client_id: &ClientId) -> Result<FrameStream, TransportError> {
        if !self.is_online() {
            return Err(TransportError::Connect("loopback offline".to_string()));
        }

        let rx = self.hub.join(client_id).await;
        let greeting = PushMessage::connected(client_id, Timestamp::now())
            .to_json()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let live = Live {
            rx,
            online: self.online.subscribe(),
            _membership: Membership {
                hub: self.hub.clone(),
                client_id: client_id.clone(),
            },
        };

        let frames = stream::unfold(live, |mut live| async move {
            loop {
                tokio::select! {
                    changed = live.online.changed() => {
                        if changed.is_err() || !*live.online.borrow() {
                            return None;
                        }
                    }
                    received = live.rx.recv() => match received {
                        Ok(message) => match message.to_json() {
                            Ok(json) => return Some((Ok(json), live)),
                            Err(e) => tracing::warn!(error = %e, "Unserializable push message"),
                        },
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Loopback stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                }
            }
        });

        Ok(stream::once(async move { Ok(greeting) }).chain(frames).boxed())
    }
}

#[async_trait]
impl EventSender for LoopbackTransport {
    async fn send(&self, event: &PendingEvent) -> Result<(), TransportError> {
        if !self.is_online() {
            return Err(TransportError::NotConnected);
        }

        let cmd = SubmitEventCommand {
            event: event.clone(),
        };
        match self.submit.handle(cmd).await {
            Ok(_) => {
                self.delivered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event.clone());
                Ok(())
            }
            Err(e) => {
                let status = match &e {
                    SubmitEventError::Parse(_) => 400,
                    SubmitEventError::NotFound(_) => 404,
                    SubmitEventError::Persistence(_) => 500,
                };
                Err(TransportError::Rejected {
                    status,
                    body: e.to_string(),
                })
            }
        }
    }
}
