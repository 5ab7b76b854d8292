//! HTTP event sender: `POST <server>/api/events`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{join_path, parse_base_url};
use crate::domain::sync::PendingEvent;
use crate::ports::{EventSender, TransportError};

#[derive(Debug, Clone)]
pub struct HttpEventSender {
    client: Client,
    events_url: Url,
}

impl HttpEventSender {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base = parse_base_url(server_url)?;
        let scheme = match base.scheme() {
            "wss" | "https" => "https",
            _ => "http",
        };
        base.set_scheme(scheme)
            .map_err(|_| TransportError::Connect(format!("cannot use scheme {}", scheme)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            events_url: join_path(&base, "api/events"),
        })
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }
}

#[async_trait]
impl EventSender for HttpEventSender {
    async fn send(&self, event: &PendingEvent) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.events_url.clone())
            .json(event)
            .send()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(event_type = %event.kind, status = status.as_u16(), "Event rejected");
        Err(TransportError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_url_is_under_api() {
        let sender = HttpEventSender::new("ws://localhost:3000", Duration::from_secs(5)).unwrap();
        assert_eq!(sender.events_url().as_str(), "http://localhost:3000/api/events");
    }
}
