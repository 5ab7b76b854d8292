//! WebSocket push transport.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{join_path, parse_base_url};
use crate::domain::foundation::ClientId;
use crate::ports::{FrameStream, PushTransport, TransportError};

/// Opens `GET <server>/api/live?clientId=..` as a WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketPushTransport {
    base: Url,
}

impl WebSocketPushTransport {
    /// `server_url` may use `http(s)` or `ws(s)`.
    pub fn new(server_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            base: parse_base_url(server_url)?,
        })
    }

    pub fn live_url(&self, client_id: &ClientId) -> Result<Url, TransportError> {
        let mut url = join_path(&self.base, "api/live");
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::Connect(format!("cannot use scheme {}", scheme)))?;
        url.query_pairs_mut().append_pair("clientId", client_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl PushTransport for WebSocketPushTransport {
    async fn open(&self, client_id: &ClientId) -> Result<FrameStream, TransportError> {
        let url = self.live_url(client_id)?;
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(client_id = %client_id, url = %url, "Push socket open");

        let frames = socket.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Send(e.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ClientId {
        "client-abc".parse().unwrap()
    }

    #[test]
    fn http_base_becomes_ws_live_url() {
        let transport = WebSocketPushTransport::new("http://localhost:8080").unwrap();
        assert_eq!(
            transport.live_url(&id()).unwrap().as_str(),
            "ws://localhost:8080/api/live?clientId=client-abc"
        );
    }

    #[test]
    fn https_base_with_path_prefix_becomes_wss() {
        let transport = WebSocketPushTransport::new("https://rig.example.com/dash/").unwrap();
        assert_eq!(
            transport.live_url(&id()).unwrap().as_str(),
            "wss://rig.example.com/dash/api/live?clientId=client-abc"
        );
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(WebSocketPushTransport::new("not a url").is_err());
        assert!(WebSocketPushTransport::new("ftp://host").is_err());
    }
}
