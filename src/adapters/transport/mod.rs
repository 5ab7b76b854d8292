//! Client transports.
//!
//! - [`websocket`] - push channel over `tokio-tungstenite`
//! - [`http_sender`] - event submission over `reqwest`
//! - [`loopback`] - in-process pair wired straight to a [`PushHub`](crate::adapters::websocket::PushHub)

pub mod http_sender;
pub mod loopback;
pub mod websocket;

pub use http_sender::HttpEventSender;
pub use loopback::LoopbackTransport;
pub use websocket::WebSocketPushTransport;

use reqwest::Url;

use crate::ports::TransportError;

/// Parse a configured server base URL.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw.trim()).map_err(|e| TransportError::Connect(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(url),
        other => Err(TransportError::Connect(format!("unsupported scheme '{}'", other))),
    }
}

/// `base` with `suffix` appended to its path.
pub(crate) fn join_path(base: &Url, suffix: &str) -> Url {
    let mut url = base.clone();
    let path = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        suffix.trim_start_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    url
}
