//! Client channel configuration
//!
//! Read by dashboard clients, not by the server itself.

use reqwest::Url;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;
use crate::client::ChannelSettings;
use crate::domain::sync::BackoffPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the dashboard server (http, https, ws or wss)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_factor")]
    pub factor: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Drop-oldest bound on queued events; unset is unbounded
    pub max_queue_len: Option<usize>,

    /// File holding this client's id across restarts
    pub identity_path: Option<PathBuf>,

    /// Timeout for a single event submission
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

impl SyncConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            self.factor,
            Duration::from_millis(self.max_delay_ms),
        )
    }

    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            backoff: self.backoff(),
            max_queue_len: self.max_queue_len,
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let url = Url::parse(&self.server_url).map_err(|_| ValidationError::InvalidServerUrl)?;
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(ValidationError::InvalidServerUrl);
        }
        if self.base_delay_ms == 0 {
            return Err(ValidationError::InvalidBackoff("base delay must be positive"));
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ValidationError::InvalidBackoff("factor must be at least 1.0"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ValidationError::InvalidBackoff("max delay below base delay"));
        }
        if self.send_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            base_delay_ms: default_base_delay(),
            factor: default_factor(),
            max_delay_ms: default_max_delay(),
            max_queue_len: None,
            identity_path: None,
            send_timeout_secs: default_send_timeout(),
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_factor() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_send_timeout() -> u64 {
    10
}
