//! Bus gateway connection configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the TCP connection to the bus gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Gateway address as `host:port`.
    pub address: String,
    /// Seconds to wait before reconnecting after a failure or disconnect.
    pub reconnect_delay_secs: u64,
    /// Seconds between keepalive writes. `0` disables the keepalive.
    pub keepalive_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "localhost:2323".to_string(),
            reconnect_delay_secs: 5,
            keepalive_secs: 0,
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    #[must_use]
    pub fn keepalive(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }
}
