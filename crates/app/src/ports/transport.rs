//! Transport port: hands encoded frames to the bus connection.

use minido_domain::error::MinidoError;

/// Outbound side of the bus connection.
///
/// `send` only enqueues; delivery happens asynchronously on the connection
/// writer. An error means the frame could not even be queued (for instance
/// because the connection task is gone).
pub trait TransportBridge {
    /// Queue raw frame bytes for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::Transport`] when the frame cannot be queued.
    fn send(&self, bytes: Vec<u8>) -> Result<(), MinidoError>;
}

impl<T: TransportBridge + Send + Sync> TransportBridge for std::sync::Arc<T> {
    fn send(&self, bytes: Vec<u8>) -> Result<(), MinidoError> {
        (**self).send(bytes)
    }
}
