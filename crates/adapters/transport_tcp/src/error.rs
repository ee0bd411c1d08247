//! Transport adapter error types.

use minido_domain::error::MinidoError;

/// Errors specific to the TCP transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Reading from or writing to the socket failed.
    #[error("bus connection I/O error")]
    Io(#[from] std::io::Error),

    /// The connection task is gone and nothing drains the outbound queue.
    #[error("outbound queue closed")]
    QueueClosed,
}

impl From<TransportError> for MinidoError {
    fn from(err: TransportError) -> Self {
        Self::Transport(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_queue_closed_error() {
        assert_eq!(
            TransportError::QueueClosed.to_string(),
            "outbound queue closed"
        );
    }

    #[test]
    fn should_convert_into_transport_domain_error() {
        let err: MinidoError = TransportError::QueueClosed.into();
        assert!(matches!(err, MinidoError::Transport(_)));
    }
}
