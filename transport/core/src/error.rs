//! Transport Error Taxonomy
//!
//! Status codes surfaced to the framing layer. Success is expressed as
//! `Ok(())`; everything else is one of the variants below.
//!
//! There is deliberately no blanket `From<std::io::Error>` conversion:
//! each call site must classify the failure itself, because the same
//! `io::Error` means different things at different points of a transfer
//! (a broken pipe mid-send is a graceful close, a failed `connect` is a
//! setup failure).

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established (socket creation, resolution,
    /// connect, bind, or listen failed). Never retried automatically;
    /// the caller must re-invoke connect/open.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// Peer closed the connection gracefully, detected mid-transfer as a
    /// zero-length read or a broken-pipe write. The local socket has
    /// already been closed as part of detection; recovery requires a new
    /// connection.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Unexpected read error other than graceful close. The socket is
    /// left in place; the buffer may hold a partial prefix.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Unexpected write error other than broken pipe.
    #[error("Send failed: {0}")]
    SendFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::ConnectionFailure("no route to host".to_string());
        assert!(err.to_string().contains("Connection failure"));
        assert!(err.to_string().contains("no route to host"));

        let err = TransportError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed by peer");

        let err = TransportError::ReceiveFailed("bad fd".to_string());
        assert!(err.to_string().contains("Receive failed"));

        let err = TransportError::SendFailed("bad fd".to_string());
        assert!(err.to_string().contains("Send failed"));
    }
}
