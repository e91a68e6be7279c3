//! Unified error type for the Tidewatch gateway.

use tidewatch_protocol::ProtocolError;
use tidewatch_session::SessionError;

use crate::transport::TransportError;

/// Top-level error that wraps the sub-crate errors.
///
/// Only connection-fatal failures travel as this type. Request-level
/// session errors are answered with an error payload instead.
#[derive(Debug, thiserror::Error)]
pub enum TidewatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use tidewatch_protocol::PlayerId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        let tw_err: TidewatchError = err.into();
        assert!(matches!(tw_err, TidewatchError::Transport(_)));
        assert!(tw_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let tw_err: TidewatchError = err.into();
        assert!(matches!(tw_err, TidewatchError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::PlayerNotFound(PlayerId(7));
        let tw_err: TidewatchError = err.into();
        assert!(matches!(tw_err, TidewatchError::Session(_)));
        assert!(tw_err.to_string().contains("P-7"));
    }
}
