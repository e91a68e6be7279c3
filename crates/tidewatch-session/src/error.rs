//! Error types for the session layer.

use tidewatch_protocol::{PlayerId, SessionCode};

/// Errors returned by [`SessionRegistry`](crate::SessionRegistry) operations.
///
/// None of these are fatal; the gateway turns the user-facing ones into
/// an error payload for the requester and drops the rest.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session has this code.
    #[error("session {0} not found")]
    NotFound(SessionCode),

    /// The player isn't in any session.
    #[error("player {0} is not in a session")]
    PlayerNotFound(PlayerId),

    /// The session left the lobby; joins and restarts are refused.
    #[error("session {0} has already started")]
    AlreadyStarted(SessionCode),

    /// The roster is at capacity.
    #[error("session {0} is full")]
    Full(SessionCode),

    /// A connection can only be in one session at a time.
    #[error("player {0} is already in session {1}")]
    AlreadyInSession(PlayerId, SessionCode),

    /// The display name was empty after trimming.
    #[error("display name must not be empty")]
    InvalidName,
}
