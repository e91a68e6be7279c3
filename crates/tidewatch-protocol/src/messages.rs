//! Messages exchanged between clients and the gateway.
//!
//! Both directions use internally tagged JSON (`{"type": "...", ...}`) so
//! browser clients can switch on a single field. Server messages travel
//! inside an [`Envelope`] carrying a per-connection sequence number.

use serde::{Deserialize, Serialize};

use crate::types::{
    AnswerKeyEntry, AnswerResult, AnswerSubmission, ErrorKind, FinalResults,
    InterruptAlert, InterruptOutcome, InterruptSummary, PlayerId, PlayerSummary,
    RankingEntry, SessionCode, StageResult,
};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can ask of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Open a new session with the sender as host.
    CreateSession { name: String },

    /// Join an existing session by code. The code is parsed leniently
    /// (case and whitespace are ignored).
    JoinSession { code: String, name: String },

    /// Flip the sender's ready flag in the lobby.
    ToggleReady,

    /// Host only: start the game. `answers` extends the default answer
    /// table for this session only.
    StartSession {
        #[serde(default)]
        answers: Vec<AnswerKeyEntry>,
    },

    /// Submit an answer to a stage question.
    SubmitAnswer(AnswerSubmission),

    /// The sender finished every question of `stage`.
    StageComplete { stage: u8 },

    /// Answer the currently active interrupt event.
    InterruptResponse {
        interrupt_id: String,
        answer: String,
        /// Client clock when the answer was given. Informational only;
        /// interrupt timing is measured on the server.
        #[serde(default)]
        timestamp: u64,
    },

    /// Keep-alive. Echoed back with the server's clock.
    Heartbeat { client_time: u64 },

    /// The client is leaving; the gateway closes the connection.
    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the gateway sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First message on every connection: the id assigned to it.
    Welcome { player_id: PlayerId },

    /// Reply to `CreateSession`.
    SessionCreated { code: SessionCode, host: bool },

    /// Full roster snapshot, broadcast whenever it changes.
    Roster {
        code: SessionCode,
        host: PlayerId,
        players: Vec<PlayerSummary>,
    },

    /// The host started the game.
    GameStarted { stage: u8 },

    /// Reply to `SubmitAnswer`.
    AnswerResult(AnswerResult),

    /// Overall standings, pushed after every scored event.
    Leaderboard { rankings: Vec<RankingEntry> },

    /// Everyone completed a stage; the session moved on.
    StageTransition {
        next_stage: u8,
        stage_results: Vec<StageResult>,
        rankings: Vec<RankingEntry>,
    },

    /// Everyone completed the last stage.
    GameOver { final_results: FinalResults },

    /// An interrupt event fired.
    InterruptAlert(InterruptAlert),

    /// Reply to `InterruptResponse`.
    InterruptResult(InterruptOutcome),

    /// An interrupt's response window closed.
    InterruptEnded(InterruptSummary),

    /// Reply to `Heartbeat`.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// A request could not be honoured. `code` follows HTTP conventions.
    Error {
        code: u16,
        kind: ErrorKind,
        message: String,
    },
}

impl ServerMessage {
    /// Shorthand for building an [`ServerMessage::Error`].
    pub fn error(code: u16, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            kind,
            message: message.into(),
        }
    }
}

/// Wrapper for every message the server writes to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    /// Per-connection counter starting at 1.
    pub seq: u64,
    /// Server clock in unix milliseconds.
    pub timestamp: u64,
    pub message: M,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_create_session_json_format() {
        let json = r#"{"type": "CreateSession", "name": "Ana"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, ClientMessage::CreateSession { name: "Ana".into() });
    }

    #[test]
    fn test_client_submit_answer_fields_are_flattened() {
        let json = r#"{
            "type": "SubmitAnswer",
            "stage": 1,
            "question_id": "n1",
            "answer": "Live Nest",
            "presented_at": 1700000000000
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SubmitAnswer(sub) => {
                assert_eq!(sub.stage, 1);
                assert_eq!(sub.question_id, "n1");
                assert_eq!(sub.presented_at, 1_700_000_000_000);
            }
            other => panic!("expected SubmitAnswer, got {other:?}"),
        }
    }

    #[test]
    fn test_client_start_session_answers_default_to_empty() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "StartSession"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartSession { answers: vec![] });
    }

    #[test]
    fn test_client_interrupt_response_timestamp_optional() {
        let json = r#"{"type": "InterruptResponse", "interrupt_id": "e1", "answer": "x"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::InterruptResponse { timestamp: 0, .. }
        ));
    }

    #[test]
    fn test_client_unknown_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "FlyToMoon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_error_json_format() {
        let msg = ServerMessage::error(404, ErrorKind::NotFound, "session not found");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 404);
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["message"], "session not found");
    }

    #[test]
    fn test_server_answer_result_json_format() {
        let msg = ServerMessage::AnswerResult(AnswerResult {
            correct: true,
            base_points: 100,
            speed_bonus: 75,
            streak_bonus: 0,
            canonical_answer: "Live Nest".into(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "AnswerResult");
        assert_eq!(json["base_points"], 100);
        assert_eq!(json["canonical_answer"], "Live Nest");
    }

    #[test]
    fn test_envelope_wraps_message() {
        let env = Envelope {
            seq: 3,
            timestamp: 1000,
            message: ServerMessage::GameStarted { stage: 1 },
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["message"]["type"], "GameStarted");
        assert_eq!(json["message"]["stage"], 1);
    }
}
