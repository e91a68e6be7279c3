//! Shared domain types for Tidewatch.
//!
//! Everything in here is visible to clients in some form: identifiers,
//! stage positions, score buckets and the result records produced by the
//! scoring engine and the interrupt scheduler. The higher crates build
//! these values; this crate only defines their shape so every layer
//! agrees on it.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Number of playable stages in a game.
pub const STAGE_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque per-connection identifier for a participant.
///
/// The gateway hands one out for every accepted connection. It carries no
/// identity beyond that connection: a player who reconnects is a new
/// player. Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Short, human-enterable code identifying a session ("room").
///
/// Codes are [`SessionCode::LEN`] characters drawn from
/// [`SessionCode::ALPHABET`], which leaves out the characters people
/// confuse when reading a code aloud (`0`/`O`, `1`/`I`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Characters a code may contain.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Length of every code.
    pub const LEN: usize = 4;

    /// Normalizes user input into a code.
    ///
    /// Surrounding whitespace is trimmed and letters are upper-cased, so
    /// `" ab3k"` parses as `AB3K`. Returns `None` when the result has the
    /// wrong length or contains a character outside the alphabet.
    pub fn parse(input: &str) -> Option<Self> {
        let code = input.trim().to_ascii_uppercase();
        let valid = code.len() == Self::LEN
            && code.bytes().all(|b| Self::ALPHABET.contains(&b));
        valid.then_some(Self(code))
    }

    /// Builds a code from alphabet indices. Used by the code generator.
    pub fn from_indices(indices: [usize; Self::LEN]) -> Self {
        let code = indices
            .iter()
            .map(|&i| Self::ALPHABET[i % Self::ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Where a session is in the game.
///
/// ```text
/// Lobby → Playing(1) → Playing(2) → Playing(3) → Playing(4) → Finished
/// ```
///
/// A session only moves forward, and only once the whole roster has
/// completed the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the host to start. Players may still join.
    #[default]
    Lobby,
    /// Stage `1..=STAGE_COUNT` is in progress.
    Playing(u8),
    /// Every stage has been completed.
    Finished,
}

impl Stage {
    /// The stage that follows `completed`, or `Finished` after the last one.
    pub fn after(completed: u8) -> Self {
        if usize::from(completed) >= STAGE_COUNT {
            Self::Finished
        } else {
            Self::Playing(completed + 1)
        }
    }

    /// The active stage index, if a stage is being played.
    pub fn index(self) -> Option<u8> {
        match self {
            Self::Playing(index) => Some(index),
            Self::Lobby | Self::Finished => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Playing(index) => write!(f, "stage {index}"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Returns `true` if `stage` names a playable stage (`1..=STAGE_COUNT`).
pub fn is_valid_stage(stage: u8) -> bool {
    (1..=STAGE_COUNT).contains(&usize::from(stage))
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// A player's points, split into one bucket per stage plus one for
/// interrupt events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBuckets {
    /// `stages[0]` is stage 1.
    pub stages: [i64; STAGE_COUNT],
    /// Points won or lost in interrupt events.
    pub interrupt: i64,
}

impl ScoreBuckets {
    /// Points in the given stage's bucket. `None` for an invalid stage.
    pub fn stage(&self, stage: u8) -> Option<i64> {
        stage_slot(stage).map(|slot| self.stages[slot])
    }

    /// Adds `points` (possibly negative) to a stage bucket.
    ///
    /// Returns `false` and changes nothing when `stage` is invalid.
    pub fn add_to_stage(&mut self, stage: u8, points: i64) -> bool {
        match stage_slot(stage) {
            Some(slot) => {
                self.stages[slot] += points;
                true
            }
            None => false,
        }
    }

    /// Adds `points` (possibly negative) to the interrupt bucket.
    pub fn add_to_interrupt(&mut self, points: i64) {
        self.interrupt += points;
    }

    /// Sum of every bucket.
    pub fn total(&self) -> i64 {
        self.stages.iter().sum::<i64>() + self.interrupt
    }
}

fn stage_slot(stage: u8) -> Option<usize> {
    is_valid_stage(stage).then(|| usize::from(stage) - 1)
}

/// Roster entry as shown in the lobby and on every roster broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
    pub is_host: bool,
    pub scores: ScoreBuckets,
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// One answer submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    /// Stage the question belongs to (`1..=STAGE_COUNT`).
    pub stage: u8,
    pub question_id: String,
    /// Raw answer text. Composite and item-set answers are encoded with
    /// `|` and `,` separators; the scoring engine decodes them.
    pub answer: String,
    /// Unix milliseconds at which the client presented the question.
    pub presented_at: u64,
}

/// A canonical answer registered for one session at start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub question_id: String,
    pub correct_answer: String,
}

/// The scored outcome of one [`AnswerSubmission`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub correct: bool,
    /// Correctness points. Negative for a wrong answer.
    pub base_points: i64,
    pub speed_bonus: i64,
    pub streak_bonus: i64,
    /// What the server considers correct, always present so the client
    /// can show it after a miss.
    pub canonical_answer: String,
}

impl AnswerResult {
    /// Points this answer added to the player's stage bucket.
    pub fn total(&self) -> i64 {
        self.base_points + self.speed_bonus + self.streak_bonus
    }
}

// ---------------------------------------------------------------------------
// Leaderboards
// ---------------------------------------------------------------------------

/// One line of the overall leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub total: i64,
    pub scores: ScoreBuckets,
}

/// One line of a single stage's leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub player_id: PlayerId,
    pub name: String,
    pub stage_score: i64,
}

/// Broadcast once the last stage has been completed by everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResults {
    pub rankings: Vec<RankingEntry>,
    pub top_scorer: Option<RankingEntry>,
}

// ---------------------------------------------------------------------------
// Interrupts
// ---------------------------------------------------------------------------

/// An interrupt event as presented to players.
///
/// The option order is shuffled per event; it carries no hint about the
/// correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptAlert {
    pub interrupt_id: String,
    pub description: String,
    pub options: Vec<String>,
    /// How long players have to respond, in milliseconds.
    pub window_ms: u64,
}

/// The scored outcome of one interrupt response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptOutcome {
    pub correct: bool,
    pub points: i64,
}

/// Sent when an interrupt's response window closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptSummary {
    pub interrupt_id: String,
    pub responded_count: usize,
    pub total_players: usize,
}

// ---------------------------------------------------------------------------
// Errors surfaced to clients
// ---------------------------------------------------------------------------

/// Machine-readable reason attached to an error sent to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyStarted,
    Full,
    AlreadyInSession,
    NotHost,
    InvalidName,
    BadRequest,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Current wall-clock time in unix milliseconds.
///
/// Answer and interrupt timings are compared against client-supplied unix
/// timestamps, so the server side has to use the same clock.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
