//! Wire protocol and shared types for Tidewatch.
//!
//! - **Types** ([`PlayerId`], [`SessionCode`], [`Stage`], [`ScoreBuckets`],
//!   result records): the vocabulary every other crate shares.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Envelope`]):
//!   what travels over a connection.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how messages become frames.
//!
//! This is the bottom of the stack: it knows nothing about sessions,
//! scoring or timers.
//!
//! ```text
//! Gateway → { Scoring, Interrupts } → Session registry → Protocol (this crate)
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, Envelope, ServerMessage};
pub use types::{
    AnswerKeyEntry, AnswerResult, AnswerSubmission, ErrorKind, FinalResults,
    InterruptAlert, InterruptOutcome, InterruptSummary, PlayerId, PlayerSummary,
    RankingEntry, STAGE_COUNT, ScoreBuckets, SessionCode, Stage, StageResult,
    is_valid_stage, unix_millis,
};
