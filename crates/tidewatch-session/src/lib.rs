//! Session layer for Tidewatch.
//!
//! Owns every live session: who is in it, who hosts it, which stage it
//! is on, its answer key and its interrupt bookkeeping. The scoring
//! engine and the interrupt scheduler operate on sessions borrowed from
//! the [`SessionRegistry`]; nothing else holds session state.

mod config;
mod error;
mod registry;
mod session;

pub use config::GameConfig;
pub use error::SessionError;
pub use registry::{Departure, SessionRegistry, SharedRegistry, StageOutcome};
pub use session::{ActiveInterrupt, AnswerKey, InterruptPhase, InterruptSlot, Player, Session};
