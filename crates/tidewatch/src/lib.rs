//! # Tidewatch
//!
//! Session orchestration and scoring server for a timed, four-stage group
//! game. Players gather in a lobby under a short session code, play the
//! stages in lockstep, and are interrupted now and then by timed emergency
//! events.
//!
//! This crate is the gateway: it accepts WebSocket connections, decodes
//! client messages, routes them through the [`Hub`], and fans results back
//! out to every player in the affected session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tidewatch::prelude::*;
//!
//! # async fn start() -> Result<(), TidewatchError> {
//! let server = TidewatchServer::builder()
//!     .bind("0.0.0.0:3001")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod hub;
mod server;
mod transport;

pub use error::TidewatchError;
pub use hub::{Hub, Outbox, Recipient};
pub use server::{DEFAULT_BIND, TidewatchServer, TidewatchServerBuilder};
pub use transport::TransportError;

pub mod prelude {
    pub use crate::{TidewatchError, TidewatchServer, TidewatchServerBuilder};
    pub use tidewatch_interrupt::InterruptConfig;
    pub use tidewatch_protocol::{ClientMessage, Envelope, ServerMessage};
    pub use tidewatch_scoring::ScoringConfig;
    pub use tidewatch_session::GameConfig;
}
