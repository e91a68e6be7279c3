//! Interrupt events for Tidewatch.
//!
//! While a session is on one of its early stages, an emergency scenario
//! fires every few minutes at a randomized moment. Players get a short
//! window to pick the right response; fast correct answers earn the most,
//! wrong answers and silence cost points. Scores go to the interrupt
//! bucket, separate from the stage buckets.

mod config;
mod scenario;
mod scheduler;

pub use config::InterruptConfig;
pub use scenario::{SCENARIOS, Scenario, scenario};
pub use scheduler::{FireOutcome, InterruptEvent, InterruptScheduler};
