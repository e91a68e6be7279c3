//! Interrupt timing and point configuration.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tidewatch_protocol::STAGE_COUNT;
use tracing::warn;

/// Timing and scoring for interrupt events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptConfig {
    /// Mean time between the end of one interrupt and the next alert.
    pub interval: Duration,

    /// Symmetric random spread around `interval`. The actual delay is
    /// uniform in `interval ± jitter`.
    pub jitter: Duration,

    /// How long players have to respond once an alert goes out.
    pub window: Duration,

    /// Points for a correct response, before the speed bonus.
    pub correct_points: i64,

    /// Speed bonus for an instant correct response. Decays linearly to
    /// zero over the window.
    pub max_speed_bonus: i64,

    /// Points for a wrong response. Never positive.
    pub wrong_points: i64,

    /// Points for not responding before the window closes. Never positive.
    pub missed_points: i64,

    /// Interrupts only fire while the session is on a stage up to this one.
    pub last_eligible_stage: u8,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(180),
            jitter: Duration::from_secs(30),
            window: Duration::from_secs(15),
            correct_points: 200,
            max_speed_bonus: 100,
            wrong_points: -75,
            missed_points: -75,
            last_eligible_stage: 3,
        }
    }
}

impl InterruptConfig {
    /// Clamps out-of-range values.
    ///
    /// - `jitter` is capped at `interval` so the delay never goes negative.
    /// - A zero `window` becomes one second.
    /// - Penalties are forced to be non-positive.
    /// - `last_eligible_stage` is kept inside the playable range.
    pub fn validated(mut self) -> Self {
        if self.jitter > self.interval {
            warn!(
                jitter_ms = self.jitter.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "interrupt jitter exceeds interval, clamping"
            );
            self.jitter = self.interval;
        }
        if self.window.is_zero() {
            warn!("interrupt window is zero, raising to 1s");
            self.window = Duration::from_secs(1);
        }
        if self.wrong_points > 0 {
            warn!(points = self.wrong_points, "wrong_points is positive, negating");
            self.wrong_points = -self.wrong_points;
        }
        if self.missed_points > 0 {
            warn!(points = self.missed_points, "missed_points is positive, negating");
            self.missed_points = -self.missed_points;
        }
        let max_stage = STAGE_COUNT as u8;
        if !(1..=max_stage).contains(&self.last_eligible_stage) {
            warn!(
                stage = self.last_eligible_stage,
                "last_eligible_stage out of range, clamping"
            );
            self.last_eligible_stage = self.last_eligible_stage.clamp(1, max_stage);
        }
        self
    }

    /// Draws the delay until the next alert.
    pub fn next_delay(&self, rng: &mut impl Rng) -> Duration {
        let jitter = self.jitter.as_millis() as i64;
        let offset = if jitter > 0 {
            rng.random_range(-jitter..=jitter)
        } else {
            0
        };
        let delay = (self.interval.as_millis() as i64 + offset).max(0);
        Duration::from_millis(delay as u64)
    }

    /// Points for a correct response given `elapsed_ms` since the alert.
    pub fn points_for_correct(&self, elapsed_ms: u64) -> i64 {
        let window = self.window.as_millis() as f64;
        let elapsed = elapsed_ms as f64;
        let bonus = if elapsed < window {
            (self.max_speed_bonus as f64 * (1.0 - elapsed / window)).round() as i64
        } else {
            0
        };
        self.correct_points + bonus
    }

    /// Returns `true` if an interrupt may fire while the session is on
    /// `stage`.
    pub fn is_eligible(&self, stage: u8) -> bool {
        (1..=self.last_eligible_stage).contains(&stage)
    }
}
