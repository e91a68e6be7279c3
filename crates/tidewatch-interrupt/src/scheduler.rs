//! The per-session interrupt scheduler.
//!
//! Each started session gets one Tokio task that loops through two
//! chained timers:
//!
//! ```text
//!          ┌──────── interval ± jitter ────────┐
//! start ──→ [Scheduled] ──fire──→ [Active] ──window──→ close ─┐
//!              ↑  │ ineligible stage: re-arm                  │
//!              │  └─────────────────────────┘                 │
//!              └──────────────────────────────────────────────┘
//!                  no scenario left: [Idle], task exits
//! ```
//!
//! The task only holds the registry lock for the synchronous steps
//! ([`InterruptScheduler::fire`] and [`InterruptScheduler::close`]), so a
//! timer step is atomic with respect to client requests. Its abort handle
//! lives in the session's [`InterruptSlot`](tidewatch_session::InterruptSlot):
//! stopping the scheduler or destroying the session aborts it.

use std::sync::Arc;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use tidewatch_protocol::{
    InterruptAlert, InterruptOutcome, InterruptSummary, PlayerId, SessionCode, unix_millis,
};
use tidewatch_session::{ActiveInterrupt, InterruptPhase, SessionRegistry, SharedRegistry};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{InterruptConfig, SCENARIOS, Scenario};

/// Something the gateway should broadcast to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptEvent {
    /// An interrupt fired.
    Alert {
        code: SessionCode,
        alert: InterruptAlert,
    },
    /// An interrupt's window closed and non-responders were penalized.
    Closed {
        code: SessionCode,
        summary: InterruptSummary,
    },
}

/// Result of one timer firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// A scenario went out; the response window is open.
    Fired(InterruptAlert),
    /// The session is not on an eligible stage. Try again next cycle.
    Ineligible,
    /// Every scenario has been used; this session gets no more interrupts.
    Exhausted,
    /// The session no longer exists.
    Gone,
}

/// Drives interrupt events for every started session.
///
/// Cheap to clone; clones share the registry, the config and the event
/// channel.
#[derive(Clone)]
pub struct InterruptScheduler {
    registry: SharedRegistry,
    config: Arc<InterruptConfig>,
    events: mpsc::UnboundedSender<InterruptEvent>,
}

impl InterruptScheduler {
    /// Creates a scheduler and the receiving end of its event stream.
    pub fn new(
        registry: SharedRegistry,
        config: InterruptConfig,
    ) -> (Self, mpsc::UnboundedReceiver<InterruptEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            registry,
            config: Arc::new(config.validated()),
            events,
        };
        (scheduler, rx)
    }

    /// Starts the interrupt cycle for a session.
    ///
    /// Takes the already-locked registry because the gateway calls this
    /// while handling `StartSession`. Any previous cycle for the session
    /// is aborted and its used scenarios forgotten. Must be called from
    /// inside a Tokio runtime. Returns `false` for an unknown code.
    pub fn start(&self, registry: &mut SessionRegistry, code: &SessionCode) -> bool {
        let Some(session) = registry.session_mut(code) else {
            return false;
        };

        let slot = &mut session.interrupt;
        slot.used.clear();
        slot.active = None;
        slot.phase = InterruptPhase::Scheduled;

        let task = tokio::spawn(self.clone().run(code.clone()));
        slot.arm(task.abort_handle());

        info!(%code, "interrupt cycle started");
        true
    }

    /// Cancels the cycle, clearing the active interrupt and used scenarios.
    pub fn stop(&self, registry: &mut SessionRegistry, code: &SessionCode) -> bool {
        let Some(session) = registry.session_mut(code) else {
            return false;
        };
        session.interrupt.cancel();
        info!(%code, "interrupt cycle stopped");
        true
    }

    async fn run(self, code: SessionCode) {
        loop {
            let delay = self.config.next_delay(&mut rand::rng());
            debug!(%code, delay_ms = delay.as_millis() as u64, "next interrupt armed");
            tokio::time::sleep(delay).await;

            let mut registry = self.registry.lock().await;
            let outcome = self.fire(&mut registry, &code, &mut rand::rng(), unix_millis());
            drop(registry);

            let interrupt_id = match outcome {
                FireOutcome::Fired(alert) => {
                    let interrupt_id = alert.interrupt_id.clone();
                    self.emit(InterruptEvent::Alert {
                        code: code.clone(),
                        alert,
                    });
                    interrupt_id
                }
                FireOutcome::Ineligible => continue,
                FireOutcome::Exhausted | FireOutcome::Gone => return,
            };

            tokio::time::sleep(self.config.window).await;

            let mut registry = self.registry.lock().await;
            let summary = self.close(&mut registry, &code, &interrupt_id);
            drop(registry);

            if let Some(summary) = summary {
                self.emit(InterruptEvent::Closed {
                    code: code.clone(),
                    summary,
                });
            }
        }
    }

    fn emit(&self, event: InterruptEvent) {
        if self.events.send(event).is_err() {
            debug!("interrupt event receiver dropped");
        }
    }

    // -- Synchronous steps ------------------------------------------------

    /// Fires an interrupt for `code` if the session is eligible.
    ///
    /// Picks an unused scenario uniformly, records it as the session's
    /// active interrupt, and returns the alert with its options shuffled.
    pub fn fire(
        &self,
        registry: &mut SessionRegistry,
        code: &SessionCode,
        rng: &mut impl Rng,
        now_ms: u64,
    ) -> FireOutcome {
        let Some(session) = registry.session_mut(code) else {
            return FireOutcome::Gone;
        };

        let eligible = session
            .stage()
            .index()
            .is_some_and(|stage| self.config.is_eligible(stage));
        if !eligible || session.interrupt.active.is_some() {
            debug!(%code, stage = %session.stage(), "interrupt skipped, session not eligible");
            return FireOutcome::Ineligible;
        }

        let slot = &mut session.interrupt;
        let available: Vec<&Scenario> = SCENARIOS
            .iter()
            .filter(|s| !slot.used.contains(s.id))
            .collect();
        let Some(&scenario) = available.choose(rng) else {
            slot.phase = InterruptPhase::Idle;
            slot.disarm();
            info!(%code, "all interrupt scenarios used, no more interrupts");
            return FireOutcome::Exhausted;
        };

        slot.used.insert(scenario.id.to_string());
        slot.active = Some(ActiveInterrupt::new(
            scenario.id.to_string(),
            scenario.correct.to_string(),
            now_ms,
        ));
        slot.phase = InterruptPhase::Active;

        let mut options: Vec<String> = scenario.options.iter().map(|o| o.to_string()).collect();
        options.shuffle(rng);

        info!(%code, interrupt_id = scenario.id, "interrupt fired");
        FireOutcome::Fired(InterruptAlert {
            interrupt_id: scenario.id.to_string(),
            description: scenario.description.to_string(),
            options,
            window_ms: self.config.window.as_millis() as u64,
        })
    }

    /// Scores a player's response to the active interrupt.
    ///
    /// Returns `None`, changing nothing, when the player's session has no
    /// active interrupt, `interrupt_id` is not the active one, or the
    /// player already responded. Late responses land here once the
    /// window has closed.
    pub fn process_response(
        &self,
        registry: &mut SessionRegistry,
        player_id: PlayerId,
        interrupt_id: &str,
        answer: &str,
        now_ms: u64,
    ) -> Option<InterruptOutcome> {
        let code = registry.session_of(player_id)?.clone();
        let session = registry.session_mut(&code)?;

        let Some(active) = session.interrupt.active.as_mut() else {
            debug!(%code, %player_id, "interrupt response with no active interrupt");
            return None;
        };
        if active.interrupt_id != interrupt_id {
            debug!(%code, %player_id, interrupt_id, "response for stale interrupt");
            return None;
        }
        if !active.record_response(player_id) {
            debug!(%code, %player_id, "duplicate interrupt response");
            return None;
        }

        let correct = answer == active.correct_option;
        let points = if correct {
            self.config
                .points_for_correct(now_ms.saturating_sub(active.started_at))
        } else {
            self.config.wrong_points
        };

        session.player_mut(player_id)?.scores.add_to_interrupt(points);
        Some(InterruptOutcome { correct, points })
    }

    /// Closes the response window for `interrupt_id`.
    ///
    /// Every current roster member who did not respond is penalized once.
    /// Returns `None` if that interrupt is not the active one (already
    /// closed, or the session is gone).
    pub fn close(
        &self,
        registry: &mut SessionRegistry,
        code: &SessionCode,
        interrupt_id: &str,
    ) -> Option<InterruptSummary> {
        let session = registry.session_mut(code)?;
        let is_active = session
            .interrupt
            .active
            .as_ref()
            .is_some_and(|a| a.interrupt_id == interrupt_id);
        if !is_active {
            return None;
        }
        let active = session.interrupt.active.take()?;
        session.interrupt.phase = InterruptPhase::Scheduled;

        let missed = self.config.missed_points;
        for player in session.players_mut() {
            if !active.has_responded(player.id) {
                player.scores.add_to_interrupt(missed);
            }
        }

        let responded_count = active.responded_count();
        let summary = InterruptSummary {
            interrupt_id: active.interrupt_id,
            responded_count,
            total_players: session.len(),
        };
        info!(
            %code,
            interrupt_id = %summary.interrupt_id,
            responded = summary.responded_count,
            players = summary.total_players,
            "interrupt closed"
        );
        Some(summary)
    }
}
