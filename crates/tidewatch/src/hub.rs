//! Request routing and fan-out.
//!
//! The [`Hub`] owns the shared registry, the scoring engine and the
//! interrupt scheduler, plus one outbox per connected player. Every
//! client request is routed while holding the registry lock and its
//! replies are queued on the outboxes before the lock is released, so
//! all players of a session observe broadcasts in the same order.
//!
//! ```text
//! handler ──dispatch──→ route(&mut registry) ──→ [(Recipient, ServerMessage)]
//!                                                   │ deliver
//! interrupt timers ──InterruptEvent──→ forward ─────┤
//!                                                   ▼
//!                                          per-player outboxes
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tidewatch_interrupt::{InterruptConfig, InterruptEvent, InterruptScheduler};
use tidewatch_protocol::{
    ClientMessage, ErrorKind, PlayerId, ServerMessage, SessionCode, unix_millis,
};
use tidewatch_scoring::{ScoringConfig, ScoringEngine};
use tidewatch_session::{
    GameConfig, Session, SessionError, SessionRegistry, SharedRegistry, StageOutcome,
};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Where a connection's outgoing messages are queued.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Who a routed message is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Player(PlayerId),
    /// Everyone on the session's roster at delivery time.
    Session(SessionCode),
}

type Outbound = Vec<(Recipient, ServerMessage)>;

/// Shared state behind every connection task.
pub struct Hub {
    registry: SharedRegistry,
    scoring: ScoringEngine,
    interrupts: InterruptScheduler,
    peers: Mutex<HashMap<PlayerId, Outbox>>,
    next_player_id: AtomicU64,
}

impl Hub {
    /// Builds a hub and the interrupt event stream that
    /// [`forward_interrupts`](Self::forward_interrupts) should consume.
    pub fn new(
        game: GameConfig,
        scoring: ScoringConfig,
        interrupts: InterruptConfig,
    ) -> (Self, mpsc::UnboundedReceiver<InterruptEvent>) {
        let registry = SessionRegistry::new(game).into_shared();
        let (interrupts, events) = InterruptScheduler::new(Arc::clone(&registry), interrupts);
        let hub = Self {
            registry,
            scoring: ScoringEngine::new(scoring),
            interrupts,
            peers: Mutex::new(HashMap::new()),
            next_player_id: AtomicU64::new(1),
        };
        (hub, events)
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Assigns a fresh player id to a new connection, registers its
    /// outbox and queues the `Welcome`.
    pub async fn connect(&self, outbox: Outbox) -> PlayerId {
        let player_id = PlayerId(self.next_player_id.fetch_add(1, Ordering::Relaxed));
        let _ = outbox.send(ServerMessage::Welcome { player_id });
        self.peers.lock().await.insert(player_id, outbox);
        debug!(%player_id, "peer registered");
        player_id
    }

    /// Routes one client request and delivers the replies.
    pub async fn dispatch(&self, player_id: PlayerId, message: ClientMessage) {
        let mut registry = self.registry.lock().await;
        let outbound = self.route(&mut registry, player_id, message, unix_millis());
        self.deliver(&registry, outbound).await;
    }

    /// Forgets a connection and removes its player from their session.
    ///
    /// The remaining roster gets a fresh snapshot. An emptied session is
    /// destroyed; otherwise the current stage barrier is re-checked,
    /// since the leaver may have been the last one holding it.
    pub async fn disconnect(&self, player_id: PlayerId) {
        self.peers.lock().await.remove(&player_id);

        let mut registry = self.registry.lock().await;
        let outbound = self.depart(&mut registry, player_id);
        self.deliver(&registry, outbound).await;
    }

    /// Broadcasts interrupt alerts and window closings until the
    /// scheduler goes away.
    pub async fn forward_interrupts(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<InterruptEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let registry = self.registry.lock().await;
            let outbound = self.interrupt_outbound(&registry, event);
            self.deliver(&registry, outbound).await;
        }
    }

    /// An alert is only forwarded while it is still the session's active
    /// interrupt. The game may have ended or the session emptied between
    /// the timer firing and the event being picked up here.
    fn interrupt_outbound(&self, registry: &SessionRegistry, event: InterruptEvent) -> Outbound {
        match event {
            InterruptEvent::Alert { code, alert } => {
                let live = registry
                    .session(&code)
                    .and_then(|session| session.interrupt.active.as_ref())
                    .is_some_and(|active| active.interrupt_id == alert.interrupt_id);
                if !live {
                    debug!(%code, interrupt_id = %alert.interrupt_id, "stale interrupt alert dropped");
                    return Vec::new();
                }
                vec![(Recipient::Session(code), ServerMessage::InterruptAlert(alert))]
            }
            InterruptEvent::Closed { code, summary } => vec![
                (
                    Recipient::Session(code.clone()),
                    ServerMessage::InterruptEnded(summary),
                ),
                self.leaderboard(registry, &code),
            ],
        }
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    fn route(
        &self,
        registry: &mut SessionRegistry,
        player_id: PlayerId,
        message: ClientMessage,
        now_ms: u64,
    ) -> Outbound {
        match message {
            ClientMessage::CreateSession { name } => {
                match registry.create_session(player_id, &name) {
                    Ok(session) => vec![
                        (
                            Recipient::Player(player_id),
                            ServerMessage::SessionCreated {
                                code: session.code().clone(),
                                host: true,
                            },
                        ),
                        roster(session),
                    ],
                    Err(e) => reject(player_id, &e),
                }
            }

            ClientMessage::JoinSession { code, name } => {
                let Some(parsed) = SessionCode::parse(&code) else {
                    return vec![(
                        Recipient::Player(player_id),
                        ServerMessage::error(
                            404,
                            ErrorKind::NotFound,
                            format!("session {} not found", code.trim()),
                        ),
                    )];
                };
                match registry.join_session(&parsed, player_id, &name) {
                    Ok(session) => vec![roster(session)],
                    Err(e) => reject(player_id, &e),
                }
            }

            ClientMessage::ToggleReady => {
                let snapshot = match registry.toggle_ready(player_id) {
                    Some(code) => registry.session(&code).map(roster),
                    None => None,
                };
                match snapshot {
                    Some(snapshot) => vec![snapshot],
                    None => reject(player_id, &SessionError::PlayerNotFound(player_id)),
                }
            }

            ClientMessage::StartSession { answers } => {
                let Some(code) = registry.session_of(player_id).cloned() else {
                    return reject(player_id, &SessionError::PlayerNotFound(player_id));
                };
                if !registry.is_host(player_id) {
                    return vec![(
                        Recipient::Player(player_id),
                        ServerMessage::error(
                            403,
                            ErrorKind::NotHost,
                            "only the host can start the session",
                        ),
                    )];
                }
                let started = registry
                    .start_session(&code, now_ms)
                    .and_then(|()| registry.register_answers(&code, answers));
                if let Err(e) = started {
                    return reject(player_id, &e);
                }
                self.interrupts.start(registry, &code);
                vec![(Recipient::Session(code), ServerMessage::GameStarted { stage: 1 })]
            }

            ClientMessage::SubmitAnswer(submission) => {
                let Some(result) =
                    self.scoring
                        .process_answer(registry, player_id, &submission, now_ms)
                else {
                    return Vec::new();
                };
                let mut outbound = vec![(
                    Recipient::Player(player_id),
                    ServerMessage::AnswerResult(result),
                )];
                if let Some(code) = registry.session_of(player_id) {
                    outbound.push(self.leaderboard(registry, code));
                }
                outbound
            }

            ClientMessage::StageComplete { stage } => {
                let Some(code) = registry.session_of(player_id).cloned() else {
                    return Vec::new();
                };
                match registry.complete_stage(player_id, stage) {
                    Some(outcome) => self.transition(registry, &code, outcome),
                    None => Vec::new(),
                }
            }

            ClientMessage::InterruptResponse {
                interrupt_id,
                answer,
                ..
            } => {
                let Some(outcome) = self.interrupts.process_response(
                    registry,
                    player_id,
                    &interrupt_id,
                    &answer,
                    now_ms,
                ) else {
                    return Vec::new();
                };
                let mut outbound = vec![(
                    Recipient::Player(player_id),
                    ServerMessage::InterruptResult(outcome),
                )];
                if let Some(code) = registry.session_of(player_id) {
                    outbound.push(self.leaderboard(registry, code));
                }
                outbound
            }

            ClientMessage::Heartbeat { client_time } => vec![(
                Recipient::Player(player_id),
                ServerMessage::HeartbeatAck {
                    client_time,
                    server_time: now_ms,
                },
            )],

            // The handler closes the connection; cleanup runs on disconnect.
            ClientMessage::Disconnect { .. } => Vec::new(),
        }
    }

    fn depart(&self, registry: &mut SessionRegistry, player_id: PlayerId) -> Outbound {
        let Some(departure) = registry.remove_player(player_id) else {
            return Vec::new();
        };
        if departure.is_empty() {
            registry.destroy_session(&departure.code);
            return Vec::new();
        }

        let code = departure.code;
        let mut outbound: Outbound = registry.session(&code).map(roster).into_iter().collect();
        if let Some(outcome) = registry.check_barrier(&code) {
            outbound.extend(self.transition(registry, &code, outcome));
        }
        outbound
    }

    fn transition(
        &self,
        registry: &mut SessionRegistry,
        code: &SessionCode,
        outcome: StageOutcome,
    ) -> Outbound {
        let message = match outcome {
            StageOutcome::Advanced { completed, next } => ServerMessage::StageTransition {
                next_stage: next,
                stage_results: self.scoring.stage_results(registry, code, completed),
                rankings: self.scoring.rankings(registry, code),
            },
            StageOutcome::Finished { .. } => {
                self.interrupts.stop(registry, code);
                ServerMessage::GameOver {
                    final_results: self.scoring.final_results(registry, code),
                }
            }
        };
        vec![(Recipient::Session(code.clone()), message)]
    }

    fn leaderboard(
        &self,
        registry: &SessionRegistry,
        code: &SessionCode,
    ) -> (Recipient, ServerMessage) {
        (
            Recipient::Session(code.clone()),
            ServerMessage::Leaderboard {
                rankings: self.scoring.rankings(registry, code),
            },
        )
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Queues each message on its recipients' outboxes. Session
    /// recipients are resolved against `registry`, which the caller still
    /// holds locked.
    async fn deliver(&self, registry: &SessionRegistry, outbound: Outbound) {
        if outbound.is_empty() {
            return;
        }
        let peers = self.peers.lock().await;
        for (recipient, message) in outbound {
            match recipient {
                Recipient::Player(player_id) => send(&peers, player_id, message),
                Recipient::Session(code) => {
                    let Some(session) = registry.session(&code) else {
                        continue;
                    };
                    for player in session.players() {
                        send(&peers, player.id, message.clone());
                    }
                }
            }
        }
    }
}

fn send(peers: &HashMap<PlayerId, Outbox>, player_id: PlayerId, message: ServerMessage) {
    let Some(outbox) = peers.get(&player_id) else {
        return;
    };
    if outbox.send(message).is_err() {
        debug!(%player_id, "outbox closed, message dropped");
    }
}

fn roster(session: &Session) -> (Recipient, ServerMessage) {
    (
        Recipient::Session(session.code().clone()),
        ServerMessage::Roster {
            code: session.code().clone(),
            host: session.host(),
            players: session.summaries(),
        },
    )
}

/// Maps a registry error to the error payload sent to the requester.
pub(crate) fn error_payload(err: &SessionError) -> ServerMessage {
    let (code, kind) = match err {
        SessionError::NotFound(_) | SessionError::PlayerNotFound(_) => (404, ErrorKind::NotFound),
        SessionError::AlreadyStarted(_) => (409, ErrorKind::AlreadyStarted),
        SessionError::Full(_) => (409, ErrorKind::Full),
        SessionError::AlreadyInSession(..) => (409, ErrorKind::AlreadyInSession),
        SessionError::InvalidName => (400, ErrorKind::InvalidName),
    };
    ServerMessage::error(code, kind, err.to_string())
}

fn reject(player_id: PlayerId, err: &SessionError) -> Outbound {
    debug!(%player_id, error = %err, "request rejected");
    vec![(Recipient::Player(player_id), error_payload(err))]
}
