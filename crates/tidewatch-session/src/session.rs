//! A single session ("room") and the per-player state it owns.
//!
//! A [`Session`] is pure data plus a handful of invariant-preserving
//! methods. All mutation goes through the
//! [`SessionRegistry`](crate::SessionRegistry), which holds the only
//! reference to each session behind one lock; the scoring engine and the
//! interrupt scheduler borrow sessions from it for the duration of one
//! operation.

use std::collections::{BTreeSet, HashMap, HashSet};

use tidewatch_protocol::{
    AnswerKeyEntry, PlayerId, PlayerSummary, ScoreBuckets, SessionCode, Stage,
};
use tokio::task::AbortHandle;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A participant in a session.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
    pub scores: ScoreBuckets,
    /// Answers submitted in the current stage. Reset on every transition.
    pub answered: u32,
    /// Stages this player has reported as completed.
    pub completed_stages: BTreeSet<u8>,
    /// Consecutive correct answers. Only the scoring engine touches it.
    pub streak: u32,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            ready: false,
            scores: ScoreBuckets::default(),
            answered: 0,
            completed_stages: BTreeSet::new(),
            streak: 0,
        }
    }

    /// Returns `true` if the player reported `stage` as completed.
    pub fn has_completed(&self, stage: u8) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Clears everything a new game starts from scratch.
    fn reset_progress(&mut self) {
        self.scores = ScoreBuckets::default();
        self.answered = 0;
        self.completed_stages.clear();
        self.streak = 0;
    }
}

// ---------------------------------------------------------------------------
// Answer key
// ---------------------------------------------------------------------------

/// Per-session overrides of the default answer table.
///
/// Populated when the host starts the game. Lookups that miss here fall
/// back to the built-in table in the scoring crate.
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    entries: HashMap<String, String>,
}

impl AnswerKey {
    /// Adds or replaces entries. Later entries for the same question win.
    pub fn register(&mut self, entries: impl IntoIterator<Item = AnswerKeyEntry>) {
        for entry in entries {
            self.entries.insert(entry.question_id, entry.correct_answer);
        }
    }

    /// The registered answer for `question_id`, if any.
    pub fn get(&self, question_id: &str) -> Option<&str> {
        self.entries.get(question_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Interrupt slot
// ---------------------------------------------------------------------------

/// Where a session's interrupt schedule stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptPhase {
    /// Never started, or every scenario has been used.
    #[default]
    Idle,
    /// A timer is armed for the next interrupt.
    Scheduled,
    /// An interrupt is accepting responses.
    Active,
    /// Stopped explicitly (game over or session torn down).
    Stopped,
}

/// The interrupt currently accepting responses.
#[derive(Debug, Clone)]
pub struct ActiveInterrupt {
    pub interrupt_id: String,
    pub correct_option: String,
    /// Unix milliseconds at which the alert went out.
    pub started_at: u64,
    responded: HashSet<PlayerId>,
}

impl ActiveInterrupt {
    pub fn new(interrupt_id: String, correct_option: String, started_at: u64) -> Self {
        Self {
            interrupt_id,
            correct_option,
            started_at,
            responded: HashSet::new(),
        }
    }

    /// Records a response. Returns `false` if the player already answered.
    pub fn record_response(&mut self, player_id: PlayerId) -> bool {
        self.responded.insert(player_id)
    }

    pub fn has_responded(&self, player_id: PlayerId) -> bool {
        self.responded.contains(&player_id)
    }

    pub fn responded_count(&self) -> usize {
        self.responded.len()
    }
}

/// Interrupt bookkeeping attached to every session.
///
/// The slot owns the abort handle of the session's scheduler task, so a
/// session that is dropped (destroyed) takes its timer with it.
#[derive(Debug, Default)]
pub struct InterruptSlot {
    pub phase: InterruptPhase,
    pub active: Option<ActiveInterrupt>,
    /// Scenario ids already fired in this session. Each fires at most once.
    pub used: HashSet<String>,
    timer: Option<AbortHandle>,
}

impl InterruptSlot {
    /// Installs the handle of a freshly spawned scheduler task, aborting
    /// any task that was there before.
    pub fn arm(&mut self, timer: AbortHandle) {
        if let Some(previous) = self.timer.replace(timer) {
            previous.abort();
        }
    }

    /// Returns `true` while a scheduler task is installed.
    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Aborts the scheduler task and forgets the active interrupt and the
    /// used scenarios.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.active = None;
        self.used.clear();
        self.phase = InterruptPhase::Stopped;
    }

    /// Forgets the scheduler task without aborting it. Used by the task
    /// itself when it exits on its own.
    pub fn disarm(&mut self) {
        self.timer = None;
    }
}

impl Drop for InterruptSlot {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One game session.
///
/// Players are kept in join order; the first one is the host until they
/// leave, at which point the earliest remaining joiner takes over.
#[derive(Debug)]
pub struct Session {
    code: SessionCode,
    host: PlayerId,
    players: Vec<Player>,
    stage: Stage,
    started_at: Option<u64>,
    pub answer_key: AnswerKey,
    pub interrupt: InterruptSlot,
}

impl Session {
    pub(crate) fn new(code: SessionCode, host: Player) -> Self {
        Self {
            code,
            host: host.id,
            players: vec![host],
            stage: Stage::Lobby,
            started_at: None,
            answer_key: AnswerKey::default(),
            interrupt: InterruptSlot::default(),
        }
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn host(&self) -> PlayerId {
        self.host
    }

    pub fn is_host(&self, player_id: PlayerId) -> bool {
        self.host == player_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Unix milliseconds at which the host started the game.
    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Returns `true` when every player in the roster has completed
    /// `stage`. An empty roster never satisfies the barrier.
    pub fn all_completed(&self, stage: u8) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.has_completed(stage))
    }

    /// Roster snapshot for broadcasting.
    pub fn summaries(&self) -> Vec<PlayerSummary> {
        self.players
            .iter()
            .map(|p| PlayerSummary {
                id: p.id,
                name: p.name.clone(),
                ready: p.ready,
                is_host: p.id == self.host,
                scores: p.scores,
            })
            .collect()
    }

    pub(crate) fn push_player(&mut self, player: Player) {
        self.players.push(player);
    }

    /// Moves the session into stage 1 and wipes any previous progress.
    pub(crate) fn start(&mut self, now_ms: u64) {
        for player in &mut self.players {
            player.reset_progress();
        }
        self.answer_key.clear();
        self.stage = Stage::Playing(1);
        self.started_at = Some(now_ms);
    }

    /// Sets the stage and clears the per-stage answer counters.
    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
        for player in &mut self.players {
            player.answered = 0;
        }
    }

    /// Removes a player. If they were the host, the earliest remaining
    /// joiner is promoted and returned.
    pub(crate) fn remove_player(&mut self, player_id: PlayerId) -> Option<Removal> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        self.players.remove(index);

        let mut new_host = None;
        if self.host == player_id {
            if let Some(next) = self.players.first() {
                self.host = next.id;
                new_host = Some(next.id);
            }
        }
        Some(Removal { new_host })
    }
}

pub(crate) struct Removal {
    pub new_host: Option<PlayerId>,
}
