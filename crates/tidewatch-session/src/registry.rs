//! The session registry: every live session, keyed by code.
//!
//! The registry is the single authority for membership and stage
//! progression. It is a plain struct with `&mut self` methods; the gateway
//! wraps it in one [`tokio::sync::Mutex`] ([`SharedRegistry`]) so each
//! client request, and each interrupt timer firing, runs against it as one
//! critical section.
//!
//! ```text
//! create_session ──→ [Lobby] ──start_session──→ [Playing(1)]
//!                       ↑ join/ready              │ complete_stage × roster
//!                                                 ▼
//!                                   [Playing(2..=4)] ──→ [Finished]
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tidewatch_protocol::{AnswerKeyEntry, PlayerId, SessionCode, Stage, is_valid_stage};
use tokio::sync::Mutex;

use crate::{GameConfig, Player, Session, SessionError};

/// The registry as shared between the gateway and the interrupt timers.
pub type SharedRegistry = Arc<Mutex<SessionRegistry>>;

/// What a completed barrier did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Everyone finished `completed`; the session is now on `next`.
    Advanced { completed: u8, next: u8 },
    /// Everyone finished the last stage; the game is over.
    Finished { completed: u8 },
}

/// What happened to a session when a player left it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub code: SessionCode,
    /// Set when the leaver was host and someone remains to take over.
    pub new_host: Option<PlayerId>,
    /// Players left in the session.
    pub remaining: usize,
}

impl Departure {
    /// Returns `true` if nobody is left; the caller should destroy the
    /// session.
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

/// All live sessions plus an index from player to session.
pub struct SessionRegistry {
    sessions: HashMap<SessionCode, Session>,

    /// Which session each player is in. Kept in sync with every roster.
    memberships: HashMap<PlayerId, SessionCode>,

    config: GameConfig,
}

impl SessionRegistry {
    pub fn new(config: GameConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            memberships: HashMap::new(),
            config: config.validated(),
        }
    }

    /// Wraps the registry for sharing across tasks.
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    // -- Membership -------------------------------------------------------

    /// Creates a session with `requester` as host and sole member.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyInSession`] if the requester is in a session
    /// - [`SessionError::InvalidName`] if the name is blank
    pub fn create_session(
        &mut self,
        requester: PlayerId,
        name: &str,
    ) -> Result<&Session, SessionError> {
        self.create_session_with_rng(requester, name, &mut rand::rng())
    }

    /// [`create_session`](Self::create_session) with a caller-supplied
    /// random source for the code.
    pub fn create_session_with_rng(
        &mut self,
        requester: PlayerId,
        name: &str,
        rng: &mut impl Rng,
    ) -> Result<&Session, SessionError> {
        self.ensure_unattached(requester)?;
        let name = self.clean_name(name)?;

        let code = loop {
            let candidate = generate_code(rng);
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!(code = %candidate, "session code collision, regenerating");
        };

        let session = Session::new(code.clone(), Player::new(requester, name));
        self.memberships.insert(requester, code.clone());
        tracing::info!(%code, host = %requester, "session created");

        Ok(&*self.sessions.entry(code).or_insert(session))
    }

    /// Adds `requester` to the session identified by `code`.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyInSession`] if the requester is in a session
    /// - [`SessionError::InvalidName`] if the name is blank
    /// - [`SessionError::NotFound`] for an unknown code
    /// - [`SessionError::AlreadyStarted`] once the lobby is closed
    /// - [`SessionError::Full`] at capacity
    pub fn join_session(
        &mut self,
        code: &SessionCode,
        requester: PlayerId,
        name: &str,
    ) -> Result<&Session, SessionError> {
        self.ensure_unattached(requester)?;
        let name = self.clean_name(name)?;
        let max_players = self.config.max_players;

        let session = self
            .sessions
            .get_mut(code)
            .ok_or_else(|| SessionError::NotFound(code.clone()))?;
        if session.stage() != Stage::Lobby {
            return Err(SessionError::AlreadyStarted(code.clone()));
        }
        if session.len() >= max_players {
            return Err(SessionError::Full(code.clone()));
        }

        session.push_player(Player::new(requester, name));
        self.memberships.insert(requester, code.clone());
        tracing::info!(%code, player_id = %requester, players = session.len(), "player joined");

        Ok(&*session)
    }

    /// Flips the requester's ready flag. Returns the session code so the
    /// caller can broadcast the roster, or `None` if the requester isn't
    /// in a session.
    pub fn toggle_ready(&mut self, requester: PlayerId) -> Option<SessionCode> {
        let code = self.memberships.get(&requester)?.clone();
        let player = self.sessions.get_mut(&code)?.player_mut(requester)?;
        player.ready = !player.ready;
        tracing::debug!(%code, player_id = %requester, ready = player.ready, "ready toggled");
        Some(code)
    }

    /// Removes `requester` from their session.
    ///
    /// Hands the host role to the earliest remaining joiner when needed.
    /// The session itself is left in place even when empty; the caller
    /// decides when to [`destroy_session`](Self::destroy_session).
    pub fn remove_player(&mut self, requester: PlayerId) -> Option<Departure> {
        let code = self.memberships.remove(&requester)?;
        let session = self.sessions.get_mut(&code)?;
        let removal = session.remove_player(requester)?;

        if let Some(new_host) = removal.new_host {
            tracing::info!(%code, %new_host, "host left, role reassigned");
        }
        tracing::info!(%code, player_id = %requester, remaining = session.len(), "player left");

        Some(Departure {
            code,
            new_host: removal.new_host,
            remaining: session.len(),
        })
    }

    /// Drops a session, cancelling its interrupt timer and forgetting any
    /// memberships that still point at it.
    pub fn destroy_session(&mut self, code: &SessionCode) -> bool {
        let Some(mut session) = self.sessions.remove(code) else {
            return false;
        };
        session.interrupt.cancel();
        for player in session.players() {
            self.memberships.remove(&player.id);
        }
        tracing::info!(%code, "session destroyed");
        true
    }

    // -- Game flow --------------------------------------------------------

    /// Moves a lobby session into stage 1.
    ///
    /// Every player's scores, streaks and completion records are cleared,
    /// and so is the answer key. Host authority is the caller's check.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] for an unknown code
    /// - [`SessionError::AlreadyStarted`] if the session left the lobby
    pub fn start_session(&mut self, code: &SessionCode, now_ms: u64) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(code)
            .ok_or_else(|| SessionError::NotFound(code.clone()))?;
        if session.stage() != Stage::Lobby {
            return Err(SessionError::AlreadyStarted(code.clone()));
        }
        session.start(now_ms);
        tracing::info!(%code, players = session.len(), "game started");
        Ok(())
    }

    /// Adds canonical answers to a session's answer key.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] for an unknown code.
    pub fn register_answers(
        &mut self,
        code: &SessionCode,
        entries: impl IntoIterator<Item = AnswerKeyEntry>,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(code)
            .ok_or_else(|| SessionError::NotFound(code.clone()))?;
        session.answer_key.register(entries);
        tracing::debug!(%code, entries = session.answer_key.len(), "answer key updated");
        Ok(())
    }

    /// Records that `requester` finished `stage`. Idempotent.
    ///
    /// Returns the requester's session code, or `None` if they aren't in
    /// a session or `stage` isn't a playable stage.
    pub fn mark_stage_complete(&mut self, requester: PlayerId, stage: u8) -> Option<SessionCode> {
        if !is_valid_stage(stage) {
            return None;
        }
        let code = self.memberships.get(&requester)?.clone();
        let player = self.sessions.get_mut(&code)?.player_mut(requester)?;
        player.completed_stages.insert(stage);
        Some(code)
    }

    /// Returns `true` if every player in the session completed `stage`.
    pub fn all_completed(&self, code: &SessionCode, stage: u8) -> bool {
        self.sessions
            .get(code)
            .is_some_and(|s| s.all_completed(stage))
    }

    /// Sets a session's stage and resets per-stage answer counters.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] for an unknown code.
    pub fn advance_stage(&mut self, code: &SessionCode, next: Stage) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(code)
            .ok_or_else(|| SessionError::NotFound(code.clone()))?;
        let previous = session.stage();
        session.set_stage(next);
        tracing::info!(%code, from = %previous, to = %next, "stage advanced");
        Ok(())
    }

    /// Marks `stage` complete for `requester` and advances the session if
    /// that closed the barrier.
    ///
    /// The advance only happens while `stage` is the session's current
    /// stage, so a late or repeated report can never advance twice.
    pub fn complete_stage(&mut self, requester: PlayerId, stage: u8) -> Option<StageOutcome> {
        let code = self.mark_stage_complete(requester, stage)?;
        self.try_advance(&code, stage)
    }

    /// Re-evaluates the current stage's barrier, e.g. after a player who
    /// was holding it up left.
    pub fn check_barrier(&mut self, code: &SessionCode) -> Option<StageOutcome> {
        let stage = self.sessions.get(code)?.stage().index()?;
        self.try_advance(code, stage)
    }

    fn try_advance(&mut self, code: &SessionCode, stage: u8) -> Option<StageOutcome> {
        let session = self.sessions.get(code)?;
        if session.stage() != Stage::Playing(stage) || !session.all_completed(stage) {
            return None;
        }

        let next = Stage::after(stage);
        self.advance_stage(code, next).ok()?;
        Some(match next {
            Stage::Playing(next) => StageOutcome::Advanced {
                completed: stage,
                next,
            },
            Stage::Lobby | Stage::Finished => StageOutcome::Finished { completed: stage },
        })
    }

    // -- Lookups ----------------------------------------------------------

    pub fn session(&self, code: &SessionCode) -> Option<&Session> {
        self.sessions.get(code)
    }

    pub fn session_mut(&mut self, code: &SessionCode) -> Option<&mut Session> {
        self.sessions.get_mut(code)
    }

    /// The code of the session `player_id` belongs to.
    pub fn session_of(&self, player_id: PlayerId) -> Option<&SessionCode> {
        self.memberships.get(&player_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        let code = self.memberships.get(&player_id)?;
        self.sessions.get(code)?.player(player_id)
    }

    pub fn is_host(&self, player_id: PlayerId) -> bool {
        self.memberships
            .get(&player_id)
            .and_then(|code| self.sessions.get(code))
            .is_some_and(|s| s.is_host(player_id))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // -- Helpers ----------------------------------------------------------

    fn ensure_unattached(&self, requester: PlayerId) -> Result<(), SessionError> {
        match self.memberships.get(&requester) {
            Some(code) => Err(SessionError::AlreadyInSession(requester, code.clone())),
            None => Ok(()),
        }
    }

    /// Trims the name and truncates it to the configured length.
    fn clean_name(&self, name: &str) -> Result<String, SessionError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidName);
        }
        Ok(trimmed.chars().take(self.config.max_name_len).collect())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

/// Draws a random code from the session alphabet.
fn generate_code(rng: &mut impl Rng) -> SessionCode {
    let alphabet = SessionCode::ALPHABET.len();
    let mut indices = [0usize; SessionCode::LEN];
    for slot in &mut indices {
        *slot = rng.random_range(0..alphabet);
    }
    SessionCode::from_indices(indices)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::default()
    }

    /// Host 1 plus `others` joined, still in the lobby.
    fn lobby(reg: &mut SessionRegistry, others: &[u64]) -> SessionCode {
        let code = reg.create_session(pid(1), "Host").unwrap().code().clone();
        for &id in others {
            reg.join_session(&code, pid(id), &format!("p{id}")).unwrap();
        }
        code
    }

    // =====================================================================
    // create_session()
    // =====================================================================

    #[test]
    fn test_create_session_code_uses_alphabet() {
        let mut reg = registry();
        let session = reg.create_session(pid(1), "Ana").unwrap();
        let code = session.code().as_str().to_string();

        assert_eq!(code.len(), SessionCode::LEN);
        assert!(code.bytes().all(|b| SessionCode::ALPHABET.contains(&b)));
        assert!(session.is_host(pid(1)));
        assert_eq!(session.stage(), Stage::Lobby);
    }

    #[test]
    fn test_create_session_collision_regenerates() {
        let mut reg = registry();
        let first = reg
            .create_session_with_rng(pid(1), "A", &mut StdRng::seed_from_u64(7))
            .unwrap()
            .code()
            .clone();
        // Same seed would yield the same code; the registry must pick another.
        let second = reg
            .create_session_with_rng(pid(2), "B", &mut StdRng::seed_from_u64(7))
            .unwrap()
            .code()
            .clone();

        assert_ne!(first, second);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_create_session_already_in_session_returns_error() {
        let mut reg = registry();
        lobby(&mut reg, &[]);
        let result = reg.create_session(pid(1), "Again");
        assert!(matches!(result, Err(SessionError::AlreadyInSession(p, _)) if p == pid(1)));
    }

    #[test]
    fn test_create_session_blank_name_returns_error() {
        let mut reg = registry();
        assert!(matches!(
            reg.create_session(pid(1), "   "),
            Err(SessionError::InvalidName)
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_create_session_long_name_is_truncated() {
        let mut reg = registry();
        let long = "x".repeat(100);
        let session = reg.create_session(pid(1), &format!("  {long} ")).unwrap();
        assert_eq!(session.players()[0].name.chars().count(), 24);
    }

    // =====================================================================
    // join_session()
    // =====================================================================

    #[test]
    fn test_join_session_adds_player_not_host() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);

        let session = reg.join_session(&code, pid(2), "Ben").unwrap();

        assert_eq!(session.len(), 2);
        assert!(!session.is_host(pid(2)));
        assert_eq!(reg.session_of(pid(2)), Some(&code));
    }

    #[test]
    fn test_join_session_unknown_code_returns_not_found() {
        let mut reg = registry();
        let code = SessionCode::parse("ZZZZ").unwrap();
        assert!(matches!(
            reg.join_session(&code, pid(2), "Ben"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_join_session_after_start_returns_already_started() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 0).unwrap();

        assert!(matches!(
            reg.join_session(&code, pid(2), "Late"),
            Err(SessionError::AlreadyStarted(_))
        ));
    }

    #[test]
    fn test_join_session_sixteenth_player_returns_full() {
        let mut reg = registry();
        let others: Vec<u64> = (2..=15).collect();
        let code = lobby(&mut reg, &others);
        assert_eq!(reg.session(&code).unwrap().len(), 15);

        assert!(matches!(
            reg.join_session(&code, pid(16), "Extra"),
            Err(SessionError::Full(_))
        ));
        assert_eq!(reg.session_of(pid(16)), None);
    }

    // =====================================================================
    // toggle_ready() / remove_player() / destroy_session()
    // =====================================================================

    #[test]
    fn test_toggle_ready_flips_flag() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[2]);

        assert_eq!(reg.toggle_ready(pid(2)), Some(code.clone()));
        assert!(reg.player(pid(2)).unwrap().ready);
        reg.toggle_ready(pid(2));
        assert!(!reg.player(pid(2)).unwrap().ready);
    }

    #[test]
    fn test_toggle_ready_unknown_player_returns_none() {
        let mut reg = registry();
        assert_eq!(reg.toggle_ready(pid(9)), None);
    }

    #[test]
    fn test_remove_player_host_reassigns_to_next_joiner() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[2, 3]);

        let departure = reg.remove_player(pid(1)).unwrap();

        assert_eq!(departure.new_host, Some(pid(2)));
        assert_eq!(departure.remaining, 2);
        assert!(reg.is_host(pid(2)));
        assert_eq!(reg.session_of(pid(1)), None);
        assert!(reg.session(&code).is_some());
    }

    #[test]
    fn test_remove_player_last_player_reports_empty() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);

        let departure = reg.remove_player(pid(1)).unwrap();
        assert!(departure.is_empty());

        assert!(reg.destroy_session(&code));
        assert!(reg.is_empty());
        assert!(!reg.destroy_session(&code));
    }

    #[test]
    fn test_remove_player_frees_player_for_new_session() {
        let mut reg = registry();
        lobby(&mut reg, &[2]);
        reg.remove_player(pid(2));
        assert!(reg.create_session(pid(2), "Ben").is_ok());
    }

    // =====================================================================
    // start_session() / register_answers()
    // =====================================================================

    #[test]
    fn test_start_session_twice_returns_already_started() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 5).unwrap();

        let session = reg.session(&code).unwrap();
        assert_eq!(session.stage(), Stage::Playing(1));
        assert_eq!(session.started_at(), Some(5));

        assert!(matches!(
            reg.start_session(&code, 6),
            Err(SessionError::AlreadyStarted(_))
        ));
    }

    #[test]
    fn test_register_answers_overrides_entries() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 0).unwrap();

        reg.register_answers(
            &code,
            [
                AnswerKeyEntry {
                    question_id: "n1".into(),
                    correct_answer: "First".into(),
                },
                AnswerKeyEntry {
                    question_id: "n1".into(),
                    correct_answer: "Second".into(),
                },
            ],
        )
        .unwrap();

        let key = &reg.session(&code).unwrap().answer_key;
        assert_eq!(key.get("n1"), Some("Second"));
        assert_eq!(key.get("n2"), None);
    }

    // =====================================================================
    // complete_stage() / check_barrier()
    // =====================================================================

    #[test]
    fn test_complete_stage_waits_for_whole_roster() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[2]);
        reg.start_session(&code, 0).unwrap();

        assert_eq!(reg.complete_stage(pid(1), 1), None);
        assert!(!reg.all_completed(&code, 1));

        assert_eq!(
            reg.complete_stage(pid(2), 1),
            Some(StageOutcome::Advanced {
                completed: 1,
                next: 2
            })
        );
        assert_eq!(reg.session(&code).unwrap().stage(), Stage::Playing(2));
    }

    #[test]
    fn test_complete_stage_repeated_report_advances_once() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 0).unwrap();

        assert!(reg.complete_stage(pid(1), 1).is_some());
        assert_eq!(reg.complete_stage(pid(1), 1), None);
        assert_eq!(reg.session(&code).unwrap().stage(), Stage::Playing(2));
    }

    #[test]
    fn test_complete_stage_future_stage_does_not_advance() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 0).unwrap();

        assert_eq!(reg.complete_stage(pid(1), 3), None);
        assert_eq!(reg.session(&code).unwrap().stage(), Stage::Playing(1));
    }

    #[test]
    fn test_complete_stage_last_stage_finishes() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 0).unwrap();
        for stage in 1..=3 {
            reg.complete_stage(pid(1), stage).unwrap();
        }

        assert_eq!(
            reg.complete_stage(pid(1), 4),
            Some(StageOutcome::Finished { completed: 4 })
        );
        assert_eq!(reg.session(&code).unwrap().stage(), Stage::Finished);
    }

    #[test]
    fn test_complete_stage_invalid_stage_ignored() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 0).unwrap();

        assert_eq!(reg.complete_stage(pid(1), 0), None);
        assert_eq!(reg.complete_stage(pid(1), 9), None);
        assert!(reg.player(pid(1)).unwrap().completed_stages.is_empty());
    }

    #[test]
    fn test_advance_stage_resets_answer_counters() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        reg.start_session(&code, 0).unwrap();
        reg.session_mut(&code)
            .unwrap()
            .player_mut(pid(1))
            .unwrap()
            .answered = 4;

        reg.advance_stage(&code, Stage::Playing(2)).unwrap();

        assert_eq!(reg.player(pid(1)).unwrap().answered, 0);
    }

    #[test]
    fn test_check_barrier_after_departure_advances() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[2]);
        reg.start_session(&code, 0).unwrap();
        reg.complete_stage(pid(1), 1);

        reg.remove_player(pid(2));

        assert_eq!(
            reg.check_barrier(&code),
            Some(StageOutcome::Advanced {
                completed: 1,
                next: 2
            })
        );
    }

    #[test]
    fn test_check_barrier_in_lobby_returns_none() {
        let mut reg = registry();
        let code = lobby(&mut reg, &[]);
        assert_eq!(reg.check_barrier(&code), None);
    }
}
