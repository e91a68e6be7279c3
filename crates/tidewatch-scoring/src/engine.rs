//! The scoring engine.
//!
//! [`ScoringEngine::process_answer`] validates one submission against the
//! session's answer key and writes the points into the submitter's stage
//! bucket. The leaderboard projections are computed fresh from player
//! state on every call; nothing is cached.

use serde::{Deserialize, Serialize};
use tidewatch_protocol::{
    AnswerResult, AnswerSubmission, FinalResults, PlayerId, RankingEntry, SessionCode, StageResult,
};
use tidewatch_session::{Player, Session, SessionRegistry};

use crate::answer::{ScoringMode, Submission, split_items};
use crate::answers::{checklist_key, default_answer, location_key};
use crate::category::{
    ITEM_FINDING_TIERS, ITEM_HIT_POINTS, ITEM_MISS_POINTS, LOCATION_POINTS,
    PERFECT_CHECKLIST_BONUS, StageCategory,
};

/// Streak tuning for the triage stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Consecutive correct answers needed before the bonus applies.
    pub streak_threshold: u32,

    /// Score multiplier once the streak is reached. The bonus paid is the
    /// excess over 1.0, rounded.
    pub streak_multiplier: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            streak_threshold: 3,
            streak_multiplier: 1.5,
        }
    }
}

impl ScoringConfig {
    pub fn validated(mut self) -> Self {
        if self.streak_threshold == 0 {
            tracing::warn!("streak_threshold is 0, raising to 1");
            self.streak_threshold = 1;
        }
        if !self.streak_multiplier.is_finite() || self.streak_multiplier < 1.0 {
            tracing::warn!(
                multiplier = self.streak_multiplier,
                "streak_multiplier below 1.0, clamping"
            );
            self.streak_multiplier = 1.0;
        }
        self
    }
}

/// Points before the streak bonus.
struct Scored {
    correct: bool,
    base_points: i64,
    speed_bonus: i64,
    canonical_answer: String,
}

/// Stateless apart from its configuration; all scores live on the
/// players in the [`SessionRegistry`].
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    /// Scores one answer and adds it to the submitter's stage bucket.
    ///
    /// Returns `None` when the answer can't be attributed: the player is
    /// in no session, or the stage index is not a playable stage. Nothing
    /// is changed in that case.
    pub fn process_answer(
        &self,
        registry: &mut SessionRegistry,
        player_id: PlayerId,
        submission: &AnswerSubmission,
        now_ms: u64,
    ) -> Option<AnswerResult> {
        let Some(category) = StageCategory::from_stage(submission.stage) else {
            tracing::debug!(%player_id, stage = submission.stage, "answer for invalid stage dropped");
            return None;
        };
        let code = registry.session_of(player_id)?.clone();
        let session = registry.session_mut(&code)?;

        let elapsed = elapsed_secs(submission.presented_at, now_ms);
        let scored = score(session, category, submission, elapsed);

        let player = session.player_mut(player_id)?;
        let streak_bonus = if category.has_streaks() {
            self.apply_streak(player, &scored)
        } else {
            0
        };

        let result = AnswerResult {
            correct: scored.correct,
            base_points: scored.base_points,
            speed_bonus: scored.speed_bonus,
            streak_bonus,
            canonical_answer: scored.canonical_answer,
        };
        player.scores.add_to_stage(submission.stage, result.total());
        player.answered += 1;

        tracing::debug!(
            %code,
            %player_id,
            question = %submission.question_id,
            correct = result.correct,
            points = result.total(),
            "answer scored"
        );
        Some(result)
    }

    /// Updates the player's streak and returns the bonus for this answer.
    ///
    /// A wrong answer resets the streak before anything is paid, so the
    /// answer that breaks a streak never earns a bonus.
    fn apply_streak(&self, player: &mut Player, scored: &Scored) -> i64 {
        if !scored.correct {
            player.streak = 0;
            return 0;
        }
        player.streak += 1;
        if player.streak < self.config.streak_threshold {
            return 0;
        }
        let earned = (scored.base_points + scored.speed_bonus) as f64;
        (earned * (self.config.streak_multiplier - 1.0)).round() as i64
    }

    // -- Leaderboards -----------------------------------------------------

    /// Overall standings: every bucket summed, highest first. Ties keep
    /// join order. Unknown code → empty.
    pub fn rankings(&self, registry: &SessionRegistry, code: &SessionCode) -> Vec<RankingEntry> {
        registry.session(code).map(session_rankings).unwrap_or_default()
    }

    /// One stage's bucket per player, highest first.
    pub fn stage_results(
        &self,
        registry: &SessionRegistry,
        code: &SessionCode,
        stage: u8,
    ) -> Vec<StageResult> {
        let Some(session) = registry.session(code) else {
            return Vec::new();
        };
        let mut results: Vec<StageResult> = session
            .players()
            .iter()
            .filter_map(|p| {
                Some(StageResult {
                    player_id: p.id,
                    name: p.name.clone(),
                    stage_score: p.scores.stage(stage)?,
                })
            })
            .collect();
        results.sort_by(|a, b| b.stage_score.cmp(&a.stage_score));
        results
    }

    /// Standings plus the top scorer, for the game-over broadcast.
    pub fn final_results(&self, registry: &SessionRegistry, code: &SessionCode) -> FinalResults {
        let rankings = self.rankings(registry, code);
        let top_scorer = rankings.first().cloned();
        FinalResults {
            rankings,
            top_scorer,
        }
    }
}

fn session_rankings(session: &Session) -> Vec<RankingEntry> {
    let mut rankings: Vec<RankingEntry> = session
        .players()
        .iter()
        .map(|p| RankingEntry {
            player_id: p.id,
            name: p.name.clone(),
            total: p.scores.total(),
            scores: p.scores,
        })
        .collect();
    // `sort_by` is stable, which keeps join order on ties.
    rankings.sort_by(|a, b| b.total.cmp(&a.total));
    rankings
}

// ---------------------------------------------------------------------------
// Per-mode scoring
// ---------------------------------------------------------------------------

fn elapsed_secs(presented_at: u64, now_ms: u64) -> f64 {
    now_ms.saturating_sub(presented_at) as f64 / 1000.0
}

/// Session key first, then the built-in table.
fn lookup(session: &Session, key: &str) -> Option<String> {
    session
        .answer_key
        .get(key)
        .or_else(|| default_answer(key))
        .map(str::to_owned)
}

fn score(
    session: &Session,
    category: StageCategory,
    submission: &AnswerSubmission,
    elapsed: f64,
) -> Scored {
    let canonical = lookup(session, &submission.question_id);
    let mode = ScoringMode::detect(category, canonical.as_deref());

    match Submission::decode(mode, &submission.answer) {
        Submission::Choice(answer) => score_choice(category, canonical, answer, elapsed),
        Submission::Composite { primary, items } => {
            score_release(session, &submission.question_id, &primary, &items, elapsed)
        }
        Submission::ItemSet(tapped) => {
            score_item_set(canonical.unwrap_or_default(), &tapped, elapsed)
        }
        Submission::Abandoned => Scored {
            correct: false,
            base_points: 0,
            speed_bonus: 0,
            canonical_answer: canonical.unwrap_or_default(),
        },
    }
}

fn score_choice(
    category: StageCategory,
    canonical: Option<String>,
    answer: String,
    elapsed: f64,
) -> Scored {
    let points = category.choice_points();
    // No canonical answer: free-form question, anything goes.
    let (correct, canonical_answer) = match canonical {
        Some(canonical) => (answer == canonical, canonical),
        None => (true, answer),
    };

    if correct {
        Scored {
            correct,
            base_points: points.correct,
            speed_bonus: category.speed_tiers().bonus(elapsed),
            canonical_answer,
        }
    } else {
        Scored {
            correct,
            base_points: points.wrong,
            speed_bonus: 0,
            canonical_answer,
        }
    }
}

/// Location and checklist are validated independently. A part with no
/// canonical value can't be matched.
fn score_release(
    session: &Session,
    question_id: &str,
    location: &str,
    checklist: &[String],
    elapsed: f64,
) -> Scored {
    let canonical_location = lookup(session, &location_key(question_id));
    let canonical_checklist = lookup(session, &checklist_key(question_id));
    let targets = canonical_checklist
        .as_deref()
        .map(split_items)
        .unwrap_or_default();

    let location_ok = canonical_location.as_deref() == Some(location);
    let (hits, misses) = tally(checklist, &targets);
    let perfect = hits == targets.len() && misses == 0;

    let correct = location_ok && perfect;

    let mut base_points = hits as i64 * ITEM_HIT_POINTS + misses as i64 * ITEM_MISS_POINTS;
    if location_ok {
        base_points += LOCATION_POINTS;
    }
    // The bonus needs both parts right, not just the checklist.
    if correct {
        base_points += PERFECT_CHECKLIST_BONUS;
    }
    let speed_bonus = if correct {
        StageCategory::Release.speed_tiers().bonus(elapsed)
    } else {
        0
    };

    Scored {
        correct,
        base_points,
        speed_bonus,
        canonical_answer: format!(
            "{}|{}",
            canonical_location.unwrap_or_default(),
            canonical_checklist.unwrap_or_default()
        ),
    }
}

/// Every tap scores on its own; correct means all targets were found,
/// whatever else was tapped.
fn score_item_set(canonical: String, tapped: &[String], elapsed: f64) -> Scored {
    let targets = split_items(&canonical);
    let (hits, misses) = tally(tapped, &targets);
    let correct = hits == targets.len();

    Scored {
        correct,
        base_points: hits as i64 * ITEM_HIT_POINTS + misses as i64 * ITEM_MISS_POINTS,
        speed_bonus: if correct {
            ITEM_FINDING_TIERS.bonus(elapsed)
        } else {
            0
        },
        canonical_answer: canonical,
    }
}

/// Counts submitted ids inside and outside the target set.
fn tally(submitted: &[String], targets: &[String]) -> (usize, usize) {
    let hits = submitted.iter().filter(|id| targets.contains(*id)).count();
    (hits, submitted.len() - hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_config_validated_clamps() {
        let config = ScoringConfig {
            streak_threshold: 0,
            streak_multiplier: 0.5,
        }
        .validated();
        assert_eq!(config.streak_threshold, 1);
        assert_eq!(config.streak_multiplier, 1.0);
    }

    #[test]
    fn test_elapsed_secs_clock_skew_is_zero() {
        assert_eq!(elapsed_secs(5_000, 1_000), 0.0);
        assert_eq!(elapsed_secs(1_000, 3_500), 2.5);
    }

    #[test]
    fn test_tally_counts_hits_and_misses() {
        let targets = split_items("a,b,c");
        let submitted = split_items("a,x,c,y");
        assert_eq!(tally(&submitted, &targets), (2, 2));
    }

    #[test]
    fn test_score_choice_no_canonical_is_trivially_correct() {
        let scored = score_choice(StageCategory::Identification, None, "anything".into(), 1.0);
        assert!(scored.correct);
        assert_eq!(scored.base_points, 100);
        assert_eq!(scored.speed_bonus, 75);
        assert_eq!(scored.canonical_answer, "anything");
    }

    #[test]
    fn test_score_item_set_all_found_with_extras_is_correct() {
        let tapped = split_items("a,b,x");
        let scored = score_item_set("a,b".into(), &tapped, 10.0);
        assert!(scored.correct);
        assert_eq!(scored.base_points, 25 + 25 - 15);
        assert_eq!(scored.speed_bonus, 50);
    }
}
