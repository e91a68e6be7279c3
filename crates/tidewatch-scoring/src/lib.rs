//! Scoring for Tidewatch.
//!
//! Turns answer submissions into points and points into leaderboards.
//! Each stage belongs to a [`StageCategory`] with its own point table and
//! speed tiers; answers are decoded once into a [`Submission`] before
//! they are checked.
//!
//! ```text
//! AnswerSubmission ──decode──→ Submission ──score──→ AnswerResult
//!                                                    │
//!                                   player stage bucket (SessionRegistry)
//! ```

mod answer;
mod answers;
mod category;
mod engine;

pub use answer::{ABANDON_SENTINEL, ScoringMode, Submission, split_items};
pub use answers::{checklist_key, default_answer, location_key};
pub use category::{
    ChoicePoints, IDENTIFICATION_TIERS, ITEM_FINDING_TIERS, ITEM_HIT_POINTS, ITEM_MISS_POINTS,
    LAB_TIERS, LOCATION_POINTS, PERFECT_CHECKLIST_BONUS, RELEASE_TIERS, SpeedTiers,
    StageCategory, TRIAGE_TIERS,
};
pub use engine::{ScoringConfig, ScoringEngine};
