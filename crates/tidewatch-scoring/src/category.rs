//! Stage categories and their point tables.
//!
//! Every number that decides a score lives here. The engine only picks
//! the right row.

/// What kind of stage a question belongs to. Each stage index maps to
/// exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCategory {
    /// Stage 1: quick visual identification.
    Identification,
    /// Stage 2: rapid sequential classification. The only category with
    /// a streak bonus.
    Triage,
    /// Stage 3: a location plus a checklist, scored per part.
    Release,
    /// Stage 4: single-choice diagnosis or item-finding sub-tasks.
    Lab,
}

impl StageCategory {
    /// Maps a stage index to its category. `None` outside `1..=4`.
    pub fn from_stage(stage: u8) -> Option<Self> {
        match stage {
            1 => Some(Self::Identification),
            2 => Some(Self::Triage),
            3 => Some(Self::Release),
            4 => Some(Self::Lab),
            _ => None,
        }
    }

    /// Correctness points and wrong-answer penalty for single-choice
    /// questions in this category.
    pub fn choice_points(self) -> ChoicePoints {
        match self {
            Self::Identification => ChoicePoints {
                correct: 100,
                wrong: -25,
            },
            Self::Triage => ChoicePoints {
                correct: 75,
                wrong: -20,
            },
            // Release is always composite; this row only applies if a
            // release question is ever scored as a plain choice.
            Self::Release => ChoicePoints {
                correct: 100,
                wrong: 0,
            },
            Self::Lab => ChoicePoints {
                correct: 150,
                wrong: -50,
            },
        }
    }

    /// Speed tiers for this category's regular questions.
    pub fn speed_tiers(self) -> SpeedTiers {
        match self {
            Self::Identification => IDENTIFICATION_TIERS,
            Self::Triage => TRIAGE_TIERS,
            Self::Release => RELEASE_TIERS,
            Self::Lab => LAB_TIERS,
        }
    }

    pub fn has_streaks(self) -> bool {
        matches!(self, Self::Triage)
    }
}

/// Fixed points for a single-choice answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoicePoints {
    pub correct: i64,
    /// Applied to a wrong answer. Never positive.
    pub wrong: i64,
}

// ---------------------------------------------------------------------------
// Speed tiers
// ---------------------------------------------------------------------------

/// A descending step function from elapsed seconds to bonus points.
///
/// Tiers are `(breakpoint_secs, bonus)` sorted by breakpoint. The first
/// tier whose breakpoint is strictly greater than the elapsed time wins;
/// past the last breakpoint the bonus is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedTiers(&'static [(f64, i64)]);

impl SpeedTiers {
    pub fn bonus(&self, elapsed_secs: f64) -> i64 {
        self.0
            .iter()
            .find(|(breakpoint, _)| elapsed_secs < *breakpoint)
            .map_or(0, |&(_, bonus)| bonus)
    }

    /// Elapsed time from which no bonus is paid.
    pub fn cutoff_secs(&self) -> f64 {
        self.0.last().map_or(0.0, |&(breakpoint, _)| breakpoint)
    }
}

pub const IDENTIFICATION_TIERS: SpeedTiers = SpeedTiers(&[(3.0, 75), (7.0, 50), (12.0, 25)]);
pub const TRIAGE_TIERS: SpeedTiers = SpeedTiers(&[(4.0, 50), (8.0, 30), (12.0, 10)]);
pub const RELEASE_TIERS: SpeedTiers = SpeedTiers(&[(10.0, 75), (20.0, 50), (30.0, 25)]);
pub const LAB_TIERS: SpeedTiers = SpeedTiers(&[(8.0, 75), (15.0, 40), (25.0, 15)]);
/// Item-finding sub-tasks have more to find, so the windows are wider.
pub const ITEM_FINDING_TIERS: SpeedTiers = SpeedTiers(&[(15.0, 50), (25.0, 30), (40.0, 15)]);

// ---------------------------------------------------------------------------
// Per-part points
// ---------------------------------------------------------------------------

/// Release stage: matching location.
pub const LOCATION_POINTS: i64 = 100;
/// Release stage: location matches and every target checklist id is
/// submitted with no extras.
pub const PERFECT_CHECKLIST_BONUS: i64 = 50;
/// Release checklist and lab item-finding: each submitted target id.
pub const ITEM_HIT_POINTS: i64 = 25;
/// Release checklist and lab item-finding: each submitted non-target id.
pub const ITEM_MISS_POINTS: i64 = -15;
