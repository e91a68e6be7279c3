//! Decoding raw answer strings into a typed [`Submission`].
//!
//! Clients encode structured answers in plain strings: a release answer
//! is `"location|id,id,id"`, an item-finding answer is `"id,id"`. They are
//! decoded here, once, according to the question's [`ScoringMode`].

use crate::StageCategory;

/// Sentinel a client sends when a player gives up on an item-finding
/// sub-task.
pub const ABANDON_SENTINEL: &str = "gave_up";

/// How one question is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Exact match against one canonical value.
    SingleChoice,
    /// Two parts, each checked against its own canonical value.
    Composite,
    /// A set of target ids; each tap scores on its own.
    ItemFinding,
}

impl ScoringMode {
    /// Picks the mode for a question.
    ///
    /// Release questions are always composite. In the lab stage a
    /// canonical answer listing more than one id, the first of which
    /// looks like an id (contains `-`), marks an item-finding sub-task.
    /// Everything else is single choice.
    pub fn detect(category: StageCategory, canonical: Option<&str>) -> Self {
        match category {
            StageCategory::Release => Self::Composite,
            StageCategory::Lab if canonical.is_some_and(is_item_list) => Self::ItemFinding,
            _ => Self::SingleChoice,
        }
    }
}

fn is_item_list(canonical: &str) -> bool {
    let mut ids = canonical.split(',');
    let first = ids.next().unwrap_or_default();
    ids.next().is_some() && first.contains('-')
}

/// A decoded answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Choice(String),
    Composite { primary: String, items: Vec<String> },
    ItemSet(Vec<String>),
    /// The player gave up on an item-finding sub-task.
    Abandoned,
}

impl Submission {
    pub fn decode(mode: ScoringMode, raw: &str) -> Self {
        match mode {
            ScoringMode::SingleChoice => Self::Choice(raw.to_string()),
            ScoringMode::Composite => {
                let (primary, items) = raw.split_once('|').unwrap_or((raw, ""));
                Self::Composite {
                    primary: primary.to_string(),
                    items: split_items(items),
                }
            }
            ScoringMode::ItemFinding if raw == ABANDON_SENTINEL => Self::Abandoned,
            ScoringMode::ItemFinding => Self::ItemSet(split_items(raw)),
        }
    }
}

/// Splits a comma-separated id list, dropping empty entries and repeats
/// while keeping first-seen order.
pub fn split_items(list: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for id in list.split(',').filter(|id| !id.is_empty()) {
        if !items.iter().any(|seen| seen == id) {
            items.push(id.to_string());
        }
    }
    items
}
