//! The fixed table of interrupt scenarios.

/// One emergency a session can be interrupted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub id: &'static str,
    pub description: &'static str,
    /// Options in authoring order. Shuffled before they are shown.
    pub options: [&'static str; 4],
    pub correct: &'static str,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        id: "e1",
        description: "A juvenile leatherback is entangled in a shark net 2 miles offshore. \
                      Fishing vessel reports turtle is still moving. What do you do?",
        options: [
            "Dispatch disentanglement team by boat immediately",
            "Wait for the turtle to free itself",
            "Ask the fishing vessel to cut the net",
            "Call the Coast Guard for an airstrike on the net",
        ],
        correct: "Dispatch disentanglement team by boat immediately",
    },
    Scenario {
        id: "e2",
        description: "Cold front approaching \u{2014} water temps dropping to 8\u{b0}C. \
                      Reports of 40+ cold-stunned green turtles washing ashore on a 3-mile \
                      stretch. What is the priority action?",
        options: [
            "Set up triage stations along the beach with warming supplies",
            "Wait until the cold front passes to collect turtles",
            "Release all turtles back into the water immediately",
            "Only collect the largest turtles",
        ],
        correct: "Set up triage stations along the beach with warming supplies",
    },
    Scenario {
        id: "e3",
        description: "Red tide bloom detected near a major nesting beach. Three adult \
                      loggerheads found lethargic in the surf zone. What is the correct response?",
        options: [
            "Transport turtles to rehab facility for brevetoxin treatment",
            "Push the turtles back out to deeper water",
            "Leave them alone \u{2014} they will recover naturally",
            "Euthanize the affected turtles immediately",
        ],
        correct: "Transport turtles to rehab facility for brevetoxin treatment",
    },
];

/// Looks a scenario up by id.
pub fn scenario(id: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_correct_answer_is_an_option() {
        for s in SCENARIOS {
            assert!(s.options.contains(&s.correct), "{} has no correct option", s.id);
        }
    }

    #[test]
    fn test_scenario_ids_are_unique() {
        for (i, a) in SCENARIOS.iter().enumerate() {
            for b in &SCENARIOS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
        assert!(scenario("e2").is_some());
        assert!(scenario("e9").is_none());
    }
}
