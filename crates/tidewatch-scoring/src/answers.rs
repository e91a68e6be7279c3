//! Built-in answer table.
//!
//! Sessions can override or extend it at start time through
//! [`AnswerKey`](tidewatch_session::AnswerKey); lookups consult the
//! session first.

/// Canonical answer for a question in the built-in table.
///
/// Release questions are keyed per part: `r1-location`, `r1-checklist`.
pub fn default_answer(question_id: &str) -> Option<&'static str> {
    let answer = match question_id {
        // Identification
        "n1" => "Live Nest",
        "n2" => "False Crawl",
        "n3" => "Predator-Raided",
        "n4" => "Hatched (old)",
        "n5" => "Washed Over",

        // Triage
        "s1" => "CC0",
        "s2" => "CC1",
        "s3" => "CC2",
        "s4" => "CC3",
        "s5" => "CC4",

        // Release
        "r1-location" => "Warm waters off the coast of central Florida",
        "r1-checklist" => "r1-c1,r1-c2,r1-c3",
        "r2-location" => "Indian River Lagoon, FL (original capture location)",
        "r2-checklist" => "r2-c1,r2-c2,r2-c3",
        "r3-location" => "Nearshore waters off Topsail Beach, NC (original stranding location)",
        "r3-checklist" => "r3-c1,r3-c2,r3-c3",
        "r4-location" => "Warm offshore waters in the Gulf Stream south of Cape Hatteras",
        "r4-checklist" => "r4-c1,r4-c2,r4-c3",
        "r5-location" => "Coral reef habitat in the Florida Keys (near original stranding site)",
        "r5-checklist" => "r5-c1,r5-c2,r5-c3",
        "r6-location" => "Nearshore waters off Mustang Island, TX (original stranding site)",
        "r6-checklist" => "r6-c1,r6-c2,r6-c3",

        // Lab
        "lab1-st1" => "lab1-m1,lab1-m3,lab1-m5,lab1-m8",
        "lab1-st2" => "Spirorchid cardiovascular fluke egg embolization to the brain",
        "lab1-st3" => "Regenerative anemia from chronic blood loss due to vascular flukes",
        "lab3-st1" => "lab3-s1,lab3-s3,lab3-s5,lab3-s6,lab3-s8,lab3-s10",
        "lab3-st2" => {
            "Intestinal impaction with secondary necrosis and perforation from plastic debris"
        }
        "lab3-st3" => {
            "Severe metabolic acidosis with lactic acidemia and hyperkalemia \u{2014} consistent with tissue necrosis and sepsis"
        }
        "lab4-st1" => {
            "Mixed respiratory and metabolic acidosis \u{2014} consistent with cold stunning"
        }
        "lab4-st2" => {
            "Stress hyperglycemia, dehydration, muscle damage, and immune suppression \u{2014} all consistent with cold-stunning syndrome"
        }
        "lab4-st3" => {
            "Warm slowly \u{2014} no more than 3-5 degrees C per day \u{2014} to prevent reperfusion injury and cardiac arrhythmias"
        }

        _ => return None,
    };
    Some(answer)
}

/// Key under which a release question's location part is stored.
pub fn location_key(question_id: &str) -> String {
    format!("{question_id}-location")
}

/// Key under which a release question's checklist part is stored.
pub fn checklist_key(question_id: &str) -> String {
    format!("{question_id}-checklist")
}
