//! Detection of the attention check questions.
//!
//! Each survey hides a few control questions whose word sets mix one obvious outlier
//! with three closely related words. Their answers are flagged in the submitted data
//! so that the analysis can isolate inattentive participants.

use std::collections::BTreeSet;

/// The known control combinations, grouped by survey.
pub const ATTENTION_CHECK_SETS: [[&str; 4]; 14] = [
    // Survey 1: attitude and importance
    ["boring", "tedious", "dull", "amazing"],
    ["trivial", "minor", "irrelevant", "essential"],
    ["optional", "unimportant", "helpful", "crucial"],
    // Survey 2: quality and problem
    ["expert", "incompetent", "skilled", "professional"],
    ["adequate", "mediocre", "average", "outstanding"],
    ["catastrophic", "devastating", "severe", "trivial"],
    // Survey 3: novelty and rigour
    ["ordinary", "common", "standard", "groundbreaking"],
    ["cutting-edge", "pioneering", "innovative", "outdated"],
    ["sloppy", "careless", "adequate", "meticulous"],
    ["flawless", "perfect", "precise", "unreliable"],
    // Survey 4: scale
    ["small", "limited", "tiny", "enormous"],
    ["enormous", "gigantic", "colossal", "minimal"],
    // Survey 5: utility
    ["useless", "ineffective", "impractical", "transformative"],
    ["perfect", "excellent", "outstanding", "useless"],
];

/// True if the words are exactly one of the control combinations, in any order.
///
/// Partial overlaps never match, and neither do word lists with repeated entries.
pub fn is_attention_check<S: AsRef<str>>(words: &[S]) -> bool {
    let candidate: BTreeSet<&str> = words.iter().map(|w| w.as_ref()).collect();
    if candidate.len() != words.len() {
        return false;
    }
    ATTENTION_CHECK_SETS.iter().any(|check_set| {
        check_set.len() == candidate.len() && check_set.iter().all(|w| candidate.contains(w))
    })
}
