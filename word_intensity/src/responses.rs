use std::collections::BTreeMap;

use log::debug;

use crate::config::{Participant, Question, Response, Role};

/// What a word selection did to the response of a question.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SelectionChange {
    /// The word now holds this role.
    Marked(Role),
    /// The word held this role and was deselected.
    Cleared(Role),
    /// Both roles are taken by other words. One of them must be deselected first.
    SlotsFull,
    /// The word is not one of the four words of the question.
    UnknownWord,
}

/// The mutable state of a participant session: the participant and the responses
/// keyed by question index.
///
/// Invariant: a word never holds both roles for the same question.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ResponseStore {
    participant: Option<Participant>,
    responses: BTreeMap<usize, Response>,
}

impl ResponseStore {
    pub fn new() -> ResponseStore {
        ResponseStore::default()
    }

    /// Toggles the role of a word for the question at `index`.
    ///
    /// A word with a role loses it. Otherwise the word takes the most intense slot
    /// if it is free, then the least intense slot. When both slots are taken
    /// nothing changes.
    pub fn select_word(&mut self, index: usize, question: &Question, word: &str) -> SelectionChange {
        if !question.contains(word) {
            debug!("select_word: question {}: unknown word {:?}", index, word);
            return SelectionChange::UnknownWord;
        }
        let response = self.responses.entry(index).or_insert_with(|| Response {
            meaning: question.meaning.clone(),
            most_intense: None,
            least_intense: None,
        });

        let change = match response.role_of(word) {
            Some(Role::MostIntense) => {
                response.most_intense = None;
                SelectionChange::Cleared(Role::MostIntense)
            }
            Some(Role::LeastIntense) => {
                response.least_intense = None;
                SelectionChange::Cleared(Role::LeastIntense)
            }
            None if response.most_intense.is_none() => {
                response.most_intense = Some(word.to_string());
                SelectionChange::Marked(Role::MostIntense)
            }
            None if response.least_intense.is_none() => {
                response.least_intense = Some(word.to_string());
                SelectionChange::Marked(Role::LeastIntense)
            }
            None => SelectionChange::SlotsFull,
        };

        if response.most_intense.is_none() && response.least_intense.is_none() {
            self.responses.remove(&index);
        }
        debug!("select_word: question {}: {:?} -> {:?}", index, word, change);
        change
    }

    pub fn response(&self, index: usize) -> Option<&Response> {
        self.responses.get(&index)
    }

    pub fn is_complete(&self, index: usize) -> bool {
        self.responses
            .get(&index)
            .map(|r| r.is_complete())
            .unwrap_or(false)
    }

    /// The number of questions with both roles assigned.
    pub fn completion_count(&self) -> usize {
        self.responses.values().filter(|r| r.is_complete()).count()
    }

    /// The indexes in `0..total` that are not complete yet.
    pub fn incomplete(&self, total: usize) -> Vec<usize> {
        (0..total).filter(|idx| !self.is_complete(*idx)).collect()
    }

    /// The complete responses, in question order.
    pub fn completed(&self) -> impl Iterator<Item = (usize, &Response)> {
        self.responses
            .iter()
            .filter(|(_, r)| r.is_complete())
            .map(|(idx, r)| (*idx, r))
    }

    pub fn participant(&self) -> Option<&Participant> {
        self.participant.as_ref()
    }

    pub fn set_participant(&mut self, participant: Participant) {
        self.participant = Some(participant);
    }

    /// Removes all the responses and the participant.
    pub fn clear(&mut self) {
        self.responses.clear();
        self.participant = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brightness() -> Question {
        Question::new(
            "degree of brightness",
            ["dim", "bright", "brilliant", "radiant"],
        )
    }

    #[test]
    fn first_selection_is_most_intense_then_least() {
        let q = brightness();
        let mut store = ResponseStore::new();
        assert_eq!(
            store.select_word(0, &q, "radiant"),
            SelectionChange::Marked(Role::MostIntense)
        );
        assert!(!store.is_complete(0));
        assert_eq!(
            store.select_word(0, &q, "dim"),
            SelectionChange::Marked(Role::LeastIntense)
        );
        assert!(store.is_complete(0));
        let r = store.response(0).unwrap();
        assert_eq!(r.meaning, "degree of brightness");
        assert_eq!(r.most_intense.as_deref(), Some("radiant"));
        assert_eq!(r.least_intense.as_deref(), Some("dim"));
    }

    #[test]
    fn third_word_is_rejected_when_slots_are_full() {
        let q = brightness();
        let mut store = ResponseStore::new();
        store.select_word(0, &q, "radiant");
        store.select_word(0, &q, "dim");
        assert_eq!(store.select_word(0, &q, "bright"), SelectionChange::SlotsFull);
        let r = store.response(0).unwrap();
        assert_eq!(r.most_intense.as_deref(), Some("radiant"));
        assert_eq!(r.least_intense.as_deref(), Some("dim"));
    }

    #[test]
    fn selecting_a_marked_word_clears_only_its_role() {
        let q = brightness();
        let mut store = ResponseStore::new();
        store.select_word(0, &q, "radiant");
        store.select_word(0, &q, "dim");
        assert_eq!(
            store.select_word(0, &q, "radiant"),
            SelectionChange::Cleared(Role::MostIntense)
        );
        assert_eq!(store.response(0).unwrap().least_intense.as_deref(), Some("dim"));
        // The free slot is refilled first.
        assert_eq!(
            store.select_word(0, &q, "brilliant"),
            SelectionChange::Marked(Role::MostIntense)
        );
        assert!(store.is_complete(0));
    }

    #[test]
    fn a_word_never_holds_both_roles() {
        let q = brightness();
        let mut store = ResponseStore::new();
        let script = [
            "dim", "dim", "dim", "bright", "dim", "dim", "bright", "radiant", "radiant", "dim",
            "bright", "brilliant", "dim",
        ];
        for w in script {
            store.select_word(0, &q, w);
            if let Some(r) = store.response(0) {
                if let (Some(m), Some(l)) = (&r.most_intense, &r.least_intense) {
                    assert_ne!(m, l);
                }
            }
        }
    }

    #[test]
    fn unknown_word_is_rejected() {
        let q = brightness();
        let mut store = ResponseStore::new();
        assert_eq!(store.select_word(0, &q, "dark"), SelectionChange::UnknownWord);
        assert!(store.response(0).is_none());
    }

    #[test]
    fn counts_and_clear() {
        let q = brightness();
        let mut store = ResponseStore::new();
        for idx in 0..3 {
            store.select_word(idx, &q, "radiant");
            store.select_word(idx, &q, "dim");
        }
        store.select_word(3, &q, "bright");
        assert_eq!(store.completion_count(), 3);
        assert_eq!(store.incomplete(5), vec![3, 4]);
        assert_eq!(
            store.completed().map(|(idx, _)| idx).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        store.set_participant(Participant {
            name: "Ada".to_string(),
            age: "36".to_string(),
            gender: "female".to_string(),
            country: "UK".to_string(),
            first_language: "English".to_string(),
            timestamp: "2024-05-01T10:00:00.000Z".to_string(),
        });
        store.clear();
        assert_eq!(store.completion_count(), 0);
        assert!(store.participant().is_none());
        assert!(store.response(3).is_none());
    }
}
