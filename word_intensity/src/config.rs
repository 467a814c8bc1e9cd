// ********* Input data structures ***********

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

/// One word-ranking question.
///
/// The participant picks the most intense and the least intense of the four words
/// with respect to the meaning.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Question {
    pub meaning: String,
    pub words: [String; 4],
}

impl Question {
    pub fn new(meaning: &str, words: [&str; 4]) -> Question {
        Question {
            meaning: meaning.to_string(),
            words: words.map(|w| w.to_string()),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }
}

/// The identifier of one of the five word surveys.
///
/// It is transmitted as a string ("1" to "5") to the collection endpoint.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SurveyId(u8);

impl SurveyId {
    pub const ALL: [SurveyId; 5] = [SurveyId(1), SurveyId(2), SurveyId(3), SurveyId(4), SurveyId(5)];

    pub fn new(number: u8) -> Option<SurveyId> {
        if (1..=5).contains(&number) {
            Some(SurveyId(number))
        } else {
            None
        }
    }

    pub fn parse(s: &str) -> Option<SurveyId> {
        s.trim().parse::<u8>().ok().and_then(SurveyId::new)
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl Display for SurveyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SurveyId> for String {
    fn from(id: SurveyId) -> String {
        id.to_string()
    }
}

impl TryFrom<String> for SurveyId {
    type Error = String;
    fn try_from(s: String) -> Result<SurveyId, String> {
        SurveyId::parse(&s).ok_or_else(|| format!("unknown survey {:?}", s))
    }
}

/// The raw values of the demographics form, before validation.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub country: String,
    pub first_language: String,
}

impl Demographics {
    /// The form fields with their display labels, in form order.
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("name", self.name.as_str()),
            ("age", self.age.as_str()),
            ("gender", self.gender.as_str()),
            ("country", self.country.as_str()),
            ("first language", self.first_language.as_str()),
        ]
    }
}

/// A participant, as recorded when the demographics were accepted.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub country: String,
    pub first_language: String,
    /// ISO-8601, captured at the demographics transition.
    pub timestamp: String,
}

/// The two ranking roles.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Role {
    MostIntense,
    LeastIntense,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::MostIntense => write!(f, "MOST INTENSE"),
            Role::LeastIntense => write!(f, "LEAST INTENSE"),
        }
    }
}

/// The selections made for one question.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub meaning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_intense: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub least_intense: Option<String>,
}

impl Response {
    pub fn is_complete(&self) -> bool {
        match (&self.most_intense, &self.least_intense) {
            (Some(most), Some(least)) => most != least,
            _ => false,
        }
    }

    pub fn role_of(&self, word: &str) -> Option<Role> {
        if self.most_intense.as_deref() == Some(word) {
            Some(Role::MostIntense)
        } else if self.least_intense.as_deref() == Some(word) {
            Some(Role::LeastIntense)
        } else {
            None
        }
    }
}

// ********* Configuration **********

/// How the collected responses are sent to the collection endpoint.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SubmissionRules {
    /// Number of responses per message. Larger sets are split in chunks of this size.
    pub chunk_size: usize,
    /// Pause between two chunks.
    pub chunk_delay: Duration,
    /// Bound for a single, unchunked submission.
    pub timeout: Duration,
    /// Bound for each chunk.
    pub chunk_timeout: Duration,
}

impl SubmissionRules {
    pub const DEFAULT_RULES: SubmissionRules = SubmissionRules {
        chunk_size: 25,
        chunk_delay: Duration::from_secs(1),
        timeout: Duration::from_secs(60),
        chunk_timeout: Duration::from_secs(30),
    };
}

impl Default for SubmissionRules {
    fn default() -> Self {
        SubmissionRules::DEFAULT_RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survey_ids_are_bounded() {
        assert_eq!(SurveyId::parse("3").map(|s| s.number()), Some(3));
        assert_eq!(SurveyId::parse(" 5 ").map(|s| s.number()), Some(5));
        assert!(SurveyId::parse("0").is_none());
        assert!(SurveyId::parse("6").is_none());
        assert!(SurveyId::parse("two").is_none());
    }

    #[test]
    fn survey_id_serializes_as_string() {
        let js = serde_json::to_string(&SurveyId::ALL[1]).unwrap();
        assert_eq!(js, "\"2\"");
        let back: SurveyId = serde_json::from_str("\"4\"").unwrap();
        assert_eq!(back.number(), 4);
        assert!(serde_json::from_str::<SurveyId>("\"9\"").is_err());
    }

    #[test]
    fn response_completeness_requires_two_distinct_words() {
        let mut r = Response {
            meaning: "speed".to_string(),
            most_intense: Some("rapid".to_string()),
            least_intense: None,
        };
        assert!(!r.is_complete());
        r.least_intense = Some("rapid".to_string());
        assert!(!r.is_complete());
        r.least_intense = Some("slow".to_string());
        assert!(r.is_complete());
        assert_eq!(r.role_of("slow"), Some(Role::LeastIntense));
        assert_eq!(r.role_of("fast"), None);
    }
}
