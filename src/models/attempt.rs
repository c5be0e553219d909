// src/models/attempt.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What a subject answered for one question.
/// Serialized as the plain string the runner sends: a taxonomy id, `"clean"` or `"timeout"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Choice {
    Clean,
    Timeout,
    Threat(String),
}

impl Choice {
    pub fn as_str(&self) -> &str {
        match self {
            Choice::Clean => "clean",
            Choice::Timeout => "timeout",
            Choice::Threat(id) => id,
        }
    }
}

impl From<String> for Choice {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "clean" => Choice::Clean,
            "timeout" => Choice::Timeout,
            _ => Choice::Threat(raw),
        }
    }
}

impl From<Choice> for String {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Threat(id) => id,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the 'attempts' table in the database. Rows are never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub assignment_id: i64,
    pub question_id: i64,
    pub click_x: Option<f64>,
    pub click_y: Option<f64>,
    pub user_choice: String,
    pub is_correct: bool,
    /// Hit metric: point-mode distance, 0/1 for polygon hit/miss, `None` when no click was graded.
    pub distance_score: Option<f64>,
    pub duration_seconds: f64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A graded answer waiting to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub question_id: i64,
    pub click_x: Option<f64>,
    pub click_y: Option<f64>,
    pub user_choice: Choice,
    pub is_correct: bool,
    pub distance_score: Option<f64>,
    pub duration_seconds: f64,
}

/// One answer as sent by the exam runner.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: i64,
    pub choice: Choice,
    pub click_x: Option<f64>,
    pub click_y: Option<f64>,
    #[serde(default)]
    pub duration_seconds: f64,
}

/// DTO for submitting a finished exam.
#[derive(Debug, Deserialize)]
pub struct SubmitExamRequest {
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitExamResponse {
    pub score: f64,
    pub correct_count: usize,
    pub total_questions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_round_trips_through_plain_strings() {
        let parsed: Vec<Choice> =
            serde_json::from_str(r#"["clean", "timeout", "bicak"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Choice::Clean,
                Choice::Timeout,
                Choice::Threat("bicak".to_string())
            ]
        );
        assert_eq!(serde_json::to_string(&parsed[2]).unwrap(), r#""bicak""#);
    }
}
