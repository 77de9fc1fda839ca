// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::models::{
    question::{Answer, QuestionType},
    test::Test,
};

/// JSON blob kept in `test_attempts.answers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptAnswers {
    /// In-progress answers keyed by question id.
    #[serde(default)]
    pub responses: BTreeMap<Uuid, Answer>,
    /// How many times the student left the exam window.
    #[serde(default)]
    pub exit_count: i64,
}

/// Represents the 'test_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_id: Uuid,
    pub answers: Json<AttemptAnswers>,
    pub total_score: Option<f64>,
    pub percentage: Option<f64>,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestAttempt {
    /// Answers are accepted until the per-attempt time limit or the test
    /// window closes, whichever comes first.
    pub fn deadline(&self, test: &Test) -> DateTime<Utc> {
        let limit = self.started_at + Duration::minutes(i64::from(test.duration_minutes));
        limit.min(test.end_time)
    }
}

/// An attempt joined with the metadata of its test, for the "my attempts" list.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptOverview {
    pub id: Uuid,
    pub test_id: Uuid,
    pub test_title: String,
    pub duration_minutes: i32,
    pub total_score: Option<f64>,
    pub percentage: Option<f64>,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Represents the 'question_responses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub user_answer: Option<Json<Answer>>,
    pub is_correct: bool,
    pub marks_obtained: f64,
}

/// A graded answer waiting to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub question_id: Uuid,
    pub user_answer: Option<Answer>,
    pub is_correct: bool,
    pub marks_obtained: f64,
}

/// Everything written when an attempt is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedAttempt {
    pub responses: Vec<NewResponse>,
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

/// A stored response joined with the question it answers.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResponseDetail {
    pub question_id: Uuid,
    pub question_text: String,
    #[sqlx(try_from = "String")]
    pub question_type: QuestionType,
    pub options: Json<Vec<String>>,
    pub correct_answer: Json<Answer>,
    pub explanation: Option<String>,
    pub marks: f64,
    pub negative_marks: f64,
    pub user_answer: Option<Json<Answer>>,
    pub is_correct: bool,
    pub marks_obtained: f64,
}

/// Aggregated counts for a submitted attempt.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreSummary {
    pub total_questions: usize,
    pub answered: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    #[serde(rename = "testId", alias = "test_id")]
    pub test_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SaveAnswersRequest {
    #[serde(rename = "attemptId", alias = "attempt_id")]
    pub attempt_id: Uuid,
    pub answers: BTreeMap<Uuid, Answer>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(rename = "attemptId", alias = "attempt_id")]
    pub attempt_id: Uuid,
    /// Final answers; when omitted the last saved answers are graded.
    pub answers: Option<BTreeMap<Uuid, Answer>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordExitRequest {
    #[serde(rename = "attemptId", alias = "attempt_id")]
    pub attempt_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_blob_defaults_missing_fields() {
        let blob: AttemptAnswers = serde_json::from_str("{}").unwrap();
        assert_eq!(blob, AttemptAnswers::default());

        let blob: AttemptAnswers = serde_json::from_str(r#"{"exit_count": 3}"#).unwrap();
        assert_eq!(blob.exit_count, 3);
        assert!(blob.responses.is_empty());
    }

    #[test]
    fn answers_blob_round_trips_question_keys() {
        let id = Uuid::new_v4();
        let mut blob = AttemptAnswers::default();
        blob.responses.insert(id, Answer::Single("A".to_string()));

        let value = serde_json::to_value(&blob).unwrap();
        assert_eq!(value["responses"][id.to_string()], "A");
        assert_eq!(value["exit_count"], 0);
    }

    #[test]
    fn deadline_is_capped_by_window() {
        let start: DateTime<Utc> = "2025-01-01T10:00:00Z".parse().unwrap();
        let test = Test {
            id: Uuid::new_v4(),
            title: "Mock 1".to_string(),
            description: None,
            duration_minutes: 60,
            start_time: start,
            end_time: start + Duration::minutes(90),
            tags: vec![],
            created_at: start,
        };
        let attempt = TestAttempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            test_id: test.id,
            answers: Json(AttemptAnswers::default()),
            total_score: None,
            percentage: None,
            is_completed: false,
            started_at: start + Duration::minutes(45),
            completed_at: None,
        };

        assert_eq!(attempt.deadline(&test), test.end_time);
    }
}
