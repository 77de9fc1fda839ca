// src/models/question.rs

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Question type: single-choice, multi-choice or numeric answer.
/// Accepted case-insensitively on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "MSQ")]
    Msq,
    #[serde(rename = "NAT")]
    Nat,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Msq => "MSQ",
            QuestionType::Nat => "NAT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for QuestionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MCQ" => Ok(QuestionType::Mcq),
            "MSQ" => Ok(QuestionType::Msq),
            "NAT" => Ok(QuestionType::Nat),
            _ => Err(UnknownVariant {
                kind: "question type",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for QuestionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "difficulty",
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for Difficulty {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An answer as submitted by a student or stored as the key.
///
/// MCQ uses `Single`, MSQ uses `Multiple`, NAT accepts `Numeric` or a
/// numeric `Single` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Numeric(f64),
    Single(String),
    Multiple(Vec<String>),
}

impl Answer {
    /// Blank strings and empty selections count as "not answered".
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Numeric(n) => !n.is_finite(),
            Answer::Single(s) => s.trim().is_empty(),
            Answer::Multiple(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Answer::Numeric(n) => Some(*n),
            Answer::Single(s) => s.trim().parse().ok(),
            Answer::Multiple(_) => None,
        }
    }

    /// Trimmed, de-duplicated selection. A single choice is a one-element set.
    pub fn as_choice_set(&self) -> BTreeSet<String> {
        match self {
            Answer::Single(s) => [s.trim().to_string()].into_iter().collect(),
            Answer::Multiple(v) => v
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Answer::Numeric(n) => [n.to_string()].into_iter().collect(),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    pub question_text: String,
    #[sqlx(try_from = "String")]
    pub question_type: QuestionType,
    /// Stored as a JSON array; empty for NAT.
    pub options: Json<Vec<String>>,
    pub correct_answer: Json<Answer>,
    pub marks: f64,
    /// Magnitude deducted for a wrong answer.
    pub negative_marks: f64,
    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,
    pub explanation: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for sending a question to a student (no answer key, no explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub marks: f64,
    pub negative_marks: f64,
    pub difficulty: Difficulty,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            options: q.options.0,
            marks: q.marks,
            negative_marks: q.negative_marks,
            difficulty: q.difficulty,
        }
    }
}

/// Question content without identity; the shape admins author, AI drafts,
/// and the store inserts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct QuestionDraft {
    #[validate(length(min = 1, max = 5000, message = "Question text must be between 1 and 5000 characters."))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: Answer,
    #[serde(default = "default_marks")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub marks: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub negative_marks: f64,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
}

fn default_marks() -> f64 {
    1.0
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() > 10 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

impl QuestionDraft {
    /// Field validation plus the rules that tie the answer key to the type.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;

        let options: BTreeSet<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
        if options.len() != self.options.len() {
            return Err(AppError::BadRequest("Options must be distinct".to_string()));
        }

        match self.question_type {
            QuestionType::Mcq => {
                if self.options.len() < 2 {
                    return Err(AppError::BadRequest(
                        "MCQ questions need at least two options".to_string(),
                    ));
                }
                let Answer::Single(ref key) = self.correct_answer else {
                    return Err(AppError::BadRequest(
                        "MCQ correct answer must be a single option".to_string(),
                    ));
                };
                if !options.contains(key.trim()) {
                    return Err(AppError::BadRequest(
                        "MCQ correct answer must be one of the options".to_string(),
                    ));
                }
            }
            QuestionType::Msq => {
                if self.options.len() < 2 {
                    return Err(AppError::BadRequest(
                        "MSQ questions need at least two options".to_string(),
                    ));
                }
                let Answer::Multiple(_) = self.correct_answer else {
                    return Err(AppError::BadRequest(
                        "MSQ correct answer must be a list of options".to_string(),
                    ));
                };
                let key = self.correct_answer.as_choice_set();
                if key.is_empty() || !key.is_subset(&options) {
                    return Err(AppError::BadRequest(
                        "MSQ correct answers must be a non-empty subset of the options".to_string(),
                    ));
                }
            }
            QuestionType::Nat => {
                if !self.options.is_empty() {
                    return Err(AppError::BadRequest(
                        "NAT questions do not take options".to_string(),
                    ));
                }
                if self.correct_answer.as_number().is_none_or(|n| !n.is_finite()) {
                    return Err(AppError::BadRequest(
                        "NAT correct answer must be a number".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Strips unsafe markup from the free-text fields. Options are left alone
    /// because answers are matched against them verbatim.
    pub fn sanitized(mut self) -> Self {
        self.question_text = crate::utils::html::clean_html(&self.question_text);
        self.explanation = self
            .explanation
            .map(|e| crate::utils::html::clean_html(&e));
        self
    }
}

impl From<&Question> for QuestionDraft {
    fn from(q: &Question) -> Self {
        Self {
            question_text: q.question_text.clone(),
            question_type: q.question_type,
            options: q.options.0.clone(),
            correct_answer: q.correct_answer.0.clone(),
            marks: q.marks,
            negative_marks: q.negative_marks,
            difficulty: q.difficulty,
            explanation: q.explanation.clone(),
        }
    }
}

/// DTO for creating a single question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[serde(alias = "testId")]
    pub test_id: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub question: QuestionDraft,
}

/// DTO for importing several questions at once.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkCreateQuestionsRequest {
    #[serde(alias = "testId")]
    pub test_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub questions: Vec<QuestionDraft>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    #[serde(rename = "questionId", alias = "question_id")]
    pub question_id: Uuid,
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<Answer>,
    pub marks: Option<f64>,
    pub negative_marks: Option<f64>,
    pub difficulty: Option<Difficulty>,
    pub explanation: Option<String>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.question_text.is_none()
            && self.question_type.is_none()
            && self.options.is_none()
            && self.correct_answer.is_none()
            && self.marks.is_none()
            && self.negative_marks.is_none()
            && self.difficulty.is_none()
            && self.explanation.is_none()
    }

    /// Overlays the given fields on the stored question.
    pub fn apply(self, current: &Question) -> QuestionDraft {
        let base = QuestionDraft::from(current);
        QuestionDraft {
            question_text: self.question_text.unwrap_or(base.question_text),
            question_type: self.question_type.unwrap_or(base.question_type),
            options: self.options.unwrap_or(base.options),
            correct_answer: self.correct_answer.unwrap_or(base.correct_answer),
            marks: self.marks.unwrap_or(base.marks),
            negative_marks: self.negative_marks.unwrap_or(base.negative_marks),
            difficulty: self.difficulty.unwrap_or(base.difficulty),
            explanation: self.explanation.or(base.explanation),
        }
    }
}
