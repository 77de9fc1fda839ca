// src/grading.rs

//! Scoring of submitted attempts and aggregation of stored responses.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{
    config::NAT_TOLERANCE,
    models::{
        attempt::{GradedAttempt, NewResponse, ResponseDetail, ScoreSummary},
        question::{Answer, Question, QuestionType},
    },
};

/// Grades one answer against the question's key.
///
/// Wrong answers lose `negative_marks`; blank answers score zero.
pub fn grade_answer(question: &Question, answer: Option<&Answer>) -> NewResponse {
    let answer = answer.filter(|a| !a.is_blank());

    let Some(answer) = answer else {
        return NewResponse {
            question_id: question.id,
            user_answer: None,
            is_correct: false,
            marks_obtained: 0.0,
        };
    };

    let key = &question.correct_answer.0;
    let is_correct = match question.question_type {
        QuestionType::Mcq => match (answer, key) {
            (Answer::Single(given), Answer::Single(expected)) => given.trim() == expected.trim(),
            _ => false,
        },
        QuestionType::Msq => answer.as_choice_set() == key.as_choice_set(),
        QuestionType::Nat => match (answer.as_number(), key.as_number()) {
            (Some(given), Some(expected)) => (given - expected).abs() <= NAT_TOLERANCE,
            _ => false,
        },
    };

    let marks_obtained = if is_correct {
        question.marks
    } else {
        -question.negative_marks.abs()
    };

    NewResponse {
        question_id: question.id,
        user_answer: Some(answer.clone()),
        is_correct,
        marks_obtained,
    }
}

/// Grades every question of a test. Answers to questions that are not part
/// of the test are ignored.
pub fn grade_attempt(questions: &[Question], answers: &BTreeMap<Uuid, Answer>) -> GradedAttempt {
    let responses: Vec<NewResponse> = questions
        .iter()
        .map(|q| grade_answer(q, answers.get(&q.id)))
        .collect();

    let total_score: f64 = responses.iter().map(|r| r.marks_obtained).sum();
    let max_score: f64 = questions.iter().map(|q| q.marks).sum();

    GradedAttempt {
        responses,
        total_score,
        max_score,
        percentage: percentage(total_score, max_score),
    }
}

/// Sums already-graded responses. Pure, so the same rows always give the
/// same summary.
pub fn summarize(responses: &[ResponseDetail]) -> ScoreSummary {
    let total_questions = responses.len();
    let answered = responses.iter().filter(|r| r.user_answer.is_some()).count();
    let correct = responses.iter().filter(|r| r.is_correct).count();
    let score: f64 = responses.iter().map(|r| r.marks_obtained).sum();
    let max_score: f64 = responses.iter().map(|r| r.marks).sum();

    ScoreSummary {
        total_questions,
        answered,
        correct,
        incorrect: answered.saturating_sub(correct),
        unanswered: total_questions - answered,
        score,
        max_score,
        percentage: percentage(score, max_score),
    }
}

fn percentage(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    ((score / max_score) * 10_000.0).round() / 100.0
}
