// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    grading::{grade_attempt, summarize},
    models::attempt::{
        RecordExitRequest, SaveAnswersRequest, StartAttemptRequest, SubmitAttemptRequest,
    },
    store::DynStore,
    utils::{extract::AppJson, jwt::Claims},
};

fn attempt_not_found() -> AppError {
    AppError::NotFound("Attempt not found".to_string())
}

/// Starts (or resumes) the caller's attempt at a test.
///
/// * 404 if the test does not exist.
/// * 400 if the test window is not open right now.
/// * An unfinished attempt for the same test is returned instead of a new one.
pub async fn start_attempt(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let test = store
        .get_test(req.test_id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    if !test.is_open_at(Utc::now()) {
        return Err(AppError::BadRequest("Test is not currently open".to_string()));
    }

    if let Some(existing) = store.find_open_attempt(user_id, test.id).await? {
        return Ok((
            StatusCode::OK,
            Json(json!({ "attempt": existing, "deadline": existing.deadline(&test), "resumed": true })),
        ));
    }

    let attempt = store.create_attempt(user_id, test.id).await?;
    tracing::info!(attempt = %attempt.id, test = %test.id, "attempt started");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "attempt": attempt, "deadline": attempt.deadline(&test), "resumed": false })),
    ))
}

/// Stores in-progress answers. Rejected once the attempt is submitted or its
/// deadline has passed.
pub async fn save_answers(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SaveAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = store
        .get_attempt(req.attempt_id, user_id)
        .await?
        .ok_or_else(attempt_not_found)?;

    if attempt.is_completed {
        return Err(AppError::BadRequest("Attempt already submitted".to_string()));
    }

    let test = store
        .get_test(attempt.test_id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    if Utc::now() > attempt.deadline(&test) {
        return Err(AppError::BadRequest("Time is up for this attempt".to_string()));
    }

    let saved = store
        .save_responses(req.attempt_id, user_id, req.answers)
        .await?
        // Submitted between the read above and this write.
        .ok_or(AppError::BadRequest("Attempt already submitted".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "saved": saved.answers.0.responses.len(),
    })))
}

/// Grades and closes the attempt.
///
/// Final answers in the body replace whatever was saved; without them the
/// saved answers are graded. Submission is accepted after the deadline so
/// that auto-submits from a client that lost its connection still count,
/// but then only the answers saved in time are graded.
pub async fn submit_attempt(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = store
        .get_attempt(req.attempt_id, user_id)
        .await?
        .ok_or_else(attempt_not_found)?;

    if attempt.is_completed {
        return Err(AppError::BadRequest("Attempt already submitted".to_string()));
    }

    let test = store
        .get_test(attempt.test_id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    let saved = attempt.answers.0.responses.clone();
    let answers = match req.answers {
        Some(_) if Utc::now() > attempt.deadline(&test) => {
            tracing::warn!(attempt = %attempt.id, "late submission; grading saved answers only");
            saved
        }
        Some(answers) => answers,
        None => saved,
    };

    let questions = store.list_questions(attempt.test_id).await?;

    let graded = grade_attempt(&questions, &answers);
    let max_score = graded.max_score;

    let completed = store
        .complete_attempt(req.attempt_id, user_id, answers, graded)
        .await?
        .ok_or(AppError::BadRequest("Attempt already submitted".to_string()))?;

    tracing::info!(
        attempt = %completed.id,
        score = ?completed.total_score,
        "attempt submitted"
    );

    let responses = store.list_responses(completed.id).await?;
    let summary = summarize(&responses);

    Ok(Json(json!({
        "success": true,
        "attempt_id": completed.id,
        "total_score": completed.total_score,
        "max_score": max_score,
        "percentage": completed.percentage,
        "summary": summary,
    })))
}

/// Counts one more "left the exam window" event on the attempt.
pub async fn record_exit(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<RecordExitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let exit_count = store
        .record_exit(req.attempt_id, user_id)
        .await?
        .ok_or_else(attempt_not_found)?;

    tracing::debug!(attempt = %req.attempt_id, exit_count, "exit recorded");

    Ok(Json(json!({ "success": true, "exit_count": exit_count })))
}

/// Score report for one of the caller's submitted attempts.
pub async fn get_result(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = store
        .get_attempt(attempt_id, user_id)
        .await?
        .ok_or_else(attempt_not_found)?;

    if !attempt.is_completed {
        return Err(AppError::BadRequest("Attempt has not been submitted yet".to_string()));
    }

    let test = store
        .get_test(attempt.test_id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    let responses = store.list_responses(attempt.id).await?;
    let summary = summarize(&responses);

    Ok(Json(json!({
        "attempt": attempt,
        "test": test,
        "summary": summary,
        "responses": responses,
    })))
}

/// The caller's attempts, newest first, with test metadata.
pub async fn list_my_attempts(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let attempts = store.list_attempts(user_id).await?;
    Ok(Json(attempts))
}
