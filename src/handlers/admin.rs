// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{BulkCreateQuestionsRequest, CreateQuestionRequest, UpdateQuestionRequest},
        test::{CreateTestRequest, NewTest, Schedule, TestChanges, UpdateTestRequest},
    },
    store::DynStore,
    utils::{extract::AppJson, jwt::Claims},
};

fn test_not_found() -> AppError {
    AppError::NotFound("Test not found".to_string())
}

fn question_not_found() -> AppError {
    AppError::NotFound("Question not found".to_string())
}

/// Creates a new test.
/// Admin only. Rejects a window whose end is not after its start.
pub async fn create_test(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let schedule = Schedule::new(payload.start_time, payload.end_time, payload.duration_minutes)?;

    let test = store
        .create_test(NewTest {
            title: payload.title.trim().to_string(),
            description: payload.description,
            schedule,
            tags: payload.tags,
        })
        .await?;

    tracing::info!(admin = ?claims.email, test = %test.id, "test created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "test": test })),
    ))
}

/// Updates a test's details or schedule.
/// Admin only. Changing only the duration moves the end time to
/// `start + duration`.
pub async fn update_test(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<UpdateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = store
        .get_test(payload.test_id)
        .await?
        .ok_or_else(test_not_found)?;

    let schedule = current.schedule().reschedule(&payload.schedule_patch())?;

    let test = store
        .update_test(
            payload.test_id,
            TestChanges {
                title: payload.title.map(|t| t.trim().to_string()),
                description: payload.description,
                tags: payload.tags,
                schedule,
            },
        )
        .await?
        .ok_or_else(test_not_found)?;

    tracing::info!(admin = ?claims.email, test = %test.id, "test updated");

    Ok(Json(json!({ "success": true, "test": test })))
}

/// Deletes a test with its questions and attempts.
/// Admin only.
pub async fn delete_test(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_test(id).await? {
        return Err(test_not_found());
    }

    tracing::info!(admin = ?claims.email, test = %id, "test deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Lists a test's questions including answer keys.
/// Admin only.
pub async fn list_questions(
    State(store): State<DynStore>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    store.get_test(test_id).await?.ok_or_else(test_not_found)?;
    let questions = store.list_questions(test_id).await?;
    Ok(Json(questions))
}

/// Creates a new question.
/// Admin only.
pub async fn create_question(
    State(store): State<DynStore>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.question.check()?;

    store
        .get_test(payload.test_id)
        .await?
        .ok_or_else(test_not_found)?;

    let created = store
        .create_questions(payload.test_id, vec![payload.question.sanitized()])
        .await?;
    let question = created
        .into_iter()
        .next()
        .ok_or(AppError::InternalServerError("Question insert returned no row".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "question": question })),
    ))
}

/// Imports several questions into a test. All are validated before any is
/// inserted; the first invalid one fails the request with its index.
/// Admin only.
pub async fn bulk_create_questions(
    State(store): State<DynStore>,
    AppJson(payload): AppJson<BulkCreateQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    for (index, question) in payload.questions.iter().enumerate() {
        question.check().map_err(|e| match e {
            AppError::BadRequest(msg) => AppError::BadRequest(format!("Question {}: {}", index + 1, msg)),
            other => other,
        })?;
    }

    store
        .get_test(payload.test_id)
        .await?
        .ok_or_else(test_not_found)?;

    let drafts = payload.questions.into_iter().map(|q| q.sanitized()).collect();
    let created = store.create_questions(payload.test_id, drafts).await?;

    tracing::info!(test = %payload.test_id, count = created.len(), "questions imported");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "created": created.len(), "questions": created })),
    ))
}

/// Updates a question. The merged result must still satisfy the type rules.
/// Admin only.
pub async fn update_question(
    State(store): State<DynStore>,
    AppJson(payload): AppJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = payload.question_id;
    let current = store
        .get_question(id)
        .await?
        .ok_or_else(question_not_found)?;

    if payload.is_empty() {
        return Ok(Json(json!({ "success": true, "question": current })));
    }

    let merged = payload.apply(&current);
    merged.check()?;

    let question = store
        .update_question(id, merged.sanitized())
        .await?
        .ok_or_else(question_not_found)?;

    Ok(Json(json!({ "success": true, "question": question })))
}

/// Deletes a question by ID.
/// Admin only.
pub async fn delete_question(
    State(store): State<DynStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_question(id).await? {
        return Err(question_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
