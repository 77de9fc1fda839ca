// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{error::AppError, models::question::PublicQuestion, store::DynStore};

/// Lists all tests with their question counts. Public.
pub async fn list_tests(State(store): State<DynStore>) -> Result<impl IntoResponse, AppError> {
    let tests = store.list_tests().await?;
    Ok(Json(tests))
}

/// Returns a test and its questions, with answer keys stripped.
/// Questions stay hidden until the test window opens.
pub async fn get_test(
    State(store): State<DynStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let test = store
        .get_test(id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    let questions: Vec<PublicQuestion> = if Utc::now() < test.start_time {
        Vec::new()
    } else {
        store
            .list_questions(id)
            .await?
            .into_iter()
            .map(PublicQuestion::from)
            .collect()
    };

    Ok(Json(json!({
        "test": test,
        "questions": questions,
    })))
}
