// src/handlers/ai.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    config::MAX_GENERATED_QUESTIONS,
    error::AppError,
    llm::{
        DynLlm,
        parse::{ParsedDrafts, clean_text, parse_difficulty, parse_drafts},
        prompts,
    },
    models::question::{Answer, Difficulty, QuestionDraft, QuestionType},
    utils::extract::AppJson,
};

#[derive(Debug, Deserialize, Validate)]
pub struct EnhanceRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub options: Vec<String>,
    pub engine: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExplainRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub options: Vec<String>,
    pub correct_answer: Answer,
    pub engine: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TranslateRequest {
    #[validate(length(min = 1, max = 10000))]
    pub text: String,
    #[validate(length(min = 2, max = 50))]
    pub target_language: String,
    pub engine: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ParseRequest {
    #[validate(length(min = 1, max = 50000))]
    pub raw_text: String,
    pub engine: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssessDifficultyRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub options: Vec<String>,
    pub engine: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(min = 2, max = 200))]
    pub topic: String,
    #[validate(range(min = 1, max = MAX_GENERATED_QUESTIONS))]
    pub count: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
    pub engine: Option<String>,
}

/// Keeps the drafts that pass the type rules. The returned count covers
/// both these and the entries that never parsed.
fn keep_valid(parsed: ParsedDrafts) -> (Vec<QuestionDraft>, usize) {
    let total = parsed.drafts.len() + parsed.rejected;
    let valid: Vec<QuestionDraft> = parsed
        .drafts
        .into_iter()
        .filter(|d| d.check().is_ok())
        .collect();
    let skipped = total - valid.len();
    (valid, skipped)
}

/// Whether a draft honours the type and difficulty the caller asked for.
fn matches_request(
    draft: &QuestionDraft,
    question_type: Option<QuestionType>,
    difficulty: Option<Difficulty>,
) -> bool {
    question_type.is_none_or(|t| draft.question_type == t)
        && difficulty.is_none_or(|d| draft.difficulty == d)
}

/// Rewrites a question for clarity.
/// Admin only.
pub async fn enhance(
    State(llm): State<DynLlm>,
    AppJson(req): AppJson<EnhanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let prompt = prompts::enhance(&req.question_text, req.question_type, &req.options);
    let completion = llm.complete(req.engine.as_deref(), &prompt).await?;

    Ok(Json(json!({
        "success": true,
        "enhanced_text": clean_text(&completion.text),
        "engine": completion.engine,
    })))
}

/// Drafts an explanation for the answer key.
/// Admin only.
pub async fn explain(
    State(llm): State<DynLlm>,
    AppJson(req): AppJson<ExplainRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let prompt = prompts::explain(
        &req.question_text,
        req.question_type,
        &req.options,
        &req.correct_answer,
    );
    let completion = llm.complete(req.engine.as_deref(), &prompt).await?;

    Ok(Json(json!({
        "success": true,
        "explanation": clean_text(&completion.text),
        "engine": completion.engine,
    })))
}

/// Translates question material.
/// Admin only.
pub async fn translate(
    State(llm): State<DynLlm>,
    AppJson(req): AppJson<TranslateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let prompt = prompts::translate(&req.text, req.target_language.trim());
    let completion = llm.complete(req.engine.as_deref(), &prompt).await?;

    Ok(Json(json!({
        "success": true,
        "translation": clean_text(&completion.text),
        "engine": completion.engine,
    })))
}

/// Converts pasted exam text into question drafts ready for bulk import.
/// Unreadable drafts and drafts whose answer key does not fit their type are
/// dropped and counted.
/// Admin only.
pub async fn parse(
    State(llm): State<DynLlm>,
    AppJson(req): AppJson<ParseRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let completion = llm
        .complete(req.engine.as_deref(), &prompts::parse(&req.raw_text))
        .await?;
    let (questions, skipped) = keep_valid(parse_drafts(&completion.text)?);

    Ok(Json(json!({
        "success": true,
        "questions": questions,
        "skipped": skipped,
        "engine": completion.engine,
    })))
}

/// Classifies a question as easy, medium or hard.
/// Admin only.
pub async fn assess_difficulty(
    State(llm): State<DynLlm>,
    AppJson(req): AppJson<AssessDifficultyRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let prompt = prompts::assess_difficulty(&req.question_text, &req.options);
    let completion = llm.complete(req.engine.as_deref(), &prompt).await?;
    let difficulty = parse_difficulty(&completion.text)?;

    Ok(Json(json!({
        "success": true,
        "difficulty": difficulty,
        "engine": completion.engine,
    })))
}

/// Generates practice questions for any signed-in user.
pub async fn generate(
    State(llm): State<DynLlm>,
    AppJson(req): AppJson<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let count = req.count.unwrap_or(5);
    let prompt = prompts::generate(req.topic.trim(), count, req.difficulty, req.question_type);
    let completion = llm.complete(req.engine.as_deref(), &prompt).await?;

    let (valid, mut skipped) = keep_valid(parse_drafts(&completion.text)?);
    let valid_count = valid.len();
    let mut questions: Vec<QuestionDraft> = valid
        .into_iter()
        .filter(|d| matches_request(d, req.question_type, req.difficulty))
        .collect();
    skipped += valid_count - questions.len();
    questions.truncate(count as usize);

    Ok(Json(json!({
        "success": true,
        "questions": questions,
        "skipped": skipped,
        "engine": completion.engine,
    })))
}

/// Engines a caller may pick from.
pub async fn list_engines(State(llm): State<DynLlm>) -> impl IntoResponse {
    Json(json!({ "engines": llm.engines() }))
}
