// src/llm/mod.rs

//! Hosted text generation used by the authoring and practice endpoints.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

pub mod openai;
pub mod parse;
pub mod prompts;

pub use openai::HttpLlmClient;

pub type DynLlm = Arc<dyn LlmClient>;

/// A two-message chat prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Text returned by an engine, tagged with the engine that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub engine: String,
    pub text: String,
}

#[derive(Debug)]
pub enum LlmError {
    UnknownEngine(String),
    NotConfigured,
    Transport(String),
    Status { status: u16, body: String },
    EmptyResponse,
    Malformed(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::UnknownEngine(name) => write!(f, "unknown AI engine '{}'", name),
            LlmError::NotConfigured => write!(f, "no AI engine is configured"),
            LlmError::Transport(msg) => write!(f, "AI request failed: {}", msg),
            LlmError::Status { status, body } => {
                write!(f, "AI service returned {}: {}", status, body)
            }
            LlmError::EmptyResponse => write!(f, "AI service returned no content"),
            LlmError::Malformed(msg) => write!(f, "AI output could not be used: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Names of the configured engines.
    fn engines(&self) -> Vec<String>;

    /// Runs `prompt` on `engine`, or on the default engine when `None`.
    async fn complete(&self, engine: Option<&str>, prompt: &Prompt)
    -> Result<Completion, LlmError>;
}
