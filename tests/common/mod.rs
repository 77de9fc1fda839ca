// tests/common/mod.rs

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use g8::{
    config::{AiConfig, Config},
    llm::{Completion, LlmClient, LlmError, Prompt},
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";
pub const ADMIN_EMAIL: &str = "admin@g8.test";

type Reply = dyn Fn(&Prompt) -> Result<String, LlmError> + Send + Sync;

/// Canned AI engine named "stub".
pub struct StubLlm {
    reply: Box<Reply>,
}

impl StubLlm {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&Prompt) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
        }
    }

    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    fn engines(&self) -> Vec<String> {
        vec!["stub".to_string()]
    }

    async fn complete(
        &self,
        engine: Option<&str>,
        prompt: &Prompt,
    ) -> Result<Completion, LlmError> {
        match engine {
            None | Some("stub") => Ok(Completion {
                engine: "stub".to_string(),
                text: (self.reply)(prompt)?,
            }),
            Some(other) => Err(LlmError::UnknownEngine(other.to_string())),
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_audience: None,
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        cors_origins: vec!["http://localhost:3000".to_string()],
        rust_log: "error".to_string(),
        ai: AiConfig::default(),
    }
}

/// Spawns the app on a random port with an in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_llm(StubLlm::fixed("stub reply")).await
}

pub async fn spawn_app_with_llm(llm: StubLlm) -> TestApp {
    let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(llm), test_config());
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

pub fn token_for(user_id: Uuid, email: &str) -> String {
    sign_jwt(user_id, Some(email), JWT_SECRET, 600).expect("Failed to sign token")
}

pub fn admin_token() -> String {
    token_for(Uuid::new_v4(), ADMIN_EMAIL)
}

pub fn student_token() -> String {
    let id = Uuid::new_v4();
    token_for(id, &format!("s_{}@g8.test", &id.to_string()[..8]))
}
