// src/llm/openai.rs

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::{AiConfig, EngineConfig},
    llm::{Completion, LlmClient, LlmError, Prompt},
};

/// Client for any engine that speaks the OpenAI chat-completions protocol
/// (OpenAI itself, Gemini's compatibility endpoint, local gateways).
#[derive(Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    engines: HashMap<String, EngineConfig>,
    default_engine: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl HttpLlmClient {
    pub fn new(config: &AiConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            engines: config.engines.clone(),
            default_engine: config.default_engine.clone(),
        })
    }

    fn resolve(&self, engine: Option<&str>) -> Result<(String, &EngineConfig), LlmError> {
        let name = match engine {
            Some(name) => name.trim().to_lowercase(),
            None => self.default_engine.clone().ok_or(LlmError::NotConfigured)?,
        };
        let config = self
            .engines
            .get(&name)
            .ok_or_else(|| LlmError::UnknownEngine(name.clone()))?;
        Ok((name, config))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn engines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }

    async fn complete(
        &self,
        engine: Option<&str>,
        prompt: &Prompt,
    ) -> Result<Completion, LlmError> {
        let (name, config) = self.resolve(engine)?;
        let url = config
            .base_url
            .join("chat/completions")
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let body = ChatRequest {
            model: &config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
        };

        tracing::debug!(engine = %name, model = %config.model, "calling chat completions");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|error| {
                tracing::error!(engine = %name, %error, "error calling AI engine");
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(engine = %name, %status, "AI engine returned error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(Completion { engine: name, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn client() -> HttpLlmClient {
        let mut engines = HashMap::new();
        engines.insert(
            "gemini".to_string(),
            EngineConfig {
                base_url: Url::parse("http://localhost:9/v1/").unwrap(),
                api_key: "k".to_string(),
                model: "m".to_string(),
            },
        );
        HttpLlmClient::new(&AiConfig {
            engines,
            default_engine: Some("gemini".to_string()),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn resolves_default_and_named_engines() {
        let c = client();
        assert_eq!(c.resolve(None).unwrap().0, "gemini");
        assert_eq!(c.resolve(Some(" Gemini ")).unwrap().0, "gemini");
        assert!(matches!(
            c.resolve(Some("openai")),
            Err(LlmError::UnknownEngine(name)) if name == "openai"
        ));
    }

    #[test]
    fn no_default_engine_is_not_configured() {
        let c = HttpLlmClient::new(&AiConfig::default()).unwrap();
        assert!(matches!(c.resolve(None), Err(LlmError::NotConfigured)));
        assert!(c.engines().is_empty());
    }

    #[test]
    fn chat_request_shape() {
        let body = ChatRequest {
            model: "m",
            messages: [
                ChatMessage { role: "system", content: "s" },
                ChatMessage { role: "user", content: "u" },
            ],
            temperature: 0.5,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["temperature"], 0.5);
    }
}
