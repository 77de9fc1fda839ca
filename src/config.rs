// src/config.rs

use std::{collections::HashMap, env, fmt, net::SocketAddr};

use dotenvy::dotenv;
use url::Url;

/// Grading tolerance for numeric-answer (NAT) questions.
pub const NAT_TOLERANCE: f64 = 0.01;

/// Upper bound for AI practice-question generation in a single request.
pub const MAX_GENERATED_QUESTIONS: u32 = 20;

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, reason } => write!(f, "{} is invalid: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Connection details of one OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub engines: HashMap<String, EngineConfig>,
    pub default_engine: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the server on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub admin_emails: Vec<String>,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    pub rust_log: String,
    pub ai: AiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = optional("DATABASE_URL");

        let jwt_secret = optional("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_audience = optional("JWT_AUDIENCE");

        let admin_emails = split_list(&env::var("ADMIN_EMAILS").unwrap_or_default());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "BIND_ADDR".to_string(),
                reason: e.to_string(),
            })?;

        let cors_origins = split_list(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let ai = AiConfig::from_lookup(optional)?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_audience,
            admin_emails,
            bind_addr,
            cors_origins,
            rust_log,
            ai,
        })
    }
}

impl AiConfig {
    /// Builds the engine table from `AI_ENGINES` and the per-engine
    /// `AI_<NAME>_BASE_URL` / `AI_<NAME>_API_KEY` / `AI_<NAME>_MODEL` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let names = split_list(&lookup("AI_ENGINES").unwrap_or_default());
        let mut engines = HashMap::new();

        for name in names {
            let prefix = format!("AI_{}", name.to_uppercase().replace('-', "_"));
            let get = |suffix: &str| {
                let key = format!("{}_{}", prefix, suffix);
                lookup(&key).ok_or_else(|| ConfigError::Invalid {
                    key,
                    reason: format!("required by AI engine '{}'", name),
                })
            };

            let raw_url = get("BASE_URL")?;
            let base_url = parse_base_url(&raw_url).map_err(|reason| ConfigError::Invalid {
                key: format!("{}_BASE_URL", prefix),
                reason,
            })?;

            engines.insert(
                name.to_lowercase(),
                EngineConfig {
                    base_url,
                    api_key: get("API_KEY")?,
                    model: get("MODEL")?,
                },
            );
        }

        let default_engine = match lookup("AI_DEFAULT_ENGINE") {
            Some(name) => {
                let name = name.to_lowercase();
                if !engines.contains_key(&name) {
                    return Err(ConfigError::Invalid {
                        key: "AI_DEFAULT_ENGINE".to_string(),
                        reason: format!("'{}' is not listed in AI_ENGINES", name),
                    });
                }
                Some(name)
            }
            // A single configured engine is the obvious default.
            None if engines.len() == 1 => engines.keys().next().cloned(),
            None => None,
        };

        let timeout_secs = match lookup("AI_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "AI_TIMEOUT_SECS".to_string(),
                reason: format!("'{}' is not a number of seconds", raw),
            })?,
            None => 60,
        };

        Ok(Self {
            engines,
            default_engine,
            timeout_secs,
        })
    }
}

/// `Url::join` drops the last path segment unless it ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| e.to_string())
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
