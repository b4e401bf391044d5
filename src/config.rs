//! Agent configuration
//!
//! Read once at startup from environment variables (the binary loads `.env` first) and
//! shared immutably afterwards. Parsing goes through a lookup function so tests can feed
//! a plain map instead of mutating the process environment.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GROQ_MODEL: &str = "llama-3.1-8b-instant";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_MODEL: &str = "llama3.1";

/// Which completion API the language model client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Groq,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Groq => "groq",
            LlmProvider::Ollama => "ollama",
        }
    }

    /// OpenAI and Groq share the chat-completions wire format.
    pub fn is_openai_compatible(&self) -> bool {
        !matches!(self, LlmProvider::Ollama)
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::Groq => GROQ_BASE_URL,
            LlmProvider::Ollama => OLLAMA_BASE_URL,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => OPENAI_MODEL,
            LlmProvider::Groq => GROQ_MODEL,
            LlmProvider::Ollama => OLLAMA_MODEL,
        }
    }
}

impl FromStr for LlmProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "groq" => Ok(LlmProvider::Groq),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(AgentError::Config(format!(
                "LLM_PROVIDER must be openai, groq or ollama, got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the sales database lives
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    Url(String),
    Parts {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: String,
    },
}

impl DatabaseConfig {
    /// Connection target without credentials, for log lines.
    pub fn describe(&self) -> String {
        match self {
            DatabaseConfig::Url(url) => match url.rsplit_once('@') {
                Some((_, rest)) => format!("mysql://***@{}", rest),
                None => url.clone(),
            },
            DatabaseConfig::Parts { host, port, database, .. } => {
                format!("mysql://{}:{}/{}", host, port, database)
            }
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseConfig").field(&self.describe()).finish()
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Everything the agent needs besides its collaborators
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// `None` when no database variables are set; commands that query fail then.
    pub database: Option<DatabaseConfig>,
    pub llm: LlmConfig,
    pub query_timeout_secs: u64,
    /// Append intent, limit and SQL to every answer.
    pub show_sql: bool,
    /// Let the model write single-row summaries.
    pub llm_summaries: bool,
    pub currency_symbol: String,
    pub query_log_path: Option<PathBuf>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig::Url(url)),
            None => match get("DB_NAME") {
                Some(database) => Some(DatabaseConfig::Parts {
                    host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                    port: parse_or("DB_PORT", get("DB_PORT"), DEFAULT_DB_PORT)?,
                    database,
                    user: get("DB_USER").unwrap_or_else(|| "root".to_string()),
                    password: get("DB_PASSWORD").unwrap_or_default(),
                }),
                None => None,
            },
        };

        let provider = match get("LLM_PROVIDER") {
            Some(p) => p.parse()?,
            None if get("GROQ_API_KEY").is_some() => LlmProvider::Groq,
            None if get("OPENAI_API_KEY").is_some() => LlmProvider::OpenAi,
            None => LlmProvider::Ollama,
        };

        let (api_key, base_url, model) = match provider {
            LlmProvider::Ollama => (
                None,
                get("OLLAMA_BASE_URL"),
                get("OLLAMA_MODEL"),
            ),
            LlmProvider::Groq => (
                get("GROQ_API_KEY").or_else(|| get("OPENAI_API_KEY")),
                get("OPENAI_BASE_URL"),
                get("OPENAI_MODEL"),
            ),
            LlmProvider::OpenAi => (
                get("OPENAI_API_KEY"),
                get("OPENAI_BASE_URL"),
                get("OPENAI_MODEL"),
            ),
        };
        if provider.is_openai_compatible() && api_key.is_none() {
            return Err(AgentError::Config(format!(
                "provider {} needs an API key (GROQ_API_KEY or OPENAI_API_KEY)",
                provider
            )));
        }

        let llm = LlmConfig {
            provider,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            timeout_secs: parse_or(
                "LLM_TIMEOUT_SECS",
                get("LLM_TIMEOUT_SECS"),
                DEFAULT_LLM_TIMEOUT_SECS,
            )?,
        };

        Ok(Self {
            database,
            llm,
            query_timeout_secs: parse_or(
                "QUERY_TIMEOUT_SECS",
                get("QUERY_TIMEOUT_SECS"),
                DEFAULT_QUERY_TIMEOUT_SECS,
            )?,
            show_sql: parse_flag("SHOW_SQL", get("SHOW_SQL"), true)?,
            llm_summaries: parse_flag("LLM_SUMMARIES", get("LLM_SUMMARIES"), true)?,
            currency_symbol: get("CURRENCY_SYMBOL").unwrap_or_else(|| "$".to_string()),
            query_log_path: get("QUERY_LOG_PATH").map(PathBuf::from),
        })
    }

    pub fn require_database(&self) -> Result<&DatabaseConfig> {
        self.database.as_ref().ok_or_else(|| {
            AgentError::Config(
                "set DATABASE_URL or DB_HOST/DB_NAME/DB_USER/DB_PASSWORD".to_string(),
            )
        })
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(v) => v
            .parse()
            .map_err(|_| AgentError::Config(format!("{} has an invalid value {:?}", key, v))),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, raw: Option<String>, default: bool) -> Result<bool> {
    match raw.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(AgentError::Config(format!(
            "{} must be true or false, got {:?}",
            key, other
        ))),
    }
}
