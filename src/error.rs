use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid company id: {0}")]
    InvalidCompany(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Query synthesis failed: {0}")]
    Synthesis(String),

    #[error("Unsafe query blocked: {0}")]
    UnsafeQuery(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Execution error: {message}")]
    Execution { message: String, sql: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Text shown to the person asking the question.
    ///
    /// Every failure that reaches the `process_query` boundary is rendered through here.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Llm(msg) | AgentError::Synthesis(msg) => format!(
                "❌ Could not generate a valid query. Please rephrase your question.\n\n\
                 **Reason:** {}",
                msg
            ),
            AgentError::UnsafeQuery(reason) => format!(
                "🚫 Only read queries are allowed. The generated query was blocked ({}).",
                reason
            ),
            AgentError::Execution { message, sql } => format!(
                "❌ Error executing query: {}\n\n**SQL:**\n```sql\n{}\n```",
                message,
                sql.trim()
            ),
            other => format!("❌ Error processing query: {}", other),
        }
    }
}

impl From<sqlx::Error> for AgentError {
    fn from(err: sqlx::Error) -> Self {
        AgentError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Llm(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
