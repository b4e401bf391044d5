pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod formatter;
pub mod intent;
pub mod llm;
pub mod matcher;
pub mod observability;
pub mod safety_guardrails;
pub mod session;
pub mod synthesis;
pub mod templates;
pub mod time;

pub use agent::{QueryPlan, SalesAgent};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use execution::{CellValue, QueryExecutor, ResultRow};
pub use llm::{LanguageModel, LlmClient};
pub use safety_guardrails::{ReadOnlyGuard, SafetyVerdict};
pub use session::{CompanyId, SessionContext};
