#![allow(dead_code)]

use async_trait::async_trait;
use sales_agent::{AgentConfig, AgentError, LanguageModel, QueryExecutor, ResultRow, SalesAgent};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Replies in order; errors once the script runs out.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn silent() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> sales_agent::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(AgentError::Llm(e)),
            None => Err(AgentError::Llm("no scripted reply".to_string())),
        }
    }
}

/// Returns fixed rows and records every statement it is given.
pub struct RecordingExecutor {
    rows: Vec<ResultRow>,
    failure: Option<String>,
    pub statements: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn returning(rows: Vec<ResultRow>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            failure: None,
            statements: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            rows: Vec::new(),
            failure: Some(message.to_string()),
            statements: Mutex::new(Vec::new()),
        })
    }

    pub fn executed(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> sales_agent::Result<Vec<ResultRow>> {
        self.statements.lock().unwrap().push(sql.to_string());
        match &self.failure {
            Some(message) => Err(AgentError::Execution {
                message: message.clone(),
                sql: sql.to_string(),
            }),
            None => Ok(self.rows.clone()),
        }
    }
}

pub fn config(pairs: &[(&str, &str)]) -> AgentConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AgentConfig::from_lookup(|key| map.get(key).cloned()).unwrap()
}

/// Deterministic answers: no footer, no model prose.
pub fn quiet_config() -> AgentConfig {
    config(&[("SHOW_SQL", "false"), ("LLM_SUMMARIES", "false")])
}

pub fn agent(
    config: &AgentConfig,
    model: Arc<ScriptedModel>,
    executor: Arc<RecordingExecutor>,
) -> SalesAgent {
    SalesAgent::new(config, model, executor)
}
