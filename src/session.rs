//! Session context
//!
//! The company a chat session is pinned to. Built once when the session starts and
//! passed by reference into every request; nothing mutates it afterwards.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tenant identifier used as a filter value in every statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(i64);

impl CompanyId {
    pub fn new(id: i64) -> Result<Self> {
        if id <= 0 {
            return Err(AgentError::InvalidCompany(format!(
                "{} (must be a positive integer)",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompanyId {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse::<i64>()
            .map_err(|_| AgentError::InvalidCompany(format!("{:?} must be numeric", s)))?;
        Self::new(id)
    }
}

/// Immutable per-session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    company_id: CompanyId,
}

impl SessionContext {
    pub fn new(company_id: CompanyId) -> Self {
        Self { company_id }
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }
}
