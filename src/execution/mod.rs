//! Query execution seam
//!
//! The agent hands validated SQL to a `QueryExecutor` and gets ordered rows back.
//! Implementations must run the read-only check again before touching the database.

pub mod result;

pub use result::{CellValue, ResultRow};

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run one SELECT and return its rows in order.
    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>>;
}
