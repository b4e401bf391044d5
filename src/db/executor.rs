//! sqlx-backed executor
//!
//! Rows are decoded by column type name: integers to `Int`, DECIMAL and floating point to
//! `Float`, DATE and DATETIME to chrono values, everything else to text.

use crate::db::connection::DbPool;
use crate::error::{AgentError, Result};
use crate::execution::{CellValue, QueryExecutor, ResultRow};
use crate::safety_guardrails::ReadOnlyGuard;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const LIST_COMPANIES_SQL: &str =
    "SELECT DISTINCT company_id FROM sales_items WHERE company_id IS NOT NULL ORDER BY company_id";

pub struct MySqlExecutor {
    pool: DbPool,
    guard: ReadOnlyGuard,
    timeout: Duration,
}

impl MySqlExecutor {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self {
            pool,
            guard: ReadOnlyGuard::new(),
            timeout,
        }
    }

    /// Company ids that have at least one sales line.
    pub async fn list_companies(&self) -> Result<Vec<i64>> {
        let rows = self.execute(LIST_COMPANIES_SQL).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("company_id").and_then(|v| v.as_f64()))
            .map(|id| id as i64)
            .collect())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>> {
        self.guard.ensure_read_only(sql)?;

        let started = Instant::now();
        let fetched = tokio::time::timeout(self.timeout, sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| AgentError::Execution {
                message: format!("query timed out after {}s", self.timeout.as_secs()),
                sql: sql.to_string(),
            })?;
        let rows = fetched.map_err(|e| {
            warn!("Query failed: {}", e);
            AgentError::Execution {
                message: e.to_string(),
                sql: sql.to_string(),
            }
        })?;

        let decoded = rows.iter().map(decode_row).collect::<Vec<_>>();
        info!(
            "Query returned {} rows in {}ms",
            decoded.len(),
            started.elapsed().as_millis()
        );
        Ok(decoded)
    }
}

fn decode_row(row: &MySqlRow) -> ResultRow {
    let mut out = ResultRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.push(column.name(), decode_cell(row, index, column.type_info().name()));
    }
    out
}

fn decode_cell(row: &MySqlRow, index: usize, type_name: &str) -> CellValue {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return CellValue::Null,
        Ok(_) => {}
        Err(e) => {
            debug!("Column {} unreadable: {}", index, e);
            return CellValue::Null;
        }
    }

    let upper = type_name.to_uppercase();
    let base = upper.split_whitespace().next().unwrap_or("");
    let decoded = match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR" => {
            if upper.contains("UNSIGNED") {
                row.try_get_unchecked::<u64, _>(index)
                    .ok()
                    .map(|v| CellValue::Int(i64::try_from(v).unwrap_or(i64::MAX)))
            } else {
                row.try_get_unchecked::<i64, _>(index).ok().map(CellValue::Int)
            }
        }
        "BOOLEAN" => row
            .try_get_unchecked::<bool, _>(index)
            .ok()
            .map(|b| CellValue::Int(i64::from(b))),
        "DECIMAL" | "NUMERIC" => row
            .try_get_unchecked::<String, _>(index)
            .ok()
            .map(|s| match s.trim().parse::<f64>() {
                Ok(v) => CellValue::Float(v),
                Err(_) => CellValue::Text(s),
            }),
        "DOUBLE" | "REAL" => row.try_get_unchecked::<f64, _>(index).ok().map(CellValue::Float),
        "FLOAT" => row
            .try_get_unchecked::<f32, _>(index)
            .ok()
            .map(|v| CellValue::Float(f64::from(v))),
        "DATE" => row.try_get_unchecked::<NaiveDate, _>(index).ok().map(CellValue::Date),
        "DATETIME" | "TIMESTAMP" => row
            .try_get_unchecked::<NaiveDateTime, _>(index)
            .ok()
            .map(CellValue::DateTime),
        _ => None,
    };

    decoded
        .or_else(|| row.try_get_unchecked::<String, _>(index).ok().map(CellValue::Text))
        .or_else(|| {
            row.try_get_unchecked::<Vec<u8>, _>(index)
                .ok()
                .map(|bytes| CellValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
        })
        .unwrap_or(CellValue::Null)
}
