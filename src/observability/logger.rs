//! Query Logger
//!
//! One record per answered question: what was asked, how it was routed, the SQL that ran
//! and how it went. Recent records stay in memory; with a log file configured every
//! record is also appended as a JSON line.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub const DEFAULT_HISTORY: usize = 200;

/// How the statement was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRoute {
    Template,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub query_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub company_id: i64,
    pub question: String,
    pub intent: String,
    pub route: Option<QueryRoute>,
    pub sql: Option<String>,
    pub rows_returned: Option<usize>,
    pub success: bool,
    pub error_message: Option<String>,
    pub elapsed_ms: u64,
}

impl QueryLogEntry {
    pub fn new(company_id: i64, question: &str) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            company_id,
            question: question.to_string(),
            intent: String::new(),
            route: None,
            sql: None,
            rows_returned: None,
            success: false,
            error_message: None,
            elapsed_ms: 0,
        }
    }
}

pub struct QueryLogger {
    log_file: Option<PathBuf>,
    entries: Mutex<VecDeque<QueryLogEntry>>,
    max_in_memory: usize,
}

impl QueryLogger {
    pub fn new(log_file: Option<PathBuf>, max_in_memory: usize) -> Self {
        Self {
            log_file,
            entries: Mutex::new(VecDeque::new()),
            max_in_memory: max_in_memory.max(1),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None, DEFAULT_HISTORY)
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<QueryLogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records in memory first; a failed file append is returned but the record is kept.
    pub fn log_query(&self, entry: QueryLogEntry) -> Result<()> {
        let line = match &self.log_file {
            Some(_) => Some(serde_json::to_string(&entry)?),
            None => None,
        };

        {
            let mut entries = self.entries();
            entries.push_back(entry);
            while entries.len() > self.max_in_memory {
                entries.pop_front();
            }
        }

        if let (Some(log_file), Some(line)) = (&self.log_file, line) {
            let mut file = OpenOptions::new().create(true).append(true).open(log_file)?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    /// Most recent entries, newest last.
    pub fn recent(&self, limit: usize) -> Vec<QueryLogEntry> {
        let entries = self.entries();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for QueryLogger {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_history_is_bounded() {
        let logger = QueryLogger::new(None, 3);
        for i in 0..5 {
            logger.log_query(QueryLogEntry::new(1, &format!("q{}", i))).unwrap();
        }
        let recent = logger.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].question, "q2");
        assert_eq!(recent[2].question, "q4");
        assert_eq!(logger.recent(1)[0].question, "q4");
    }

    #[test]
    fn test_json_lines_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.jsonl");
        let logger = QueryLogger::new(Some(path.clone()), 10);

        let mut entry = QueryLogEntry::new(922, "total sales today");
        entry.intent = "sales_total".to_string();
        entry.route = Some(QueryRoute::Template);
        entry.success = true;
        entry.rows_returned = Some(1);
        logger.log_query(entry).unwrap();
        logger.log_query(QueryLogEntry::new(922, "second")).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let lines: Vec<String> =
            std::io::BufReader::new(file).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        let first: QueryLogEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.company_id, 922);
        assert_eq!(first.route, Some(QueryRoute::Template));
        assert!(lines[0].contains("\"route\":\"template\""));
    }

    #[test]
    fn test_unwritable_log_file_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let logger = QueryLogger::new(Some(dir.path().to_path_buf()), 10);

        let result = logger.log_query(QueryLogEntry::new(922, "total sales today"));
        assert!(result.is_err());
        assert_eq!(logger.len(), 1);
        assert_eq!(logger.recent(1)[0].question, "total sales today");
    }
}
