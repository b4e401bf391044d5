//! Read-Only Guardrails
//!
//! Every statement is checked here before it reaches the database, and checked again
//! by the executor itself. A statement passes only if it is a single SELECT with no
//! data-changing keyword outside string literals and comments.
//!
//! The check is total: any input string yields a verdict. Malformed but harmless SQL
//! is accepted and left to fail at execution.

use crate::error::{AgentError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;
use tracing::{debug, warn};

/// Keywords that may never appear as a bare token
pub const FORBIDDEN_KEYWORDS: [&str; 11] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "REPLACE", "MERGE",
    "GRANT", "REVOKE",
];

/// Why a statement was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    Empty,
    NotSelect,
    ForbiddenKeyword(String),
    StackedStatements,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "empty statement"),
            RejectReason::NotSelect => write!(f, "statement does not start with SELECT"),
            RejectReason::ForbiddenKeyword(kw) => write!(f, "forbidden keyword {}", kw),
            RejectReason::StackedStatements => write!(f, "multiple statements"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyVerdict {
    Accepted,
    Rejected(RejectReason),
}

impl SafetyVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SafetyVerdict::Accepted)
    }
}

lazy_static! {
    // Literals first so a comment marker inside a string is not treated as a comment.
    static ref LITERALS_AND_COMMENTS: Regex = Regex::new(
        r#"'(?:[^'\\]|\\.|'')*'|"(?:[^"\\]|\\.|"")*"|`[^`]*`|--[^\n]*|#[^\n]*|/\*[\s\S]*?\*/"#
    )
    .expect("valid literal pattern");

    static ref WORD: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid word pattern");
}

/// Stateless read-only statement validator
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyGuard;

impl ReadOnlyGuard {
    pub fn new() -> Self {
        Self
    }

    /// Accept or reject `sql`. Never panics, never errors.
    pub fn validate(&self, sql: &str) -> SafetyVerdict {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return SafetyVerdict::Rejected(RejectReason::Empty);
        }

        let scan = scan_tokens(trimmed).unwrap_or_else(|| scan_stripped(trimmed));

        if let Some(keyword) = scan.forbidden {
            return SafetyVerdict::Rejected(RejectReason::ForbiddenKeyword(keyword));
        }
        if !starts_with_select(trimmed) {
            return SafetyVerdict::Rejected(RejectReason::NotSelect);
        }
        if scan.stacked {
            return SafetyVerdict::Rejected(RejectReason::StackedStatements);
        }
        SafetyVerdict::Accepted
    }

    pub fn is_read_only(&self, sql: &str) -> bool {
        self.validate(sql).is_accepted()
    }

    /// [`validate`](Self::validate) as a `Result`, for call sites that short-circuit.
    pub fn ensure_read_only(&self, sql: &str) -> Result<()> {
        match self.validate(sql) {
            SafetyVerdict::Accepted => Ok(()),
            SafetyVerdict::Rejected(reason) => {
                warn!("Blocked statement ({}): {}", reason, sql.trim());
                Err(AgentError::UnsafeQuery(reason.to_string()))
            }
        }
    }
}

#[derive(Debug, Default)]
struct Scan {
    forbidden: Option<String>,
    stacked: bool,
}

/// Token-level scan with the MySQL tokenizer; `None` when the input does not tokenize.
fn scan_tokens(sql: &str) -> Option<Scan> {
    let dialect = MySqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!("Tokenizer fallback: {}", e);
            return None;
        }
    };

    let mut scan = Scan::default();
    let mut seen_semicolon = false;
    for token in &tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => continue,
            Token::SemiColon => {
                if seen_semicolon {
                    scan.stacked = true;
                }
                seen_semicolon = true;
                continue;
            }
            _ => {}
        }
        if seen_semicolon {
            scan.stacked = true;
        }
        if let Token::Word(word) = token {
            if word.quote_style.is_none() && scan.forbidden.is_none() {
                let upper = word.value.to_uppercase();
                if FORBIDDEN_KEYWORDS.contains(&upper.as_str()) {
                    scan.forbidden = Some(upper);
                }
            }
        }
    }
    Some(scan)
}

/// Regex fallback: blank out literals and comments, then scan words and semicolons.
fn scan_stripped(sql: &str) -> Scan {
    let cleaned = LITERALS_AND_COMMENTS.replace_all(sql, " ");
    let forbidden = WORD
        .find_iter(&cleaned)
        .map(|m| m.as_str().to_uppercase())
        .find(|w| FORBIDDEN_KEYWORDS.contains(&w.as_str()));

    let body = cleaned.trim_end();
    let body = body.strip_suffix(';').unwrap_or(body);
    Scan {
        forbidden,
        stacked: body.contains(';'),
    }
}

fn starts_with_select(trimmed: &str) -> bool {
    let head: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    head.eq_ignore_ascii_case("SELECT")
}
