//! Tenant scope check for synthesized SQL
//!
//! A generated statement may only read the session's company. It passes when:
//!
//! - at least one `company_id = <session id>` predicate is present,
//! - every other comparison on a `company_id` column is an equality with that id or with
//!   another `company_id` column,
//! - no OR/XOR/`||` sits at or above the depth of the outermost tenant predicate,
//! - no set operation (UNION, INTERSECT, EXCEPT) is present.
//!
//! Works on the MySQL token stream, so literals and comments never count.

use crate::error::{AgentError, Result};
use crate::session::CompanyId;
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::warn;

const COMPANY_COLUMN: &str = "company_id";

/// What a single `company_id` occurrence does to the scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    /// Equality with the session's company.
    Scoped,
    /// Not a literal comparison: select list, GROUP BY, join on another company_id.
    Neutral,
}

pub fn check_tenant_scope(sql: &str, company_id: CompanyId) -> Result<()> {
    let dialect = MySqlDialect {};
    let tokens: Vec<Token> = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| rejected(format!("query could not be tokenized: {}", e)))?
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect();

    let mut depth: i32 = 0;
    let mut scope_depth: Option<i32> = None;
    let mut or_depths = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            Token::StringConcat => or_depths.push(depth),
            Token::Word(w) if w.quote_style.is_none() => {
                match w.value.to_uppercase().as_str() {
                    "UNION" | "INTERSECT" | "EXCEPT" => {
                        return Err(rejected("set operations are not allowed".to_string()))
                    }
                    "OR" | "XOR" => or_depths.push(depth),
                    _ => {}
                }
            }
            _ => {}
        }

        if !is_company_column(&tokens, i) {
            continue;
        }
        let forward = compare_forward(&tokens, i, company_id)?;
        let backward = compare_backward(&tokens, i, company_id)?;
        if forward == Filter::Scoped || backward == Filter::Scoped {
            scope_depth = Some(scope_depth.map_or(depth, |d| d.min(depth)));
        }
    }

    let Some(scope_depth) = scope_depth else {
        return Err(rejected(format!(
            "query is not filtered by company_id = {}",
            company_id
        )));
    };
    if or_depths.iter().any(|d| *d <= scope_depth) {
        return Err(rejected(
            "OR next to the company filter widens the scope".to_string(),
        ));
    }
    Ok(())
}

fn rejected(reason: String) -> AgentError {
    warn!("Tenant scope check failed: {}", reason);
    AgentError::Synthesis(reason)
}

fn is_company_column(tokens: &[Token], i: usize) -> bool {
    match tokens.get(i) {
        Some(Token::Word(w)) => {
            w.value.eq_ignore_ascii_case(COMPANY_COLUMN)
                && !matches!(tokens.get(i + 1), Some(Token::Period | Token::LParen))
        }
        _ => false,
    }
}

fn is_comparison(token: &Token) -> bool {
    matches!(
        token,
        Token::Neq | Token::Lt | Token::Gt | Token::LtEq | Token::GtEq | Token::Spaceship
    )
}

fn is_equality(token: &Token) -> bool {
    matches!(token, Token::Eq | Token::DoubleEq)
}

/// Value of a number or quoted literal, if it is one.
fn literal_id(token: Option<&Token>) -> Option<Option<i64>> {
    match token? {
        Token::Number(n, _) => Some(n.parse().ok()),
        Token::SingleQuotedString(s) | Token::DoubleQuotedString(s) => Some(s.trim().parse().ok()),
        _ => None,
    }
}

fn literal_filter(value: Option<i64>, company_id: CompanyId) -> Result<Filter> {
    match value {
        Some(id) if id == company_id.get() => Ok(Filter::Scoped),
        Some(id) => Err(rejected(format!(
            "query references company {} instead of {}",
            id, company_id
        ))),
        None => Err(rejected("company_id compared with a non-numeric value".to_string())),
    }
}

/// `company_id <op> ...`
fn compare_forward(tokens: &[Token], i: usize, company_id: CompanyId) -> Result<Filter> {
    let Some(next) = tokens.get(i + 1) else {
        return Ok(Filter::Neutral);
    };
    if is_comparison(next) {
        return Err(rejected("company_id may only be compared with =".to_string()));
    }
    if let Token::Word(w) = next {
        if w.quote_style.is_none()
            && matches!(
                w.value.to_uppercase().as_str(),
                "IN" | "NOT" | "BETWEEN" | "LIKE" | "IS" | "RLIKE" | "REGEXP"
            )
        {
            return Err(rejected(format!(
                "company_id may only be compared with =, found {}",
                w.value.to_uppercase()
            )));
        }
    }
    if !is_equality(next) {
        return Ok(Filter::Neutral);
    }

    if let Some(value) = literal_id(tokens.get(i + 2)) {
        return literal_filter(value, company_id);
    }
    if ends_in_company_column(tokens, i + 2) {
        return Ok(Filter::Neutral);
    }
    Err(rejected("company_id compared with an expression".to_string()))
}

/// `... <op> company_id`, with an optional `alias.` in front of the column.
fn compare_backward(tokens: &[Token], i: usize, company_id: CompanyId) -> Result<Filter> {
    let start = match (i.checked_sub(1).and_then(|j| tokens.get(j)), i.checked_sub(2)) {
        (Some(Token::Period), Some(qualifier)) => qualifier,
        _ => i,
    };
    let Some(op_index) = start.checked_sub(1) else {
        return Ok(Filter::Neutral);
    };
    let op = &tokens[op_index];
    if is_comparison(op) {
        return Err(rejected("company_id may only be compared with =".to_string()));
    }
    if !is_equality(op) {
        return Ok(Filter::Neutral);
    }

    let operand = op_index.checked_sub(1).and_then(|j| tokens.get(j));
    if let Some(value) = literal_id(operand) {
        return literal_filter(value, company_id);
    }
    match operand {
        Some(Token::Word(_)) => Ok(Filter::Neutral),
        _ => Err(rejected("company_id compared with an expression".to_string())),
    }
}

/// `company_id` or `alias.company_id` starting at `j`.
fn ends_in_company_column(tokens: &[Token], j: usize) -> bool {
    match (tokens.get(j), tokens.get(j + 1), tokens.get(j + 2)) {
        (Some(Token::Word(_)), Some(Token::Period), Some(Token::Word(w))) => {
            w.value.eq_ignore_ascii_case(COMPANY_COLUMN)
        }
        (Some(Token::Word(w)), _, _) => w.value.eq_ignore_ascii_case(COMPANY_COLUMN),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> CompanyId {
        CompanyId::new(922).unwrap()
    }

    fn check(sql: &str) -> Result<()> {
        check_tenant_scope(sql, company())
    }

    #[test]
    fn test_scoped_statements_pass() {
        assert!(check("SELECT 1 FROM t WHERE si.company_id = 922").is_ok());
        assert!(check("SELECT 1 FROM t WHERE company_id='922'").is_ok());
        assert!(check("SELECT 1 FROM t WHERE 922 = si.company_id").is_ok());
        assert!(check(
            "SELECT c.company FROM sales_invoice si JOIN contacts c \
             ON c.contact_id = si.customer_id AND c.company_id = si.company_id \
             WHERE si.company_id = 922 AND (si.status = 'paid' OR si.status = 'unpaid') \
             GROUP BY si.company_id, c.company"
        )
        .is_ok());
        assert!(check(
            "SELECT COUNT(*) FROM (SELECT customer_id FROM sales_invoice \
             WHERE company_id = 922 GROUP BY customer_id) t"
        )
        .is_ok());
    }

    #[test]
    fn test_missing_or_foreign_company_fails() {
        assert!(check("SELECT 1 FROM t").is_err());
        assert!(check("SELECT 1 FROM t WHERE note = 'company_id = 922'").is_err());
        assert!(check("SELECT 1 FROM t WHERE si.company_id = 922 OR si.company_id = 5").is_err());
        assert!(check("SELECT 1 FROM t WHERE si.company_id = 922 AND 5 = si.company_id").is_err());
    }

    #[test]
    fn test_or_beside_tenant_predicate_fails() {
        assert!(check("SELECT * FROM sales_invoice WHERE company_id = 922 OR 1 = 1").is_err());
        assert!(check("SELECT * FROM sales_invoice WHERE (company_id = 922 OR 1 = 1)").is_err());
        assert!(check("SELECT * FROM sales_invoice WHERE 1 = 1 OR (company_id = 922)").is_err());
        assert!(check("SELECT * FROM sales_invoice WHERE company_id = 922 || 1").is_err());
    }

    #[test]
    fn test_set_operations_fail() {
        assert!(check(
            "SELECT total FROM sales_invoice WHERE company_id = 922 \
             UNION SELECT total FROM sales_invoice WHERE company_id IN (5)"
        )
        .is_err());
        assert!(check(
            "SELECT total FROM sales_invoice WHERE company_id = 922 \
             UNION ALL SELECT total FROM sales_invoice WHERE company_id = 922"
        )
        .is_err());
    }

    #[test]
    fn test_other_comparisons_fail() {
        for sql in [
            "SELECT 1 FROM t WHERE company_id = 922 AND company_id <> 922",
            "SELECT 1 FROM t WHERE company_id = 922 AND si.company_id != 5",
            "SELECT 1 FROM t WHERE company_id = 922 AND x.company_id > 0",
            "SELECT 1 FROM t WHERE company_id = 922 AND company_id >= 1",
            "SELECT 1 FROM t WHERE company_id IN (922, 5)",
            "SELECT 1 FROM t WHERE company_id = 922 AND company_id NOT IN (1)",
            "SELECT 1 FROM t WHERE company_id BETWEEN 1 AND 1000",
            "SELECT 1 FROM t WHERE company_id = 922 AND company_id IS NOT NULL",
            "SELECT 1 FROM t WHERE company_id = (SELECT MAX(company_id) FROM t)",
            "SELECT 1 FROM t WHERE company_id = 922 AND 0 < company_id",
        ] {
            assert!(check(sql).is_err(), "should fail: {}", sql);
        }
    }
}
