//! Date context extraction
//!
//! Turns the temporal phrase in a question ("today", "this month", "last 90 days")
//! into a `DateContext`: a display label plus the SQL predicate that restricts the
//! invoice date. Questions without a recognised phrase get the "All Time" context
//! with an empty predicate, which means no date filtering.

use crate::matcher::{PhraseRule, PhraseTable};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Invoice date column every template aliases `sales_invoice` to.
pub const DEFAULT_DATE_COLUMN: &str = "si.invoice_date";

const MAX_LOOKBACK_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Today,
    Yesterday,
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
    LastDays(u32),
    AllTime,
}

impl Period {
    pub fn label(&self) -> String {
        match self {
            Period::Today => "Today".to_string(),
            Period::Yesterday => "Yesterday".to_string(),
            Period::ThisMonth => "This Month".to_string(),
            Period::LastMonth => "Last Month".to_string(),
            Period::ThisYear => "This Year".to_string(),
            Period::LastYear => "Last Year".to_string(),
            Period::LastDays(365) => "Last 12 Months".to_string(),
            Period::LastDays(n) => format!("Last {} Days", n),
            Period::AllTime => "All Time".to_string(),
        }
    }

    /// SQL fragment (leading `AND`) restricting `column` to this period.
    pub fn predicate_for(&self, column: &str) -> String {
        match self {
            Period::Today => format!(
                "AND {c} >= CURDATE() AND {c} < CURDATE() + INTERVAL 1 DAY",
                c = column
            ),
            Period::Yesterday => format!(
                "AND {c} >= CURDATE() - INTERVAL 1 DAY AND {c} < CURDATE()",
                c = column
            ),
            Period::ThisMonth => format!(
                "AND {c} >= DATE_FORMAT(CURDATE(), '%Y-%m-01') \
                 AND {c} < CURDATE() + INTERVAL 1 DAY",
                c = column
            ),
            Period::LastMonth => format!(
                "AND {c} >= DATE_FORMAT(CURDATE() - INTERVAL 1 MONTH, '%Y-%m-01') \
                 AND {c} < DATE_FORMAT(CURDATE(), '%Y-%m-01')",
                c = column
            ),
            Period::ThisYear => format!(
                "AND {c} >= DATE_FORMAT(CURDATE(), '%Y-01-01') \
                 AND {c} < CURDATE() + INTERVAL 1 DAY",
                c = column
            ),
            Period::LastYear => format!(
                "AND {c} >= DATE_FORMAT(CURDATE() - INTERVAL 1 YEAR, '%Y-01-01') \
                 AND {c} < DATE_FORMAT(CURDATE(), '%Y-01-01')",
                c = column
            ),
            Period::LastDays(days) => {
                format!("AND {} >= CURDATE() - INTERVAL {} DAY", column, days)
            }
            Period::AllTime => String::new(),
        }
    }
}

/// Resolved time range of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateContext {
    pub period: Period,
    pub label: String,
    /// Predicate against [`DEFAULT_DATE_COLUMN`]; empty for all time.
    pub predicate: String,
}

impl DateContext {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            label: period.label(),
            predicate: period.predicate_for(DEFAULT_DATE_COLUMN),
        }
    }

    pub fn all_time() -> Self {
        Self::new(Period::AllTime)
    }

    pub fn predicate_for(&self, column: &str) -> String {
        self.period.predicate_for(column)
    }

    pub fn is_all_time(&self) -> bool {
        self.period == Period::AllTime
    }
}

lazy_static! {
    // Order is priority: the first rule with a phrase in the question wins.
    static ref PERIOD_PHRASES: PhraseTable<Period> = PhraseTable::new(vec![
        PhraseRule::new(&["today", "so far today"], Period::Today),
        PhraseRule::new(&["yesterday"], Period::Yesterday),
        PhraseRule::new(
            &["this month", "current month", "month to date", "mtd"],
            Period::ThisMonth,
        ),
        PhraseRule::new(&["last month", "previous month"], Period::LastMonth),
        PhraseRule::new(
            &["this year", "current year", "year to date", "ytd"],
            Period::ThisYear,
        ),
        PhraseRule::new(&["last year", "previous year"], Period::LastYear),
        PhraseRule::new(
            &["last 12 months", "past 12 months", "past year"],
            Period::LastDays(365),
        ),
        PhraseRule::new(
            &["last 90 days", "past 90 days", "last 3 months", "past 3 months", "last quarter"],
            Period::LastDays(90),
        ),
        PhraseRule::new(
            &["last 60 days", "past 60 days", "last 2 months", "past 2 months"],
            Period::LastDays(60),
        ),
        PhraseRule::new(&["last 30 days", "past 30 days", "past month"], Period::LastDays(30)),
        PhraseRule::new(
            &["last 7 days", "past 7 days", "last week", "past week"],
            Period::LastDays(7),
        ),
    ]);

    static ref LAST_N_DAYS: Regex = Regex::new(r"\b(?:last|past)\s+(\d{1,5})\s+days?\b")
        .expect("valid last-n-days pattern");
}

/// Extract the date context of a question. Never fails; no phrase means all time.
pub fn extract_date_context(question: &str) -> DateContext {
    let text = question.to_lowercase();

    if let Some(period) = PERIOD_PHRASES.resolve(&text) {
        return DateContext::new(*period);
    }

    if let Some(days) = LAST_N_DAYS
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|d| *d > 0)
    {
        return DateContext::new(Period::LastDays(days.min(MAX_LOOKBACK_DAYS)));
    }

    DateContext::all_time()
}
