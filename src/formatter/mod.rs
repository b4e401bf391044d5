//! Result Formatter
//!
//! Turns executed rows into a markdown answer. The shape depends on the rows:
//!
//! - no rows, or one row of nulls: the no-data message with the period label
//! - one row with a this/last pair of numbers: a comparison block
//! - one row otherwise: a metric card, or model-written prose when enabled
//! - several rows: a numbered listing, with the leader called out for rankings
//!
//! The model is only ever asked to phrase a single row. Any failure there falls back to
//! the deterministic card.

pub mod columns;
pub mod comparison;

pub use columns::{classify_column, column_label, format_cell, format_numeric, ColumnKind};
pub use comparison::{detect_comparison, Comparison, ComparisonShape, Trend};

use crate::execution::ResultRow;
use crate::intent::IntentKind;
use crate::llm::LanguageModel;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows shown before the listing is cut short.
pub const MAX_LISTED_ROWS: usize = 20;
const NARRATION_MAX_TOKENS: u32 = 200;
const NULL_CELL: &str = "—";

/// Transparency details appended under the answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFooter {
    pub intent: String,
    pub limit: Option<u32>,
    pub sql: String,
}

/// What the formatter knows about the question behind the rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub question: String,
    pub title: String,
    pub date_label: String,
    /// Call out the first row as the leader.
    pub ranking: bool,
    pub footer: Option<ReportFooter>,
}

impl ReportContext {
    pub fn new(question: &str, intent: Option<IntentKind>, date_label: &str) -> Self {
        Self {
            question: question.to_string(),
            title: report_title(intent).to_string(),
            date_label: date_label.to_string(),
            ranking: intent.map(|k| k.is_ranking()).unwrap_or(false),
            footer: None,
        }
    }

    pub fn with_footer(mut self, footer: ReportFooter) -> Self {
        self.footer = Some(footer);
        self
    }
}

pub fn report_title(intent: Option<IntentKind>) -> &'static str {
    let Some(kind) = intent else {
        return "Query Results";
    };
    match kind {
        IntentKind::SalesTotal => "Sales Summary",
        IntentKind::Returns => "Returns",
        IntentKind::NetSales => "Net Sales",
        IntentKind::CompareMonths => "Month-over-Month Sales",
        IntentKind::CompareYears => "Year-over-Year Sales",
        IntentKind::BestSalesDay => "Best Sales Day",
        IntentKind::WorstSalesDay => "Worst Sales Day",
        IntentKind::InvoiceCount => "Invoice Count",
        IntentKind::MonthlySalesTrend => "Monthly Sales Trend",
        IntentKind::BranchRanking => "Branch Performance",
        IntentKind::SalesBySalesperson => "Sales by Salesperson",
        IntentKind::SalespersonRanking => "Salesperson Ranking",
        IntentKind::ProductRanking => "Product Performance",
        IntentKind::CategoryRanking => "Category Performance",
        IntentKind::CustomerRanking => "Customer Ranking",
        IntentKind::CustomerSalesBreakdown => "Customer Sales Breakdown",
        IntentKind::InactiveCustomers => "Inactive Customers",
    }
}

pub fn no_data_message(date_label: &str) -> String {
    format!("ℹ️ No data found for your query.\n\n**Period:** {}", date_label)
}

pub struct ResultFormatter {
    llm: Option<Arc<dyn LanguageModel>>,
    currency_symbol: String,
}

impl ResultFormatter {
    pub fn new(currency_symbol: &str) -> Self {
        Self {
            llm: None,
            currency_symbol: currency_symbol.to_string(),
        }
    }

    /// Let the model phrase single-row answers.
    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub async fn format(&self, ctx: &ReportContext, rows: &[ResultRow]) -> String {
        match rows {
            [] => no_data_message(&ctx.date_label),
            [row] if row.all_null() => no_data_message(&ctx.date_label),
            [row] => {
                let body = match detect_comparison(row) {
                    Some(shape) => self.comparison_block(row, &shape),
                    None => match self.narrate(ctx, row).await {
                        Some(prose) => prose,
                        None => self.metric_card(row),
                    },
                };
                self.assemble(ctx, &body)
            }
            _ => self.assemble(ctx, &self.listing(ctx, rows)),
        }
    }

    /// Deterministic rendering without the model, used by tests and as fallback.
    pub fn format_plain(&self, ctx: &ReportContext, rows: &[ResultRow]) -> String {
        match rows {
            [] => no_data_message(&ctx.date_label),
            [row] if row.all_null() => no_data_message(&ctx.date_label),
            [row] => {
                let body = match detect_comparison(row) {
                    Some(shape) => self.comparison_block(row, &shape),
                    None => self.metric_card(row),
                };
                self.assemble(ctx, &body)
            }
            _ => self.assemble(ctx, &self.listing(ctx, rows)),
        }
    }

    fn assemble(&self, ctx: &ReportContext, body: &str) -> String {
        let mut out = format!(
            "**📊 {}** | **📅 {}**\n\n{}",
            ctx.title,
            ctx.date_label,
            body.trim_end()
        );
        if let Some(footer) = &ctx.footer {
            out.push_str("\n\n---\n");
            out.push_str(&format!("*Intent:* `{}`", footer.intent));
            if let Some(limit) = footer.limit {
                out.push_str(&format!(" | *Limit:* {}", limit));
            }
            out.push_str(&format!("\n```sql\n{}\n```", footer.sql.trim()));
        }
        out
    }

    fn cell(&self, column: &str, value: &crate::execution::CellValue) -> Option<String> {
        format_cell(classify_column(column), value, &self.currency_symbol)
    }

    fn metric_card(&self, row: &ResultRow) -> String {
        row.iter()
            .filter_map(|(column, value)| {
                self.cell(column, value)
                    .map(|text| format!("**{}:** {}", column_label(column), text))
            })
            .join("\n")
    }

    fn comparison_block(&self, row: &ResultRow, shape: &ComparisonShape) -> String {
        let kind = classify_column(&shape.current_column);
        let comparison = &shape.comparison;
        let mut lines: Vec<String> = row
            .iter()
            .filter_map(|(column, value)| {
                self.cell(column, value)
                    .map(|text| format!("**{}:** {}", column_label(column), text))
            })
            .collect();

        let sign = if comparison.difference > 0.0 { "+" } else { "" };
        let pct_sign = if comparison.percent_change > 0.0 { "+" } else { "" };
        lines.push(format!(
            "**Difference:** {}{} ({}{:.2}%)",
            sign,
            format_numeric(kind, comparison.difference, &self.currency_symbol),
            pct_sign,
            comparison.percent_change
        ));
        lines.push(String::new());
        lines.push(comparison.insight());
        lines.join("\n")
    }

    fn listing(&self, ctx: &ReportContext, rows: &[ResultRow]) -> String {
        let mut lines = Vec::new();
        for (i, row) in rows.iter().take(MAX_LISTED_ROWS).enumerate() {
            let label_column = label_column(row);
            let mut parts = Vec::new();
            for (column, value) in row.iter() {
                if Some(column) == label_column {
                    parts.push(format!("**{}**", value));
                    continue;
                }
                let text = self.cell(column, value).unwrap_or_else(|| NULL_CELL.to_string());
                parts.push(format!("{}: {}", column_label(column), text));
            }
            lines.push(format!("{}. {}", i + 1, parts.join(" | ")));
        }
        if rows.len() > MAX_LISTED_ROWS {
            lines.push(format!("…and {} more", rows.len() - MAX_LISTED_ROWS));
        }
        if ctx.ranking {
            if let Some(insight) = self.leader_insight(&rows[0]) {
                lines.push(String::new());
                lines.push(insight);
            }
        }
        lines.join("\n")
    }

    fn leader_insight(&self, leader: &ResultRow) -> Option<String> {
        let name = label_column(leader).and_then(|c| leader.get(c))?.to_string();
        let (column, value) = leader
            .iter()
            .find(|(column, value)| {
                value.as_f64().is_some() && classify_column(column) != ColumnKind::Text
            })?;
        let text = self.cell(column, value)?;
        Some(format!("🏆 **{}** leads with {} ({}).", name, text, column_label(column)))
    }

    async fn narrate(&self, ctx: &ReportContext, row: &ResultRow) -> Option<String> {
        let llm = self.llm.as_ref()?;
        let prompt = format!(
            "Summarise this sales analytics result for a business owner \
             in one to three sentences.\n\
             Question: {}\nPeriod: {}\nFormatted values:\n{}\nRaw row: {}\n\
             Use the formatted values exactly as given. Do not invent numbers. Plain text only.",
            ctx.question,
            ctx.date_label,
            self.metric_card(row),
            row.to_json()
        );
        match llm.complete(&prompt, NARRATION_MAX_TOKENS).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Using model narration");
                Some(text.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Narration failed, using metric card: {}", e);
                None
            }
        }
    }
}

/// First column whose value is non-null text that is not a number.
fn label_column(row: &ResultRow) -> Option<&str> {
    row.iter()
        .find(|(_, value)| {
            matches!(value, crate::execution::CellValue::Text(_)) && value.as_f64().is_none()
        })
        .map(|(column, _)| column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::CellValue;

    fn formatter() -> ResultFormatter {
        ResultFormatter::new("$")
    }

    fn row(cells: Vec<(&str, CellValue)>) -> ResultRow {
        cells.into_iter().collect()
    }

    #[test]
    fn test_no_data() {
        let ctx = ReportContext::new("returns today", Some(IntentKind::Returns), "Today");
        assert_eq!(
            formatter().format_plain(&ctx, &[]),
            "ℹ️ No data found for your query.\n\n**Period:** Today"
        );
        let nulls = vec![row(vec![("total_returns", CellValue::Null)])];
        assert_eq!(formatter().format_plain(&ctx, &nulls), no_data_message("Today"));
    }

    #[test]
    fn test_metric_card() {
        let ctx = ReportContext::new("sales today", Some(IntentKind::SalesTotal), "Today");
        let rows = vec![row(vec![
            ("total_sales", CellValue::Float(12345.67)),
            ("note", CellValue::Null),
        ])];
        let out = formatter().format_plain(&ctx, &rows);
        assert!(out.starts_with("**📊 Sales Summary** | **📅 Today**"));
        assert!(out.contains("**Total Sales:** $12,345.67"));
        assert!(!out.contains("Note"));
    }

    #[test]
    fn test_comparison_block() {
        let ctx = ReportContext::new("compare", Some(IntentKind::CompareMonths), "All Time");
        let rows = vec![row(vec![
            ("total_sales_this_month", CellValue::Float(150.0)),
            ("total_sales_last_month", CellValue::Float(100.0)),
        ])];
        let out = formatter().format_plain(&ctx, &rows);
        assert!(out.contains("**Difference:** +$50.00 (+50.00%)"));
        assert!(out.contains("📈 Up 50.00%"));
    }

    #[test]
    fn test_listing_caps_rows_and_names_leader() {
        let ctx = ReportContext::new("top products", Some(IntentKind::ProductRanking), "All Time");
        let rows: Vec<ResultRow> = (0..25)
            .map(|i| {
                row(vec![
                    ("product_name", CellValue::Text(format!("Item {}", i))),
                    ("total_sold_qty", CellValue::Float(1000.0 - i as f64)),
                    (
                        "total_revenue",
                        if i == 1 { CellValue::Null } else { CellValue::Float(10.0) },
                    ),
                ])
            })
            .collect();
        let out = formatter().format_plain(&ctx, &rows);
        assert!(out
            .contains("1. **Item 0** | Total Sold Qty: 1,000 units | Total Revenue: $10.00"));
        assert!(out.contains("2. **Item 1** | Total Sold Qty: 999 units | Total Revenue: —"));
        assert!(out.contains("20. **Item 19**"));
        assert!(!out.contains("21. "));
        assert!(out.contains("…and 5 more"));
        assert!(out.contains("🏆 **Item 0** leads with 1,000 units"));
    }

    #[test]
    fn test_footer() {
        let ctx = ReportContext::new("top products", Some(IntentKind::ProductRanking), "All Time")
            .with_footer(ReportFooter {
                intent: "product_ranking".to_string(),
                limit: Some(5),
                sql: "SELECT 1".to_string(),
            });
        let rows = vec![row(vec![("total_sales", CellValue::Int(3))])];
        let out = formatter().format_plain(&ctx, &rows);
        assert!(out.ends_with("*Intent:* `product_ranking` | *Limit:* 5\n```sql\nSELECT 1\n```"));
    }
}
