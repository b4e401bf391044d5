//! Column classification and number rendering
//!
//! A column's presentation kind comes from its name alone, checked in a fixed order.
//! Values that are not numeric are shown as-is whatever the kind says.

use crate::execution::CellValue;
use crate::matcher::{PhraseRule, PhraseTable};
use itertools::Itertools;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Percentage,
    Quantity,
    Count,
    Currency,
    Date,
    Text,
}

lazy_static! {
    // Quantity and count come before currency so `total_sold_qty` is a unit count.
    static ref COLUMN_KINDS: PhraseTable<ColumnKind> = PhraseTable::new(vec![
        PhraseRule::new(&["percent", "pct", "margin"], ColumnKind::Percentage),
        PhraseRule::new(&["qty", "quantity", "units", "sold_qty"], ColumnKind::Quantity),
        PhraseRule::new(&["count", "invoices", "orders"], ColumnKind::Count),
        PhraseRule::new(
            &["revenue", "amount", "total", "price", "cost", "profit", "value", "sales"],
            ColumnKind::Currency,
        ),
        PhraseRule::new(&["date"], ColumnKind::Date),
    ]);
}

pub fn classify_column(name: &str) -> ColumnKind {
    COLUMN_KINDS
        .resolve(&name.to_lowercase())
        .copied()
        .unwrap_or(ColumnKind::Text)
}

/// `total_sold_qty` -> `Total Sold Qty`
pub fn column_label(name: &str) -> String {
    name.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .join(" ")
}

/// Fixed decimals with thousands separators: `1234567.891, 2` -> `1,234,567.89`
pub fn format_number(value: f64, decimals: usize) -> String {
    let rendered = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rendered.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }

    let negative = value < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn format_currency(value: f64, symbol: &str) -> String {
    let body = format_number(value, 2);
    match body.strip_prefix('-') {
        Some(positive) => format!("-{}{}", symbol, positive),
        None => format!("{}{}", symbol, body),
    }
}

/// Render a number the way its column kind asks for.
pub fn format_numeric(kind: ColumnKind, value: f64, currency_symbol: &str) -> String {
    match kind {
        ColumnKind::Percentage => format!("{:.2}%", value),
        ColumnKind::Quantity => {
            let decimals = if value.fract() == 0.0 { 0 } else { 2 };
            format!("{} units", format_number(value, decimals))
        }
        ColumnKind::Count => format_number(value.round(), 0),
        ColumnKind::Currency => format_currency(value, currency_symbol),
        ColumnKind::Date | ColumnKind::Text => {
            if value.fract() == 0.0 {
                format!("{}", value as i64)
            } else {
                format!("{}", value)
            }
        }
    }
}

/// Render one cell; `None` for nulls so callers choose how to show them.
pub fn format_cell(kind: ColumnKind, value: &CellValue, currency_symbol: &str) -> Option<String> {
    match value {
        CellValue::Null => None,
        CellValue::Int(_) | CellValue::Float(_) | CellValue::Text(_) => match value.as_f64() {
            Some(number) if !matches!(kind, ColumnKind::Date | ColumnKind::Text) => {
                Some(format_numeric(kind, number, currency_symbol))
            }
            _ => Some(value.to_string()),
        },
        CellValue::Date(_) | CellValue::DateTime(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_order() {
        assert_eq!(classify_column("total_sold_qty"), ColumnKind::Quantity);
        assert_eq!(classify_column("total_quantity"), ColumnKind::Quantity);
        assert_eq!(classify_column("total_invoices"), ColumnKind::Count);
        assert_eq!(classify_column("invoice_count"), ColumnKind::Count);
        assert_eq!(classify_column("total_sales"), ColumnKind::Currency);
        assert_eq!(classify_column("Total_Revenue"), ColumnKind::Currency);
        assert_eq!(classify_column("profit_margin"), ColumnKind::Percentage);
        assert_eq!(classify_column("last_invoice_date"), ColumnKind::Date);
        assert_eq!(classify_column("customer_name"), ColumnKind::Text);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(12345.678, 2), "12,345.68");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1000.0, 0), "1,000");
        assert_eq!(format_number(-1234567.0, 0), "-1,234,567");
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_kind_rendering() {
        assert_eq!(format_numeric(ColumnKind::Currency, 12345.67, "$"), "$12,345.67");
        assert_eq!(format_numeric(ColumnKind::Currency, -50.0, "$"), "-$50.00");
        assert_eq!(format_numeric(ColumnKind::Quantity, 1234.0, "$"), "1,234 units");
        assert_eq!(format_numeric(ColumnKind::Count, 1234.0, "$"), "1,234");
        assert_eq!(format_numeric(ColumnKind::Percentage, 12.5, "$"), "12.50%");
    }

    #[test]
    fn test_non_numeric_is_plain_text() {
        let cell = CellValue::Text("Main Street".to_string());
        assert_eq!(format_cell(ColumnKind::Currency, &cell, "$").as_deref(), Some("Main Street"));
        assert_eq!(format_cell(ColumnKind::Currency, &CellValue::Null, "$"), None);
        let day = CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(format_cell(ColumnKind::Currency, &day, "$").as_deref(), Some("2024-03-09"));
    }

    #[test]
    fn test_column_label() {
        assert_eq!(column_label("total_sold_qty"), "Total Sold Qty");
        assert_eq!(column_label("net_sales"), "Net Sales");
    }
}
