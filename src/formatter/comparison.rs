//! Period-over-period comparison

use crate::execution::ResultRow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn emoji(&self) -> &'static str {
        match self {
            Trend::Up => "📈",
            Trend::Down => "📉",
            Trend::Flat => "➡️",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub current: f64,
    pub previous: f64,
    pub difference: f64,
    /// `difference / previous * 100`; 0 when the previous period is zero.
    /// Carries the sign of `previous`, so it can disagree with `trend`.
    pub percent_change: f64,
    pub trend: Trend,
}

impl Comparison {
    pub fn new(current: f64, previous: f64) -> Self {
        let difference = current - previous;
        let percent_change = if previous == 0.0 {
            0.0
        } else {
            difference / previous * 100.0
        };
        let trend = if difference > 0.0 {
            Trend::Up
        } else if difference < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        };
        Self {
            current,
            previous,
            difference,
            percent_change,
            trend,
        }
    }

    pub fn insight(&self) -> String {
        match self.trend {
            Trend::Flat => format!("{} No change from the previous period.", self.trend.emoji()),
            Trend::Up if self.previous == 0.0 => {
                format!("{} Up from nothing in the previous period.", self.trend.emoji())
            }
            Trend::Up => format!(
                "{} Up {:.2}% compared to the previous period.",
                self.trend.emoji(),
                self.percent_change.abs()
            ),
            Trend::Down if self.previous == 0.0 => {
                format!("{} Down from nothing in the previous period.", self.trend.emoji())
            }
            Trend::Down => format!(
                "{} Down {:.2}% compared to the previous period.",
                self.trend.emoji(),
                self.percent_change.abs()
            ),
        }
    }
}

/// A row with exactly one current-period and one previous-period numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonShape {
    pub current_column: String,
    pub previous_column: String,
    pub comparison: Comparison,
}

pub fn detect_comparison(row: &ResultRow) -> Option<ComparisonShape> {
    let mut current = Vec::new();
    let mut previous = Vec::new();
    for (name, value) in row.iter() {
        let Some(number) = value.as_f64() else {
            continue;
        };
        let lower = name.to_lowercase();
        if lower.contains("this") || lower.contains("current") {
            current.push((name, number));
        } else if lower.contains("last") || lower.contains("previous") {
            previous.push((name, number));
        }
    }
    match (current.as_slice(), previous.as_slice()) {
        ([(current_name, current_value)], [(previous_name, previous_value)]) => {
            Some(ComparisonShape {
                current_column: current_name.to_string(),
                previous_column: previous_name.to_string(),
                comparison: Comparison::new(*current_value, *previous_value),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::CellValue;

    #[test]
    fn test_comparison_math() {
        let c = Comparison::new(150.0, 100.0);
        assert_eq!(c.difference, 50.0);
        assert!((c.percent_change - 50.0).abs() < 1e-9);
        assert_eq!(c.trend, Trend::Up);
        assert!(c.insight().contains("Up 50.00%"));

        let down = Comparison::new(75.0, 100.0);
        assert_eq!(down.trend, Trend::Down);
        assert!(down.insight().contains("Down 25.00%"));
    }

    #[test]
    fn test_previous_zero_has_zero_percent() {
        let c = Comparison::new(80.0, 0.0);
        assert_eq!(c.percent_change, 0.0);
        assert_eq!(c.difference, 80.0);
        assert_eq!(c.trend, Trend::Up);

        let flat = Comparison::new(0.0, 0.0);
        assert_eq!(flat.trend, Trend::Flat);
        assert_eq!(flat.percent_change, 0.0);
    }

    #[test]
    fn test_negative_previous_keeps_plain_ratio() {
        // A loss month followed by a profit month.
        let c = Comparison::new(50.0, -100.0);
        assert_eq!(c.difference, 150.0);
        assert!((c.percent_change + 150.0).abs() < 1e-9);
        assert_eq!(c.trend, Trend::Up);
        assert!(c.insight().contains("Up 150.00%"));
    }

    #[test]
    fn test_detect_comparison() {
        let row: ResultRow = vec![
            ("total_sales_this_month", CellValue::Float(150.0)),
            ("total_sales_last_month", CellValue::Float(100.0)),
        ]
        .into_iter()
        .collect();
        let shape = detect_comparison(&row).unwrap();
        assert_eq!(shape.current_column, "total_sales_this_month");
        assert_eq!(shape.comparison.difference, 50.0);

        let not_numeric: ResultRow = vec![
            ("customer_name", CellValue::from("Acme")),
            ("last_invoice_date", CellValue::from("2024-01-01")),
        ]
        .into_iter()
        .collect();
        assert!(detect_comparison(&not_numeric).is_none());
    }
}
