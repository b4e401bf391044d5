//! Query Intent
//!
//! The closed set of analytic questions the agent answers from fixed templates.
//! Adding a question means adding an `IntentKind` variant, which the compiler then
//! forces through the resolver, the template library and the report titles.

pub mod resolver;

pub use resolver::IntentResolver;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_INACTIVE_DAYS: u32 = 30;
pub const MAX_LIMIT: u32 = 500;

/// Measure a ranking is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Units moved out of stock
    Quantity,
    /// Net-of-tax money taken
    Revenue,
    /// Revenue minus stock cost
    Profit,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Quantity => "quantity",
            Metric::Revenue => "revenue",
            Metric::Profit => "profit",
        }
    }
}

/// Direction of a ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    Top,
    Bottom,
}

impl RankOrder {
    pub fn sql_direction(&self) -> &'static str {
        match self {
            RankOrder::Top => "DESC",
            RankOrder::Bottom => "ASC",
        }
    }
}

/// Canonical analytic questions with a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Net-of-tax sales total for the period
    SalesTotal,
    /// Value of returns for the period
    Returns,
    /// Sales with returns netted out
    NetSales,
    /// This month vs last month
    CompareMonths,
    /// This year vs last year
    CompareYears,
    BestSalesDay,
    WorstSalesDay,
    InvoiceCount,
    /// Month-by-month sales over the trailing 12 months
    MonthlySalesTrend,
    /// Branches (warehouses) ranked by sales
    BranchRanking,
    /// Every salesperson with their sales
    SalesBySalesperson,
    /// Salespeople ranked by sales, with invoice counts
    SalespersonRanking,
    /// Products ranked by quantity, revenue or profit
    ProductRanking,
    /// Categories ranked by quantity, revenue or profit
    CategoryRanking,
    /// Customers ranked by revenue
    CustomerRanking,
    /// Per-customer invoice count, gross, tax and net sales
    CustomerSalesBreakdown,
    /// Active customers without a purchase in the last N days
    InactiveCustomers,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::SalesTotal => "sales_total",
            IntentKind::Returns => "returns",
            IntentKind::NetSales => "net_sales",
            IntentKind::CompareMonths => "compare_months",
            IntentKind::CompareYears => "compare_years",
            IntentKind::BestSalesDay => "best_sales_day",
            IntentKind::WorstSalesDay => "worst_sales_day",
            IntentKind::InvoiceCount => "invoice_count",
            IntentKind::MonthlySalesTrend => "monthly_sales_trend",
            IntentKind::BranchRanking => "branch_ranking",
            IntentKind::SalesBySalesperson => "sales_by_salesperson",
            IntentKind::SalespersonRanking => "salesperson_ranking",
            IntentKind::ProductRanking => "product_ranking",
            IntentKind::CategoryRanking => "category_ranking",
            IntentKind::CustomerRanking => "customer_ranking",
            IntentKind::CustomerSalesBreakdown => "customer_sales_breakdown",
            IntentKind::InactiveCustomers => "inactive_customers",
        }
    }

    /// Whether `order` and `limit` change the statement.
    pub fn is_ranking(&self) -> bool {
        matches!(
            self,
            IntentKind::BranchRanking
                | IntentKind::SalespersonRanking
                | IntentKind::ProductRanking
                | IntentKind::CategoryRanking
                | IntentKind::CustomerRanking
        )
    }

    /// Whether the question's date context is applied.
    pub fn uses_date_filter(&self) -> bool {
        !matches!(
            self,
            IntentKind::CompareMonths
                | IntentKind::CompareYears
                | IntentKind::MonthlySalesTrend
                | IntentKind::InactiveCustomers
        )
    }
}

/// Parameters extracted alongside the intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentParams {
    pub limit: u32,
    pub metric: Metric,
    pub days: u32,
    pub order: RankOrder,
}

impl Default for IntentParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            metric: Metric::Revenue,
            days: DEFAULT_INACTIVE_DAYS,
            order: RankOrder::Top,
        }
    }
}

/// Outcome of intent resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryIntent {
    Resolved { kind: IntentKind, params: IntentParams },
    /// No template fits; the question goes to SQL synthesis.
    Unresolved,
}

impl QueryIntent {
    pub fn kind(&self) -> Option<IntentKind> {
        match self {
            QueryIntent::Resolved { kind, .. } => Some(*kind),
            QueryIntent::Unresolved => None,
        }
    }

    pub fn params(&self) -> Option<&IntentParams> {
        match self {
            QueryIntent::Resolved { params, .. } => Some(params),
            QueryIntent::Unresolved => None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind().map(|k| k.as_str()).unwrap_or("synthesized")
    }
}
