//! Intent Resolver
//!
//! Deterministic, offline mapping from question text to a template intent.
//! Resolution is first-match over an ordered phrase table, so more specific phrases
//! sit above the generic ones they contain ("net sales" above "sales").

use super::{
    IntentKind, IntentParams, Metric, QueryIntent, RankOrder, DEFAULT_INACTIVE_DAYS, DEFAULT_LIMIT,
    MAX_LIMIT,
};
use crate::matcher::{PhraseRule, PhraseTable};
use crate::time::{DateContext, Period};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// What a table row resolves to before question-specific modifiers are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentDefaults {
    pub kind: IntentKind,
    pub limit: u32,
    pub metric: Metric,
    pub order: RankOrder,
}

const fn entry(kind: IntentKind, limit: u32, metric: Metric, order: RankOrder) -> IntentDefaults {
    IntentDefaults { kind, limit, metric, order }
}

const fn sales(kind: IntentKind) -> IntentDefaults {
    entry(kind, DEFAULT_LIMIT, Metric::Revenue, RankOrder::Top)
}

lazy_static! {
    static ref INTENT_TABLE: PhraseTable<IntentDefaults> = PhraseTable::new(vec![
        PhraseRule::new(
            &["this month vs last month", "this month versus last month", "compare this month",
              "compared to last month", "compare month", "month over month", "month-over-month",
              "vs last month", "versus last month"],
            sales(IntentKind::CompareMonths),
        ),
        PhraseRule::new(
            &["this year vs last year", "this year versus last year", "compare this year",
              "compared to last year", "compare year", "year over year", "year-over-year",
              "vs last year", "versus last year", "yoy"],
            sales(IntentKind::CompareYears),
        ),
        PhraseRule::new(
            &["sales trend", "revenue trend", "monthly trend", "trend", "month by month",
              "monthly sales", "sales by month", "each month"],
            sales(IntentKind::MonthlySalesTrend),
        ),
        PhraseRule::new(
            &["inactive customer", "inactive client", "not purchased", "haven't purchased",
              "have not purchased", "not bought", "haven't bought", "have not bought",
              "stopped buying", "dormant customer", "lost customer", "no purchase"],
            sales(IntentKind::InactiveCustomers),
        ),
        PhraseRule::new(
            &["net sales", "net revenue", "sales after returns", "sales minus returns"],
            sales(IntentKind::NetSales),
        ),
        PhraseRule::new(&["return", "refund"], sales(IntentKind::Returns)),
        PhraseRule::new(
            &["highest sales day", "best sales day", "best day", "highest day", "peak day",
              "busiest day", "best selling day", "top day"],
            sales(IntentKind::BestSalesDay),
        ),
        PhraseRule::new(
            &["lowest sales day", "worst sales day", "worst day", "lowest day", "slowest day",
              "weakest day"],
            sales(IntentKind::WorstSalesDay),
        ),
        PhraseRule::new(
            &["how many invoices", "number of invoices", "invoice count", "count of invoices",
              "total invoices", "how many sales", "number of sales", "how many orders",
              "number of orders"],
            sales(IntentKind::InvoiceCount),
        ),
        PhraseRule::new(
            &["worst salesperson", "lowest salesperson", "weakest salesperson",
              "worst performing salesperson", "lowest performing salesperson", "worst salesman"],
            entry(IntentKind::SalespersonRanking, 1, Metric::Revenue, RankOrder::Bottom),
        ),
        PhraseRule::new(
            &["best salesperson", "top salesperson", "highest salesperson",
              "best performing salesperson", "top performing salesperson", "star salesperson",
              "best salesman", "top salesman"],
            entry(IntentKind::SalespersonRanking, 1, Metric::Revenue, RankOrder::Top),
        ),
        PhraseRule::new(
            &["top salespeople", "top sales people", "top sales reps", "best salespeople",
              "best sales reps", "salespeople ranking", "rank salespeople", "top salesmen",
              "best salesmen"],
            entry(IntentKind::SalespersonRanking, DEFAULT_LIMIT, Metric::Revenue, RankOrder::Top),
        ),
        PhraseRule::new(
            &["salesperson", "salespeople", "sales person", "sales people", "sales rep",
              "salesman", "salesmen", "by employee", "by staff"],
            sales(IntentKind::SalesBySalesperson),
        ),
        PhraseRule::new(
            &["branches", "warehouses", "stores", "outlets", "by branch", "per branch",
              "each branch", "branch wise", "branch-wise", "by warehouse", "per warehouse"],
            entry(IntentKind::BranchRanking, DEFAULT_LIMIT, Metric::Revenue, RankOrder::Top),
        ),
        PhraseRule::new(
            &["worst branch", "lowest branch", "lowest sales branch", "weakest branch",
              "worst warehouse", "lowest warehouse", "worst store"],
            entry(IntentKind::BranchRanking, 1, Metric::Revenue, RankOrder::Bottom),
        ),
        PhraseRule::new(
            &["branch", "warehouse", "store", "outlet"],
            entry(IntentKind::BranchRanking, 1, Metric::Revenue, RankOrder::Top),
        ),
        PhraseRule::new(
            &["categories", "category wise", "category-wise", "by category", "per category",
              "each category"],
            entry(IntentKind::CategoryRanking, DEFAULT_LIMIT, Metric::Quantity, RankOrder::Top),
        ),
        PhraseRule::new(
            &["category"],
            entry(IntentKind::CategoryRanking, 1, Metric::Quantity, RankOrder::Top),
        ),
        PhraseRule::new(
            &["customer wise", "customer-wise", "sales by customer", "sales per customer",
              "per customer", "each customer", "customer breakdown"],
            sales(IntentKind::CustomerSalesBreakdown),
        ),
        PhraseRule::new(
            &["customers", "clients", "buyers"],
            entry(IntentKind::CustomerRanking, DEFAULT_LIMIT, Metric::Revenue, RankOrder::Top),
        ),
        PhraseRule::new(
            &["customer", "client", "buyer"],
            entry(IntentKind::CustomerRanking, 1, Metric::Revenue, RankOrder::Top),
        ),
        PhraseRule::new(
            &["slow moving", "slow-moving", "slow selling", "slow-selling", "least selling",
              "least sold", "not selling", "poor selling", "worst selling", "worst-selling"],
            entry(IntentKind::ProductRanking, DEFAULT_LIMIT, Metric::Quantity, RankOrder::Bottom),
        ),
        PhraseRule::new(
            &["products", "items", "best sellers", "bestsellers", "best-selling", "best selling",
              "top selling", "top-selling", "most sold", "skus"],
            entry(IntentKind::ProductRanking, DEFAULT_LIMIT, Metric::Quantity, RankOrder::Top),
        ),
        PhraseRule::new(
            &["product", "item", "sku"],
            entry(IntentKind::ProductRanking, 1, Metric::Quantity, RankOrder::Top),
        ),
        PhraseRule::new(
            &["sales", "revenue", "turnover", "sold", "sell", "income", "earned", "earnings",
              "takings"],
            sales(IntentKind::SalesTotal),
        ),
    ]);

    static ref METRIC_TABLE: PhraseTable<Metric> = PhraseTable::new(vec![
        PhraseRule::new(&["profit", "margin"], Metric::Profit),
        PhraseRule::new(
            &["quantity", "qty", "units", "volume", "pieces", "most sold", "count"],
            Metric::Quantity,
        ),
        PhraseRule::new(
            &["revenue", "value", "money", "amount", "income", "turnover", "earn", "by sales",
              "in sales"],
            Metric::Revenue,
        ),
    ]);

    static ref BOTTOM_ORDER: PhraseTable<RankOrder> = PhraseTable::new(vec![PhraseRule::new(
        &["lowest", "least", "worst", "bottom", "weakest", "slowest", "fewest", "poorest",
          "slow moving", "slow-moving"],
        RankOrder::Bottom,
    )]);

    static ref LIMIT_MODIFIER: Regex =
        Regex::new(r"\b(top|best|bottom|worst|first|highest|lowest)\s+(\d{1,4})\b")
            .expect("valid limit pattern");

    static ref DAYS_MODIFIER: Regex = Regex::new(r"\b(\d{1,4})\s*(days?|months?)\b")
        .expect("valid days pattern");
}

/// Resolves questions against the ordered intent table
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentResolver;

impl IntentResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `question` to a template intent, or `Unresolved`.
    pub fn resolve(&self, question: &str, date: &DateContext) -> QueryIntent {
        let lowered = question.to_lowercase();
        let (text, explicit_limit) = extract_limit(&lowered);

        let Some((defaults, phrase)) = INTENT_TABLE.resolve_with_phrase(&text) else {
            debug!("No intent phrase matched: {:?}", text);
            return QueryIntent::Unresolved;
        };
        let kind = defaults.kind;

        let metric = if supports_metric(kind) {
            METRIC_TABLE.resolve(&text).copied().unwrap_or(defaults.metric)
        } else {
            defaults.metric
        };

        let order = if kind.is_ranking() && is_bottom_ranking(&text) {
            RankOrder::Bottom
        } else {
            defaults.order
        };

        let days = if kind == IntentKind::InactiveCustomers {
            extract_days(&text).unwrap_or(match date.period {
                Period::LastDays(n) => n,
                _ => DEFAULT_INACTIVE_DAYS,
            })
        } else {
            DEFAULT_INACTIVE_DAYS
        };

        let params = IntentParams {
            limit: explicit_limit.unwrap_or(defaults.limit),
            metric,
            days,
            order,
        };

        debug!("Intent {} matched on {:?} with {:?}", kind.as_str(), phrase, params);
        QueryIntent::Resolved { kind, params }
    }

    /// Priority of the first table row matching `question`; lower wins.
    pub fn priority(&self, question: &str) -> Option<usize> {
        let lowered = question.to_lowercase();
        let (text, _) = extract_limit(&lowered);
        INTENT_TABLE.position(&text)
    }
}

/// Convenience wrapper over [`IntentResolver::resolve`].
pub fn resolve_intent(question: &str, date: &DateContext) -> QueryIntent {
    IntentResolver::new().resolve(question, date)
}

fn supports_metric(kind: IntentKind) -> bool {
    matches!(kind, IntentKind::ProductRanking | IntentKind::CategoryRanking)
}

fn is_bottom_ranking(text: &str) -> bool {
    // "at least" is a quantity qualifier, not a ranking direction
    let text = text.replace("at least", "");
    BOTTOM_ORDER.resolve(&text).is_some()
}

/// Pull "top 5" style modifiers out of the text. The number is dropped from the
/// returned text so "top 5 salespeople" matches the phrase "top salespeople".
fn extract_limit(text: &str) -> (String, Option<u32>) {
    let Some(caps) = LIMIT_MODIFIER.captures(text) else {
        return (text.to_string(), None);
    };
    let limit = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|n| n.clamp(1, MAX_LIMIT));
    let word = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let normalized = LIMIT_MODIFIER.replace(text, word).into_owned();
    (normalized, limit)
}

fn extract_days(text: &str) -> Option<u32> {
    let caps = DAYS_MODIFIER.captures(text)?;
    let n = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let unit = caps.get(2)?.as_str();
    let days = if unit.starts_with("month") { n * 30 } else { n };
    (days > 0).then_some(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::extract_date_context;

    fn resolve(q: &str) -> QueryIntent {
        resolve_intent(q, &extract_date_context(q))
    }

    fn kind(q: &str) -> Option<IntentKind> {
        resolve(q).kind()
    }

    fn params(q: &str) -> IntentParams {
        *resolve(q).params().expect("resolved intent")
    }

    #[test]
    fn test_sales_today() {
        assert_eq!(kind("What are my total sales today?"), Some(IntentKind::SalesTotal));
    }

    #[test]
    fn test_top_products_by_revenue() {
        let q = "top 5 products by revenue";
        assert_eq!(kind(q), Some(IntentKind::ProductRanking));
        let p = params(q);
        assert_eq!(p.limit, 5);
        assert_eq!(p.metric, Metric::Revenue);
        assert_eq!(p.order, RankOrder::Top);
    }

    #[test]
    fn test_product_metric_defaults_to_quantity() {
        let p = params("best selling products this month");
        assert_eq!(p.metric, Metric::Quantity);
        assert_eq!(p.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_most_profitable_products() {
        let q = "most profitable products this year";
        assert_eq!(kind(q), Some(IntentKind::ProductRanking));
        assert_eq!(params(q).metric, Metric::Profit);
    }

    #[test]
    fn test_first_match_not_best_match() {
        // Both "net sales" and "sales" match; the net sales row comes first.
        assert_eq!(kind("net sales this month"), Some(IntentKind::NetSales));
        // "returns" beats the generic sales row.
        assert_eq!(kind("sales returns today"), Some(IntentKind::Returns));
        // Comparison beats trend, which beats sales total.
        assert_eq!(kind("sales this month vs last month"), Some(IntentKind::CompareMonths));
        assert_eq!(kind("sales trend"), Some(IntentKind::MonthlySalesTrend));
        // Inactive customers beats plural customers.
        assert_eq!(
            kind("customers who have not purchased in 60 days"),
            Some(IntentKind::InactiveCustomers)
        );
        // Salesperson rows beat the generic sales row.
        assert_eq!(kind("sales by salesperson"), Some(IntentKind::SalesBySalesperson));
        // Best sales day beats best selling products.
        assert_eq!(kind("best selling day this month"), Some(IntentKind::BestSalesDay));
    }

    #[test]
    fn test_priority_ordering_is_fixed() {
        let resolver = IntentResolver::new();
        let net = resolver.priority("net sales").unwrap();
        let generic = resolver.priority("sales").unwrap();
        let returns = resolver.priority("returns").unwrap();
        let products = resolver.priority("products").unwrap();
        assert!(net < returns);
        assert!(returns < generic);
        assert!(products < generic);
        assert_eq!(resolver.priority("net sales and returns"), Some(net));
    }

    #[test]
    fn test_salesperson_ranking_singular_and_plural() {
        let best = params("who is my best salesperson");
        assert_eq!(kind("who is my best salesperson"), Some(IntentKind::SalespersonRanking));
        assert_eq!(best.limit, 1);
        assert_eq!(best.order, RankOrder::Top);

        let worst = params("worst salesperson this year");
        assert_eq!(worst.order, RankOrder::Bottom);

        let top = params("top 3 salespeople");
        assert_eq!(kind("top 3 salespeople"), Some(IntentKind::SalespersonRanking));
        assert_eq!(top.limit, 3);
    }

    #[test]
    fn test_bottom_keywords_flip_ranking() {
        let p = params("which branch had the lowest sales");
        assert_eq!(kind("which branch had the lowest sales"), Some(IntentKind::BranchRanking));
        assert_eq!(p.order, RankOrder::Bottom);
        assert_eq!(p.limit, 1);

        let p = params("customers who spent at least 100");
        assert_eq!(p.order, RankOrder::Top);
    }

    #[test]
    fn test_slow_moving_products() {
        let q = "slow moving products last 90 days";
        assert_eq!(kind(q), Some(IntentKind::ProductRanking));
        let p = params(q);
        assert_eq!(p.order, RankOrder::Bottom);
        assert_eq!(p.metric, Metric::Quantity);
    }

    #[test]
    fn test_inactive_days() {
        assert_eq!(params("inactive customers 60 days").days, 60);
        assert_eq!(params("customers who haven't bought in 3 months").days, 90);
        assert_eq!(params("inactive customers").days, DEFAULT_INACTIVE_DAYS);
    }

    #[test]
    fn test_customer_metric_is_always_revenue() {
        let p = params("top customers by quantity");
        assert_eq!(p.metric, Metric::Revenue);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(params("top 9999 products").limit, MAX_LIMIT);
        assert_eq!(params("top 0 products").limit, 1);
    }

    #[test]
    fn test_unresolved() {
        assert_eq!(
            resolve("what is the average discount per payment term"),
            QueryIntent::Unresolved
        );
        assert_eq!(resolve("hello"), QueryIntent::Unresolved);
    }
}
