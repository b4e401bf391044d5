//! SQL Template Library
//!
//! One fixed, reviewed statement per intent. Business rules live here and nowhere else:
//!
//! - revenue is `total - COALESCE(total_tax, 0)`
//! - a valid sale has a status outside `draft`, `draft_return`, `return`, `canceled`
//! - a return has `status = 'return'`; net sales count returns negatively
//! - product quantities come from outbound `stock` rows (`stock_type = 'sales'`,
//!   `quantity < 0`) as `ABS(quantity)`
//! - product money joins `stock`, `sales_invoice` and `sales_items` on invoice id
//!   AND product id
//! - display names: `contacts.company`, `warehouses.title`, `products_category.title`,
//!   `CONCAT(users.firstname, ' ', users.lastname)`
//!
//! `sales_invoice` is always aliased `si` so the date predicate applies unchanged.

use crate::intent::{IntentKind, IntentParams, Metric, RankOrder};
use crate::session::CompanyId;
use crate::time::DateContext;

pub const VALID_SALE_STATUSES: &str =
    "si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')";
pub const NET_SALE_STATUSES: &str = "si.status NOT IN ('draft', 'draft_return', 'canceled')";
pub const REVENUE_EXPR: &str = "si.total - COALESCE(si.total_tax, 0)";

const SALES_TOTAL: &str = "
SELECT SUM(si.total - COALESCE(si.total_tax, 0)) AS total_sales
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}";

const RETURNS: &str = "
SELECT SUM(si.total - COALESCE(si.total_tax, 0)) AS total_returns
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.status = 'return'
  {date_filter}";

const NET_SALES: &str = "
SELECT COALESCE(SUM(CASE
         WHEN si.status = 'return' THEN -(si.total - COALESCE(si.total_tax, 0))
         ELSE si.total - COALESCE(si.total_tax, 0)
       END), 0) AS net_sales
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'canceled')
  {date_filter}";

const COMPARE_MONTHS: &str = "
SELECT
  COALESCE(SUM(CASE
    WHEN si.invoice_date >= DATE_FORMAT(CURDATE(), '%Y-%m-01')
     AND si.invoice_date < CURDATE() + INTERVAL 1 DAY
    THEN si.total - COALESCE(si.total_tax, 0) ELSE 0 END), 0) AS total_sales_this_month,
  COALESCE(SUM(CASE
    WHEN si.invoice_date >= DATE_FORMAT(CURDATE() - INTERVAL 1 MONTH, '%Y-%m-01')
     AND si.invoice_date < DATE_FORMAT(CURDATE(), '%Y-%m-01')
    THEN si.total - COALESCE(si.total_tax, 0) ELSE 0 END), 0) AS total_sales_last_month
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')";

const COMPARE_YEARS: &str = "
SELECT
  COALESCE(SUM(CASE
    WHEN si.invoice_date >= DATE_FORMAT(CURDATE(), '%Y-01-01')
     AND si.invoice_date < CURDATE() + INTERVAL 1 DAY
    THEN si.total - COALESCE(si.total_tax, 0) ELSE 0 END), 0) AS total_sales_this_year,
  COALESCE(SUM(CASE
    WHEN si.invoice_date >= DATE_FORMAT(CURDATE() - INTERVAL 1 YEAR, '%Y-01-01')
     AND si.invoice_date < DATE_FORMAT(CURDATE(), '%Y-01-01')
    THEN si.total - COALESCE(si.total_tax, 0) ELSE 0 END), 0) AS total_sales_last_year
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')";

const SALES_DAY: &str = "
SELECT DATE(si.invoice_date) AS sales_day,
       SUM(si.total - COALESCE(si.total_tax, 0)) AS total_sales
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY DATE(si.invoice_date)
ORDER BY total_sales {direction}
LIMIT 1";

const INVOICE_COUNT: &str = "
SELECT COUNT(si.invoice_id) AS total_sales_invoices
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}";

const MONTHLY_TREND: &str = "
SELECT DATE_FORMAT(si.invoice_date, '%Y-%m') AS month,
       SUM(si.total - COALESCE(si.total_tax, 0)) AS total_sales
FROM sales_invoice si
WHERE si.company_id = {company_id}
  AND si.invoice_date >= DATE_FORMAT(CURDATE() - INTERVAL 11 MONTH, '%Y-%m-01')
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
GROUP BY DATE_FORMAT(si.invoice_date, '%Y-%m')
ORDER BY month ASC";

const BRANCH_RANKING: &str = "
SELECT w.title AS branch_name,
       SUM(si.total - COALESCE(si.total_tax, 0)) AS total_sales
FROM sales_invoice si
JOIN warehouses w ON si.warehouse_id = w.warehouse_id
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY si.warehouse_id, w.title
ORDER BY total_sales {direction}
LIMIT {limit}";

const SALES_BY_SALESPERSON: &str = "
SELECT CONCAT(u.firstname, ' ', u.lastname) AS salesperson_name,
       SUM(si.total - COALESCE(si.total_tax, 0)) AS total_sales
FROM sales_invoice si
LEFT JOIN users u ON si.salesman = u.user_id
WHERE si.company_id = {company_id}
  AND si.salesman > 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY si.salesman, u.firstname, u.lastname
ORDER BY total_sales DESC";

const SALESPERSON_RANKING: &str = "
SELECT CONCAT(u.firstname, ' ', u.lastname) AS salesperson_name,
       SUM(si.total - COALESCE(si.total_tax, 0)) AS total_sales,
       COUNT(si.invoice_id) AS invoice_count
FROM sales_invoice si
LEFT JOIN users u ON si.salesman = u.user_id
WHERE si.company_id = {company_id}
  AND si.salesman > 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY si.salesman, u.firstname, u.lastname
ORDER BY total_sales {direction}
LIMIT {limit}";

const PRODUCTS_BY_QUANTITY: &str = "
SELECT p.name AS product_name,
       SUM(ABS(s.quantity)) AS total_sold_qty
FROM stock s
JOIN products p ON s.product_id = p.product_id
JOIN sales_invoice si ON si.invoice_id = s.invoice_id
WHERE s.company_id = {company_id}
  AND s.stock_type = 'sales'
  AND s.quantity < 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY s.product_id, p.name
ORDER BY total_sold_qty {direction}
LIMIT {limit}";

const PRODUCTS_BY_REVENUE: &str = "
SELECT p.name AS product_name,
       SUM(ABS(s.quantity) * (si_item.price - si_item.discount)) AS total_revenue
FROM stock s
JOIN products p ON s.product_id = p.product_id
JOIN sales_invoice si ON si.invoice_id = s.invoice_id
JOIN sales_items si_item ON si_item.invoice_id = s.invoice_id AND si_item.product_id = s.product_id
WHERE s.company_id = {company_id}
  AND s.stock_type = 'sales'
  AND s.quantity < 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY s.product_id, p.name
ORDER BY total_revenue {direction}
LIMIT {limit}";

const PRODUCTS_BY_PROFIT: &str = "
SELECT p.name AS product_name,
       SUM(ABS(s.quantity) * ((si_item.price - si_item.discount) - s.cost)) AS total_profit,
       SUM(ABS(s.quantity)) AS total_quantity
FROM stock s
JOIN products p ON s.product_id = p.product_id
JOIN sales_invoice si ON si.invoice_id = s.invoice_id
JOIN sales_items si_item ON si_item.invoice_id = s.invoice_id AND si_item.product_id = s.product_id
WHERE s.company_id = {company_id}
  AND s.stock_type = 'sales'
  AND s.quantity < 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY s.product_id, p.name
ORDER BY total_profit {direction}
LIMIT {limit}";

const CATEGORIES_BY_QUANTITY: &str = "
SELECT c.title AS category_name,
       SUM(ABS(s.quantity)) AS total_sold_qty
FROM stock s
JOIN products p ON p.product_id = s.product_id
JOIN products_category c ON c.category_id = p.category_id
JOIN sales_invoice si ON si.invoice_id = s.invoice_id
WHERE s.company_id = {company_id}
  AND s.stock_type = 'sales'
  AND s.quantity < 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY c.category_id, c.title
ORDER BY total_sold_qty {direction}
LIMIT {limit}";

const CATEGORIES_BY_REVENUE: &str = "
SELECT c.title AS category_name,
       SUM(ABS(s.quantity)) AS total_sold_qty,
       SUM(ABS(s.quantity) * (si_item.price - si_item.discount)) AS total_revenue
FROM stock s
JOIN products p ON p.product_id = s.product_id
JOIN products_category c ON c.category_id = p.category_id
JOIN sales_invoice si ON si.invoice_id = s.invoice_id
JOIN sales_items si_item ON si_item.invoice_id = s.invoice_id AND si_item.product_id = s.product_id
WHERE s.company_id = {company_id}
  AND s.stock_type = 'sales'
  AND s.quantity < 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY c.category_id, c.title
ORDER BY total_revenue {direction}
LIMIT {limit}";

const CATEGORIES_BY_PROFIT: &str = "
SELECT c.title AS category_name,
       SUM(ABS(s.quantity) * ((si_item.price - si_item.discount) - s.cost)) AS total_profit,
       SUM(ABS(s.quantity)) AS total_sold_qty
FROM stock s
JOIN products p ON p.product_id = s.product_id
JOIN products_category c ON c.category_id = p.category_id
JOIN sales_invoice si ON si.invoice_id = s.invoice_id
JOIN sales_items si_item ON si_item.invoice_id = s.invoice_id AND si_item.product_id = s.product_id
WHERE s.company_id = {company_id}
  AND s.stock_type = 'sales'
  AND s.quantity < 0
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY c.category_id, c.title
ORDER BY total_profit {direction}
LIMIT {limit}";

const CUSTOMER_RANKING: &str = "
SELECT c.company AS customer_name,
       SUM(si.total - COALESCE(si.total_tax, 0)) AS total_revenue
FROM sales_invoice si
JOIN contacts c ON c.contact_id = si.customer_id
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY c.contact_id, c.company
ORDER BY total_revenue {direction}
LIMIT {limit}";

const CUSTOMER_BREAKDOWN: &str = "
SELECT c.company AS customer_name,
       COUNT(si.invoice_id) AS total_invoices,
       SUM(si.total) AS gross_sales,
       SUM(COALESCE(si.total_tax, 0)) AS total_tax,
       SUM(si.total - COALESCE(si.total_tax, 0)) AS net_sales
FROM sales_invoice si
JOIN contacts c ON c.contact_id = si.customer_id
WHERE si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
  {date_filter}
GROUP BY c.contact_id, c.company
ORDER BY net_sales DESC
LIMIT {limit}";

const INACTIVE_CUSTOMERS: &str = "
SELECT c.company AS customer_name,
       MAX(si.invoice_date) AS last_invoice_date
FROM contacts c
LEFT JOIN sales_invoice si_recent
  ON si_recent.customer_id = c.contact_id
  AND si_recent.company_id = {company_id}
  AND si_recent.invoice_date >= CURDATE() - INTERVAL {days} DAY
  AND si_recent.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
LEFT JOIN sales_invoice si
  ON si.customer_id = c.contact_id
  AND si.company_id = {company_id}
  AND si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')
WHERE c.company_id = {company_id}
  AND c.is_active = 1
  AND si_recent.invoice_id IS NULL
GROUP BY c.contact_id, c.company
HAVING MAX(si.invoice_date) IS NOT NULL
ORDER BY last_invoice_date DESC
LIMIT {limit}";

/// Template for an intent. Metric only matters for product and category rankings.
pub fn template_for(kind: IntentKind, metric: Metric) -> &'static str {
    match kind {
        IntentKind::SalesTotal => SALES_TOTAL,
        IntentKind::Returns => RETURNS,
        IntentKind::NetSales => NET_SALES,
        IntentKind::CompareMonths => COMPARE_MONTHS,
        IntentKind::CompareYears => COMPARE_YEARS,
        IntentKind::BestSalesDay | IntentKind::WorstSalesDay => SALES_DAY,
        IntentKind::InvoiceCount => INVOICE_COUNT,
        IntentKind::MonthlySalesTrend => MONTHLY_TREND,
        IntentKind::BranchRanking => BRANCH_RANKING,
        IntentKind::SalesBySalesperson => SALES_BY_SALESPERSON,
        IntentKind::SalespersonRanking => SALESPERSON_RANKING,
        IntentKind::ProductRanking => match metric {
            Metric::Quantity => PRODUCTS_BY_QUANTITY,
            Metric::Revenue => PRODUCTS_BY_REVENUE,
            Metric::Profit => PRODUCTS_BY_PROFIT,
        },
        IntentKind::CategoryRanking => match metric {
            Metric::Quantity => CATEGORIES_BY_QUANTITY,
            Metric::Revenue => CATEGORIES_BY_REVENUE,
            Metric::Profit => CATEGORIES_BY_PROFIT,
        },
        IntentKind::CustomerRanking => CUSTOMER_RANKING,
        IntentKind::CustomerSalesBreakdown => CUSTOMER_BREAKDOWN,
        IntentKind::InactiveCustomers => INACTIVE_CUSTOMERS,
    }
}

/// Values substituted into a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParams {
    pub company_id: i64,
    pub limit: u32,
    pub days: u32,
    pub date_filter: String,
    pub direction: &'static str,
}

impl TemplateParams {
    pub fn new(
        kind: IntentKind,
        params: &IntentParams,
        company_id: CompanyId,
        date: &DateContext,
    ) -> Self {
        let direction = match kind {
            IntentKind::BestSalesDay => RankOrder::Top.sql_direction(),
            IntentKind::WorstSalesDay => RankOrder::Bottom.sql_direction(),
            _ => params.order.sql_direction(),
        };
        let date_filter = if kind.uses_date_filter() {
            date.predicate.clone()
        } else {
            String::new()
        };
        Self {
            company_id: company_id.get(),
            limit: params.limit,
            days: params.days,
            date_filter,
            direction,
        }
    }
}

/// Pure placeholder substitution.
pub fn render(template: &str, params: &TemplateParams) -> String {
    template
        .replace("{company_id}", &params.company_id.to_string())
        .replace("{limit}", &params.limit.to_string())
        .replace("{days}", &params.days.to_string())
        .replace("{direction}", params.direction)
        .replace("{date_filter}", &params.date_filter)
        .trim()
        .to_string()
}

/// Fill the template of a resolved intent.
pub fn build_sql(
    kind: IntentKind,
    params: &IntentParams,
    company_id: CompanyId,
    date: &DateContext,
) -> String {
    let template = template_for(kind, params.metric);
    render(template, &TemplateParams::new(kind, params, company_id, date))
}

/// Every template, for checks that must hold across the whole library.
pub fn all_templates() -> Vec<(IntentKind, Metric, &'static str)> {
    use IntentKind::*;
    let kinds = [
        SalesTotal,
        Returns,
        NetSales,
        CompareMonths,
        CompareYears,
        BestSalesDay,
        WorstSalesDay,
        InvoiceCount,
        MonthlySalesTrend,
        BranchRanking,
        SalesBySalesperson,
        SalespersonRanking,
        ProductRanking,
        CategoryRanking,
        CustomerRanking,
        CustomerSalesBreakdown,
        InactiveCustomers,
    ];
    let mut out = Vec::new();
    for kind in kinds {
        let metrics: &[Metric] = match kind {
            ProductRanking | CategoryRanking => {
                &[Metric::Quantity, Metric::Revenue, Metric::Profit]
            }
            _ => &[Metric::Revenue],
        };
        for metric in metrics {
            out.push((kind, *metric, template_for(kind, *metric)));
        }
    }
    out
}
