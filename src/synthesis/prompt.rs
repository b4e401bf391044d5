//! Synthesis prompt
//!
//! Schema, business rules and worked examples for questions no template covers. The
//! examples are rendered from the template library for the session's own company, so the
//! model sees exactly the statement shapes the agent trusts.

use crate::intent::{IntentKind, IntentParams, Metric};
use crate::session::CompanyId;
use crate::templates::{build_sql, NET_SALE_STATUSES, REVENUE_EXPR, VALID_SALE_STATUSES};
use crate::time::{DateContext, Period};

pub const SCHEMA: &str = "\
sales_invoice si: invoice_id (PK), company_id, warehouse_id -> warehouses.warehouse_id,
  customer_id -> contacts.contact_id, salesman -> users.user_id, invoice_num, invoice_date,
  status, total, total_tax, subtotal, discount
sales_items: item_id (PK), company_id, invoice_id -> sales_invoice.invoice_id,
  product_id -> products.product_id, quantity, price, discount, item_cost, total, tax
stock: stock_id (PK), company_id, product_id -> products.product_id,
  invoice_id -> sales_invoice.invoice_id, quantity, cost, stock_type
products: product_id (PK), company_id, category_id -> products_category.category_id,
  name, sku, price, cost
products_category: category_id (PK), title
contacts: contact_id (PK), company_id, company, region, is_active
users: user_id (PK), company_id, firstname, lastname
warehouses: warehouse_id (PK), company_id, title";

/// Rules the model must follow; the same rules the templates encode.
pub fn business_rules(company_id: CompanyId) -> Vec<String> {
    vec![
        "Generate exactly one read-only SELECT statement. Never modify data.".to_string(),
        format!(
            "Always filter by company_id = {} on the main table (for example si.company_id = {}).",
            company_id, company_id
        ),
        format!("Alias sales_invoice as si. Revenue is {}.", REVENUE_EXPR),
        format!("A valid sale has {}.", VALID_SALE_STATUSES),
        format!(
            "Returns have si.status = 'return'; net sales use {} and subtract returns.",
            NET_SALE_STATUSES
        ),
        "Sold quantity comes from stock rows with stock_type = 'sales' AND quantity < 0, \
         summed as ABS(quantity)."
            .to_string(),
        "When joining stock and sales_items, join on BOTH invoice_id AND product_id.".to_string(),
        "Customer names are contacts.company; category and warehouse names are .title; \
         salesperson names are CONCAT(users.firstname, ' ', users.lastname)."
            .to_string(),
        "Use COALESCE for nullable sums and LIMIT list queries to 20 rows.".to_string(),
    ]
}

/// One worked question and its statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptExample {
    pub question: &'static str,
    pub sql: String,
}

pub fn examples(company_id: CompanyId) -> Vec<PromptExample> {
    let this_month = DateContext::new(Period::ThisMonth);
    let last_90 = DateContext::new(Period::LastDays(90));
    let cases: [(&'static str, IntentKind, IntentParams, &DateContext); 4] = [
        (
            "What are my total sales this month?",
            IntentKind::SalesTotal,
            IntentParams::default(),
            &this_month,
        ),
        (
            "Top 5 products by revenue in the last 90 days",
            IntentKind::ProductRanking,
            IntentParams { limit: 5, metric: Metric::Revenue, ..IntentParams::default() },
            &last_90,
        ),
        (
            "Which branch sold the most this month?",
            IntentKind::BranchRanking,
            IntentParams { limit: 1, ..IntentParams::default() },
            &this_month,
        ),
        (
            "Customers who have not bought anything in 60 days",
            IntentKind::InactiveCustomers,
            IntentParams { days: 60, limit: 20, ..IntentParams::default() },
            &this_month,
        ),
    ];
    cases
        .into_iter()
        .map(|(question, kind, params, date)| PromptExample {
            question,
            sql: build_sql(kind, &params, company_id, date),
        })
        .collect()
}

/// Full prompt for a question no template answers.
pub fn build_synthesis_prompt(question: &str, company_id: CompanyId, date: &DateContext) -> String {
    let mut prompt = String::from(
        "You are a MySQL expert for a sales analytics system. \
         Write one query that answers the question.\n\n",
    );

    prompt.push_str("## Schema\n");
    prompt.push_str(SCHEMA);
    prompt.push_str("\n\n## Rules\n");
    for (i, rule) in business_rules(company_id).iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, rule));
    }

    prompt.push_str("\n## Examples\n");
    for example in examples(company_id) {
        prompt.push_str(&format!("Q: {}\nA: {}\n\n", example.question, example.sql));
    }

    prompt.push_str("## Task\n");
    prompt.push_str(&format!("Question: {}\n", question.trim()));
    prompt.push_str(&format!("Company ID: {}\n", company_id));
    prompt.push_str(&format!("Date range: {}\n", date.label));
    if date.is_all_time() {
        prompt.push_str("Date filter: none\n");
    } else {
        prompt.push_str(&format!("Date filter: {}\n", date.predicate));
    }

    prompt.push_str("\nReturn ONLY the SQL query. No explanation, no markdown, no backticks.\n");
    prompt
}
