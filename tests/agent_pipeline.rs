mod common;

use common::{agent, config, quiet_config, RecordingExecutor, ScriptedModel};
use sales_agent::{CellValue, ResultRow};

fn row(cells: Vec<(&str, CellValue)>) -> ResultRow {
    cells.into_iter().collect()
}

#[tokio::test]
async fn test_total_sales_today() {
    let model = ScriptedModel::silent();
    let executor = RecordingExecutor::returning(vec![row(vec![(
        "total_sales",
        CellValue::Float(12345.67),
    )])]);
    let agent = agent(&quiet_config(), model.clone(), executor.clone());

    let answer = agent.process_query("What are my total sales today?", 922).await;

    let money_lines: Vec<&str> = answer.lines().filter(|l| l.contains("$12,345.67")).collect();
    assert_eq!(money_lines.len(), 1, "answer was: {}", answer);
    assert!(answer.contains("Today"));

    let executed = executor.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].contains("si.company_id = 922"));
    assert!(executed[0].contains("si.invoice_date >= CURDATE()"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_top_products_by_revenue_joins_on_both_keys() {
    let executor = RecordingExecutor::returning(vec![
        row(vec![
            ("product_name", CellValue::from("Widget")),
            ("total_revenue", CellValue::Float(5000.0)),
        ]),
        row(vec![
            ("product_name", CellValue::from("Gadget")),
            ("total_revenue", CellValue::Float(3200.5)),
        ]),
    ]);
    let agent = agent(&quiet_config(), ScriptedModel::silent(), executor.clone());

    let answer = agent.process_query("top 5 products by revenue", 922).await;

    let sql = &executor.executed()[0];
    assert!(sql.contains(
        "si_item.invoice_id = s.invoice_id AND si_item.product_id = s.product_id"
    ));
    assert!(sql.contains("LIMIT 5"));
    assert!(sql.contains("ORDER BY total_revenue DESC"));
    assert!(answer.contains("1. **Widget** | Total Revenue: $5,000.00"));
    assert!(answer.contains("2. **Gadget** | Total Revenue: $3,200.50"));
    assert!(answer.contains("🏆 **Widget** leads"));
}

#[tokio::test]
async fn test_returns_today_with_no_rows() {
    let executor = RecordingExecutor::returning(Vec::new());
    let agent = agent(&config(&[]), ScriptedModel::silent(), executor.clone());

    let answer = agent.process_query("returns today", 922).await;

    assert_eq!(answer, "ℹ️ No data found for your query.\n\n**Period:** Today");
    assert!(executor.executed()[0].contains("si.status = 'return'"));
}

#[tokio::test]
async fn test_model_write_statement_is_never_executed() {
    let model = ScriptedModel::new(vec![Ok("DELETE FROM sales_invoice WHERE company_id = 922")]);
    let executor = RecordingExecutor::returning(Vec::new());
    let agent = agent(&quiet_config(), model, executor.clone());

    let answer = agent.process_query("what is the weather like", 922).await;

    assert!(answer.contains("Only read queries are allowed"), "answer was: {}", answer);
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_write_wrapping_a_select_is_never_executed() {
    let model = ScriptedModel::new(vec![Ok(
        "DELETE FROM sales_invoice WHERE invoice_id IN \
         (SELECT invoice_id FROM sales_invoice WHERE company_id = 922)",
    )]);
    let executor = RecordingExecutor::returning(Vec::new());
    let agent = agent(&quiet_config(), model, executor.clone());

    let answer = agent.process_query("clear out old invoices", 922).await;

    assert!(answer.contains("Only read queries are allowed"), "answer was: {}", answer);
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_widened_tenant_scope_is_never_executed() {
    for reply in [
        "SELECT SUM(si.total) AS total FROM sales_invoice si WHERE si.company_id = 922 OR 1 = 1",
        "SELECT si.total FROM sales_invoice si WHERE si.company_id = 922 \
         UNION SELECT si.total FROM sales_invoice si WHERE si.company_id IN (5)",
        "SELECT SUM(si.total) AS total FROM sales_invoice si WHERE si.company_id <> 922",
    ] {
        let model = ScriptedModel::new(vec![Ok(reply)]);
        let executor = RecordingExecutor::returning(Vec::new());
        let agent = agent(&quiet_config(), model, executor.clone());

        let answer = agent.process_query("average basket size", 922).await;

        assert!(answer.contains("Could not generate a valid query"), "reply: {}", reply);
        assert!(executor.executed().is_empty(), "reply: {}", reply);
    }
}

#[tokio::test]
async fn test_comma_join_gets_product_predicate_before_execution() {
    let model = ScriptedModel::new(vec![Ok(
        "SELECT SUM(it.price) AS item_value FROM stock s, sales_items it \
         WHERE it.invoice_id = s.invoice_id AND s.company_id = 922",
    )]);
    let executor =
        RecordingExecutor::returning(vec![row(vec![("item_value", CellValue::Float(7.0))])]);
    let agent = agent(&quiet_config(), model, executor.clone());

    agent.process_query("average basket size", 922).await;

    let executed = executor.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0]
        .contains("it.invoice_id = s.invoice_id AND it.product_id = s.product_id"));
}

#[tokio::test]
async fn test_stacked_statement_is_never_executed() {
    let model = ScriptedModel::new(vec![Ok(
        "SELECT 1 FROM sales_invoice si WHERE si.company_id = 922; DROP TABLE sales_invoice",
    )]);
    let executor = RecordingExecutor::returning(Vec::new());
    let agent = agent(&quiet_config(), model, executor.clone());

    let answer = agent.process_query("how tall is the office", 922).await;

    assert!(answer.contains("Only read queries are allowed"));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_model_failure_reports_reason() {
    let model = ScriptedModel::new(vec![Err("connection refused")]);
    let executor = RecordingExecutor::returning(Vec::new());
    let agent = agent(&quiet_config(), model, executor.clone());

    let answer = agent.process_query("average basket size", 922).await;

    assert!(answer.contains("Could not generate a valid query"));
    assert!(answer.contains("connection refused"));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_synthesized_sql_for_other_company_is_refused() {
    let model = ScriptedModel::new(vec![Ok(
        "SELECT AVG(si.total) AS avg_basket FROM sales_invoice si WHERE si.company_id = 7",
    )]);
    let executor = RecordingExecutor::returning(Vec::new());
    let agent = agent(&quiet_config(), model, executor.clone());

    let answer = agent.process_query("average basket size", 922).await;

    assert!(answer.contains("Could not generate a valid query"));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_synthesized_sql_is_corrected_and_executed() {
    let model = ScriptedModel::new(vec![Ok(
        "```sql\nSELECT AVG(si.total) AS avg_basket_value FROM sales_invoice si \
         WHERE si.company_id = 922 AND si.status IN ('paid', 'unpaid', 'remaining')\n```",
    )]);
    let executor =
        RecordingExecutor::returning(vec![row(vec![("avg_basket_value", CellValue::Float(42.5))])]);
    let agent = agent(&config(&[("LLM_SUMMARIES", "false")]), model, executor.clone());

    let answer = agent.process_query("average basket size this month", 922).await;

    let sql = &executor.executed()[0];
    assert!(sql.starts_with("SELECT AVG(si.total)"));
    assert!(sql.contains("si.status NOT IN ('draft', 'draft_return', 'return', 'canceled')"));
    assert!(answer.contains("**Avg Basket Value:** $42.50"));
    assert!(answer.contains("*Intent:* `synthesized`"));
    assert!(answer.contains("```sql\nSELECT AVG(si.total)"));
}

#[tokio::test]
async fn test_execution_error_shows_sql() {
    let executor = RecordingExecutor::failing("Unknown column 'si.total_tax'");
    let agent = agent(&quiet_config(), ScriptedModel::silent(), executor);

    let answer = agent.process_query("total sales this month", 922).await;

    assert!(answer.contains("Error executing query: Unknown column 'si.total_tax'"));
    assert!(answer
        .contains("```sql\nSELECT SUM(si.total - COALESCE(si.total_tax, 0)) AS total_sales"));
}

#[tokio::test]
async fn test_month_comparison() {
    let executor = RecordingExecutor::returning(vec![row(vec![
        ("total_sales_this_month", CellValue::Float(150.0)),
        ("total_sales_last_month", CellValue::Float(100.0)),
    ])]);
    let agent = agent(&quiet_config(), ScriptedModel::silent(), executor);

    let answer = agent.process_query("compare this month vs last month", 922).await;

    assert!(answer.contains("**Difference:** +$50.00 (+50.00%)"));
    assert!(answer.contains("📈"));
}

#[tokio::test]
async fn test_single_row_narration_with_fallback() {
    let rows = vec![row(vec![("total_sales", CellValue::Float(10.0))])];

    let model = ScriptedModel::new(vec![Ok("You sold $10.00 today, a quiet start.")]);
    let no_sql = config(&[("SHOW_SQL", "false")]);
    let narrated = agent(&no_sql, model, RecordingExecutor::returning(rows.clone()));
    let answer = narrated.process_query("total sales today", 922).await;
    assert!(answer.ends_with("You sold $10.00 today, a quiet start."));

    let model = ScriptedModel::new(vec![Err("timeout")]);
    let fallback = agent(&no_sql, model, RecordingExecutor::returning(rows));
    let answer = fallback.process_query("total sales today", 922).await;
    assert!(answer.ends_with("**Total Sales:** $10.00"));
}

#[tokio::test]
async fn test_total_sold_qty_renders_as_units() {
    let executor = RecordingExecutor::returning(vec![
        row(vec![
            ("category_name", CellValue::from("Drinks")),
            ("total_sold_qty", CellValue::Float(1234.0)),
        ]),
        row(vec![
            ("category_name", CellValue::from("Snacks")),
            ("total_sold_qty", CellValue::Float(56.0)),
        ]),
    ]);
    let agent = agent(&quiet_config(), ScriptedModel::silent(), executor);

    let answer = agent.process_query("sales by category", 922).await;

    assert!(answer.contains("Total Sold Qty: 1,234 units"));
    assert!(!answer.contains("$1,234"));
}
