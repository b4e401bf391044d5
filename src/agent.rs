//! Sales Agent
//!
//! Orchestrates one question end to end:
//! date context → intent → template or synthesized SQL → read-only check → execution →
//! formatting. Every stage runs to completion before the next starts, and every failure
//! is turned into a message at the `process_query` boundary.

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::execution::QueryExecutor;
use crate::formatter::{ReportContext, ReportFooter, ResultFormatter};
use crate::intent::{IntentKind, IntentResolver, QueryIntent};
use crate::llm::LanguageModel;
use crate::observability::{QueryLogEntry, QueryLogger, QueryRoute};
use crate::safety_guardrails::ReadOnlyGuard;
use crate::session::{CompanyId, SessionContext};
use crate::synthesis::SqlSynthesizer;
use crate::templates::{build_sql, template_for};
use crate::time::{extract_date_context, DateContext};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const EMPTY_QUESTION: &str = "❓ Please ask a question about your sales.";

/// Resolution-only view of a question, nothing executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub question: String,
    pub company_id: CompanyId,
    pub date: DateContext,
    pub intent: QueryIntent,
    /// Template statement; `None` when the question would go to synthesis.
    pub sql: Option<String>,
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Question: {}", self.question)?;
        writeln!(f, "Company:  {}", self.company_id)?;
        writeln!(f, "Period:   {}", self.date.label)?;
        match &self.intent {
            QueryIntent::Resolved { kind, params } => {
                writeln!(
                    f,
                    "Intent:   {} (limit {}, metric {}, order {})",
                    kind.as_str(),
                    params.limit,
                    params.metric.as_str(),
                    params.order.sql_direction()
                )?;
            }
            QueryIntent::Unresolved => writeln!(f, "Intent:   unresolved (model synthesis)")?,
        }
        if let Some(sql) = &self.sql {
            write!(f, "SQL:\n{}", sql)?;
        }
        Ok(())
    }
}

pub struct SalesAgent {
    resolver: IntentResolver,
    synthesizer: SqlSynthesizer,
    guard: ReadOnlyGuard,
    executor: Arc<dyn QueryExecutor>,
    formatter: ResultFormatter,
    logger: Arc<QueryLogger>,
    show_sql: bool,
}

impl SalesAgent {
    pub fn new(
        config: &AgentConfig,
        llm: Arc<dyn LanguageModel>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        let mut formatter = ResultFormatter::new(&config.currency_symbol);
        if config.llm_summaries {
            formatter = formatter.with_llm(Arc::clone(&llm));
        }
        Self {
            resolver: IntentResolver::new(),
            synthesizer: SqlSynthesizer::new(llm),
            guard: ReadOnlyGuard::new(),
            executor,
            formatter,
            logger: Arc::new(QueryLogger::in_memory()),
            show_sql: config.show_sql,
        }
    }

    pub fn with_logger(mut self, logger: Arc<QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> &QueryLogger {
        &self.logger
    }

    /// Date context, intent and template SQL for a question, without running anything.
    pub fn plan(&self, question: &str, company_id: CompanyId) -> QueryPlan {
        let date = extract_date_context(question);
        let intent = self.resolver.resolve(question, &date);
        let sql = match &intent {
            QueryIntent::Resolved { kind, params } => {
                Some(build_sql(*kind, params, company_id, &date))
            }
            QueryIntent::Unresolved => None,
        };
        QueryPlan {
            question: question.to_string(),
            company_id,
            date,
            intent,
            sql,
        }
    }

    /// Answer a question for a raw company id. Never fails; errors become text.
    pub async fn process_query(&self, question: &str, company_id: i64) -> String {
        match CompanyId::new(company_id) {
            Ok(id) => self.process(&SessionContext::new(id), question).await,
            Err(e) => e.user_message(),
        }
    }

    pub async fn process(&self, session: &SessionContext, question: &str) -> String {
        if question.trim().is_empty() {
            return EMPTY_QUESTION.to_string();
        }

        let started = Instant::now();
        let mut entry = QueryLogEntry::new(session.company_id().get(), question);
        let outcome = self.answer(session, question, &mut entry).await;
        entry.elapsed_ms = started.elapsed().as_millis() as u64;
        entry.success = outcome.is_ok();
        if let Err(e) = &outcome {
            entry.error_message = Some(e.to_string());
        }
        if let Err(e) = self.logger.log_query(entry) {
            warn!("Failed to record query log: {}", e);
        }

        match outcome {
            Ok(answer) => answer,
            Err(e) => {
                error!("Question failed: {}", e);
                e.user_message()
            }
        }
    }

    async fn answer(
        &self,
        session: &SessionContext,
        question: &str,
        entry: &mut QueryLogEntry,
    ) -> Result<String> {
        let company_id = session.company_id();
        let date = extract_date_context(question);
        info!("Date context: {}", date.label);

        let intent = self.resolver.resolve(question, &date);
        entry.intent = intent.label().to_string();
        info!("Intent: {}", intent.label());

        let sql = match &intent {
            QueryIntent::Resolved { kind, params } => {
                entry.route = Some(QueryRoute::Template);
                build_sql(*kind, params, company_id, &date)
            }
            QueryIntent::Unresolved => {
                entry.route = Some(QueryRoute::Synthesized);
                self.synthesizer.synthesize(question, company_id, &date).await?
            }
        };
        entry.sql = Some(sql.clone());

        if let Err(e) = self.guard.ensure_read_only(&sql) {
            warn!("Statement rejected before execution");
            return Err(e);
        }

        let rows = self.executor.execute(&sql).await.map_err(|e| match e {
            AgentError::Database(message) => AgentError::Execution {
                message,
                sql: sql.clone(),
            },
            other => other,
        })?;
        entry.rows_returned = Some(rows.len());
        info!("Rows: {}", rows.len());

        let mut ctx = ReportContext::new(question, intent.kind(), &date.label);
        if self.show_sql {
            ctx = ctx.with_footer(ReportFooter {
                intent: intent.label().to_string(),
                limit: footer_limit(&intent),
                sql: sql.clone(),
            });
        }
        Ok(self.formatter.format(&ctx, &rows).await)
    }
}

/// The limit only means something when the template has one.
fn footer_limit(intent: &QueryIntent) -> Option<u32> {
    match intent {
        QueryIntent::Resolved { kind, params } => match kind {
            IntentKind::BestSalesDay | IntentKind::WorstSalesDay => None,
            _ if template_for(*kind, params.metric).contains("{limit}") => Some(params.limit),
            _ => None,
        },
        QueryIntent::Unresolved => None,
    }
}
