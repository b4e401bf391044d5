//! Dynamic SQL synthesis
//!
//! Fallback for questions the intent table does not cover: prompt the model, clean up its
//! answer with the correction passes, and insist the result is scoped to the session's
//! company. Any failure yields no statement; the agent never guesses.

pub mod corrections;
pub mod prompt;
pub mod tenant;

pub use corrections::{apply_corrections, CorrectionPass, PASSES};
pub use prompt::build_synthesis_prompt;
pub use tenant::check_tenant_scope;

use crate::error::{AgentError, Result};
use crate::llm::LanguageModel;
use crate::safety_guardrails::{ReadOnlyGuard, RejectReason, SafetyVerdict};
use crate::session::CompanyId;
use crate::time::DateContext;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SYNTHESIS_MAX_TOKENS: u32 = 500;

pub struct SqlSynthesizer {
    llm: Arc<dyn LanguageModel>,
    guard: ReadOnlyGuard,
}

impl SqlSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            guard: ReadOnlyGuard::new(),
        }
    }

    pub async fn synthesize(
        &self,
        question: &str,
        company_id: CompanyId,
        date: &DateContext,
    ) -> Result<String> {
        let prompt = build_synthesis_prompt(question, company_id, date);
        debug!("Synthesis prompt: {} chars", prompt.len());

        let raw = self.llm.complete(&prompt, SYNTHESIS_MAX_TOKENS).await?;
        let sql = apply_corrections(&raw);

        match self.guard.validate(&sql) {
            SafetyVerdict::Accepted => {}
            SafetyVerdict::Rejected(RejectReason::Empty | RejectReason::NotSelect) => {
                warn!("Model response has no SELECT statement");
                return Err(AgentError::Synthesis(
                    "the model did not return a SELECT statement".to_string(),
                ));
            }
            SafetyVerdict::Rejected(reason) => {
                warn!("Model wrote a non-read statement ({}): {}", reason, sql);
                return Err(AgentError::UnsafeQuery(reason.to_string()));
            }
        }
        check_tenant_scope(&sql, company_id)?;

        info!("Synthesized SQL ({} chars)", sql.len());
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedModel(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, _prompt: &str, max_tokens: u32) -> Result<String> {
            assert_eq!(max_tokens, SYNTHESIS_MAX_TOKENS);
            self.0
                .map(str::to_string)
                .map_err(|e| AgentError::Llm(e.to_string()))
        }
    }

    fn synthesizer(reply: std::result::Result<&'static str, &'static str>) -> SqlSynthesizer {
        SqlSynthesizer::new(Arc::new(CannedModel(reply)))
    }

    fn company() -> CompanyId {
        CompanyId::new(922).unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_cleans_model_output() {
        let reply = "```sql\nSELECT c.name, SUM(si.total) AS total_sales FROM sales_invoice si \
                     JOIN contacts c ON c.contact_id = si.customer_id WHERE si.company_id = 922 \
                     AND si.status IN ('paid', 'unpaid') GROUP BY c.name\n```";
        let sql = synthesizer(Ok(reply))
            .synthesize("sales per customer name", company(), &DateContext::all_time())
            .await
            .unwrap();
        assert!(sql.starts_with("SELECT c.company"));
        assert!(sql.contains("NOT IN ('draft', 'draft_return', 'return', 'canceled')"));
    }

    #[tokio::test]
    async fn test_model_error_is_reported() {
        let err = synthesizer(Err("connection refused"))
            .synthesize("anything", company(), &DateContext::all_time())
            .await
            .unwrap_err();
        assert!(err.user_message().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_write_wrapping_select_is_unsafe() {
        let err = synthesizer(Ok(
            "DELETE FROM sales_invoice WHERE invoice_id IN \
             (SELECT invoice_id FROM sales_invoice WHERE company_id = 922)",
        ))
        .synthesize("clean up", company(), &DateContext::all_time())
        .await
        .unwrap_err();
        assert!(matches!(err, AgentError::UnsafeQuery(_)));
    }

    #[tokio::test]
    async fn test_widened_scope_fails() {
        let reply = "SELECT SUM(total) FROM sales_invoice WHERE company_id = 922 OR 1 = 1";
        let err = synthesizer(Ok(reply))
            .synthesize("all sales", company(), &DateContext::all_time())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Synthesis(_)));
    }

    #[tokio::test]
    async fn test_no_select_fails() {
        let err = synthesizer(Ok("I don't know."))
            .synthesize("anything", company(), &DateContext::all_time())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Synthesis(_)));
    }
}
