//! Query orchestration
//!
//! The single entry point the outer boundary calls: classify the question,
//! extract parameters, run the one aggregation that answers it, assemble
//! the bounded context payload. Stateless per invocation and read-only
//! against the store; all store reads complete before the outcome is
//! returned, so nothing is held across the downstream model call.

use crate::aggregate::Aggregator;
use crate::config::EngineConfig;
use crate::context::{ContextAssembler, ContextPayload};
use crate::entity::EntityResolver;
use crate::error::Result;
use crate::intent::{classify, Intent};
use crate::params::ParameterExtractor;
use crate::store::OperationalStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// What one question resolves to. `data` is `None` exactly when the
/// intent is `Unknown`; `note` carries structured reasons (unrecognized
/// question, dropped filters, assumed defaults, clamped values).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub intent: Intent,
    pub data: Option<ContextPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub struct QueryOrchestrator {
    config: EngineConfig,
    store: Arc<dyn OperationalStore>,
    extractor: ParameterExtractor,
    aggregator: Aggregator,
    assembler: ContextAssembler,
}

impl QueryOrchestrator {
    pub fn new(store: Arc<dyn OperationalStore>, config: EngineConfig) -> Self {
        let resolver = EntityResolver::new(config.fuzzy_threshold, config.ambiguity_margin);
        let extractor = ParameterExtractor::new(resolver, config.default_limit);
        let aggregator = Aggregator::new(Arc::clone(&store));
        let assembler = ContextAssembler::new(config.max_context_bytes);
        Self {
            config,
            store,
            extractor,
            aggregator,
            assembler,
        }
    }

    /// Answer a question with "today" taken from the configured business
    /// timezone.
    pub async fn process_query(&self, question: &str) -> Result<QueryOutcome> {
        self.process_query_at(question, self.config.business_today())
            .await
    }

    /// Same as `process_query` with an explicit anchor date, so callers
    /// and tests can pin the relative date grammar.
    pub async fn process_query_at(
        &self,
        question: &str,
        today: NaiveDate,
    ) -> Result<QueryOutcome> {
        let intent = classify(question);
        info!(%intent, "classified question");

        if intent == Intent::Unknown {
            return Ok(QueryOutcome {
                intent,
                data: None,
                note: Some("unrecognized question".to_string()),
            });
        }

        let (params, mut notes) = self
            .extractor
            .extract(self.store.as_ref(), question, intent, today)
            .await?;

        let (result, aggregation_notes) = self.aggregator.aggregate(intent, &params, today).await?;
        notes.extend(aggregation_notes);

        let payload = self.assembler.assemble(intent, result)?;

        Ok(QueryOutcome {
            intent,
            data: Some(payload),
            note: if notes.is_empty() {
                None
            } else {
                Some(notes.join("; "))
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Dataset, MemoryStore};

    #[tokio::test]
    async fn test_unknown_short_circuits_without_store_access() {
        let orchestrator = QueryOrchestrator::new(
            Arc::new(MemoryStore::new(Dataset::default())),
            EngineConfig::default(),
        );
        let outcome = orchestrator
            .process_query("xyz abc random text")
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::Unknown);
        assert!(outcome.data.is_none());
        assert_eq!(outcome.note.as_deref(), Some("unrecognized question"));
    }

    #[tokio::test]
    async fn test_data_present_iff_intent_known() {
        let orchestrator = QueryOrchestrator::new(
            Arc::new(MemoryStore::new(Dataset::default())),
            EngineConfig::default(),
        );
        let outcome = orchestrator
            .process_query("Ai đang nợ tôi nhiều nhất?")
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::TopDebtors);
        let payload = outcome.data.expect("known intent always carries data");
        assert!(payload.is_empty);
    }
}
