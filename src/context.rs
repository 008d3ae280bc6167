//! Context assembly
//!
//! Packages an aggregation result into the bounded payload handed to the
//! downstream language model. Serialization is struct-ordered (no maps),
//! so two calls on identical input produce byte-identical JSON. Numbers
//! stay numeric; locale formatting belongs to the presentation boundary.

use crate::aggregate::{AggregationData, AggregationResult};
use crate::error::Result;
use crate::intent::Intent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The structured, bounded context for grounded answer synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPayload {
    pub intent: Intent,
    pub generated_at: DateTime<Utc>,
    pub is_empty: bool,
    /// True when rows were dropped to respect the byte ceiling.
    pub truncated: bool,
    pub data: AggregationData,
}

impl ContextPayload {
    /// Deterministic serialization: identical payloads yield identical
    /// bytes.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds payloads under a fixed byte ceiling. Sequences are already
/// capped upstream by the per-intent row limit, so the ceiling only bites
/// on pathological row sizes; when it does, trailing rows are dropped
/// deterministically.
pub struct ContextAssembler {
    max_bytes: usize,
}

impl ContextAssembler {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn assemble(&self, intent: Intent, result: AggregationResult) -> Result<ContextPayload> {
        let mut payload = ContextPayload {
            intent,
            generated_at: result.generated_at,
            is_empty: result.is_empty,
            truncated: false,
            data: result.data,
        };

        let mut serialized = payload.to_json()?;
        while serialized.len() > self.max_bytes && pop_trailing_row(&mut payload.data) {
            payload.truncated = true;
            serialized = payload.to_json()?;
        }
        if serialized.len() > self.max_bytes {
            warn!(
                bytes = serialized.len(),
                ceiling = self.max_bytes,
                "context payload exceeds ceiling even with no rows left"
            );
        }

        Ok(payload)
    }
}

/// Drop one row from the end of the variant's sequence, if it has one.
fn pop_trailing_row(data: &mut AggregationData) -> bool {
    match data {
        AggregationData::TopDebtors { debtors } => debtors.pop().is_some(),
        AggregationData::MonthlySales { by_type, .. } => by_type.pop().is_some(),
        AggregationData::OverdueReceivables { receivables, .. } => receivables.pop().is_some(),
        AggregationData::CurrentInventory { stocks } => stocks.pop().is_some(),
        AggregationData::SupplierPayables { suppliers } => suppliers.pop().is_some(),
        AggregationData::RevenueComparison { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CustomerBalance;
    use chrono::TimeZone;

    fn fixed_result(rows: usize) -> AggregationResult {
        AggregationResult {
            generated_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            is_empty: rows == 0,
            data: AggregationData::TopDebtors {
                debtors: (0..rows)
                    .map(|i| CustomerBalance {
                        customer_id: format!("C{i}"),
                        name: format!("Khách hàng số {i}"),
                        remaining_amount: 1000.0 - i as f64,
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_assemble_deterministic() {
        let assembler = ContextAssembler::new(8192);
        let a = assembler
            .assemble(Intent::TopDebtors, fixed_result(3))
            .unwrap()
            .to_json()
            .unwrap();
        let b = assembler
            .assemble(Intent::TopDebtors, fixed_result(3))
            .unwrap()
            .to_json()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_intent_serialized_screaming_snake() {
        let assembler = ContextAssembler::new(8192);
        let json = assembler
            .assemble(Intent::TopDebtors, fixed_result(1))
            .unwrap()
            .to_json()
            .unwrap();
        assert!(json.contains("\"TOP_DEBTORS\""));
        assert!(json.contains("\"is_empty\":false"));
        // Numbers stay numeric, not strings
        assert!(json.contains("\"remaining_amount\":1000.0"));
    }

    #[test]
    fn test_byte_ceiling_drops_trailing_rows() {
        let assembler = ContextAssembler::new(600);
        let payload = assembler
            .assemble(Intent::TopDebtors, fixed_result(20))
            .unwrap();
        assert!(payload.truncated);
        let AggregationData::TopDebtors { debtors } = &payload.data else {
            panic!("wrong variant")
        };
        assert!(debtors.len() < 20);
        assert!(payload.to_json().unwrap().len() <= 600);
        // The kept rows are the leading ones
        assert_eq!(debtors[0].customer_id, "C0");
    }

    #[test]
    fn test_no_truncation_under_ceiling() {
        let assembler = ContextAssembler::new(8192);
        let payload = assembler
            .assemble(Intent::TopDebtors, fixed_result(5))
            .unwrap();
        assert!(!payload.truncated);
    }
}
