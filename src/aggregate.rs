//! Aggregation dispatch
//!
//! One deterministic query per intent. Every number in an
//! `AggregationResult` comes straight from a store read; nothing here is
//! estimated or synthesized. Empty result sets are explicit: `is_empty`
//! is set and sequences stay present (empty), so downstream grounding can
//! truthfully say "no data" instead of guessing.

use crate::entity::MatchConfidence;
use crate::error::{EngineError, Result};
use crate::intent::Intent;
use crate::params::{DateRange, QueryParameters};
use crate::store::{CustomerBalance, OperationalStore, SupplierBalance, TypeTotals};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One receivable past due, with the day count precomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueEntry {
    pub customer_id: String,
    pub customer_name: String,
    pub due_date: NaiveDate,
    pub days_overdue: i64,
    pub remaining_amount: f64,
}

/// On-hand quantity for one cement type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub cement_type: String,
    pub on_hand_quantity: f64,
}

/// Revenue total over one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRevenue {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total: f64,
}

/// Intent-specific aggregation payload. Serialized untagged: the intent
/// label travels separately in the context payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationData {
    TopDebtors {
        debtors: Vec<CustomerBalance>,
    },
    MonthlySales {
        start: NaiveDate,
        end: NaiveDate,
        by_type: Vec<TypeTotals>,
        total_quantity: f64,
        total_revenue: f64,
    },
    OverdueReceivables {
        threshold_days: i64,
        receivables: Vec<OverdueEntry>,
    },
    RevenueComparison {
        current: PeriodRevenue,
        previous: PeriodRevenue,
        delta_percent: f64,
        /// False when the prior period total is zero and the delta is
        /// not computable.
        comparable: bool,
    },
    CurrentInventory {
        stocks: Vec<StockLevel>,
    },
    SupplierPayables {
        suppliers: Vec<SupplierBalance>,
    },
}

/// Typed result of one aggregation, stamped and flagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub generated_at: DateTime<Utc>,
    pub is_empty: bool,
    pub data: AggregationData,
}

impl AggregationResult {
    fn new(is_empty: bool, data: AggregationData) -> Self {
        Self {
            generated_at: Utc::now(),
            is_empty,
            data,
        }
    }
}

/// Routes (intent, parameters) to the one query that answers it.
pub struct Aggregator {
    store: Arc<dyn OperationalStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }

    /// Run the aggregation for `intent`. Returns the typed result plus
    /// notes about degradations (dropped filters, clamped values).
    pub async fn aggregate(
        &self,
        intent: Intent,
        params: &QueryParameters,
        today: NaiveDate,
    ) -> Result<(AggregationResult, Vec<String>)> {
        info!(intent = %intent, "running aggregation");
        match intent {
            Intent::TopDebtors => self.top_debtors(params).await,
            Intent::MonthlySalesVolume => self.monthly_sales(params, today).await,
            Intent::OverdueReceivables => self.overdue_receivables(params, today).await,
            Intent::RevenueComparison => self.revenue_comparison(params, today).await,
            Intent::CurrentInventory => self.current_inventory().await,
            Intent::SupplierPayables => self.supplier_payables(params).await,
            Intent::Unknown => Err(EngineError::Execution(
                "cannot aggregate an unrecognized intent".to_string(),
            )),
        }
    }

    async fn top_debtors(
        &self,
        params: &QueryParameters,
    ) -> Result<(AggregationResult, Vec<String>)> {
        let mut notes = Vec::new();
        let balances = self.store.receivables_by_customer().await?;

        let filter_id = entity_filter(params, &mut notes);
        let debtors: Vec<CustomerBalance> = balances
            .into_iter()
            .filter(|b| filter_id.map_or(true, |id| b.customer_id == id))
            .sorted_by(compare_balances)
            .take(limit(params))
            .collect();

        debug!(rows = debtors.len(), "top debtors computed");
        let is_empty = debtors.is_empty();
        Ok((
            AggregationResult::new(is_empty, AggregationData::TopDebtors { debtors }),
            notes,
        ))
    }

    async fn supplier_payables(
        &self,
        params: &QueryParameters,
    ) -> Result<(AggregationResult, Vec<String>)> {
        let mut notes = Vec::new();
        let balances = self.store.payables_by_supplier().await?;

        let filter_id = entity_filter(params, &mut notes);
        let suppliers: Vec<SupplierBalance> = balances
            .into_iter()
            .filter(|b| filter_id.map_or(true, |id| b.supplier_id == id))
            .sorted_by(|a, b| {
                b.remaining_amount
                    .partial_cmp(&a.remaining_amount)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.name.cmp(&b.name))
            })
            .take(limit(params))
            .collect();

        let is_empty = suppliers.is_empty();
        Ok((
            AggregationResult::new(is_empty, AggregationData::SupplierPayables { suppliers }),
            notes,
        ))
    }

    async fn monthly_sales(
        &self,
        params: &QueryParameters,
        today: NaiveDate,
    ) -> Result<(AggregationResult, Vec<String>)> {
        let range = params
            .date_range
            .unwrap_or_else(|| fallback_month(today));
        let by_type = self.store.sales_by_type(Some(&range)).await?;

        let total_quantity = by_type.iter().map(|t| t.quantity).sum();
        let total_revenue = by_type.iter().map(|t| t.revenue).sum();
        let is_empty = by_type.is_empty();

        Ok((
            AggregationResult::new(
                is_empty,
                AggregationData::MonthlySales {
                    start: range.start,
                    end: range.end,
                    by_type,
                    total_quantity,
                    total_revenue,
                },
            ),
            Vec::new(),
        ))
    }

    async fn overdue_receivables(
        &self,
        params: &QueryParameters,
        today: NaiveDate,
    ) -> Result<(AggregationResult, Vec<String>)> {
        let mut notes = Vec::new();
        let threshold_days = params.threshold_days.unwrap_or(0);
        let cutoff = today - Duration::days(threshold_days);

        let rows = self.store.unpaid_receivables_due_before(cutoff).await?;
        let filter_id = entity_filter(params, &mut notes);

        let receivables: Vec<OverdueEntry> = rows
            .into_iter()
            .filter(|r| filter_id.map_or(true, |id| r.customer_id == id))
            .map(|r| OverdueEntry {
                days_overdue: today.signed_duration_since(r.due_date).num_days(),
                customer_id: r.customer_id,
                customer_name: r.customer_name,
                due_date: r.due_date,
                remaining_amount: r.remaining_amount,
            })
            .sorted_by(|a, b| {
                b.days_overdue
                    .cmp(&a.days_overdue)
                    .then_with(|| {
                        b.remaining_amount
                            .partial_cmp(&a.remaining_amount)
                            .unwrap_or(Ordering::Equal)
                    })
                    .then_with(|| a.customer_name.cmp(&b.customer_name))
            })
            .take(limit(params))
            .collect();

        let is_empty = receivables.is_empty();
        Ok((
            AggregationResult::new(
                is_empty,
                AggregationData::OverdueReceivables {
                    threshold_days,
                    receivables,
                },
            ),
            notes,
        ))
    }

    async fn revenue_comparison(
        &self,
        params: &QueryParameters,
        today: NaiveDate,
    ) -> Result<(AggregationResult, Vec<String>)> {
        let current_range = params
            .date_range
            .unwrap_or_else(|| fallback_month(today));
        let previous_range = current_range.preceding();

        let current_rows = self.store.sales_by_type(Some(&current_range)).await?;
        let previous_rows = self.store.sales_by_type(Some(&previous_range)).await?;

        let current_total: f64 = current_rows.iter().map(|t| t.revenue).sum();
        let previous_total: f64 = previous_rows.iter().map(|t| t.revenue).sum();

        let mut notes = Vec::new();
        let (delta_percent, comparable) = if previous_total == 0.0 {
            notes.push("previous period has no revenue; delta not computable".to_string());
            (0.0, false)
        } else {
            (
                (current_total - previous_total) / previous_total * 100.0,
                true,
            )
        };

        let is_empty = current_rows.is_empty() && previous_rows.is_empty();
        Ok((
            AggregationResult::new(
                is_empty,
                AggregationData::RevenueComparison {
                    current: PeriodRevenue {
                        start: current_range.start,
                        end: current_range.end,
                        total: current_total,
                    },
                    previous: PeriodRevenue {
                        start: previous_range.start,
                        end: previous_range.end,
                        total: previous_total,
                    },
                    delta_percent,
                    comparable,
                },
            ),
            notes,
        ))
    }

    async fn current_inventory(&self) -> Result<(AggregationResult, Vec<String>)> {
        let purchased = self.store.purchases_by_type(None).await?;
        let sold = self.store.sales_by_type(None).await?;

        let mut per_type: BTreeMap<String, f64> = BTreeMap::new();
        for p in purchased {
            *per_type.entry(p.cement_type).or_insert(0.0) += p.quantity;
        }
        for s in sold {
            *per_type.entry(s.cement_type).or_insert(0.0) -= s.quantity;
        }

        let mut notes = Vec::new();
        let stocks: Vec<StockLevel> = per_type
            .into_iter()
            .map(|(cement_type, on_hand)| {
                if on_hand < 0.0 {
                    notes.push(format!(
                        "computed on-hand quantity for {} is negative ({:.1}), reported as 0; \
                         purchase and sale records are inconsistent",
                        cement_type, on_hand
                    ));
                    StockLevel {
                        cement_type,
                        on_hand_quantity: 0.0,
                    }
                } else {
                    StockLevel {
                        cement_type,
                        on_hand_quantity: on_hand,
                    }
                }
            })
            .collect();

        let is_empty = stocks.is_empty();
        Ok((
            AggregationResult::new(is_empty, AggregationData::CurrentInventory { stocks }),
            notes,
        ))
    }
}

fn fallback_month(today: NaiveDate) -> DateRange {
    DateRange::month(today.year(), today.month())
        .expect("current month of a valid date is a valid range")
}

fn limit(params: &QueryParameters) -> usize {
    params.limit.unwrap_or(10)
}

/// A resolved entity reference narrows the query; an unresolved or
/// ambiguous one is dropped with a note so the aggregation still answers
/// the broader question.
fn entity_filter<'a>(params: &'a QueryParameters, notes: &mut Vec<String>) -> Option<&'a str> {
    let entity = params.entity.as_ref()?;
    if entity.is_resolved() {
        entity.resolved_id.as_deref()
    } else {
        if entity.confidence == MatchConfidence::None {
            notes.push(format!(
                "could not resolve {} name \"{}\"; ignoring the name filter",
                entity.kind.as_str(),
                entity.raw_name
            ));
        }
        None
    }
}

fn compare_balances(a: &CustomerBalance, b: &CustomerBalance) -> Ordering {
    b.remaining_amount
        .partial_cmp(&a.remaining_amount)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Customer, Dataset, MemoryStore, Purchase, Receivable, Sale};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn aggregator(data: Dataset) -> Aggregator {
        Aggregator::new(Arc::new(MemoryStore::new(data)))
    }

    fn debtor_data() -> Dataset {
        Dataset {
            customers: vec![
                Customer { id: "A".into(), name: "An".into() },
                Customer { id: "B".into(), name: "Bình".into() },
                Customer { id: "C".into(), name: "Cúc".into() },
            ],
            receivables: vec![
                Receivable { customer_id: "A".into(), amount: 500.0, paid_amount: 0.0, due_date: None },
                Receivable { customer_id: "B".into(), amount: 1200.0, paid_amount: 0.0, due_date: None },
                Receivable { customer_id: "C".into(), amount: 1200.0, paid_amount: 0.0, due_date: None },
            ],
            ..Dataset::default()
        }
    }

    #[tokio::test]
    async fn test_top_debtors_sorted_desc_ties_by_name() {
        let agg = aggregator(debtor_data());
        let (result, notes) = agg
            .aggregate(Intent::TopDebtors, &QueryParameters::default(), day(2025, 3, 1))
            .await
            .unwrap();
        assert!(notes.is_empty());
        assert!(!result.is_empty);
        let AggregationData::TopDebtors { debtors } = result.data else {
            panic!("wrong variant")
        };
        let names: Vec<&str> = debtors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Bình", "Cúc", "An"]);
    }

    #[tokio::test]
    async fn test_top_debtors_limit() {
        let agg = aggregator(debtor_data());
        let params = QueryParameters {
            limit: Some(2),
            ..QueryParameters::default()
        };
        let (result, _) = agg
            .aggregate(Intent::TopDebtors, &params, day(2025, 3, 1))
            .await
            .unwrap();
        let AggregationData::TopDebtors { debtors } = result.data else {
            panic!("wrong variant")
        };
        assert_eq!(debtors.len(), 2);
    }

    #[tokio::test]
    async fn test_overdue_threshold_strictly_greater() {
        let today = day(2025, 4, 10);
        let data = Dataset {
            customers: vec![Customer { id: "A".into(), name: "An".into() }],
            receivables: vec![
                // 90 days overdue exactly: excluded by "> 90"
                Receivable {
                    customer_id: "A".into(),
                    amount: 100.0,
                    paid_amount: 0.0,
                    due_date: Some(today - Duration::days(90)),
                },
                // 91 days overdue: included
                Receivable {
                    customer_id: "A".into(),
                    amount: 200.0,
                    paid_amount: 0.0,
                    due_date: Some(today - Duration::days(91)),
                },
            ],
            ..Dataset::default()
        };
        let agg = aggregator(data);
        let params = QueryParameters {
            threshold_days: Some(90),
            ..QueryParameters::default()
        };
        let (result, _) = agg
            .aggregate(Intent::OverdueReceivables, &params, today)
            .await
            .unwrap();
        let AggregationData::OverdueReceivables { receivables, threshold_days } = result.data
        else {
            panic!("wrong variant")
        };
        assert_eq!(threshold_days, 90);
        assert_eq!(receivables.len(), 1);
        assert_eq!(receivables[0].days_overdue, 91);
    }

    #[tokio::test]
    async fn test_overdue_empty_is_flagged() {
        let agg = aggregator(debtor_data());
        let params = QueryParameters {
            threshold_days: Some(90),
            ..QueryParameters::default()
        };
        let (result, _) = agg
            .aggregate(Intent::OverdueReceivables, &params, day(2025, 4, 10))
            .await
            .unwrap();
        assert!(result.is_empty);
        let AggregationData::OverdueReceivables { receivables, .. } = result.data else {
            panic!("wrong variant")
        };
        assert!(receivables.is_empty());
    }

    #[tokio::test]
    async fn test_inventory_never_negative() {
        let data = Dataset {
            purchases: vec![Purchase {
                date: day(2025, 1, 1),
                cement_type: "PCB40".into(),
                quantity: 500.0,
                amount: 0.0,
            }],
            sales: vec![Sale {
                date: day(2025, 2, 1),
                cement_type: "PCB40".into(),
                quantity: 520.0,
                amount: 0.0,
            }],
            ..Dataset::default()
        };
        let agg = aggregator(data);
        let (result, notes) = agg
            .aggregate(Intent::CurrentInventory, &QueryParameters::default(), day(2025, 3, 1))
            .await
            .unwrap();
        let AggregationData::CurrentInventory { stocks } = result.data else {
            panic!("wrong variant")
        };
        assert_eq!(stocks.len(), 1);
        assert_eq!(stocks[0].on_hand_quantity, 0.0);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("PCB40"));
    }

    #[tokio::test]
    async fn test_revenue_comparison_not_computable_without_prior_data() {
        let data = Dataset {
            sales: vec![Sale {
                date: day(2025, 3, 10),
                cement_type: "PCB40".into(),
                quantity: 10.0,
                amount: 150.0,
            }],
            ..Dataset::default()
        };
        let agg = aggregator(data);
        let params = QueryParameters {
            date_range: DateRange::month(2025, 3),
            ..QueryParameters::default()
        };
        let (result, notes) = agg
            .aggregate(Intent::RevenueComparison, &params, day(2025, 3, 15))
            .await
            .unwrap();
        let AggregationData::RevenueComparison { current, previous, delta_percent, comparable } =
            result.data
        else {
            panic!("wrong variant")
        };
        assert_eq!(current.total, 150.0);
        assert_eq!(previous.total, 0.0);
        assert_eq!(delta_percent, 0.0);
        assert!(!comparable);
        assert!(!notes.is_empty());
    }

    #[tokio::test]
    async fn test_revenue_comparison_delta() {
        let data = Dataset {
            sales: vec![
                Sale { date: day(2025, 2, 10), cement_type: "PCB40".into(), quantity: 1.0, amount: 100.0 },
                Sale { date: day(2025, 3, 10), cement_type: "PCB40".into(), quantity: 1.0, amount: 150.0 },
            ],
            ..Dataset::default()
        };
        let agg = aggregator(data);
        // March has 31 days; the preceding equal-length window still
        // covers the February sale
        let params = QueryParameters {
            date_range: DateRange::month(2025, 3),
            ..QueryParameters::default()
        };
        let (result, _) = agg
            .aggregate(Intent::RevenueComparison, &params, day(2025, 3, 15))
            .await
            .unwrap();
        let AggregationData::RevenueComparison { delta_percent, comparable, .. } = result.data
        else {
            panic!("wrong variant")
        };
        assert!(comparable);
        assert!((delta_percent - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty_sequences() {
        let agg = aggregator(Dataset::default());
        for intent in [
            Intent::TopDebtors,
            Intent::MonthlySalesVolume,
            Intent::OverdueReceivables,
            Intent::RevenueComparison,
            Intent::CurrentInventory,
            Intent::SupplierPayables,
        ] {
            let (result, _) = agg
                .aggregate(intent, &QueryParameters::default(), day(2025, 3, 1))
                .await
                .unwrap();
            assert!(result.is_empty, "{intent} should be empty on an empty store");
        }
    }

    #[tokio::test]
    async fn test_unknown_intent_is_execution_error() {
        let agg = aggregator(Dataset::default());
        let err = agg
            .aggregate(Intent::Unknown, &QueryParameters::default(), day(2025, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }
}
