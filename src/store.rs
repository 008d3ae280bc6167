//! Operational store access
//!
//! The dispatcher never hardwires a storage technology: it is written
//! against `OperationalStore`, a small read-only capability set (grouped
//! sums, filtered lookups, name search). `MemoryStore` is the reference
//! implementation over a plain JSON-loadable dataset; it backs the CLI and
//! the test suite. Every method is a single bounded pass over the data,
//! and nothing here writes.

use crate::entity::{EntityKind, EntityRecord};
use crate::error::{EngineError, Result};
use crate::params::DateRange;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Unpaid receivable balance summed per customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBalance {
    pub customer_id: String,
    pub name: String,
    pub remaining_amount: f64,
}

/// Unpaid payable balance summed per supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierBalance {
    pub supplier_id: String,
    pub name: String,
    pub remaining_amount: f64,
}

/// Quantity and revenue totals for one cement type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeTotals {
    pub cement_type: String,
    pub quantity: f64,
    pub revenue: f64,
}

/// One unpaid receivable already past its cutoff date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueRow {
    pub customer_id: String,
    pub customer_name: String,
    pub due_date: NaiveDate,
    pub remaining_amount: f64,
}

/// Read-only query capabilities the engine needs from the system of
/// record. Implementations own their own timeouts and surface them as
/// `EngineError::StoreTimeout`.
#[async_trait]
pub trait OperationalStore: Send + Sync {
    /// Sum of unpaid receivable balances grouped by customer.
    async fn receivables_by_customer(&self) -> Result<Vec<CustomerBalance>>;

    /// Sum of unpaid payable balances grouped by supplier.
    async fn payables_by_supplier(&self) -> Result<Vec<SupplierBalance>>;

    /// Sale quantity and revenue grouped by cement type, optionally
    /// restricted to a date range. `None` means all history.
    async fn sales_by_type(&self, range: Option<&DateRange>) -> Result<Vec<TypeTotals>>;

    /// Purchase quantity and cost grouped by cement type, optionally
    /// restricted to a date range.
    async fn purchases_by_type(&self, range: Option<&DateRange>) -> Result<Vec<TypeTotals>>;

    /// Unpaid receivables whose due date is strictly before `cutoff`.
    async fn unpaid_receivables_due_before(&self, cutoff: NaiveDate) -> Result<Vec<OverdueRow>>;

    /// Name records for entity resolution.
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>>;
}

// ---------------------------------------------------------------------------
// In-memory reference implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
}

/// Amount owed to the company by a customer for one sale/invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receivable {
    pub customer_id: String,
    pub amount: f64,
    #[serde(default)]
    pub paid_amount: f64,
    pub due_date: Option<NaiveDate>,
}

impl Receivable {
    pub fn remaining(&self) -> f64 {
        self.amount - self.paid_amount
    }
}

/// Amount the company owes a supplier for one purchase/invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payable {
    pub supplier_id: String,
    pub amount: f64,
    #[serde(default)]
    pub paid_amount: f64,
    pub due_date: Option<NaiveDate>,
}

impl Payable {
    pub fn remaining(&self) -> f64 {
        self.amount - self.paid_amount
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub date: NaiveDate,
    pub cement_type: String,
    pub quantity: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub date: NaiveDate,
    pub cement_type: String,
    pub quantity: f64,
    pub amount: f64,
}

/// The operational records the in-memory store serves. Deserializable
/// from a JSON file so datasets can be shipped next to the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
    #[serde(default)]
    pub receivables: Vec<Receivable>,
    #[serde(default)]
    pub payables: Vec<Payable>,
    #[serde(default)]
    pub sales: Vec<Sale>,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
}

pub struct MemoryStore {
    data: Dataset,
}

impl MemoryStore {
    pub fn new(data: Dataset) -> Self {
        Self { data }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let data: Dataset = serde_json::from_str(&raw)?;
        Ok(Self::new(data))
    }

    fn customer_name(&self, id: &str) -> Result<&str> {
        self.data
            .customers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
            .ok_or_else(|| {
                EngineError::MalformedRow(format!("receivable references unknown customer {id}"))
            })
    }

    fn supplier_name(&self, id: &str) -> Result<&str> {
        self.data
            .suppliers
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
            .ok_or_else(|| {
                EngineError::MalformedRow(format!("payable references unknown supplier {id}"))
            })
    }
}

fn totals_by_type<'a>(
    rows: impl Iterator<Item = (&'a NaiveDate, &'a str, f64, f64)>,
    range: Option<&DateRange>,
) -> Vec<TypeTotals> {
    let mut grouped: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for (date, cement_type, quantity, amount) in rows {
        if let Some(r) = range {
            if !r.contains(*date) {
                continue;
            }
        }
        let entry = grouped.entry(cement_type).or_insert((0.0, 0.0));
        entry.0 += quantity;
        entry.1 += amount;
    }
    grouped
        .into_iter()
        .map(|(cement_type, (quantity, revenue))| TypeTotals {
            cement_type: cement_type.to_string(),
            quantity,
            revenue,
        })
        .collect()
}

#[async_trait]
impl OperationalStore for MemoryStore {
    async fn receivables_by_customer(&self) -> Result<Vec<CustomerBalance>> {
        let mut grouped: BTreeMap<&str, f64> = BTreeMap::new();
        for r in &self.data.receivables {
            let remaining = r.remaining();
            if remaining > 0.0 {
                *grouped.entry(r.customer_id.as_str()).or_insert(0.0) += remaining;
            }
        }
        grouped
            .into_iter()
            .map(|(id, remaining_amount)| {
                Ok(CustomerBalance {
                    customer_id: id.to_string(),
                    name: self.customer_name(id)?.to_string(),
                    remaining_amount,
                })
            })
            .collect()
    }

    async fn payables_by_supplier(&self) -> Result<Vec<SupplierBalance>> {
        let mut grouped: BTreeMap<&str, f64> = BTreeMap::new();
        for p in &self.data.payables {
            let remaining = p.remaining();
            if remaining > 0.0 {
                *grouped.entry(p.supplier_id.as_str()).or_insert(0.0) += remaining;
            }
        }
        grouped
            .into_iter()
            .map(|(id, remaining_amount)| {
                Ok(SupplierBalance {
                    supplier_id: id.to_string(),
                    name: self.supplier_name(id)?.to_string(),
                    remaining_amount,
                })
            })
            .collect()
    }

    async fn sales_by_type(&self, range: Option<&DateRange>) -> Result<Vec<TypeTotals>> {
        Ok(totals_by_type(
            self.data
                .sales
                .iter()
                .map(|s| (&s.date, s.cement_type.as_str(), s.quantity, s.amount)),
            range,
        ))
    }

    async fn purchases_by_type(&self, range: Option<&DateRange>) -> Result<Vec<TypeTotals>> {
        Ok(totals_by_type(
            self.data
                .purchases
                .iter()
                .map(|p| (&p.date, p.cement_type.as_str(), p.quantity, p.amount)),
            range,
        ))
    }

    async fn unpaid_receivables_due_before(&self, cutoff: NaiveDate) -> Result<Vec<OverdueRow>> {
        let mut rows = Vec::new();
        for r in &self.data.receivables {
            let remaining = r.remaining();
            let Some(due_date) = r.due_date else { continue };
            if remaining > 0.0 && due_date < cutoff {
                rows.push(OverdueRow {
                    customer_id: r.customer_id.clone(),
                    customer_name: self.customer_name(&r.customer_id)?.to_string(),
                    due_date,
                    remaining_amount: remaining,
                });
            }
        }
        Ok(rows)
    }

    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        Ok(match kind {
            EntityKind::Customer => self
                .data
                .customers
                .iter()
                .map(|c| EntityRecord {
                    id: c.id.clone(),
                    name: c.name.clone(),
                })
                .collect(),
            EntityKind::Supplier => self
                .data
                .suppliers
                .iter()
                .map(|s| EntityRecord {
                    id: s.id.clone(),
                    name: s.name.clone(),
                })
                .collect(),
        })
    }
}
