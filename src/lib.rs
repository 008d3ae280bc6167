//! bizquery - intent resolution and data aggregation for grounded Q&A
//!
//! Turns a free-form Vietnamese business question ("Ai đang nợ tôi nhiều
//! nhất?") into a grounded, auditable answer context:
//!
//! 1. classify the question into a closed intent catalog (or `Unknown`)
//! 2. extract parameters: time ranges, day thresholds, limits, entity names
//! 3. run one deterministic aggregation against the operational store
//! 4. assemble a bounded, byte-deterministic context payload for the
//!    downstream language model
//!
//! The engine never invents a number: everything in the payload is derived
//! from a store read, empty results are flagged explicitly, and ambiguous
//! entity references are surfaced instead of silently guessed.

pub mod aggregate;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod intent;
pub mod normalize;
pub mod orchestrator;
pub mod params;
pub mod store;

pub use aggregate::{AggregationData, AggregationResult};
pub use config::EngineConfig;
pub use context::ContextPayload;
pub use entity::{EntityKind, EntityMatch, MatchConfidence};
pub use error::{EngineError, Result};
pub use intent::{classify, Intent};
pub use orchestrator::{QueryOrchestrator, QueryOutcome};
pub use params::{DateRange, QueryParameters};
pub use store::{Dataset, MemoryStore, OperationalStore};
