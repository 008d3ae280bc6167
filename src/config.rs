//! Engine configuration
//!
//! All knobs are read from environment variables with documented defaults,
//! so the engine can run unconfigured in tests and pick up deployment
//! settings from a `.env` file in the binary.

use chrono::{FixedOffset, NaiveDate, Utc};
use tracing::warn;

/// Runtime configuration for the query engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Business timezone as a fixed UTC offset in hours (default +7, Vietnam).
    pub tz_offset_hours: i32,

    /// Similarity threshold (0.0-1.0) for fuzzy entity matching.
    pub fuzzy_threshold: f64,

    /// Two candidates scoring within this margin are indistinguishable and
    /// the reference is treated as ambiguous.
    pub ambiguity_margin: f64,

    /// Default row cap for ranked results (top debtors, overdue list, ...).
    pub default_limit: usize,

    /// Hard ceiling on the serialized context payload, in bytes.
    pub max_context_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tz_offset_hours: 7,
            fuzzy_threshold: 0.85,
            ambiguity_margin: 0.03,
            default_limit: 10,
            max_context_bytes: 8192,
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything missing or unparseable. Never fails.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tz_offset_hours: env_parse("BIZQUERY_TZ_OFFSET_HOURS", defaults.tz_offset_hours)
                .clamp(-12, 14),
            fuzzy_threshold: env_parse("BIZQUERY_FUZZY_THRESHOLD", defaults.fuzzy_threshold)
                .clamp(0.0, 1.0),
            ambiguity_margin: env_parse("BIZQUERY_AMBIGUITY_MARGIN", defaults.ambiguity_margin)
                .clamp(0.0, 0.5),
            default_limit: env_parse("BIZQUERY_DEFAULT_LIMIT", defaults.default_limit).max(1),
            max_context_bytes: env_parse("BIZQUERY_MAX_CONTEXT_BYTES", defaults.max_context_bytes)
                .max(512),
        }
    }

    /// Today's calendar date in the configured business timezone.
    pub fn business_today(&self) -> NaiveDate {
        let offset = FixedOffset::east_opt(self.tz_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Utc::now().with_timezone(&offset).date_naive()
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring unparseable {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tz_offset_hours, 7);
        assert_eq!(config.default_limit, 10);
        assert!(config.fuzzy_threshold > 0.5);
    }

    #[test]
    fn test_env_parse_fallback() {
        // Unset variable falls back
        assert_eq!(env_parse("BIZQUERY_TEST_UNSET_VAR", 42usize), 42);
    }
}
