//! Entity resolution
//!
//! Maps a noisy name fragment from a question to a concrete customer or
//! supplier record. Exact lookup first (case- and diacritic-insensitive),
//! then fuzzy lookup via Jaro-Winkler with a substring bonus. An ambiguous
//! reference is never resolved to an arbitrary winner: two candidates
//! within the ambiguity margin come back as `Ambiguous` and the caller
//! drops the filter instead.

use crate::error::Result;
use crate::normalize::{contains_phrase, normalize, words};
use crate::store::OperationalStore;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Supplier,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customer",
            EntityKind::Supplier => "supplier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    Fuzzy,
    /// More than one candidate within an indistinguishable margin.
    Ambiguous,
    None,
}

/// A name record as the store exposes it for lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
}

/// Result of resolving a raw name fragment. Constructed per request,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
    pub kind: EntityKind,
    pub raw_name: String,
    pub resolved_id: Option<String>,
    pub display_name: Option<String>,
    pub confidence: MatchConfidence,
}

impl EntityMatch {
    pub fn unresolved(kind: EntityKind, raw_name: &str, confidence: MatchConfidence) -> Self {
        Self {
            kind,
            raw_name: raw_name.to_string(),
            resolved_id: None,
            display_name: None,
            confidence,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.confidence, MatchConfidence::Exact | MatchConfidence::Fuzzy)
    }
}

/// Read-only resolver over the store's name records.
pub struct EntityResolver {
    similarity_threshold: f64,
    ambiguity_margin: f64,
}

impl EntityResolver {
    pub fn new(similarity_threshold: f64, ambiguity_margin: f64) -> Self {
        Self {
            similarity_threshold,
            ambiguity_margin,
        }
    }

    /// Similarity between two normalized strings. Jaro-Winkler handles
    /// name variations; a bounded substring bonus handles partial names
    /// like "Hoa Binh" against "Cong ty Hoa Binh".
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let jw = jaro_winkler(a, b);
        let is_substring = !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a));
        let bonus = if is_substring {
            let len_diff = (a.len() as f64 - b.len() as f64).abs();
            let max_len = a.len().max(b.len()) as f64;
            (1.0 - len_diff / max_len) * 0.1
        } else {
            0.0
        };
        (jw + bonus).min(1.0)
    }

    /// Resolve a raw name fragment against the store's records of `kind`.
    pub async fn resolve(
        &self,
        store: &dyn OperationalStore,
        raw_name: &str,
        kind: EntityKind,
    ) -> Result<EntityMatch> {
        let raw_norm = normalize(raw_name);
        if raw_norm.is_empty() {
            return Ok(EntityMatch::unresolved(kind, raw_name, MatchConfidence::None));
        }

        let candidates = store.list_entities(kind).await?;

        // Exact pass: normalized full-name equality
        let exact: Vec<&EntityRecord> = candidates
            .iter()
            .filter(|c| normalize(&c.name) == raw_norm)
            .collect();
        match exact.len() {
            1 => {
                return Ok(EntityMatch {
                    kind,
                    raw_name: raw_name.to_string(),
                    resolved_id: Some(exact[0].id.clone()),
                    display_name: Some(exact[0].name.clone()),
                    confidence: MatchConfidence::Exact,
                })
            }
            n if n > 1 => {
                return Ok(EntityMatch::unresolved(kind, raw_name, MatchConfidence::Ambiguous))
            }
            _ => {}
        }

        // Fuzzy pass
        let mut scored: Vec<(&EntityRecord, f64)> = candidates
            .iter()
            .map(|c| (c, self.similarity(&normalize(&c.name), &raw_norm)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.name.cmp(&b.0.name))
        });

        self.pick(kind, raw_name, &scored, MatchConfidence::Fuzzy)
    }

    /// Scan a question for a mention of any store entity of `kind`.
    ///
    /// Questions rarely quote a full record name, so three signals are
    /// tried per candidate, strongest first:
    /// 1. the whole normalized name occurs in the question (exact),
    /// 2. the candidate's final name word occurs as a question word
    ///    (Vietnamese given names come last), scored as a strong fuzzy hit,
    /// 3. best Jaro-Winkler score over question n-grams of the same length.
    ///
    /// Returns `Ok(None)` when nothing clears the threshold; an ambiguous
    /// hit comes back as `Some` with `MatchConfidence::Ambiguous`.
    pub async fn detect_in_question(
        &self,
        store: &dyn OperationalStore,
        question: &str,
        kind: EntityKind,
    ) -> Result<Option<EntityMatch>> {
        let q_norm = normalize(question);
        let q_words = words(&q_norm);
        if q_words.is_empty() {
            return Ok(None);
        }

        let candidates = store.list_entities(kind).await?;
        let mut scored: Vec<(&EntityRecord, f64)> = Vec::new();

        for candidate in &candidates {
            let cand_norm = normalize(&candidate.name);
            let cand_words: Vec<&str> = cand_norm.split_whitespace().collect();
            if cand_words.is_empty() {
                continue;
            }

            let score = if contains_phrase(&q_words, &cand_norm) {
                1.0
            } else if let Some(last) = cand_words.last().filter(|w| w.len() >= 3) {
                if q_words.contains(last) {
                    0.9
                } else {
                    self.best_ngram_score(&q_words, &cand_norm, cand_words.len())
                }
            } else {
                self.best_ngram_score(&q_words, &cand_norm, cand_words.len())
            };

            scored.push((candidate, score));
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.name.cmp(&b.0.name))
        });

        if scored.is_empty() || scored[0].1 < self.similarity_threshold {
            return Ok(None);
        }

        let confidence = if scored[0].1 >= 1.0 {
            MatchConfidence::Exact
        } else {
            MatchConfidence::Fuzzy
        };
        let mention = scored[0].0.name.clone();
        self.pick(kind, &mention, &scored, confidence).map(Some)
    }

    fn best_ngram_score(&self, q_words: &[&str], cand_norm: &str, n: usize) -> f64 {
        if n == 0 || q_words.len() < n {
            return 0.0;
        }
        q_words
            .windows(n)
            .map(|window| self.similarity(&window.join(" "), cand_norm))
            .fold(0.0, f64::max)
    }

    /// Shared tail of both lookups: apply threshold and ambiguity margin
    /// to a score-descending candidate list.
    fn pick(
        &self,
        kind: EntityKind,
        raw_name: &str,
        scored: &[(&EntityRecord, f64)],
        confidence: MatchConfidence,
    ) -> Result<EntityMatch> {
        let Some((best, best_score)) = scored.first() else {
            return Ok(EntityMatch::unresolved(kind, raw_name, MatchConfidence::None));
        };
        if *best_score < self.similarity_threshold {
            return Ok(EntityMatch::unresolved(kind, raw_name, MatchConfidence::None));
        }
        if let Some((runner_up, runner_score)) = scored.get(1) {
            if runner_up.id != best.id && (best_score - runner_score) <= self.ambiguity_margin {
                return Ok(EntityMatch::unresolved(kind, raw_name, MatchConfidence::Ambiguous));
            }
        }
        Ok(EntityMatch {
            kind,
            raw_name: raw_name.to_string(),
            resolved_id: Some(best.id.clone()),
            display_name: Some(best.name.clone()),
            confidence,
        })
    }
}
