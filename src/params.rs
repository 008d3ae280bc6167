//! Parameter extraction
//!
//! Pulls date ranges, day thresholds, row limits and entity references out
//! of a question, guided by the already-detected intent. Extraction never
//! fails the query: anything missing or unparseable degrades to the
//! documented per-intent default, and a note is recorded whenever the
//! default materially shapes the result ("assumed current month").

use crate::entity::{EntityKind, EntityMatch, EntityResolver, MatchConfidence};
use crate::error::Result;
use crate::intent::Intent;
use crate::normalize::{contains_phrase, normalize, words};
use crate::store::OperationalStore;
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

lazy_static! {
    // "tháng 5", "tháng 5/2025", "tháng 5 năm 2025" (normalized form)
    static ref MONTH_RE: Regex =
        Regex::new(r"\bthang\s+(\d{1,2})(?:\s+(?:nam\s+)?(\d{4}))?").expect("month regex");
    // "quá 90 ngày", "quá hạn 90 ngày", "hơn 30 ngày", "trên 60 ngày"
    static ref THRESHOLD_RE: Regex =
        Regex::new(r"\b(?:qua han|qua|hon|tren)\s+(\d{1,4})\s+ngay\b").expect("threshold regex");
    // "top 5", "5 khách hàng", "3 nhà cung cấp"
    static ref TOP_RE: Regex = Regex::new(r"\btop\s+(\d{1,3})\b").expect("top regex");
    static ref COUNT_RE: Regex =
        Regex::new(r"\b(\d{1,3})\s+(?:khach hang|khach|nha cung cap|ncc)\b").expect("count regex");
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The calendar month containing `year`/`month`.
    pub fn month(year: i32, month: u32) -> Option<DateRange> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(DateRange { start, end })
    }

    /// The calendar year `year`.
    pub fn year(year: i32) -> Option<DateRange> {
        Some(DateRange {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
        })
    }

    /// The range of equal length ending where this one starts.
    pub fn preceding(&self) -> DateRange {
        let len = self.end.signed_duration_since(self.start);
        DateRange {
            start: self.start - len,
            end: self.start,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// Named, optional parameters for one query. Absence means "use the
/// intent default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParameters {
    pub date_range: Option<DateRange>,
    pub entity: Option<EntityMatch>,
    pub threshold_days: Option<i64>,
    pub limit: Option<usize>,
}

/// Intent-aware extractor. Only the fields relevant to the given intent
/// are looked for.
pub struct ParameterExtractor {
    resolver: EntityResolver,
    default_limit: usize,
}

impl ParameterExtractor {
    pub fn new(resolver: EntityResolver, default_limit: usize) -> Self {
        Self {
            resolver,
            default_limit,
        }
    }

    /// Extract parameters for `intent` from `text`. `today` anchors the
    /// relative date grammar in the business timezone. Returns the
    /// parameters plus notes about defaults that shaped them.
    pub async fn extract(
        &self,
        store: &dyn OperationalStore,
        text: &str,
        intent: Intent,
        today: NaiveDate,
    ) -> Result<(QueryParameters, Vec<String>)> {
        let normalized = normalize(text);
        let mut params = QueryParameters::default();
        let mut notes = Vec::new();

        match intent {
            Intent::MonthlySalesVolume | Intent::RevenueComparison => {
                match parse_period(&normalized, today) {
                    Some(range) => params.date_range = Some(range),
                    None => {
                        params.date_range = current_month(today);
                        notes.push("assumed current month".to_string());
                    }
                }
            }
            Intent::OverdueReceivables => {
                params.threshold_days = parse_threshold_days(&normalized);
                params.limit = parse_limit(&normalized);
                self.detect_entity(store, text, EntityKind::Customer, &mut params, &mut notes)
                    .await?;
            }
            Intent::TopDebtors => {
                params.limit = parse_limit(&normalized);
                self.detect_entity(store, text, EntityKind::Customer, &mut params, &mut notes)
                    .await?;
            }
            Intent::SupplierPayables => {
                params.limit = parse_limit(&normalized);
                self.detect_entity(store, text, EntityKind::Supplier, &mut params, &mut notes)
                    .await?;
            }
            Intent::CurrentInventory | Intent::Unknown => {}
        }

        if params.limit.is_none() {
            params.limit = Some(self.default_limit);
        }

        debug!(intent = %intent, ?params, "extracted parameters");
        Ok((params, notes))
    }

    /// Look for a mention of a store entity in the question. Ambiguous
    /// mentions are kept (so the dispatcher can drop the filter and the
    /// note can tell the user); clean misses leave the field empty.
    async fn detect_entity(
        &self,
        store: &dyn OperationalStore,
        text: &str,
        kind: EntityKind,
        params: &mut QueryParameters,
        notes: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(m) = self.resolver.detect_in_question(store, text, kind).await? {
            if m.confidence == MatchConfidence::Ambiguous {
                notes.push(format!(
                    "{} name \"{}\" matches more than one record; ignoring the name filter",
                    m.kind.as_str(),
                    m.raw_name
                ));
            }
            params.entity = Some(m);
        }
        Ok(())
    }
}

/// Parse a Vietnamese period phrase into a concrete range.
/// Recognizes "tháng này", "tháng trước", "tháng N", "tháng N/YYYY",
/// "tháng N năm YYYY", "năm nay", "năm trước"/"năm ngoái".
fn parse_period(normalized: &str, today: NaiveDate) -> Option<DateRange> {
    let w = words(normalized);

    if contains_phrase(&w, "thang nay") {
        return current_month(today);
    }
    if contains_phrase(&w, "thang truoc") {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        return DateRange::month(year, month);
    }
    if contains_phrase(&w, "nam nay") {
        return DateRange::year(today.year());
    }
    if contains_phrase(&w, "nam truoc") || contains_phrase(&w, "nam ngoai") {
        return DateRange::year(today.year() - 1);
    }

    if let Some(caps) = MONTH_RE.captures(normalized) {
        let month: u32 = caps.get(1)?.as_str().parse().ok()?;
        if (1..=12).contains(&month) {
            let year = match caps.get(2) {
                Some(y) => y.as_str().parse().ok()?,
                None => today.year(),
            };
            return DateRange::month(year, month);
        }
    }

    None
}

fn current_month(today: NaiveDate) -> Option<DateRange> {
    DateRange::month(today.year(), today.month())
}

fn parse_threshold_days(normalized: &str) -> Option<i64> {
    THRESHOLD_RE
        .captures(normalized)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_limit(normalized: &str) -> Option<usize> {
    for re in [&*TOP_RE, &*COUNT_RE] {
        if let Some(n) = re
            .captures(normalized)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
        {
            if n > 0 {
                return Some(n);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_this_month() {
        let today = day(2025, 3, 15);
        let r = parse_period(&normalize("doanh thu tháng này"), today).unwrap();
        assert_eq!(r.start, day(2025, 3, 1));
        assert_eq!(r.end, day(2025, 4, 1));
    }

    #[test]
    fn test_last_month_across_year_boundary() {
        let today = day(2025, 1, 10);
        let r = parse_period(&normalize("sản lượng tháng trước"), today).unwrap();
        assert_eq!(r.start, day(2024, 12, 1));
        assert_eq!(r.end, day(2025, 1, 1));

        // Mid-year it is the previous calendar month, not a fixed-width slice
        let r = parse_period(&normalize("tháng trước"), day(2025, 3, 15)).unwrap();
        assert_eq!(r.start, day(2025, 2, 1));
        assert_eq!(r.end, day(2025, 3, 1));
    }

    #[test]
    fn test_explicit_month() {
        let today = day(2025, 6, 1);
        let r = parse_period(&normalize("bán được bao nhiêu trong tháng 2"), today).unwrap();
        assert_eq!(r.start, day(2025, 2, 1));
        assert_eq!(r.end, day(2025, 3, 1));
    }

    #[test]
    fn test_explicit_month_with_year() {
        let today = day(2025, 6, 1);
        let slash = parse_period(&normalize("doanh thu tháng 5/2024"), today).unwrap();
        assert_eq!(slash.start, day(2024, 5, 1));
        let nam = parse_period(&normalize("doanh thu tháng 12 năm 2023"), today).unwrap();
        assert_eq!(nam.start, day(2023, 12, 1));
        assert_eq!(nam.end, day(2024, 1, 1));
    }

    #[test]
    fn test_year_phrases() {
        let today = day(2025, 6, 1);
        let nay = parse_period(&normalize("doanh thu năm nay"), today).unwrap();
        assert_eq!(nay.start, day(2025, 1, 1));
        let ngoai = parse_period(&normalize("doanh thu năm ngoái"), today).unwrap();
        assert_eq!(ngoai.start, day(2024, 1, 1));
        assert_eq!(ngoai.end, day(2025, 1, 1));
    }

    #[test]
    fn test_invalid_month_falls_through() {
        let today = day(2025, 6, 1);
        assert!(parse_period(&normalize("tháng 13"), today).is_none());
        assert!(parse_period(&normalize("hôm qua bán gì"), today).is_none());
    }

    #[test]
    fn test_threshold_days() {
        assert_eq!(parse_threshold_days(&normalize("nợ quá 90 ngày")), Some(90));
        assert_eq!(parse_threshold_days(&normalize("quá hạn 30 ngày")), Some(30));
        assert_eq!(parse_threshold_days(&normalize("trên 60 ngày chưa trả")), Some(60));
        assert_eq!(parse_threshold_days(&normalize("nợ quá hạn")), None);
    }

    #[test]
    fn test_limit() {
        assert_eq!(parse_limit(&normalize("top 5 khách nợ")), Some(5));
        assert_eq!(parse_limit(&normalize("3 khách hàng nợ nhiều nhất")), Some(3));
        assert_eq!(parse_limit(&normalize("2 nhà cung cấp")), Some(2));
        // A day threshold must not be read as a limit
        assert_eq!(parse_limit(&normalize("nợ quá 90 ngày")), None);
    }

    #[test]
    fn test_preceding_period_same_length() {
        let r = DateRange::month(2025, 3).unwrap();
        let prev = r.preceding();
        assert_eq!(prev.end, r.start);
        assert_eq!(prev.start, day(2025, 1, 29));
    }
}
