//! Intent classification
//!
//! Maps a free-text business question to one member of a closed intent
//! catalog, or `Unknown`. This is a rule table, not a statistical model:
//! the table is ordered, declarative data so priority and coverage are
//! reviewable on their own, and the same input always yields the same
//! intent. Consumers are forced to handle `Unknown` explicitly.

use crate::normalize::{contains_phrase, normalize, words};
use serde::{Deserialize, Serialize};

/// Closed catalog of supported business questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    TopDebtors,
    MonthlySalesVolume,
    OverdueReceivables,
    RevenueComparison,
    CurrentInventory,
    SupplierPayables,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::TopDebtors => "TOP_DEBTORS",
            Intent::MonthlySalesVolume => "MONTHLY_SALES_VOLUME",
            Intent::OverdueReceivables => "OVERDUE_RECEIVABLES",
            Intent::RevenueComparison => "REVENUE_COMPARISON",
            Intent::CurrentInventory => "CURRENT_INVENTORY",
            Intent::SupplierPayables => "SUPPLIER_PAYABLES",
            Intent::Unknown => "UNKNOWN",
        }
    }

    /// All supported (non-Unknown) intents, for boundary/UI introspection.
    pub fn supported() -> &'static [Intent] {
        &[
            Intent::TopDebtors,
            Intent::MonthlySalesVolume,
            Intent::OverdueReceivables,
            Intent::RevenueComparison,
            Intent::CurrentInventory,
            Intent::SupplierPayables,
        ]
    }

    /// Representative phrasing, useful for help output.
    pub fn example(&self) -> &'static str {
        match self {
            Intent::TopDebtors => "Ai đang nợ tôi nhiều nhất?",
            Intent::MonthlySalesVolume => "Tháng này bán được bao nhiêu xi măng?",
            Intent::OverdueReceivables => "Khách hàng nào nợ quá 90 ngày?",
            Intent::RevenueComparison => "So sánh doanh thu tháng này với tháng trước",
            Intent::CurrentInventory => "Còn bao nhiêu xi măng PCB40 trong kho?",
            Intent::SupplierPayables => "Tôi đang nợ nhà cung cấp nào nhiều nhất?",
            Intent::Unknown => "",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the classification table. A rule fires when any keyword
/// phrase matches and, if `modifiers` is non-empty, any modifier phrase
/// matches too. All phrases are stored pre-normalized (diacritics folded).
pub struct IntentRule {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
    pub modifiers: &'static [&'static str],
}

/// Priority-ordered rule table. Most specific intents are declared first:
/// overdue and supplier questions also mention debt words, so they must
/// win over the generic debtor rules; the revenue comparison must win over
/// the plain revenue question.
pub const RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::OverdueReceivables,
        keywords: &["qua han", "tre han", "no qua", "no lau", "cham thanh toan"],
        modifiers: &[],
    },
    IntentRule {
        intent: Intent::SupplierPayables,
        keywords: &["nha cung cap", "ncc"],
        modifiers: &["no", "phai tra", "cong no", "thanh toan", "chua tra"],
    },
    IntentRule {
        intent: Intent::SupplierPayables,
        keywords: &["phai tra", "can tra"],
        modifiers: &[],
    },
    IntentRule {
        intent: Intent::RevenueComparison,
        keywords: &["doanh thu", "doanh so"],
        modifiers: &["so sanh", "so voi", "cung ky", "chenh lech", "tang truong", "hon thang"],
    },
    IntentRule {
        intent: Intent::CurrentInventory,
        keywords: &["ton kho", "trong kho", "nhap kho"],
        modifiers: &[],
    },
    IntentRule {
        intent: Intent::CurrentInventory,
        keywords: &["con bao nhieu", "con lai bao nhieu"],
        modifiers: &["xi mang", "kho", "hang"],
    },
    IntentRule {
        intent: Intent::MonthlySalesVolume,
        keywords: &["ban duoc", "ban ra", "san luong", "tieu thu"],
        modifiers: &[],
    },
    IntentRule {
        intent: Intent::MonthlySalesVolume,
        keywords: &["doanh thu", "doanh so"],
        modifiers: &[],
    },
    IntentRule {
        intent: Intent::TopDebtors,
        keywords: &["no", "con no", "cong no", "khach no"],
        modifiers: &["nhieu nhat", "top", "lon nhat", "cao nhat"],
    },
    IntentRule {
        intent: Intent::TopDebtors,
        keywords: &["cong no", "con no", "dang no", "khach no", "no toi"],
        modifiers: &[],
    },
];

/// Classify a raw question. Total and deterministic: normalization plus a
/// single pass over the ordered rule table; no match means `Unknown`.
pub fn classify(text: &str) -> Intent {
    let normalized = normalize(text);
    let w = words(&normalized);
    if w.is_empty() {
        return Intent::Unknown;
    }

    for rule in RULES {
        let keyword_hit = rule.keywords.iter().any(|k| contains_phrase(&w, k));
        if !keyword_hit {
            continue;
        }
        let modifier_hit =
            rule.modifiers.is_empty() || rule.modifiers.iter().any(|m| contains_phrase(&w, m));
        if modifier_hit {
            return rule.intent;
        }
    }

    Intent::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_debtors() {
        assert_eq!(classify("Ai đang nợ tôi nhiều nhất?"), Intent::TopDebtors);
        assert_eq!(classify("Top 5 khách hàng còn nợ"), Intent::TopDebtors);
        assert_eq!(classify("cong no khach hang"), Intent::TopDebtors);
    }

    #[test]
    fn test_overdue_beats_top_debtors() {
        // Both debt words and an overdue marker present: overdue must win
        assert_eq!(classify("Khách hàng nào nợ quá 90 ngày?"), Intent::OverdueReceivables);
        assert_eq!(classify("nợ quá hạn nhiều nhất"), Intent::OverdueReceivables);
    }

    #[test]
    fn test_supplier_beats_top_debtors() {
        assert_eq!(
            classify("Tôi đang nợ nhà cung cấp nào nhiều nhất?"),
            Intent::SupplierPayables
        );
        assert_eq!(classify("Còn phải trả bao nhiêu cho Hà Tiên?"), Intent::SupplierPayables);
    }

    #[test]
    fn test_revenue_comparison_beats_plain_revenue() {
        assert_eq!(
            classify("So sánh doanh thu tháng này với tháng trước"),
            Intent::RevenueComparison
        );
        assert_eq!(classify("Doanh thu tháng 3"), Intent::MonthlySalesVolume);
    }

    #[test]
    fn test_monthly_sales() {
        assert_eq!(classify("Tháng này bán được bao nhiêu xi măng?"), Intent::MonthlySalesVolume);
        assert_eq!(classify("sản lượng tháng trước"), Intent::MonthlySalesVolume);
    }

    #[test]
    fn test_inventory() {
        assert_eq!(classify("Còn bao nhiêu xi măng PCB40 trong kho?"), Intent::CurrentInventory);
        assert_eq!(classify("tồn kho hiện tại"), Intent::CurrentInventory);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify("xyz abc random text"), Intent::Unknown);
        assert_eq!(classify(""), Intent::Unknown);
        assert_eq!(classify("   ?!  "), Intent::Unknown);
    }

    #[test]
    fn test_deterministic() {
        let q = "Ai đang nợ tôi nhiều nhất?";
        let first = classify(q);
        for _ in 0..10 {
            assert_eq!(classify(q), first);
        }
    }

    #[test]
    fn test_folded_no_does_not_match_inside_words() {
        // English text containing "no"-like substrings must not be debt
        assert_eq!(classify("normal notes nothing"), Intent::Unknown);
    }
}
