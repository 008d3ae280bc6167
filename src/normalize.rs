//! Text normalization for Vietnamese question matching
//!
//! Questions arrive mixed-case, with or without diacritics, with free
//! punctuation. Matching happens on a folded form: lowercase, diacritics
//! stripped, punctuation mapped to spaces, whitespace collapsed. Keyword
//! phrases are compared as whole-word sequences so a short folded token
//! like "no" (from "nợ") cannot match inside an unrelated word.

/// Fold a single lowercase character to its base ASCII letter.
/// Covers the full Vietnamese alphabet including the horned vowels and đ.
fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'ạ' | 'ả' | 'ã' | 'â' | 'ầ' | 'ấ' | 'ậ' | 'ẩ' | 'ẫ' | 'ă' | 'ằ' | 'ắ'
        | 'ặ' | 'ẳ' | 'ẵ' => 'a',
        'è' | 'é' | 'ẹ' | 'ẻ' | 'ẽ' | 'ê' | 'ề' | 'ế' | 'ệ' | 'ể' | 'ễ' => 'e',
        'ì' | 'í' | 'ị' | 'ỉ' | 'ĩ' => 'i',
        'ò' | 'ó' | 'ọ' | 'ỏ' | 'õ' | 'ô' | 'ồ' | 'ố' | 'ộ' | 'ổ' | 'ỗ' | 'ơ' | 'ờ' | 'ớ'
        | 'ợ' | 'ở' | 'ỡ' => 'o',
        'ù' | 'ú' | 'ụ' | 'ủ' | 'ũ' | 'ư' | 'ừ' | 'ứ' | 'ự' | 'ử' | 'ữ' => 'u',
        'ỳ' | 'ý' | 'ỵ' | 'ỷ' | 'ỹ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

/// Normalize free text for matching: lowercase, strip diacritics, map
/// punctuation to spaces, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(fold_char)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split already-normalized text into words.
pub fn words(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// True when `phrase` (itself normalized) occurs as a contiguous run of
/// whole words inside `haystack_words`.
pub fn contains_phrase(haystack_words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > haystack_words.len() {
        return false;
    }
    haystack_words
        .windows(needle.len())
        .any(|window| window == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("Ai đang nợ tôi nhiều nhất?"), "ai dang no toi nhieu nhat");
        assert_eq!(normalize("Khách hàng nào nợ quá 90 ngày?"), "khach hang nao no qua 90 ngay");
        assert_eq!(normalize("CÔNG NỢ"), "cong no");
    }

    #[test]
    fn test_normalize_punctuation_to_spaces() {
        // Slash-separated month/year must stay tokenizable
        assert_eq!(normalize("tháng 5/2025"), "thang 5 2025");
        assert_eq!(normalize("  PCB40?!  "), "pcb40");
    }

    #[test]
    fn test_contains_phrase_whole_words_only() {
        let text = normalize("normal people say no");
        let w = words(&text);
        assert!(contains_phrase(&w, "no"));
        assert!(contains_phrase(&w, "say no"));
        // "no" must not match inside "normal"
        let text2 = normalize("normal people");
        let w2 = words(&text2);
        assert!(!contains_phrase(&w2, "no"));
    }

    #[test]
    fn test_contains_phrase_contiguous() {
        let text = normalize("so sánh doanh thu tháng này");
        let w = words(&text);
        assert!(contains_phrase(&w, "so sanh"));
        assert!(contains_phrase(&w, "doanh thu"));
        assert!(!contains_phrase(&w, "sanh thu"));
    }
}
