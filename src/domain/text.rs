// ============================================================
// Layer 3 — Word Splitting Rules
// ============================================================
// The vocabulary, the label builder and the evaluator must all
// agree on what a "word" is, so the rules live in one place.

/// Remove ASCII punctuation (the `!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~` set)
pub fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

/// Case-sensitive vocabulary words: punctuation stripped, split on
/// single spaces, empty pieces dropped.
pub fn vocabulary_words(text: &str) -> Vec<String> {
    strip_punctuation(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case-insensitive tokens used for whole-word answer matching
pub fn match_tokens(text: &str) -> Vec<String> {
    strip_punctuation(&text.to_lowercase())
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// True if `needle` occurs as a contiguous run of whole tokens in `haystack`
pub fn contains_tokens(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_words_keep_case() {
        assert_eq!(vocabulary_words("Is CT, present?"), vec!["Is", "CT", "present"]);
    }

    #[test]
    fn test_double_space_yields_no_empty_word() {
        assert_eq!(vocabulary_words("a  b"), vec!["a", "b"]);
        assert!(vocabulary_words("?!").is_empty());
    }

    #[test]
    fn test_whole_token_match_not_substring() {
        let hay = match_tokens("Contrast CT scan.");
        assert!(contains_tokens(&hay, &match_tokens("ct scan")));
        assert!(contains_tokens(&hay, &match_tokens("CT")));
        assert!(!contains_tokens(&hay, &match_tokens("con")));
        assert!(!contains_tokens(&hay, &[]));
    }
}
