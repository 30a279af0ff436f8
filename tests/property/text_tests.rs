//! Property-based tests for normalization and similarity scores

use proptest::prelude::*;
use llm_emulator::matching::text::{jaro_winkler, matches_exact, norm, score_fuzzy, score_ngram_semantic};

const TEXT: &str = "[a-zA-Z0-9 ,.!?'_-]{0,40}";

proptest! {
    /// Normalizing twice changes nothing
    #[test]
    fn test_norm_idempotent(s in TEXT) {
        let once = norm(&s);
        prop_assert_eq!(norm(&once), once);
    }

    /// Output is lowercase, single-spaced and trimmed
    #[test]
    fn test_norm_shape(s in TEXT) {
        let out = norm(&s);
        prop_assert!(!out.starts_with(' ') && !out.ends_with(' '));
        prop_assert!(!out.contains("  "));
        prop_assert_eq!(out.to_lowercase(), out.clone());
        prop_assert!(out.chars().all(|c| c == ' ' || c.is_alphanumeric()));
    }

    /// Case and punctuation never affect exact matching
    #[test]
    fn test_exact_ignores_case_and_punctuation(words in prop::collection::vec("[a-z]{1,8}", 1..6)) {
        let plain = words.join(" ");
        let noisy = format!("  {}!!", words.join(", ").to_uppercase());
        prop_assert!(matches_exact(&noisy, &plain));
    }

    #[test]
    fn test_jaro_winkler_bounds(a in TEXT, b in TEXT) {
        let score = jaro_winkler(&a, &b);
        prop_assert!((0.0..=1.0 + 1e-9).contains(&score), "score {} out of range", score);
    }

    /// Symmetric, including strings with repeated characters
    #[test]
    fn test_jaro_winkler_symmetry(a in "[a-d]{0,20}", b in "[a-d]{0,20}") {
        prop_assert!((jaro_winkler(&a, &b) - jaro_winkler(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_jaro_winkler_symmetry_mixed_text(a in TEXT, b in TEXT) {
        prop_assert!((jaro_winkler(&a, &b) - jaro_winkler(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_jaro_winkler_identity(s in "[a-z]{1,30}") {
        prop_assert!((jaro_winkler(&s, &s) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_and_ngram_bounds(a in TEXT, b in TEXT) {
        let fuzzy = score_fuzzy(&a, &b);
        let ngram = score_ngram_semantic(&a, &b);
        prop_assert!((0.0..=1.0 + 1e-9).contains(&fuzzy));
        prop_assert!((0.0..=1.0 + 1e-9).contains(&ngram));
    }

    /// Identical non-empty text is a perfect fuzzy match
    #[test]
    fn test_fuzzy_identity(words in prop::collection::vec("[a-z]{1,8}", 1..6)) {
        let s = words.join(" ");
        prop_assert!((score_fuzzy(&s, &s) - 1.0).abs() < 1e-9);
        prop_assert!((score_ngram_semantic(&s, &s) - 1.0).abs() < 1e-9);
    }
}
