//! Property-based tests for `{{var}}` templates

use std::collections::HashMap;

use proptest::prelude::*;
use llm_emulator::matching::template::{placeholder_names, render_template, VarExtractor};

proptest! {
    /// A value substituted into a pattern is extracted back unchanged
    #[test]
    fn test_extract_recovers_value(value in "[a-z0-9]{1,12}") {
        let extractor = VarExtractor::new("track order {{id}} please").unwrap();
        let vars = extractor.extract(&format!("track order {} please", value)).unwrap();
        prop_assert_eq!(vars.get("id"), Some(&value));
    }

    /// Case of the literal words does not matter, the captured value keeps its case
    #[test]
    fn test_extract_case_insensitive(value in "[A-Za-z]{1,12}") {
        let extractor = VarExtractor::new("hello {{name}}").unwrap();
        let vars = extractor.extract(&format!("HELLO {}", value)).unwrap();
        prop_assert_eq!(vars.get("name"), Some(&value));
    }

    #[test]
    fn test_render_substitutes(name in "[a-z_]{1,8}", value in "[a-zA-Z0-9 ]{0,16}") {
        let template = format!("<{{{{{}}}}}>", name);
        let vars: HashMap<String, String> = [(name.clone(), value.clone())].into_iter().collect();
        prop_assert_eq!(render_template(&template, &vars), format!("<{}>", value));
    }

    /// Unknown variables render as the empty string
    #[test]
    fn test_render_missing_is_empty(name in "[a-z]{1,8}") {
        let template = format!("a{{{{{}}}}}b", name);
        prop_assert_eq!(render_template(&template, &HashMap::new()), "ab");
    }

    #[test]
    fn test_placeholder_names_unique(names in prop::collection::vec("[a-c]{1,2}", 0..8)) {
        let pattern = names.iter().map(|n| format!("{{{{{}}}}}", n)).collect::<Vec<_>>().join(" x ");
        let found = placeholder_names(&pattern);
        let mut deduped = found.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), found.len());
        for name in &names {
            prop_assert!(found.contains(name));
        }
    }
}
