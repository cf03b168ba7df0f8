use proptest::prelude::*;
use wordvault_model::{is_truncated_definition, normalize_term};

fn phrase() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ \t]{0,3}[A-Za-z]{1,8}([ \t]{1,3}[A-Za-z]{1,8}){0,3}[ \t]{0,3}")
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn normalize_term_is_idempotent(p in phrase()) {
        let once = normalize_term(&p);
        prop_assert_eq!(normalize_term(&once), once.clone());
        prop_assert!(!once.contains("  "));
        prop_assert_eq!(once.trim(), once.as_str());
    }

    #[test]
    fn ellipsis_always_marks_truncation(p in phrase()) {
        let cut = format!("{p}...");
        prop_assert!(is_truncated_definition(&cut));
    }
}
