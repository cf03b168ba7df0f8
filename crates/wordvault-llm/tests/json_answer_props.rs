use proptest::prelude::*;
use serde_json::{json, Value};
use wordvault_llm::parse_json_answer;

proptest! {
    #[test]
    fn prop_json_survives_prose_and_fences(
        prefix in "[A-Za-z .,!]{0,40}",
        suffix in "[A-Za-z .,!]{0,40}",
        word in "[a-z]{1,12}",
        fenced in any::<bool>(),
    ) {
        let payload = json!({"word": word, "definition": format!("{{{word}}} in braces")}).to_string();
        let body = if fenced { format!("```json\n{payload}\n```") } else { payload };
        let text = format!("{prefix}{body}{suffix}");

        let parsed: Value = parse_json_answer(&text).unwrap();
        prop_assert_eq!(parsed["word"].as_str(), Some(word.as_str()));
    }
}
