//! Lenient JSON extraction from model answers.

use serde::de::DeserializeOwned;

use crate::LlmError;

/// Parses a JSON answer that may be wrapped in markdown fences or prose.
///
/// Tries the whole text first, then the first balanced `{…}` or `[…]`
/// span (braces inside strings are ignored).
pub fn parse_json_answer<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let trimmed = strip_code_fence(text.trim());
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Ok(v);
    }

    let Some(start) = trimmed.find(['{', '[']) else {
        return Err(LlmError::Parse("answer contains no JSON".to_string()));
    };
    let candidate = balanced_span(trimmed, start)
        .ok_or_else(|| LlmError::Parse("answer contains unterminated JSON".to_string()))?;

    serde_json::from_str(candidate)
        .map_err(|e| LlmError::Parse(format!("answer is not the expected JSON: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, `JSON`, …) up to the first newline.
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in text.char_indices().skip_while(|(i, _)| *i < start) {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_plain_and_fenced() {
        let v: Value = parse_json_answer(r#"{"definition": "to lessen"}"#).unwrap();
        assert_eq!(v["definition"], "to lessen");

        let fenced = "```json\n{\"synonyms\": [\"lessen\", \"subside\"]}\n```";
        let v: Value = parse_json_answer(fenced).unwrap();
        assert_eq!(v["synonyms"][1], "subside");
    }

    #[test]
    fn test_prose_around_json() {
        let text = r#"Sure! Here it is: {"etymology": "Old French {abatre}"} Hope that helps."#;
        let v: Value = parse_json_answer(text).unwrap();
        assert_eq!(v["etymology"], "Old French {abatre}");
    }

    #[test]
    fn test_no_json_is_parse_error() {
        assert!(matches!(
            parse_json_answer::<Value>("I cannot help with that."),
            Err(LlmError::Parse(_))
        ));
        assert!(parse_json_answer::<Value>("{\"a\": [1, 2").is_err());
    }
}
