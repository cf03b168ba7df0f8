//! Heuristics for spotting damaged definition strings.
//!
//! Earlier bulk imports cut definitions at fixed byte offsets. The repair job
//! (`admin fix-definitions`) uses `is_truncated_definition` to pick the
//! documents it sends back through the LLM.

const DANGLING_WORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "and", "or", "with", "for", "in", "on", "by", "as", "that",
];

/// Returns true when the definition text looks cut off.
pub fn is_truncated_definition(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return true;
    }
    if text.ends_with("...") || text.ends_with('…') {
        return true;
    }
    if text.ends_with([',', ':', ';', '-']) {
        return true;
    }

    let open = text.chars().filter(|c| *c == '(').count();
    let close = text.chars().filter(|c| *c == ')').count();
    if open != close {
        return true;
    }

    let last = text
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase();
    DANGLING_WORDS.contains(&last.as_str())
}

#[cfg(test)]
mod tests {
    use super::is_truncated_definition;

    #[test]
    fn complete_definitions_pass() {
        assert!(!is_truncated_definition("to reduce in amount or intensity"));
        assert!(!is_truncated_definition("lessen (a feeling)."));
        assert!(!is_truncated_definition("calm"));
    }

    #[test]
    fn cut_off_definitions_are_flagged() {
        assert!(is_truncated_definition(""));
        assert!(is_truncated_definition("to reduce in amount..."));
        assert!(is_truncated_definition("to reduce in amount or"));
        assert!(is_truncated_definition("lessen (a feeling"));
        assert!(is_truncated_definition("to make less intense,"));
        assert!(is_truncated_definition("a state of the"));
        assert!(is_truncated_definition("the"));
        assert!(is_truncated_definition(" of "));
    }
}
