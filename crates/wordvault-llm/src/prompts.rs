//! Fixed prompts. Every prompt asks for a single JSON object.

/// Longest raw text sent for word-list inference.
pub const MAX_INFER_CHARS: usize = 12_000;

pub const SYSTEM_LEXICOGRAPHER: &str = "You are a lexicographer writing entries for students preparing for \
the SAT and TOEFL. Definitions are short complete phrases a learner can read on a flashcard: \
concise, never truncated, never ending in an ellipsis. Always answer with one JSON object and nothing else.";

pub const SYSTEM_TRANSLATOR: &str = "You translate study material for English learners. \
Keep the meaning exact and the register neutral. Always answer with one JSON object and nothing else.";

pub const SYSTEM_LIST_READER: &str = "You read vocabulary lists that were extracted from PDFs or photos. \
The text may be noisy: broken lines, page numbers, headers, OCR mistakes. \
Always answer with one JSON object and nothing else.";

pub fn word_details(word: &str) -> String {
    format!(
        r#"Write a dictionary entry for the English word "{word}".

Return JSON with exactly these keys:
{{
  "partsOfSpeech": ["verb"],
  "definitions": [{{"text": "...", "partOfSpeech": "verb", "translation": "Korean gloss"}}],
  "etymology": "one or two sentences",
  "synonyms": ["..."],
  "antonyms": ["..."],
  "examples": [{{"sentence": "...", "translation": "Korean translation"}}],
  "difficulty": 1-10,
  "pronunciation": "IPA"
}}

Give one to three definitions, at most five synonyms and antonyms, and two example sentences."#
    )
}

pub fn examples(word: &str, definition: Option<&str>, count: usize) -> String {
    let sense = definition
        .map(|d| format!(" in the sense \"{d}\""))
        .unwrap_or_default();
    format!(
        r#"Write {count} natural example sentences that use "{word}"{sense}.
Each sentence should make the meaning clear from context and suit a high-school reader.

Return JSON: {{"examples": [{{"sentence": "...", "translation": "Korean translation"}}]}}"#
    )
}

pub fn synonyms(word: &str, definition: Option<&str>) -> String {
    let sense = definition
        .map(|d| format!(" (meaning: \"{d}\")"))
        .unwrap_or_default();
    format!(
        r#"List synonyms and antonyms for "{word}"{sense}. Single words or short phrases only, at most five of each.

Return JSON: {{"synonyms": ["..."], "antonyms": ["..."]}}"#
    )
}

pub fn etymology(word: &str) -> String {
    format!(
        r#"Explain the origin of "{word}" in one or two sentences: source language, root words and how the meaning developed.

Return JSON: {{"etymology": "..."}}"#
    )
}

pub fn repair_definition(word: &str, truncated: &str) -> String {
    format!(
        r#"This definition of "{word}" was cut off: "{truncated}"
Rewrite it as one complete definition with the same meaning. Do not end with an ellipsis or a dangling word.

Return JSON: {{"definition": "..."}}"#
    )
}

pub fn translate(text: &str, target_language: &str) -> String {
    format!(
        r#"Translate the following text into {target_language}.

Text:
{text}

Return JSON: {{"translation": "..."}}"#
    )
}

pub fn infer_word_list(raw_text: &str) -> String {
    let clipped: String = raw_text.chars().take(MAX_INFER_CHARS).collect();
    format!(
        r#"The text below was extracted from a vocabulary list. Identify the English headwords it teaches, in order.
Include the definition printed next to a word when there is one. Skip headers, page numbers, instructions and example sentences.

Text:
{clipped}

Return JSON: {{"words": [{{"word": "...", "definition": "... or null"}}]}}"#
    )
}
