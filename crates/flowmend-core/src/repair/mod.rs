//! Best-effort recovery of near-valid JSON from free-form model output.
//!
//! Completion services are asked to return bare JSON, but in practice the
//! text comes back wrapped in code fences, prefixed with prose, single-quoted,
//! or with trailing commas. `repair` normalizes those defects in a fixed
//! order and parses the result. It is pure and idempotent: no state, no
//! collaborator calls, same output for the same input.

use serde_json::Value;

/// The repair pipeline gave up — the calling agent substitutes its fallback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unparseable structured output: {reason}")]
pub struct RepairFailure {
    pub reason: String,
}

/// Recover a JSON value from raw completion text.
///
/// Steps, each attempted only if the previous did not already parse:
/// 1. strip Markdown code fences
/// 2. slice to the outermost `{...}`/`[...]` span (drops surrounding prose)
/// 3. strict parse
/// 4. quote + trailing-comma fixups, then one retry
pub fn repair(raw: &str) -> Result<Value, RepairFailure> {
    let defenced = strip_code_fences(raw);
    let sliced = slice_outer_block(&defenced);

    match serde_json::from_str::<Value>(sliced) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let fixed = strip_trailing_commas(&normalize_quotes(sliced));
            serde_json::from_str::<Value>(&fixed).map_err(|second_err| RepairFailure {
                reason: format!("{} (after fixups: {})", first_err, second_err),
            })
        }
    }
}

/// Remove leading/trailing Markdown code-fence markers (```json ... ```).
fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Skip an optional language tag on the opening fence line.
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim().to_string()
}

/// Slice to the span from the first opening bracket to the last matching
/// closing bracket, discarding any prose the model added around it.
fn slice_outer_block(text: &str) -> &str {
    let open = text.find(['{', '[']);
    let Some(start) = open else { return text };
    let close = match text.as_bytes()[start] {
        b'{' => '}',
        _ => ']',
    };
    match text.rfind(close) {
        Some(end) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Replace single-quote string delimiters with double quotes.
///
/// Straight character replacement: apostrophes inside content get mangled.
/// Runs only after a strict parse already failed.
fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

/// Remove trailing commas before a closing brace/bracket.
fn strip_trailing_commas(text: &str) -> String {
    let re = regex::Regex::new(r",(\s*[}\]])").unwrap();
    re.replace_all(text, "$1").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_clean_json() {
        let value = repair(r#"{"name": "Order Intake", "steps": ["a", "b"]}"#).unwrap();
        assert_eq!(value["name"], "Order Intake");
        assert_eq!(value["steps"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_strips_code_fences() {
        let raw = "```json\n{\"name\": \"X\"}\n```";
        let value = repair(raw).unwrap();
        assert_eq!(value["name"], "X");
    }

    #[test]
    fn test_discards_surrounding_prose() {
        let raw = "Here is the JSON you asked for:\n{\"ok\": true}\nLet me know!";
        let value = repair(raw).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_fixes_single_quotes_and_trailing_commas() {
        let raw = "{'name': 'X', 'steps': ['a', 'b',],}";
        let value = repair(raw).unwrap();
        assert_eq!(value["name"], "X");
        assert_eq!(value["steps"][1], "b");
    }

    #[test]
    fn test_array_payload() {
        let raw = "```json\n[{\"location\": \"triage\"}]\n```";
        let value = repair(raw).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_unrecoverable_input_fails() {
        assert!(repair("no structured data here at all").is_err());
        assert!(repair("").is_err());
    }

    #[test]
    fn test_idempotent_over_accepted_formats() {
        // repair(to_string(repair(x))) == repair(x) for every accepted shape.
        for raw in [
            r#"{"a": 1, "b": [2, 3]}"#,
            "```json\n{\"a\": 1}\n```",
            "{'a': 'x', 'b': [1, 2,],}",
        ] {
            let once = repair(raw).unwrap();
            let twice = repair(&serde_json::to_string(&once).unwrap()).unwrap();
            assert_eq!(once, twice);
        }
    }
}
