//! Balanced-brace JSON recovery for noisy oracle output.
//!
//! Oracle output may be wrapped in prose or code fences and may contain
//! trailing commas or smart-quote characters that break strict parsing.
//! Recovery is two-stage: this module does the mechanical cleanup; the
//! pipeline escalates a remaining parse failure once to an oracle-assisted
//! syntax repair before treating it as fatal.

use pmdex_core::Error;
use serde_json::Value;

/// Recover a single JSON object from raw oracle output.
///
/// Strips code fences, scans for the first balanced `{...}` span with
/// string-literal-aware brace tracking, cleans up common syntax damage
/// (trailing commas, smart quotes, control characters), and parses the
/// result. The recovered value must be a JSON object.
pub fn recover_json(raw: &str) -> Result<Value, Error> {
    let stripped = strip_fences(raw);
    let candidate = balanced_object_span(&stripped)
        .ok_or_else(|| Error::OracleMalformed("no JSON object found in oracle output".into()))?;
    let cleaned = cleanup(candidate);

    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| Error::OracleMalformed(format!("oracle output did not parse as JSON: {e}")))?;

    if !value.is_object() {
        return Err(Error::OracleMalformed("oracle output parsed but is not a JSON object".into()));
    }

    Ok(value)
}

/// Drop Markdown fence marker lines (``` or ```json).
fn strip_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Find the span from the first `{` to its matching `}`.
///
/// A quote toggles "inside string" state; a backslash inside a string
/// escapes the next character and is not itself toggled upon. If no
/// balanced close is found, the remainder of the text from the first `{`
/// is returned as a fallback.
fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Some(&text[start..])
}

/// Mechanical cleanup of a candidate span:
/// - commas immediately preceding a closing brace/bracket are removed
/// - curly/smart quotes are normalized to their ASCII equivalents
/// - control characters are stripped (newlines and tabs kept as spaces)
fn cleanup(candidate: &str) -> String {
    let mut normalized = String::with_capacity(candidate.len());
    for c in candidate.chars() {
        match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' => normalized.push('"'),
            '\u{2018}' | '\u{2019}' => normalized.push('\''),
            '\n' | '\t' | '\r' => normalized.push(' '),
            c if c.is_control() => {}
            c => normalized.push(c),
        }
    }

    // Second pass drops trailing commas, tracking string state so commas
    // inside literals survive.
    let mut out = String::with_capacity(normalized.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = normalized.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' if in_string => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = !in_string;
                out.push(c);
            }
            ',' if !in_string => {
                let next_meaningful = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next_meaningful, Some('}') | Some(']')) {
                    continue;
                }
                out.push(c);
            }
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recover_with_noise_and_trailing_comma() {
        let raw = "noise {\"a\":1,\"b\":{\"c\":2,}} trailing";
        let value = recover_json(raw).unwrap();
        assert_eq!(value, serde_json::json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_recover_strips_code_fences() {
        let raw = "Here is the extraction:\n```json\n{\"blocks\": []}\n```\nDone.";
        let value = recover_json(raw).unwrap();
        assert_eq!(value, serde_json::json!({"blocks": []}));
    }

    #[test]
    fn test_recover_normalizes_smart_quotes() {
        let raw = "{\u{201C}heading\u{201D}: \u{201C}DOSAGE\u{201D}}";
        let value = recover_json(raw).unwrap();
        assert_eq!(value, serde_json::json!({"heading": "DOSAGE"}));
    }

    #[test]
    fn test_recover_trailing_comma_in_array() {
        let raw = "{\"xs\": [1, 2, 3,]}";
        let value = recover_json(raw).unwrap();
        assert_eq!(value, serde_json::json!({"xs": [1, 2, 3]}));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let raw = "{\"text\": \"dose {high} range\", \"n\": 1} tail";
        let value = recover_json(raw).unwrap();
        assert_eq!(value["text"], "dose {high} range");
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let raw = "{\"text\": \"he said \\\"stop\\\"\"}";
        let value = recover_json(raw).unwrap();
        assert_eq!(value["text"], "he said \"stop\"");
    }

    #[test]
    fn test_comma_inside_string_survives() {
        let raw = "{\"text\": \"500 mg, then wait\"}";
        let value = recover_json(raw).unwrap();
        assert_eq!(value["text"], "500 mg, then wait");
    }

    #[test]
    fn test_control_characters_stripped() {
        let raw = "{\"a\":\u{0007} 1}";
        let value = recover_json(raw).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_no_object_is_an_error() {
        assert!(recover_json("no json here at all").is_err());
    }

    #[test]
    fn test_unbalanced_fallback_still_fails_cleanly() {
        // Remainder-of-text fallback is taken, but it cannot parse.
        let err = recover_json("prefix {\"a\": 1, \"b\": ").unwrap_err();
        assert!(matches!(err, Error::OracleMalformed(_)));
    }

    #[test]
    fn test_non_object_json_rejected() {
        assert!(recover_json("[1, 2, 3]").is_err());
    }
}
