//! Recovering an analysis object from free-form model output.
//!
//! Models wrap JSON in prose, markdown fences or reasoning traces. The scanner
//! tries every `{` as a candidate start, finds the matching close brace while
//! honouring string literals and escapes, and keeps the first span that parses.

use serde_json::Value;

use super::LlmError;
use crate::models::AnalysisResult;

/// Find the first balanced `{...}` span that is valid JSON.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut start = 0;

    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[open..=close]) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
        start = open + 1;
    }

    None
}

/// Index of the brace closing the one at `open`, if any.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse raw model output into a validated analysis.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, LlmError> {
    let value = extract_json_object(raw)
        .ok_or_else(|| LlmError::Parse("no JSON object in response".to_string()))?;

    let result: AnalysisResult = serde_json::from_value(value)
        .map_err(|e| LlmError::Parse(format!("response does not match schema: {}", e)))?;

    // "error" is reserved for the placeholder stored when every model fails
    if result.is_unavailable() {
        return Err(LlmError::Parse(
            "response uses the reserved 'error' sentiment".to_string(),
        ));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sentiment, Speaker};

    const VALID: &str = r#"{
        "management_tone": {"sentiment": "optimistic", "confidence": "high",
                            "supporting_quotes": ["We delivered {record} results."]},
        "key_positives": [{"topic": "Demand", "description": "Strong", "mentioned_by": "CEO"}],
        "key_concerns": [],
        "forward_guidance": {"revenue_outlook": "Up 10%", "margin_outlook": null,
                             "capex_outlook": null, "confidence": "medium"},
        "capacity_utilization": "85%",
        "growth_initiatives": [],
        "summary": "Solid quarter."
    }"#;

    #[test]
    fn test_plain_object() {
        let value = extract_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_object_inside_prose_and_fences() {
        let raw = format!("Sure! Here is the analysis:\n```json\n{}\n```\nLet me know.", VALID);
        let result = parse_analysis(&raw).unwrap();
        assert_eq!(result.management_tone.sentiment, Sentiment::Optimistic);
        assert_eq!(result.key_positives[0].mentioned_by, Some(Speaker::Ceo));
        assert_eq!(result.capacity_utilization.as_deref(), Some("85%"));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let raw = r#"{"quote": "a } b { c", "n": 2} trailing"#;
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_escaped_quotes() {
        let raw = r#"{"quote": "he said \"up }\"", "ok": true}"#;
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_skips_invalid_leading_braces() {
        let raw = r#"<think>{not json}</think> {"ok": 1}"#;
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["ok"], 1);
    }

    #[test]
    fn test_no_object() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{ unbalanced").is_none());
        assert!(matches!(parse_analysis("[1, 2]"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_reserved_error_sentiment_is_rejected() {
        let raw = VALID.replace(r#""sentiment": "optimistic""#, r#""sentiment": "Error""#);
        let err = parse_analysis(&raw).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_schema_mismatch_is_parse_error() {
        let err = parse_analysis(r#"{"summary": "missing tone"}"#).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
