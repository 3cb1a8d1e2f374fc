//! Recovery of a structured answer from raw model text
//!
//! Models wrap JSON in prose or code fences, leave trailing commas, use
//! single quotes, or omit scores. Each of those is repaired here before the
//! result is checked against the response shape.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::entities::symptom::{Confidence, SymptomResponse};

/// Note appended when a condition arrived without a relative score
pub const RESCUED_SCORE_NOTE: &str = "parsed_and_rescued_relative_score";

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r",\s*([}\]])").expect("static pattern is valid")
});

/// Reasons raw model output could not be used
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Could not locate JSON in LLM output")]
    NoJson,

    #[error("Invalid JSON in LLM output: {0}")]
    InvalidJson(String),

    #[error("LLM output failed validation: {0}")]
    Validation(String),
}

/// Extract, repair and validate a `SymptomResponse` from raw model text
pub fn parse_and_validate(raw_text: &str) -> Result<SymptomResponse, ParseError> {
    let raw = strip_fences(raw_text.trim());
    let candidate = extract_candidate(&raw).ok_or(ParseError::NoJson)?;
    let mut parsed = lenient_decode(candidate)?;

    rescue_relative_scores(&mut parsed);

    let response: SymptomResponse = serde_json::from_value(parsed)
        .map_err(|e| ParseError::Validation(e.to_string()))?;

    if response.probable_conditions.is_empty() {
        return Err(ParseError::Validation(
            "probable_conditions must contain at least one condition".to_string(),
        ));
    }

    Ok(response)
}

fn strip_fences(raw: &str) -> String {
    if raw.starts_with("```") && raw.ends_with("```") {
        raw.lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    } else {
        raw.to_string()
    }
}

/// Longest balanced `{..}` or `[..]` block, else first `{` to last `}`
fn extract_candidate(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let mut best: Option<&str> = None;

    for (open, close) in [(b'{', b'}'), (b'[', b']')] {
        for start in bytes.iter().enumerate().filter(|(_, b)| **b == open).map(|(i, _)| i) {
            let mut depth = 0usize;
            for (offset, byte) in bytes[start..].iter().enumerate() {
                if *byte == open {
                    depth += 1;
                } else if *byte == close {
                    depth -= 1;
                    if depth == 0 {
                        let block = &raw[start..=start + offset];
                        if best.map_or(true, |b| block.len() > b.len()) {
                            best = Some(block);
                        }
                        break;
                    }
                }
            }
        }
    }

    best.or_else(|| {
        let first = raw.find('{')?;
        let last = raw.rfind('}')?;
        (last > first).then(|| &raw[first..=last])
    })
}

fn lenient_decode(candidate: &str) -> Result<Value, ParseError> {
    if let Ok(value) = serde_json::from_str(candidate) {
        return Ok(value);
    }

    let without_commas = TRAILING_COMMA.replace_all(candidate, "$1");
    if let Ok(value) = serde_json::from_str(&without_commas) {
        return Ok(value);
    }

    serde_json::from_str(&without_commas.replace('\'', "\""))
        .map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// Fill missing relative scores from the confidence label
fn rescue_relative_scores(parsed: &mut Value) {
    let Some(object) = parsed.as_object_mut() else {
        return;
    };

    let mut rescued = false;
    if let Some(Value::Array(conditions)) = object.get_mut("probable_conditions") {
        for condition in conditions.iter_mut().filter_map(Value::as_object_mut) {
            match condition.get("relative_score") {
                None => {
                    let confidence = condition
                        .get("confidence")
                        .and_then(Value::as_str)
                        .map(Confidence::parse)
                        .unwrap_or(Confidence::Unknown);
                    condition.insert("relative_score".to_string(), Value::from(confidence.default_score()));
                    rescued = true;
                },
                Some(Value::Null) => {
                    condition.insert("relative_score".to_string(), Value::from(0.0));
                },
                Some(_) => {}
            }
        }
    }

    if rescued {
        let existing = object.get("notes").and_then(Value::as_str).unwrap_or_default();
        let notes = format!("{} {}", existing, RESCUED_SCORE_NOTE).trim().to_string();
        object.insert("notes".to_string(), Value::String(notes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "input": "itchy eyes",
        "probable_conditions": [
            {"condition": "allergy", "rationale": "Itching suggests allergy.", "confidence": "medium", "relative_score": 0.6}
        ],
        "recommended_next_steps": ["Avoid allergens."],
        "disclaimer": "Educational only."
    }"#;

    #[test]
    fn test_plain_json() {
        let response = parse_and_validate(VALID).unwrap();
        assert_eq!(response.input, "itchy eyes");
        assert_eq!(response.probable_conditions[0].confidence, Confidence::Medium);
        assert_eq!(response.probable_conditions[0].relative_score, 0.6);
        assert_eq!(response.notes, None);
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert!(parse_and_validate(&fenced).is_ok());

        let chatty = format!("Sure! Here is the result:\n{}\nHope this helps.", VALID);
        assert_eq!(parse_and_validate(&chatty).unwrap().input, "itchy eyes");
    }

    #[test]
    fn test_trailing_commas_and_single_quotes() {
        let sloppy = "{'input': 'cough', 'probable_conditions': [{'condition': 'cold', 'rationale': 'Common.', 'confidence': 'low', 'relative_score': 0.3},], 'recommended_next_steps': ['Rest.',], 'disclaimer': 'Educational only.',}";
        let response = parse_and_validate(sloppy).unwrap();
        assert_eq!(response.probable_conditions[0].condition, "cold");
        assert_eq!(response.recommended_next_steps, vec!["Rest."]);
    }

    #[test]
    fn test_missing_scores_are_rescued() {
        let raw = r#"{"input": "x", "probable_conditions": [
            {"condition": "a", "rationale": "r", "confidence": "High"},
            {"condition": "b", "rationale": "r", "confidence": "medium", "relative_score": 0.4},
            {"condition": "c", "rationale": "r", "confidence": "perhaps"}
        ], "recommended_next_steps": [], "disclaimer": "d"}"#;

        let response = parse_and_validate(raw).unwrap();
        let scores: Vec<f64> = response.probable_conditions.iter().map(|c| c.relative_score).collect();
        assert_eq!(scores, vec![0.75, 0.4, 0.33]);
        assert_eq!(response.notes.as_deref(), Some(RESCUED_SCORE_NOTE));
    }

    #[test]
    fn test_rescue_note_is_appended_to_existing_notes() {
        let raw = r#"{"input": "x", "probable_conditions": [{"condition": "a", "rationale": "r", "confidence": "low"}],
            "recommended_next_steps": [], "disclaimer": "d", "notes": "model_note"}"#;
        let response = parse_and_validate(raw).unwrap();
        assert_eq!(response.notes.as_deref(), Some("model_note parsed_and_rescued_relative_score"));
        assert_eq!(response.probable_conditions[0].relative_score, 0.25);
    }

    #[test]
    fn test_quoted_score_and_numeric_confidence_are_accepted() {
        let raw = r#"{"input": "x", "probable_conditions": [
            {"condition": "a", "rationale": "r", "confidence": 3, "relative_score": "0.7"}
        ], "recommended_next_steps": [], "disclaimer": "d"}"#;

        let response = parse_and_validate(raw).unwrap();
        assert_eq!(response.probable_conditions[0].relative_score, 0.7);
        assert_eq!(response.probable_conditions[0].confidence, Confidence::Unknown);
        assert_eq!(response.notes, None);
    }

    #[test]
    fn test_no_json() {
        assert_eq!(parse_and_validate("I cannot help with that."), Err(ParseError::NoJson));
        assert_eq!(parse_and_validate(""), Err(ParseError::NoJson));
    }

    #[test]
    fn test_unrepairable_json() {
        assert!(matches!(parse_and_validate("{input: ???}"), Err(ParseError::InvalidJson(_))));
    }

    #[test]
    fn test_validation_failures() {
        assert!(matches!(
            parse_and_validate(r#"{"error": "cannot_respond"}"#),
            Err(ParseError::Validation(_))
        ));

        let empty = r#"{"input": "x", "probable_conditions": [], "recommended_next_steps": [], "disclaimer": "d"}"#;
        assert!(matches!(parse_and_validate(empty), Err(ParseError::Validation(_))));
    }

    #[test]
    fn test_longest_block_wins() {
        assert_eq!(extract_candidate(r#"a {"x": 1} b {"y": {"z": 2}}"#), Some(r#"{"y": {"z": 2}}"#));
        assert_eq!(extract_candidate("[1, 2] {"), Some("[1, 2]"));
        assert_eq!(extract_candidate("no braces"), None);
    }
}
