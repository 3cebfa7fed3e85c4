//! Model response validation
//!
//! Model output is free-form text that is supposed to be JSON. Shape
//! problems are coerced, never surfaced:
//! - unknown or missing `verdict` becomes `no_verdict`
//! - unknown or missing flag `severity` becomes `none`
//! - flag `category` / `details` are always stringified
//! - missing `summary` becomes [`DEFAULT_SUMMARY`]
//! - falsy `ageRecommendation` / `reasoning` become `None`
//!
//! Only empty or non-JSON output is an error.

use safereads_common::models::{ContentFlag, Severity, Verdict};
use safereads_common::{Error, Result};
use serde_json::{Map, Value};

pub const DEFAULT_SUMMARY: &str = "No summary provided.";

/// Validated model verdict, ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerdict {
    pub verdict: Verdict,
    pub age_recommendation: Option<String>,
    pub summary: String,
    pub content_flags: Vec<ContentFlag>,
    pub reasoning: Option<String>,
}

/// Validate raw model output
pub fn parse_model_verdict(raw: Option<&str>) -> Result<ParsedVerdict> {
    let raw = match raw {
        Some(text) if !text.is_empty() => text,
        _ => return Err(Error::ModelEmptyResponse),
    };

    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| Error::ModelParse(e.to_string()))?;

    let empty = Map::new();
    let object = parsed.as_object().unwrap_or(&empty);
    let field = |camel: &str, snake: &str| object.get(camel).or_else(|| object.get(snake));

    let verdict = field("verdict", "verdict")
        .and_then(Value::as_str)
        .and_then(|v| v.parse::<Verdict>().ok())
        .unwrap_or(Verdict::NoVerdict);

    let summary = match field("summary", "summary") {
        None | Some(Value::Null) => DEFAULT_SUMMARY.to_string(),
        Some(value) => stringify(value),
    };

    let content_flags: Vec<ContentFlag> = field("contentFlags", "content_flags")
        .and_then(Value::as_array)
        .map(|flags| flags.iter().map(parse_flag).collect())
        .unwrap_or_default();

    Ok(ParsedVerdict {
        verdict,
        age_recommendation: truthy_string(field("ageRecommendation", "age_recommendation")),
        summary,
        content_flags,
        reasoning: truthy_string(field("reasoning", "reasoning")),
    })
}

fn parse_flag(flag: &Value) -> ContentFlag {
    let get = |key: &str| flag.get(key);

    ContentFlag {
        category: get("category").map(stringify).unwrap_or_default(),
        severity: get("severity")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or(Severity::None),
        details: get("details").map(stringify).unwrap_or_default(),
    }
}

/// Text form of any JSON value; strings are taken verbatim
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `None` for missing, null, false, zero and empty string
fn truthy_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(stringify(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ParsedVerdict {
        parse_model_verdict(Some(raw)).unwrap()
    }

    #[test]
    fn test_well_formed_response() {
        let parsed = parse(
            r#"{
                "verdict": "caution",
                "ageRecommendation": "12+",
                "summary": "A survival story.",
                "contentFlags": [
                    {"category": "Violence", "severity": "moderate", "details": "Animal attacks"}
                ],
                "reasoning": "Peril throughout."
            }"#,
        );

        assert_eq!(parsed.verdict, Verdict::Caution);
        assert_eq!(parsed.age_recommendation.as_deref(), Some("12+"));
        assert_eq!(parsed.summary, "A survival story.");
        assert_eq!(parsed.content_flags[0].severity, Severity::Moderate);
        assert_eq!(parsed.reasoning.as_deref(), Some("Peril throughout."));
    }

    #[test]
    fn test_malformed_verdicts_collapse_to_no_verdict() {
        for raw in [
            r#"{"verdict": "SAFE"}"#,
            r#"{"verdict": ""}"#,
            r#"{"verdict": "unsafe"}"#,
            r#"{"verdict": 3}"#,
            r#"{"verdict": null}"#,
            r#"{}"#,
        ] {
            assert_eq!(parse(raw).verdict, Verdict::NoVerdict, "input {}", raw);
        }
    }

    #[test]
    fn test_malformed_severities_collapse_to_none() {
        let parsed = parse(
            r#"{"verdict": "safe", "contentFlags": [
                {"category": "Language", "severity": "extreme", "details": "x"},
                {"category": "Violence", "severity": "Mild", "details": "x"},
                {"category": "Dark Themes", "details": "x"},
                {"category": "Substance Use", "severity": 2, "details": "x"}
            ]}"#,
        );

        assert_eq!(parsed.content_flags.len(), 4);
        assert!(parsed
            .content_flags
            .iter()
            .all(|flag| flag.severity == Severity::None));
    }

    #[test]
    fn test_non_string_flag_fields_are_stringified() {
        let parsed = parse(
            r#"{"contentFlags": [{"category": 7, "severity": "heavy", "details": ["a", "b"]}]}"#,
        );

        let flag = &parsed.content_flags[0];
        assert_eq!(flag.category, "7");
        assert_eq!(flag.details, r#"["a","b"]"#);
        assert_eq!(flag.severity, Severity::Heavy);
    }

    #[test]
    fn test_missing_or_null_flag_text_is_empty() {
        let parsed = parse(
            r#"{"contentFlags": [{"severity": "mild"}, {"category": null, "details": null}]}"#,
        );

        assert_eq!(parsed.content_flags.len(), 2);
        for flag in &parsed.content_flags {
            assert_eq!(flag.category, "");
            assert_eq!(flag.details, "");
        }
        assert_eq!(parsed.content_flags[0].severity, Severity::Mild);
    }

    #[test]
    fn test_summary_default_and_falsy_optionals() {
        let parsed = parse(r#"{"verdict": "warning", "ageRecommendation": "", "reasoning": 0}"#);

        assert_eq!(parsed.summary, DEFAULT_SUMMARY);
        assert_eq!(parsed.age_recommendation, None);
        assert_eq!(parsed.reasoning, None);
        assert!(parsed.content_flags.is_empty());

        let numeric = parse(r#"{"summary": 42, "ageRecommendation": 14}"#);
        assert_eq!(numeric.summary, "42");
        assert_eq!(numeric.age_recommendation.as_deref(), Some("14"));
    }

    #[test]
    fn test_empty_and_invalid_output_fail() {
        assert!(matches!(
            parse_model_verdict(None),
            Err(Error::ModelEmptyResponse)
        ));
        assert!(matches!(
            parse_model_verdict(Some("")),
            Err(Error::ModelEmptyResponse)
        ));
        assert!(matches!(
            parse_model_verdict(Some("The book is safe.")),
            Err(Error::ModelParse(_))
        ));
    }
}
