//! Critique payload adapter.
//!
//! Providers return critique JSON in slightly different shapes. This module
//! is the single place that tolerates them; everything past it works with
//! [`Critique`].

use schemars::schema_for;
use serde_json::{Map, Value};

use lumen_models::{Critique, CritiqueIssue, IssueScope};

use crate::error::{AiError, AiResult};

const SCORE_KEYS: &[&str] = &["score", "quality_score", "rating"];
const ISSUE_LIST_KEYS: &[&str] = &["issues", "problems", "remaining_issues"];
const DESCRIPTION_KEYS: &[&str] = &["description", "issue", "text", "problem"];
const REGION_KEYS: &[&str] = &["region", "location", "area"];
const SCOPE_KEYS: &[&str] = &["type", "scope", "kind"];

/// JSON schema of [`Critique`], embedded in critique prompts.
pub fn critique_schema_json() -> String {
    serde_json::to_string_pretty(&schema_for!(Critique)).unwrap_or_default()
}

/// Coerce a raw critique response into the internal shape.
///
/// Fails with [`AiError::MalformedResponse`] when no JSON object with a
/// usable score can be recovered.
pub fn coerce_critique(text: &str) -> AiResult<Critique> {
    let value = parse_json_object(text)?;
    let object = value
        .as_object()
        .ok_or_else(|| AiError::malformed("critique is not a JSON object"))?;

    let score = lookup(object, SCORE_KEYS)
        .and_then(coerce_score)
        .ok_or_else(|| AiError::malformed("critique has no numeric score"))?;

    let issues = match lookup(object, ISSUE_LIST_KEYS) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(coerce_issue).collect(),
        Some(other) => {
            return Err(AiError::malformed(format!(
                "critique issues must be a list, got {}",
                type_name(other)
            )))
        }
    };

    Ok(Critique::new(score, issues))
}

/// Strip markdown fences and surrounding prose around a JSON object.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = match text.strip_prefix("```") {
        // Drop the info string ("json") along with the fence
        Some(rest) => rest.split_once('\n').map(|(_, body)| body).unwrap_or(""),
        None => text,
    };
    text.trim().trim_end_matches("```").trim()
}

fn parse_json_object(text: &str) -> AiResult<Value> {
    let body = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    // Prose around the object: take the outermost braces
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end])
            .map_err(|e| AiError::malformed(format!("critique JSON: {}", e))),
        _ => Err(AiError::malformed("critique response contains no JSON object")),
    }
}

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn coerce_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_score_text(s),
        _ => None,
    }
}

/// "8.5", "8.5/10" or "85/100".
fn parse_score_text(s: &str) -> Option<f64> {
    let s = s.trim();
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den > 0.0).then(|| num / den * Critique::MAX_SCORE)
        }
        None => s.parse().ok(),
    }
}

fn coerce_issue(value: &Value) -> Option<CritiqueIssue> {
    match value {
        Value::String(description) if !description.trim().is_empty() => {
            Some(CritiqueIssue::global(description.trim()))
        }
        Value::Object(object) => {
            let description = lookup(object, DESCRIPTION_KEYS)
                .and_then(Value::as_str)
                .unwrap_or("unspecified issue")
                .trim()
                .to_string();
            let region = lookup(object, REGION_KEYS)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            Some(CritiqueIssue {
                description,
                region,
                scope: coerce_scope(object),
            })
        }
        _ => None,
    }
}

fn coerce_scope(object: &Map<String, Value>) -> IssueScope {
    match object.get("surgical") {
        Some(Value::Bool(true)) => return IssueScope::Surgical,
        Some(Value::Bool(false)) => return IssueScope::Global,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => return IssueScope::Surgical,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => return IssueScope::Global,
        _ => {}
    }

    let label = lookup(object, SCOPE_KEYS)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase());
    match label.as_deref() {
        Some("surgical" | "local" | "localized" | "localised" | "region" | "regional") => {
            IssueScope::Surgical
        }
        _ => IssueScope::Global,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
