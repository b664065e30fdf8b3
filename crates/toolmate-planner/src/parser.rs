//! Plan parser: extracts a validated [`Plan`] from raw backend text.
//!
//! The backend is asked for a bare JSON array but frequently wraps it in
//! prose or markdown.  The parser tries, in order:
//!
//! 1. **Whole document**: the trimmed text as JSON.  An array is the plan; an
//!    object with a `plan` field carries the plan (and optionally a
//!    `reasoning` string).
//! 2. **Fenced block**: the contents of the first ```` ```json ```` or bare
//!    ```` ``` ```` fence, decoded the same way.
//! 3. **Embedded array**: the first `[ {` in the text, decoded as one JSON
//!    value with any trailing prose ignored.
//!
//! Whatever path produced the array, every element is shape-checked.  A
//! single malformed step fails the whole parse; partial plans never escape.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PlannerError;
use crate::plan::{InputValue, Plan, PlanStep, StepInputs};

/// Start of a JSON array whose first element is an object.
static ARRAY_OF_OBJECTS_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*\{").expect("array start pattern is a valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A successfully parsed backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    /// The validated plan; may be empty ("no feasible plan").
    pub plan: Plan,

    /// Free-text rationale, when the backend wrapped the plan in an object.
    pub reasoning: Option<String>,
}

/// No valid plan could be recovered from the backend text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason}")]
pub struct ParseFailure {
    /// Why the text was rejected.
    pub reason: String,

    /// The raw backend text, kept for diagnostics.
    pub raw: String,
}

impl From<ParseFailure> for PlannerError {
    fn from(failure: ParseFailure) -> Self {
        PlannerError::UnparsablePlan {
            reason: failure.reason,
            raw: failure.raw,
        }
    }
}

/// Where in the text the candidate array came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Document,
    Fenced,
    Embedded,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse raw backend text into a validated plan.
pub fn parse(raw_text: &str) -> Result<ParsedPlan, ParseFailure> {
    let fail = |reason: String| ParseFailure {
        reason,
        raw: raw_text.to_owned(),
    };

    let (items, reasoning, source) = locate_array(raw_text).map_err(fail)?;
    let plan = validate_steps(items).map_err(fail)?;

    debug!(
        steps = plan.len(),
        source = ?source,
        has_reasoning = reasoning.is_some(),
        "plan parsed"
    );

    Ok(ParsedPlan { plan, reasoning })
}

/// Find the candidate array (and optional reasoning) in the text.
fn locate_array(
    raw_text: &str,
) -> Result<(Vec<Value>, Option<String>, Source), String> {
    let trimmed = raw_text.trim();
    if trimmed.is_empty() {
        return Err("backend returned empty text".into());
    }

    // 1. Whole document.
    if let Ok(document) = serde_json::from_str::<Value>(trimmed) {
        let (items, reasoning) = unwrap_document(document)?;
        return Ok((items, reasoning, Source::Document));
    }

    // 2. Fenced block. A fence holding some other JSON falls through to the
    // scan, which may still find the steps outside it.
    let mut fence_error = None;
    if let Some(Ok(document)) = extract_fenced_block(trimmed).map(serde_json::from_str::<Value>) {
        match unwrap_document(document) {
            Ok((items, reasoning)) => return Ok((items, reasoning, Source::Fenced)),
            Err(reason) => fence_error = Some(reason),
        }
    }

    // 3. First embedded array of objects.
    for start in ARRAY_OF_OBJECTS_START.find_iter(trimmed).map(|m| m.start()) {
        let mut stream = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Array(items))) = stream.next() {
            return Ok((items, None, Source::Embedded));
        }
    }

    Err(fence_error.unwrap_or_else(|| "no JSON array of steps found in backend response".into()))
}

/// Accept a bare array, or an object carrying the array under `plan`.
fn unwrap_document(document: Value) -> Result<(Vec<Value>, Option<String>), String> {
    match document {
        Value::Array(items) => Ok((items, None)),
        Value::Object(mut object) => {
            let reasoning = object
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_owned);
            match object.remove("plan") {
                Some(Value::Array(items)) => Ok((items, reasoning)),
                Some(_) => Err("`plan` field is not an array".into()),
                None => Err("JSON object has no `plan` field".into()),
            }
        }
        other => Err(format!(
            "expected a JSON array of steps, found {}",
            json_kind(&other)
        )),
    }
}

/// Shape-check every element, failing on the first malformed one.
fn validate_steps(items: Vec<Value>) -> Result<Plan, String> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_step(index, item))
        .collect::<Result<Vec<_>, _>>()
        .map(Plan::new)
}

fn validate_step(index: usize, item: Value) -> Result<PlanStep, String> {
    let Value::Object(mut object) = item else {
        return Err(format!("step {index} is not an object"));
    };

    let function = match object.remove("function") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        Some(Value::String(_)) => return Err(format!("step {index} has an empty `function`")),
        Some(_) => return Err(format!("step {index} has a non-string `function`")),
        None => return Err(format!("step {index} is missing `function`")),
    };

    let inputs = match object.remove("inputs") {
        None => StepInputs::new(),
        Some(Value::Object(map)) => validate_inputs(index, map)?,
        Some(_) => return Err(format!("step {index} `inputs` is not an object")),
    };

    Ok(PlanStep { function, inputs })
}

fn validate_inputs(index: usize, map: Map<String, Value>) -> Result<StepInputs, String> {
    let mut inputs = StepInputs::new();
    for (name, value) in map {
        let value = InputValue::from_json(value).ok_or_else(|| {
            format!("step {index} input `{name}` is not a scalar or placeholder")
        })?;
        inputs.insert(name, value);
    }
    Ok(inputs)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Contents of the first markdown code fence, if any.
fn extract_fenced_block(text: &str) -> Option<&str> {
    // ```json ... ``` fences.
    if let Some(start) = text.find("```json") {
        let body_start = start + "```json".len();
        if let Some(end) = text[body_start..].find("```") {
            return Some(text[body_start..body_start + end].trim());
        }
    }

    // ``` ... ``` fences without a language tag.
    if let Some(start) = text.find("```") {
        let body_start = start + 3;
        if let Some(end) = text[body_start..].find("```") {
            return Some(text[body_start..body_start + end].trim());
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = r#"[{"function":"send_email_tool","inputs":{"to":"?","content":"?"}}]"#;

    #[test]
    fn bare_array_parses() {
        let parsed = parse(BARE).unwrap();
        assert_eq!(parsed.plan.len(), 1);
        let step = &parsed.plan.steps[0];
        assert_eq!(step.function, "send_email_tool");
        assert!(step.inputs.get("to").unwrap().is_placeholder());
        assert!(step.inputs.get("content").unwrap().is_placeholder());
        assert!(parsed.reasoning.is_none());
    }

    #[test]
    fn wrapped_object_surfaces_reasoning() {
        let text = r#"{"reasoning": "Email is the only channel needed.", "plan": [
            {"function": "send_email_tool", "inputs": {"to": "boss@example.com"}}
        ]}"#;
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.plan.len(), 1);
        assert_eq!(
            parsed.reasoning.as_deref(),
            Some("Email is the only channel needed.")
        );
    }

    #[test]
    fn object_without_plan_fails() {
        let failure = parse(r#"{"steps": []}"#).unwrap_err();
        assert!(failure.reason.contains("no `plan` field"));
    }

    #[test]
    fn prose_and_fences_yield_same_plan_as_bare_array() {
        let expected = parse(BARE).unwrap().plan;

        let prose = format!("Sure! Here is your plan:\n{BARE}\nLet me know if you need more.");
        assert_eq!(parse(&prose).unwrap().plan, expected);

        let fenced = format!("```json\n{BARE}\n```");
        assert_eq!(parse(&fenced).unwrap().plan, expected);

        let bare_fence = format!("Plan below.\n```\n{BARE}\n```\nDone.");
        assert_eq!(parse(&bare_fence).unwrap().plan, expected);
    }

    #[test]
    fn fenced_non_plan_json_falls_through_to_scan() {
        let text = format!("Notes:\n```json\n{{\"note\": \"see below\"}}\n```\n{BARE}");
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.plan, parse(BARE).unwrap().plan);

        let failure = parse("```json\n{\"note\": \"nothing else\"}\n```").unwrap_err();
        assert!(failure.reason.contains("no `plan` field"));
    }

    #[test]
    fn embedded_array_ignores_trailing_brackets() {
        let text = format!("{BARE} and some [notes] afterwards ]");
        assert_eq!(parse(&text).unwrap().plan.len(), 1);
    }

    #[test]
    fn empty_array_is_a_valid_empty_plan() {
        let parsed = parse("[]").unwrap();
        assert!(parsed.plan.is_empty());

        let parsed = parse("```json\n[]\n```").unwrap();
        assert!(parsed.plan.is_empty());
    }

    #[test]
    fn refusal_prose_is_unparsable() {
        let failure = parse("I cannot help with that.").unwrap_err();
        assert_eq!(failure.raw, "I cannot help with that.");
        assert!(failure.reason.contains("no JSON array"));
    }

    #[test]
    fn empty_text_is_unparsable() {
        assert!(parse("   \n").is_err());
    }

    #[test]
    fn missing_function_rejects_whole_plan() {
        let text = r#"[
            {"function": "a_tool", "inputs": {}},
            {"inputs": {"x": "?"}}
        ]"#;
        let failure = parse(text).unwrap_err();
        assert!(failure.reason.contains("step 1 is missing `function`"));
    }

    #[test]
    fn malformed_steps_are_rejected() {
        for (text, needle) in [
            (r#"[{"function": ""}]"#, "empty `function`"),
            (r#"[{"function": 7}]"#, "non-string `function`"),
            (r#"["send_email_tool"]"#, "not an object"),
            (r#"[{"function": "a", "inputs": ["?"]}]"#, "`inputs` is not an object"),
            (r#"[{"function": "a", "inputs": {"rows": [1, 2]}}]"#, "not a scalar"),
        ] {
            let failure = parse(text).unwrap_err();
            assert!(
                failure.reason.contains(needle),
                "{text}: expected `{needle}` in `{}`",
                failure.reason
            );
        }
    }

    #[test]
    fn non_array_document_is_rejected() {
        assert!(parse("42").is_err());
        assert!(parse(r#"{"plan": "send_email_tool"}"#).is_err());
    }

    #[test]
    fn scalar_literals_are_kept() {
        let text = r#"[{"function":"f","inputs":{"n":3,"flag":true,"none":null,"s":"x"}}]"#;
        let plan = parse(text).unwrap().plan;
        let inputs = &plan.steps[0].inputs;
        assert_eq!(inputs.len(), 4);
        assert!(inputs.iter().all(|(_, v)| !v.is_placeholder()));
    }

    #[test]
    fn serialized_plan_round_trips() {
        let plan = Plan::new(vec![
            PlanStep::new("parse_csv_tool").with_input("file", "sales.csv"),
            PlanStep::new("summarize_numeric_tool")
                .with_placeholder("data")
                .with_input("precision", 2),
            PlanStep::new("send_email_tool")
                .with_placeholder("to")
                .with_input("urgent", false),
        ]);
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(parse(&json).unwrap().plan, plan);
        assert_eq!(parse(&plan.to_pretty_json()).unwrap().plan, plan);
    }

    #[test]
    fn failure_converts_to_planner_error() {
        let failure = parse("nope").unwrap_err();
        let err: PlannerError = failure.into();
        assert!(matches!(err, PlannerError::UnparsablePlan { raw, .. } if raw == "nope"));
    }

    #[test]
    fn fence_extraction() {
        assert_eq!(extract_fenced_block("```json\n[1]\n```"), Some("[1]"));
        assert_eq!(extract_fenced_block("```\n[2]\n```"), Some("[2]"));
        assert_eq!(extract_fenced_block("no fences"), None);
    }
}
