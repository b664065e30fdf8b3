//! Plan types: the canonical structure every backend response is parsed into.
//!
//! A [`Plan`] is an ordered list of [`PlanStep`]s.  Each step names a tool and
//! maps parameter names to [`InputValue`]s, which are either a concrete JSON
//! scalar or the placeholder marker `"?"` (a value the planner could not
//! determine from the request).

use std::collections::HashSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::catalog::ToolDescriptor;

/// The marker standing in for an argument the planner could not determine.
pub const PLACEHOLDER: &str = "?";

// ---------------------------------------------------------------------------
// Input values
// ---------------------------------------------------------------------------

/// The value of one step input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Not determinable from the request; serialized as `"?"`.
    Placeholder,
    /// A concrete scalar (string, number, boolean, or null).
    Literal(Value),
}

impl InputValue {
    /// Convert a decoded JSON value, rejecting arrays and objects.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::String(s) if s == PLACEHOLDER => Some(Self::Placeholder),
            Value::Array(_) | Value::Object(_) => None,
            scalar => Some(Self::Literal(scalar)),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// The JSON form of this value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Placeholder => Value::String(PLACEHOLDER.to_owned()),
            Self::Literal(v) => v.clone(),
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => f.write_str(PLACEHOLDER),
            Self::Literal(Value::String(s)) => write!(f, "{s:?}"),
            Self::Literal(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for InputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value)
            .ok_or_else(|| serde::de::Error::custom("step input must be a scalar or \"?\""))
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Ordered parameter-name to value mapping of one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInputs(Vec<(String, InputValue)>);

impl StepInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an input, replacing an existing value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: InputValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for StepInputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for StepInputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InputsVisitor;

        impl<'de> Visitor<'de> for InputsVisitor {
            type Value = StepInputs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of input name to scalar value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut inputs = StepInputs::new();
                while let Some((name, value)) = access.next_entry::<String, InputValue>()? {
                    inputs.insert(name, value);
                }
                Ok(inputs)
            }
        }

        deserializer.deserialize_map(InputsVisitor)
    }
}

/// One tool invocation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Name of the tool to invoke.
    pub function: String,

    /// Arguments for the invocation.
    #[serde(default)]
    pub inputs: StepInputs,
}

impl PlanStep {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            inputs: StepInputs::new(),
        }
    }

    /// Add an input value; `"?"` becomes a placeholder and non-scalar values
    /// are stored as `null`.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = InputValue::from_json(value.into())
            .unwrap_or_else(|| InputValue::Literal(Value::Null));
        self.inputs.insert(name, value);
        self
    }

    /// Add a placeholder input.
    pub fn with_placeholder(mut self, name: impl Into<String>) -> Self {
        self.inputs.insert(name, InputValue::Placeholder);
        self
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// An ordered sequence of steps; order is execution order.
///
/// An empty plan is a valid "cannot fulfill" answer, distinct from a parse
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Functions used by the plan that are not among `tools`.
    ///
    /// Names are deduplicated and listed in order of first appearance.
    pub fn unknown_functions(&self, tools: &[ToolDescriptor]) -> Vec<String> {
        let known: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .map(|s| s.function.as_str())
            .filter(|f| !known.contains(f) && seen.insert(*f))
            .map(str::to_owned)
            .collect()
    }

    /// Pretty-printed JSON array, as embedded in update prompts.
    pub fn to_pretty_json(&self) -> String {
        // Serializing plain strings and scalars cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "[]".to_owned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
