//! Tool catalog: the immutable list of tool descriptors the planner may use.
//!
//! The catalog is loaded once per process from a JSON array and shared
//! read-only afterwards.  Only `name` is mandatory; every other field is
//! optional and treated as empty when absent, so older and newer schema
//! revisions load through the same path.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::error::{PlannerError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Description of one input or output parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Declared type (free text, e.g. `"string"`, `"list[dict]"`).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Human-readable description of the parameter.
    #[serde(default)]
    pub description: Option<String>,
}

impl ParamSpec {
    /// The declared type, or `"unknown"` when the catalog omits it.
    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or("unknown")
    }

    /// The description, or a neutral fallback when the catalog omits it.
    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or("No description.")
    }
}

/// Parameter map that keeps the catalog's declaration order.
///
/// Order matters for the rendered prompt, which must mirror the catalog file
/// and be byte-identical across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap(Vec<(String, ParamSpec)>);

impl ParamMap {
    /// Build a map from `(name, spec)` pairs in the given order.
    pub fn from_pairs(pairs: Vec<(String, ParamSpec)>) -> Self {
        Self(pairs)
    }

    /// Iterate over parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.0.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ParamMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for ParamMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ParamMapVisitor;

        impl<'de> Visitor<'de> for ParamMapVisitor {
            type Value = ParamMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter name to {type, description}")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, spec)) = access.next_entry::<String, ParamSpec>()? {
                    pairs.push((name, spec));
                }
                Ok(ParamMap(pairs))
            }

            // A `null` parameter block is treated like an empty one.
            fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(ParamMap::default())
            }
        }

        deserializer.deserialize_any(ParamMapVisitor)
    }
}

/// Decode `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single tool the planner may reference in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name; the primary key for retrieval and validation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// What the tool does.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    /// Extra retrieval terms that do not belong in the description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,

    /// Input parameters in declaration order.
    #[serde(default)]
    pub input: ParamMap,

    /// Output parameters in declaration order.
    #[serde(default)]
    pub output: ParamMap,

    /// Free-text usage constraint rendered verbatim into prompts.
    #[serde(default)]
    pub constraints: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub author: Option<String>,
}

impl ToolDescriptor {
    /// Create a descriptor with only a name and description set.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: None,
            tags: Vec::new(),
            keywords: Vec::new(),
            input: ParamMap::default(),
            output: ParamMap::default(),
            constraints: None,
            version: None,
            author: None,
        }
    }

    /// Add an input parameter.
    pub fn with_input(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.input.0.push((
            name.into(),
            ParamSpec {
                kind: Some(kind.into()),
                description: Some(description.into()),
            },
        ));
        self
    }

    /// Add an output parameter.
    pub fn with_output(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.output.0.push((
            name.into(),
            ParamSpec {
                kind: Some(kind.into()),
                description: Some(description.into()),
            },
        ));
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_constraints(mut self, constraints: impl Into<String>) -> Self {
        self.constraints = Some(constraints.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The full, validated list of tools known to the process.
///
/// Catalog order is significant: retrieval breaks score ties by it.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Build a catalog from descriptors, rejecting empty or duplicate names.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(tools.len());
        for (index, tool) in tools.iter().enumerate() {
            if tool.name.trim().is_empty() {
                return Err(PlannerError::CatalogLoad {
                    reason: format!("entry {index} has no `name`"),
                });
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(PlannerError::DuplicateTool {
                    name: tool.name.clone(),
                });
            }
        }

        debug!(count = tools.len(), "tool catalog validated");
        Ok(Self { tools })
    }

    /// Decode a catalog from a JSON array of descriptors.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let tools: Vec<ToolDescriptor> = serde_json::from_str(json)?;
        Self::new(tools)
    }

    /// Load a catalog from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        info!(path = %path.display(), tools = catalog.len(), "tool catalog loaded");
        Ok(catalog)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Tool names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "name": "send_email_tool",
            "description": "Send an email to a recipient",
            "category": "communication",
            "tags": ["email", "notify"],
            "keywords": ["mail", "inbox"],
            "input": {
                "to": {"type": "string", "description": "Recipient address"},
                "content": {"type": "string", "description": "Body of the message"}
            },
            "output": {"status": {"type": "string", "description": "Delivery status"}},
            "version": "1.2.0",
            "author": "toolmate",
            "meta": {"usage_examples": ["email bob"]}
        },
        {
            "name": "parse_csv_tool",
            "description": "Parse a CSV file"
        }
    ]"#;

    #[test]
    fn loads_full_and_minimal_entries() {
        let catalog = ToolCatalog::from_json_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names(), vec!["send_email_tool", "parse_csv_tool"]);

        let email = catalog.get("send_email_tool").unwrap();
        assert_eq!(email.category.as_deref(), Some("communication"));
        assert_eq!(email.tags, vec!["email", "notify"]);
        assert_eq!(email.input.len(), 2);
        assert_eq!(email.output.len(), 1);

        let csv = catalog.get("parse_csv_tool").unwrap();
        assert!(csv.input.is_empty());
        assert!(csv.category.is_none());
        assert!(csv.keywords.is_empty());
    }

    #[test]
    fn parameter_order_follows_declaration() {
        let json = r#"[{"name": "t", "input": {
            "zeta": {"type": "string"},
            "alpha": {"type": "int"},
            "mid": {"description": "middle"}
        }}]"#;
        let catalog = ToolCatalog::from_json_str(json).unwrap();
        let names: Vec<&str> = catalog.tools()[0].input.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);

        let mid = catalog.tools()[0].input.get("mid").unwrap();
        assert_eq!(mid.kind_or_default(), "unknown");
        assert_eq!(mid.description_or_default(), "middle");
    }

    #[test]
    fn null_optional_fields_load_as_empty() {
        let json = r#"[{
            "name": "a",
            "description": null,
            "category": null,
            "tags": null,
            "keywords": null,
            "input": null,
            "constraints": null
        }]"#;
        let catalog = ToolCatalog::from_json_str(json).unwrap();
        let tool = catalog.get("a").unwrap();
        assert!(tool.description.is_empty());
        assert!(tool.category.is_none());
        assert!(tool.tags.is_empty());
        assert!(tool.keywords.is_empty());
        assert!(tool.input.is_empty());

        let err = ToolCatalog::from_json_str(r#"[{"name": null}]"#).unwrap_err();
        assert!(matches!(err, PlannerError::CatalogLoad { reason } if reason.contains("entry 0")));
    }

    #[test]
    fn missing_name_fails_the_load() {
        let json = r#"[{"name": "ok_tool"}, {"description": "no name here"}]"#;
        let err = ToolCatalog::from_json_str(json).unwrap_err();
        match err {
            PlannerError::CatalogLoad { reason } => assert!(reason.contains("entry 1")),
            other => panic!("expected CatalogLoad, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_name_fails_the_load() {
        let json = r#"[{"name": "a"}, {"name": "a"}]"#;
        assert!(matches!(
            ToolCatalog::from_json_str(json),
            Err(PlannerError::DuplicateTool { name }) if name == "a"
        ));
    }

    #[test]
    fn non_array_document_fails() {
        assert!(matches!(
            ToolCatalog::from_json_str(r#"{"name": "a"}"#),
            Err(PlannerError::Json(_))
        ));
    }

    #[test]
    fn null_parameter_block_is_empty() {
        let json = r#"[{"name": "a", "input": null}]"#;
        let catalog = ToolCatalog::from_json_str(json).unwrap();
        assert!(catalog.tools()[0].input.is_empty());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let catalog = ToolCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ToolCatalog::load(dir.path().join("absent.json"));
        match result {
            Err(PlannerError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
