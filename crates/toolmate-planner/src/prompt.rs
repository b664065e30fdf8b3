//! Prompt assembly: renders candidate tools and a request into the single
//! instruction block sent to the generation backend.
//!
//! Both builders are pure: no I/O, no clocks, no randomness.  The same inputs
//! always produce byte-identical output, so prompts can be asserted on
//! directly in tests.

use crate::catalog::{ParamMap, ToolDescriptor};
use crate::plan::Plan;

/// Worked example used when the caller does not provide one.
pub const DEFAULT_EXAMPLE: &str = r#"User query: "Summarize sales by category and email the report"
[
  {"function": "read_excel_tool", "inputs": {"file_path": "?"}},
  {"function": "group_by_category_tool", "inputs": {"data": "?", "category_field": "?"}},
  {"function": "calculate_sum_tool", "inputs": {"grouped_data": "?", "sum_field": "?"}},
  {"function": "generate_summary_pdf_tool", "inputs": {"summary_data": "?"}},
  {"function": "generate_email_tool", "inputs": {"content": "?"}},
  {"function": "send_email_tool", "inputs": {"to": "?", "content": "?"}}
]"#;

/// Rules shared by the initial and the update prompt.
const RULES: &str = r#"RULES:
- Use only the listed tools. Never invent tools.
- Respond with exactly one JSON array of steps and nothing else: no prose, no markdown fences.
- Each step is an object: {"function": "<tool name>", "inputs": {"<parameter>": <value>}}.
- If an input value cannot be determined from the request or an earlier step, use the placeholder "?".
- If the request cannot be fulfilled with the listed tools, respond with [].
- Order the steps for execution and feed earlier outputs into later inputs."#;

const UPDATE_RULES: &str = r#"UPDATE RULES:
1. Change the current plan strictly as the update request requires.
2. Preserve every step the update request does not affect, including its inputs.
3. Add, remove or reorder steps only when the update request calls for it.
4. Keep "?" wherever a value is still unknown; do not invent values."#;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Build the prompt for a fresh plan.
///
/// `example` replaces [`DEFAULT_EXAMPLE`] when given.
pub fn build_initial(query: &str, tools: &[ToolDescriptor], example: Option<&str>) -> String {
    let tool_list = render_tools(tools);
    let example = example.unwrap_or(DEFAULT_EXAMPLE);

    format!(
        r#"You are an AI workflow planner. Break down the user's request into a sequence of function calls using only the tools below.

{RULES}

TOOLS:
{tool_list}
EXAMPLE:
{example}

User query:
"{query}"

Respond ONLY with the JSON array as described above.
"#
    )
}

/// Build the prompt for revising `current_plan` according to `instruction`.
pub fn build_update(
    original_query: &str,
    current_plan: &Plan,
    instruction: &str,
    tools: &[ToolDescriptor],
) -> String {
    let tool_list = render_tools(tools);
    let plan_json = current_plan.to_pretty_json();

    format!(
        r#"You are an AI workflow planner. Revise an existing plan of function calls using only the tools below.

{RULES}

{UPDATE_RULES}

TOOLS:
{tool_list}
Original request:
"{original_query}"

Current plan:
{plan_json}

Update request:
"{instruction}"

Respond ONLY with the complete updated JSON array as described above.
"#
    )
}

// ---------------------------------------------------------------------------
// Tool rendering
// ---------------------------------------------------------------------------

/// Render every tool, separated by blank lines.
fn render_tools(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "- None\n".to_owned();
    }
    tools
        .iter()
        .map(render_tool)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_tool(tool: &ToolDescriptor) -> String {
    let mut out = format!("- {}\n", tool.name);
    let description = if tool.description.is_empty() {
        "No description available."
    } else {
        tool.description.as_str()
    };
    out.push_str(&format!("  Description: {description}\n"));

    if let Some(category) = tool.category.as_deref().filter(|c| !c.is_empty()) {
        out.push_str(&format!("  Category: {category}\n"));
    }
    if !tool.tags.is_empty() {
        out.push_str(&format!("  Tags: {}\n", tool.tags.join(", ")));
    }

    out.push_str("  Input Parameters:\n");
    render_params(&mut out, &tool.input);
    out.push_str("  Output Parameters:\n");
    render_params(&mut out, &tool.output);

    if let Some(constraints) = tool.constraints.as_deref().filter(|c| !c.is_empty()) {
        out.push_str(&format!("  CONSTRAINT: {constraints}\n"));
    }
    out
}

fn render_params(out: &mut String, params: &ParamMap) {
    if params.is_empty() {
        out.push_str("    - None\n");
        return;
    }
    for (name, spec) in params.iter() {
        out.push_str(&format!(
            "    - {name} (type: {}): {}\n",
            spec.kind_or_default(),
            spec.description_or_default()
        ));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
