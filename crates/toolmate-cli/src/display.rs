//! Terminal rendering of plans, outcomes, threads and ranked tools.
//!
//! Every function returns a `String` so the output can be asserted on in
//! tests; callers decide where to print it.

use toolmate_planner::{
    ConversationThread, FailureCause, InputValue, Outcome, PlanVersion, ScoredTool, ThreadStore,
    ToolCatalog, ToolDescriptor,
};

/// Maximum length of a thread title in the thread list.
pub const TITLE_CHARS: usize = 40;

/// How much of an unparsable backend response to echo back.
const RAW_PREVIEW_CHARS: usize = 500;

const NO_VALUE_HINT: &str = "No value provided";

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// Human label for a tool name: `send_email_tool` and `sendEmailTool` both
/// become `Send Email`.
pub fn step_label(function: &str) -> String {
    let chars: Vec<char> = function.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        // Split before `E` in `sendEmail` and before `T` in `PDFTool`.
        let boundary = ch.is_uppercase()
            && i > 0
            && (chars[i - 1].is_lowercase()
                || chars[i - 1].is_ascii_digit()
                || (chars[i - 1].is_uppercase()
                    && chars.get(i + 1).is_some_and(|c| c.is_lowercase())));
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    if words.len() > 1 && words.last().is_some_and(|w| w.eq_ignore_ascii_case("tool")) {
        words.pop();
    }

    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render one plan version the way the REPL shows it.
///
/// `position` is the `(k, n)` pair of [`ConversationThread::position`].
pub fn render_version(
    version: &PlanVersion,
    catalog: &ToolCatalog,
    position: (usize, usize),
) -> String {
    let (k, n) = position;
    let mut out = format!("  Plan, version {k} of {n}\n\n");

    if version.plan.is_empty() {
        out.push_str("  No feasible plan: the available tools cannot fulfil this request.\n");
        render_reasoning(&mut out, version);
        return out;
    }

    let flow: Vec<String> = version
        .plan
        .steps
        .iter()
        .map(|s| step_label(&s.function))
        .chain(std::iter::once("Output".to_owned()))
        .collect();
    out.push_str(&format!("  {}\n\n", flow.join(" -> ")));

    for (i, step) in version.plan.steps.iter().enumerate() {
        let tool = version
            .relevant_tool(&step.function)
            .or_else(|| catalog.get(&step.function));

        out.push_str(&format!("  Step {}: {}\n", i + 1, step_label(&step.function)));
        out.push_str(&format!("    function: {}\n", step.function));
        if version.unknown_functions.contains(&step.function) {
            out.push_str("    [!] not one of the candidate tools\n");
        }
        if let Some(description) = tool.map(|t| t.description.as_str()).filter(|d| !d.is_empty()) {
            out.push_str(&format!("    what it does: {description}\n"));
        }

        let lines: Vec<String> = step
            .inputs
            .iter()
            .filter_map(|(name, value)| render_input(name, value, tool))
            .collect();
        if !lines.is_empty() {
            out.push_str("    inputs:\n");
            for line in lines {
                out.push_str(&format!("      - {line}\n"));
            }
        }
        out.push('\n');
    }

    render_reasoning(&mut out, version);
    out
}

/// One input line; `None` for empty literals, which are not shown.
fn render_input(name: &str, value: &InputValue, tool: Option<&ToolDescriptor>) -> Option<String> {
    match value {
        InputValue::Placeholder => Some(format!("{name}: ? ({})", placeholder_hint(name, tool))),
        InputValue::Literal(serde_json::Value::Null) => None,
        InputValue::Literal(serde_json::Value::String(s)) if s.is_empty() => None,
        literal => Some(format!("{name}: {literal}")),
    }
}

/// What the user should supply for a placeholder, from the tool's schema.
fn placeholder_hint(name: &str, tool: Option<&ToolDescriptor>) -> String {
    match tool.and_then(|t| t.input.get(name)) {
        Some(spec) if spec.description.is_some() => {
            format!("{} - {}", spec.kind_or_default(), spec.description_or_default())
        }
        _ => NO_VALUE_HINT.to_owned(),
    }
}

fn render_reasoning(out: &mut String, version: &PlanVersion) {
    if let Some(reasoning) = version.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
        out.push_str("  Why these functions?\n");
        out.push_str(&format!("    {}\n", reasoning.trim()));
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Message for a request that did not record a version.
///
/// Returns `None` for outcomes that carry a version; render those with
/// [`render_version`].
pub fn render_rejection(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Applied(_) | Outcome::RejectedEmptyPlan(_) => None,
        Outcome::RejectedNoTools => Some(
            "  No relevant tools found for that request. Try rephrasing it.\n".to_owned(),
        ),
        Outcome::RejectedParseFailure(cause) => {
            let mut out = format!("  Couldn't get a valid plan: {cause}\n");
            match cause {
                FailureCause::Backend { .. } => {
                    out.push_str("  Check your API key and model settings, then try again.\n");
                }
                FailureCause::Unparsable { raw, .. } | FailureCause::UnknownTools { raw, .. } => {
                    out.push_str("  Raw response:\n");
                    out.push_str(&indent(&preview(raw, RAW_PREVIEW_CHARS), "    "));
                    out.push_str("  Try rephrasing your request.\n");
                }
            }
            Some(out)
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines().map(|line| format!("{prefix}{line}\n")).collect()
}

// ---------------------------------------------------------------------------
// Threads and tools
// ---------------------------------------------------------------------------

/// Numbered thread list, newest first; `*` marks the active thread.
pub fn render_threads(store: &ThreadStore) -> String {
    if store.is_empty() {
        return "  No conversations yet.\n".to_owned();
    }
    let active = store.active().map(ConversationThread::id);
    store
        .iter_recent()
        .enumerate()
        .map(|(i, thread)| {
            let marker = if Some(thread.id()) == active { '*' } else { ' ' };
            let (_, versions) = thread.position();
            format!(
                "  {marker} {}. {} ({versions} version{})\n",
                i + 1,
                thread.title(TITLE_CHARS),
                if versions == 1 { "" } else { "s" }
            )
        })
        .collect()
}

/// Ranked candidate tools with their similarity scores.
pub fn render_scored(scored: &[ScoredTool<'_>]) -> String {
    if scored.is_empty() {
        return "  No relevant tools.\n".to_owned();
    }
    scored
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "  {:>2}. {:.3}  {:<32} {}\n",
                i + 1,
                s.score,
                s.tool.name,
                s.tool.description
            )
        })
        .collect()
}

/// Names of a version's candidate tools, one per line.
pub fn render_candidates(version: &PlanVersion) -> String {
    version
        .relevant_tools
        .iter()
        .map(|t| format!("  - {}: {}\n", t.name, t.description))
        .collect()
}

#[cfg(test)]
mod tests {
    use toolmate_planner::{ConversationThread, Plan, PlanStep};

    use super::*;

    fn catalog() -> ToolCatalog {
        ToolCatalog::new(vec![
            ToolDescriptor::new("read_excel_tool", "Read rows from an Excel spreadsheet")
                .with_input("file_path", "string", "Path to the spreadsheet file"),
            ToolDescriptor::new("send_email_tool", "Send an email to a recipient")
                .with_input("to", "string", "Recipient email address")
                .with_input("content", "string", "Body of the email"),
        ])
        .unwrap()
    }

    #[test]
    fn labels() {
        assert_eq!(step_label("send_email_tool"), "Send Email");
        assert_eq!(step_label("readExcelTool"), "Read Excel");
        assert_eq!(step_label("generateSummaryPDFTool"), "Generate Summary PDF");
        assert_eq!(step_label("tool"), "Tool");
        assert_eq!(step_label("summarize"), "Summarize");
    }

    #[test]
    fn renders_flow_steps_and_hints() {
        let catalog = catalog();
        let plan = Plan::new(vec![
            PlanStep::new("read_excel_tool").with_input("file_path", "sales.xlsx"),
            PlanStep::new("send_email_tool")
                .with_placeholder("to")
                .with_placeholder("cc")
                .with_input("content", ""),
        ]);
        let thread = ConversationThread::new(
            "q",
            plan,
            Some("Read then mail.".into()),
            catalog.tools().to_vec(),
        );
        let text = render_version(thread.current(), &catalog, thread.position());

        assert!(text.contains("version 1 of 1"));
        assert!(text.contains("Read Excel -> Send Email -> Output"));
        assert!(text.contains("  Step 2: Send Email\n    function: send_email_tool\n"));
        assert!(text.contains("what it does: Send an email to a recipient"));
        assert!(text.contains("- file_path: \"sales.xlsx\""));
        assert!(text.contains("- to: ? (string - Recipient email address)"));
        assert!(text.contains("- cc: ? (No value provided)"));
        assert!(!text.contains("content:"));
        assert!(text.contains("Why these functions?\n    Read then mail."));
        assert!(!text.contains("[!]"));
    }

    #[test]
    fn flags_unknown_functions() {
        let catalog = catalog();
        let plan = Plan::new(vec![PlanStep::new("teleport_tool")]);
        let thread = ConversationThread::new("q", plan, None, catalog.tools().to_vec());
        let text = render_version(thread.current(), &catalog, thread.position());
        assert!(text.contains("[!] not one of the candidate tools"));
        assert!(!text.contains("Why these functions?"));
    }

    #[test]
    fn empty_plan_message() {
        let catalog = catalog();
        let thread = ConversationThread::new("q", Plan::empty(), None, Vec::new());
        let text = render_version(thread.current(), &catalog, thread.position());
        assert!(text.contains("No feasible plan"));
        assert!(!text.contains("Output"));
    }

    #[test]
    fn rejection_messages() {
        assert!(render_rejection(&Outcome::RejectedNoTools)
            .unwrap()
            .contains("No relevant tools"));

        let unparsable = Outcome::RejectedParseFailure(FailureCause::Unparsable {
            reason: "no JSON array of steps found in backend response".into(),
            raw: "I cannot help with that.".into(),
        });
        let text = render_rejection(&unparsable).unwrap();
        assert!(text.contains("Raw response:\n    I cannot help with that.\n"));

        let thread = ConversationThread::new("q", Plan::empty(), None, Vec::new());
        let empty = Outcome::RejectedEmptyPlan(thread.current().clone());
        assert!(render_rejection(&empty).is_none());
    }

    #[test]
    fn thread_list_marks_active() {
        let mut store = ThreadStore::new();
        assert!(render_threads(&store).contains("No conversations"));

        store.insert(ConversationThread::new("first request", Plan::empty(), None, Vec::new()));
        store.insert(ConversationThread::new("second request", Plan::empty(), None, Vec::new()));
        let text = render_threads(&store);
        assert_eq!(
            text,
            "  * 1. second request (1 version)\n    2. first request (1 version)\n"
        );
    }

    #[test]
    fn long_raw_responses_are_cut() {
        let raw = "x".repeat(RAW_PREVIEW_CHARS + 10);
        assert!(preview(&raw, RAW_PREVIEW_CHARS).ends_with("..."));
        assert_eq!(preview("short", RAW_PREVIEW_CHARS), "short");
    }
}
