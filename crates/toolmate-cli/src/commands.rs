//! One-shot subcommands: `plan`, `prompt`, `tools` and `status`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use toolmate_llm::LlmClient;
use toolmate_planner::{
    Orchestrator, Plan, PlannerConfig, PlannerError, ToolCatalog, parser, prompt, retriever,
};

use crate::config::AppConfig;
use crate::display::{render_rejection, render_scored, render_version};
use crate::helpers::{load_catalog, load_samples, resolve_llm_config};

// ---------------------------------------------------------------------------
// Subcommand: plan
// ---------------------------------------------------------------------------

/// Plan a single request and print it.
pub async fn cmd_plan(config: &AppConfig, query: &str) -> Result<()> {
    let catalog = load_catalog(&config.catalog.path)?;
    let llm_config = resolve_llm_config(&config.llm)?;
    let llm = LlmClient::new(llm_config).context("failed to create LLM client")?;
    info!(provider = %llm.provider(), model = %llm.model(), "LLM client ready");

    let orchestrator = Orchestrator::new(catalog, llm, config.planner.clone());
    let created = orchestrator.create_thread(query).await;

    match created.thread {
        Some(thread) => {
            println!(
                "{}",
                render_version(thread.current(), orchestrator.catalog(), thread.position())
            );
            Ok(())
        }
        None => {
            if let Some(message) = render_rejection(&created.outcome) {
                eprintln!("{message}");
            }
            created
                .outcome
                .into_result(query)
                .map(|_| ())
                .context("no plan was produced")
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: prompt
// ---------------------------------------------------------------------------

/// Print the prompt that `plan` (or an update) would send.
pub fn cmd_prompt(
    config: &AppConfig,
    query: &str,
    update_plan: Option<&Path>,
    instruction: Option<&str>,
) -> Result<()> {
    let catalog = load_catalog(&config.catalog.path)?;

    let update = match (update_plan, instruction) {
        (Some(path), Some(instruction)) => Some((read_plan(path)?, instruction)),
        _ => None,
    };
    let text = assemble_prompt(
        &config.planner,
        &catalog,
        query,
        update.as_ref().map(|(plan, instruction)| (plan, *instruction)),
    );
    println!("{text}");
    Ok(())
}

/// Build the initial prompt, or the update prompt when `update` is given.
///
/// Retrieval runs exactly as in the orchestrator: on the query alone, or on
/// the query followed by the instruction for updates.
fn assemble_prompt(
    planner: &PlannerConfig,
    catalog: &ToolCatalog,
    query: &str,
    update: Option<(&Plan, &str)>,
) -> String {
    let retrieval_query = match update {
        Some((_, instruction)) => format!("{query} {instruction}"),
        None => query.to_owned(),
    };
    let tools = retriever::rank(&retrieval_query, catalog.tools(), planner.top_n);
    if tools.is_empty() {
        warn!(query = %retrieval_query, "no relevant tools; the backend would not be called");
    }

    match update {
        Some((plan, instruction)) => prompt::build_update(query, plan, instruction, &tools),
        None => prompt::build_initial(query, &tools, planner.example.as_deref()),
    }
}

/// Read a plan file; any text the parser accepts will do.
fn read_plan(path: &Path) -> Result<Plan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file {}", path.display()))?;
    let parsed = parser::parse(&content)
        .map_err(PlannerError::from)
        .with_context(|| format!("invalid plan file {}", path.display()))?;
    Ok(parsed.plan)
}

// ---------------------------------------------------------------------------
// Subcommand: tools
// ---------------------------------------------------------------------------

/// Print the ranked candidate tools for a request.
pub fn cmd_tools(config: &AppConfig, query: &str, top_n: Option<usize>) -> Result<()> {
    let catalog = load_catalog(&config.catalog.path)?;
    let top_n = top_n.unwrap_or(config.planner.top_n);
    let scored = retriever::rank_scored(query, catalog.tools(), top_n);

    println!();
    println!("  Candidates for \"{query}\" ({} of {} tools)", scored.len(), catalog.len());
    println!();
    print!("{}", render_scored(&scored));
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

/// Show catalog, configuration and provider status.
pub fn cmd_status(config: &AppConfig, source: Option<&Path>) -> Result<()> {
    println!();
    println!("  Toolmate Status");
    println!("  ===============");
    println!();

    match source {
        Some(path) => println!("  Config:           OK ({})", path.display()),
        None => println!("  Config:           DEFAULTS (no config file)"),
    }

    let catalog_path = &config.catalog.path;
    match ToolCatalog::load(catalog_path) {
        Ok(catalog) => println!(
            "  Catalog:          OK ({} tools, {})",
            catalog.len(),
            catalog_path.display()
        ),
        Err(e) => println!(
            "  Catalog:          ERROR ({}: {e})",
            catalog_path.display()
        ),
    }

    let samples = load_samples(&config.catalog.samples);
    println!("  Sample requests:  {}", samples.len());

    match resolve_llm_config(&config.llm) {
        Ok(llm) => {
            println!("  Provider:         {}", llm.provider);
            println!("  Model:            {}", llm.model);
            println!("  Endpoint:         {}", llm.base_url);
        }
        Err(e) => println!("  Provider:         NOT CONFIGURED ({e})"),
    }

    println!("  Top-N:            {}", config.planner.top_n);
    println!("  Unknown tools:    {}", config.planner.unknown_tool_policy);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use toolmate_planner::{PlanStep, ToolDescriptor};

    use super::*;

    fn catalog() -> ToolCatalog {
        ToolCatalog::new(vec![
            ToolDescriptor::new("send_email_tool", "Send an email to a recipient"),
            ToolDescriptor::new("send_sms_tool", "Send a text message to a phone number"),
        ])
        .unwrap()
    }

    #[test]
    fn initial_prompt_lists_candidates() {
        let text = assemble_prompt(&PlannerConfig::default(), &catalog(), "email my boss", None);
        assert!(text.contains("- send_email_tool"));
        assert!(!text.contains("send_sms_tool"));
        assert!(text.contains("User query:\n\"email my boss\""));
    }

    #[test]
    fn update_prompt_retrieves_on_query_and_instruction() {
        let plan = Plan::new(vec![PlanStep::new("send_email_tool").with_placeholder("to")]);
        let text = assemble_prompt(
            &PlannerConfig::default(),
            &catalog(),
            "email my boss",
            Some((&plan, "also send a text message")),
        );
        assert!(text.contains("- send_sms_tool"));
        assert!(text.contains("Original request:\n\"email my boss\""));
        assert!(text.contains("Update request:\n\"also send a text message\""));
        assert!(text.contains("\"function\": \"send_email_tool\""));
    }

    #[test]
    fn plan_files_accept_fenced_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.md");
        std::fs::write(
            &path,
            "```json\n[{\"function\": \"send_email_tool\", \"inputs\": {\"to\": \"?\"}}]\n```\n",
        )
        .unwrap();
        let plan = read_plan(&path).unwrap();
        assert_eq!(plan.steps[0].function, "send_email_tool");

        std::fs::write(&path, "not a plan").unwrap();
        assert!(read_plan(&path).is_err());
    }
}
