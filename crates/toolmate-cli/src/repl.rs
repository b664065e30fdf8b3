//! Subcommand `toolmate run`: the interactive planning REPL.
//!
//! Free text starts a new conversation, or revises the plan of the active
//! one. Slash commands browse threads and versions.

use std::io::{self, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{info, warn};

use toolmate_llm::LlmClient;
use toolmate_planner::{ConversationThread, Generator, Orchestrator, PlannerError, ThreadStore};

use crate::config::AppConfig;
use crate::display::{
    TITLE_CHARS, render_candidates, render_rejection, render_threads, render_version,
};
use crate::helpers::{load_catalog, load_samples, resolve_llm_config};

const HELP: &str = "\
  Type a request to plan it. While a conversation is open, free text
  revises its current plan.

  /new            start a new conversation
  /threads        list conversations (newest first)
  /open <n>       switch to conversation n
  /delete <n>     delete conversation n
  /prev, /next    step through plan versions
  /version <k>    show version k
  /revert <k>     go back to version k, discarding later versions
  /show           show the current plan again
  /tools          list the candidate tools of the current plan
  /surprise       plan a sample request
  /help           show this help
  quit, exit      leave
";

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Free text: a new request or an update instruction.
    Request(String),
    New,
    Threads,
    /// 1-based position in the thread list.
    Open(usize),
    Delete(usize),
    Prev,
    Next,
    /// 1-based version number.
    Version(usize),
    Revert(usize),
    Show,
    Tools,
    Surprise,
    Help,
    Quit,
    Empty,
    /// A malformed command, with the message to show.
    Invalid(String),
}

/// Parse a line of input.
pub fn parse_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    if trimmed == "quit" || trimmed == "exit" {
        return ReplCommand::Quit;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return ReplCommand::Request(trimmed.to_owned());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    if parts.next().is_some() {
        return ReplCommand::Invalid(format!("/{name} takes at most one argument"));
    }

    let numbered = |make: fn(usize) -> ReplCommand| match arg.map(str::parse::<usize>) {
        Some(Ok(n)) if n > 0 => make(n),
        _ => ReplCommand::Invalid(format!("usage: /{name} <number>, counting from 1")),
    };

    match name {
        "new" => ReplCommand::New,
        "threads" => ReplCommand::Threads,
        "open" => numbered(ReplCommand::Open),
        "delete" => numbered(ReplCommand::Delete),
        "prev" => ReplCommand::Prev,
        "next" => ReplCommand::Next,
        "version" => numbered(ReplCommand::Version),
        "revert" => numbered(ReplCommand::Revert),
        "show" => ReplCommand::Show,
        "tools" => ReplCommand::Tools,
        "surprise" => ReplCommand::Surprise,
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("unknown command /{other}; try /help")),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// What the loop should do after a line was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Quit,
}

/// The state of one REPL: every thread, plus the sample rotation.
pub struct Session<G> {
    orchestrator: Orchestrator<G>,
    threads: ThreadStore,
    samples: Vec<String>,
    next_sample: usize,
}

impl<G: Generator> Session<G> {
    pub fn new(orchestrator: Orchestrator<G>, samples: Vec<String>) -> Self {
        Self {
            orchestrator,
            threads: ThreadStore::new(),
            samples,
            next_sample: 0,
        }
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    /// Handle one line of input.
    pub async fn handle(&mut self, line: &str) -> Reply {
        let text = match parse_command(line) {
            ReplCommand::Quit => return Reply::Quit,
            ReplCommand::Empty => String::new(),
            ReplCommand::Invalid(message) => format!("  {message}\n"),
            ReplCommand::Help => HELP.to_owned(),
            ReplCommand::Request(request) => self.request(&request).await,
            ReplCommand::Surprise => self.surprise().await,
            ReplCommand::New => {
                self.threads.clear_active();
                "  Started a new conversation. Type a request.\n".to_owned()
            }
            ReplCommand::Threads => render_threads(&self.threads),
            ReplCommand::Open(n) => self.open(n),
            ReplCommand::Delete(n) => self.delete(n),
            ReplCommand::Prev => self.navigate(|t| {
                t.previous();
                Ok(())
            }),
            ReplCommand::Next => self.navigate(|t| {
                t.next();
                Ok(())
            }),
            ReplCommand::Version(k) => self.navigate(|t| t.select(k - 1).map(|_| ())),
            ReplCommand::Revert(k) => self.navigate(|t| t.revert(k - 1)),
            ReplCommand::Show => self.navigate(|_| Ok(())),
            ReplCommand::Tools => match self.threads.active() {
                Some(thread) => render_candidates(thread.current()),
                None => NO_ACTIVE.to_owned(),
            },
        };
        Reply::Print(text)
    }

    /// Plan `text`: update the active thread, or start a new one.
    async fn request(&mut self, text: &str) -> String {
        if let Some(thread) = self.threads.active_mut() {
            let outcome = self.orchestrator.update_thread(thread, text).await;
            return match render_rejection(&outcome) {
                Some(message) => message,
                None => render_version(
                    thread.current(),
                    self.orchestrator.catalog(),
                    thread.position(),
                ),
            };
        }

        let created = self.orchestrator.create_thread(text).await;
        match created.thread {
            Some(thread) => {
                let id = self.threads.insert(thread);
                match self.threads.get(id) {
                    Some(thread) => render_version(
                        thread.current(),
                        self.orchestrator.catalog(),
                        thread.position(),
                    ),
                    None => String::new(),
                }
            }
            None => render_rejection(&created.outcome).unwrap_or_default(),
        }
    }

    /// Plan the next sample request in a fresh conversation.
    async fn surprise(&mut self) -> String {
        if self.samples.is_empty() {
            return "  No sample requests available.\n".to_owned();
        }
        let sample = self.samples[self.next_sample % self.samples.len()].clone();
        self.next_sample = (self.next_sample + 1) % self.samples.len();

        self.threads.clear_active();
        let rendered = self.request(&sample).await;
        format!("  > {sample}\n\n{rendered}")
    }

    fn open(&mut self, n: usize) -> String {
        let Some(id) = self.threads.iter_recent().nth(n - 1).map(|t| t.id()) else {
            return no_such_thread(n, self.threads.len());
        };
        if let Err(e) = self.threads.set_active(id) {
            return format!("  {e}\n");
        }
        self.navigate(|_| Ok(()))
    }

    fn delete(&mut self, n: usize) -> String {
        let Some(id) = self.threads.iter_recent().nth(n - 1).map(|t| t.id()) else {
            return no_such_thread(n, self.threads.len());
        };
        match self.threads.delete(id) {
            Ok(thread) => format!("  Deleted \"{}\".\n", thread.title(TITLE_CHARS)),
            Err(e) => format!("  {e}\n"),
        }
    }

    /// Apply `step` to the active thread and show its current version.
    fn navigate<F>(&mut self, step: F) -> String
    where
        F: FnOnce(&mut ConversationThread) -> toolmate_planner::Result<()>,
    {
        let Some(thread) = self.threads.active_mut() else {
            return NO_ACTIVE.to_owned();
        };
        match step(thread) {
            Ok(()) => render_version(
                thread.current(),
                self.orchestrator.catalog(),
                thread.position(),
            ),
            Err(PlannerError::OutOfRangeVersion { index, len }) => format!(
                "  Version {} does not exist; this conversation has {len}.\n",
                index + 1
            ),
            Err(e) => format!("  {e}\n"),
        }
    }
}

const NO_ACTIVE: &str = "  No active conversation. Type a request, or /threads to pick one.\n";

fn no_such_thread(n: usize, len: usize) -> String {
    format!("  Conversation {n} does not exist; there are {len}.\n")
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Run the interactive REPL.
pub async fn cmd_run(config: &AppConfig) -> Result<()> {
    info!("starting Toolmate");

    // 1. Load the catalog and sample requests.
    let catalog = load_catalog(&config.catalog.path)?;
    let samples = load_samples(&config.catalog.samples);
    info!(
        tools = catalog.len(),
        samples = samples.len(),
        "catalog loaded"
    );

    // 2. Resolve the model provider.
    let llm_config = resolve_llm_config(&config.llm)?;
    let provider = llm_config.provider;
    let model = llm_config.model.clone();
    let llm = LlmClient::new(llm_config).context("failed to create LLM client")?;
    info!(%provider, %model, "LLM client ready");

    let tool_count = catalog.len();
    let orchestrator = Orchestrator::new(catalog, llm, config.planner.clone());
    let mut session = Session::new(orchestrator, samples);

    // 3. Print startup banner.
    println!();
    println!("  Toolmate v{}", env!("CARGO_PKG_VERSION"));
    println!("  Provider: {provider}");
    println!("  Model: {model}");
    println!("  Tools: {tool_count}");
    println!("  Type a request, /help for commands, or 'quit' to exit.");
    println!();

    // 4. Set up Ctrl+C handler.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running.store(false, Ordering::SeqCst);
                eprintln!("\n  Interrupted. Goodbye!");
                std::process::exit(0);
            }
        });
    }

    // 5. REPL loop.
    let stdin = io::stdin();
    let mut line_buf = String::new();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        line_buf.clear();
        match stdin.read_line(&mut line_buf) {
            Ok(0) => {
                println!();
                info!("EOF received, exiting");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to read input");
                eprintln!("  Error reading input: {e}");
                continue;
            }
        }

        match session.handle(&line_buf).await {
            Reply::Quit => {
                info!("user requested exit");
                break;
            }
            Reply::Print(text) if text.is_empty() => {}
            Reply::Print(text) => println!("{text}"),
        }

        if !running.load(Ordering::SeqCst) {
            break;
        }
    }

    info!(threads = session.threads().len(), "shutting down");
    Ok(())
}
