//! Version store: conversation threads and their plan history.
//!
//! A [`ConversationThread`] owns an append-only list of [`PlanVersion`]s and a
//! cursor (`active_index`) naming the version on display.  Reverting truncates
//! the list; discarded versions are gone for good.  A thread always holds at
//! least one version, so [`ConversationThread::current`] is infallible.
//!
//! [`ThreadStore`] is the process-lifetime collection of threads (the chat
//! history sidebar) plus an optional active-thread cursor.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::catalog::ToolDescriptor;
use crate::error::{PlannerError, Result};
use crate::plan::Plan;

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// One accepted plan state in a thread's history.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanVersion {
    pub plan: Plan,

    /// Rationale supplied by the backend, if any.
    pub reasoning: Option<String>,

    /// The exact candidate set this version was produced from.
    pub relevant_tools: Vec<ToolDescriptor>,

    /// Position in the thread's version list.
    pub sequence_index: usize,

    /// Step functions absent from `relevant_tools`, flagged for display.
    pub unknown_functions: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl PlanVersion {
    fn new(
        plan: Plan,
        reasoning: Option<String>,
        relevant_tools: Vec<ToolDescriptor>,
        sequence_index: usize,
    ) -> Self {
        let unknown_functions = plan.unknown_functions(&relevant_tools);
        Self {
            plan,
            reasoning,
            relevant_tools,
            sequence_index,
            unknown_functions,
            created_at: Utc::now(),
        }
    }

    /// The candidate tool with the given name, if it was part of this version.
    pub fn relevant_tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.relevant_tools.iter().find(|t| t.name == name)
    }
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

/// A conversation: the original request and its plan history.
#[derive(Debug, Clone)]
pub struct ConversationThread {
    id: Uuid,
    original_query: String,
    versions: Vec<PlanVersion>,
    active_index: usize,
    created_at: DateTime<Utc>,
}

impl ConversationThread {
    /// Create a thread whose first version is `plan`.
    pub fn new(
        original_query: impl Into<String>,
        plan: Plan,
        reasoning: Option<String>,
        relevant_tools: Vec<ToolDescriptor>,
    ) -> Self {
        let thread = Self {
            id: Uuid::now_v7(),
            original_query: original_query.into(),
            versions: vec![PlanVersion::new(plan, reasoning, relevant_tools, 0)],
            active_index: 0,
            created_at: Utc::now(),
        };
        info!(thread_id = %thread.id, steps = thread.versions[0].plan.len(), "thread created");
        thread
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn original_query(&self) -> &str {
        &self.original_query
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// All versions, oldest first.
    pub fn versions(&self) -> &[PlanVersion] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Always `false`; a thread is created with its first version.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// Append a new version and make it active.
    pub fn append(
        &mut self,
        plan: Plan,
        reasoning: Option<String>,
        relevant_tools: Vec<ToolDescriptor>,
    ) -> &PlanVersion {
        let index = self.versions.len();
        self.versions
            .push(PlanVersion::new(plan, reasoning, relevant_tools, index));
        self.active_index = index;
        info!(
            thread_id = %self.id,
            version = index,
            steps = self.versions[index].plan.len(),
            "plan version appended"
        );
        &self.versions[index]
    }

    /// Move the cursor to `index`.
    pub fn select(&mut self, index: usize) -> Result<&PlanVersion> {
        self.check_index(index)?;
        self.active_index = index;
        Ok(&self.versions[index])
    }

    /// Truncate the history to `[0, index]` and make `index` active.
    pub fn revert(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let discarded = self.versions.len() - index - 1;
        self.versions.truncate(index + 1);
        self.active_index = index;
        info!(thread_id = %self.id, version = index, discarded, "thread reverted");
        Ok(())
    }

    /// The version on display.
    pub fn current(&self) -> &PlanVersion {
        &self.versions[self.active_index]
    }

    /// Step the cursor back by one, stopping at the first version.
    pub fn previous(&mut self) -> &PlanVersion {
        self.active_index = self.active_index.saturating_sub(1);
        self.current()
    }

    /// Step the cursor forward by one, stopping at the last version.
    pub fn next(&mut self) -> &PlanVersion {
        self.active_index = (self.active_index + 1).min(self.versions.len() - 1);
        self.current()
    }

    /// `(k, n)`: the active version is the k-th of n, 1-based.
    pub fn position(&self) -> (usize, usize) {
        (self.active_index + 1, self.versions.len())
    }

    /// Sidebar label: the original query cut to `max_chars` characters.
    pub fn title(&self, max_chars: usize) -> String {
        let query = self.original_query.trim();
        if query.chars().count() <= max_chars {
            return query.to_owned();
        }
        let cut: String = query.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.versions.len() {
            return Err(PlannerError::OutOfRangeVersion {
                index,
                len: self.versions.len(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Thread store
// ---------------------------------------------------------------------------

/// All threads of the running process, in creation order.
#[derive(Debug, Default)]
pub struct ThreadStore {
    threads: Vec<ConversationThread>,
    active: Option<Uuid>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a thread and make it the active one.
    pub fn insert(&mut self, thread: ConversationThread) -> Uuid {
        let id = thread.id();
        self.threads.push(thread);
        self.active = Some(id);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&ConversationThread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ConversationThread> {
        self.threads.iter_mut().find(|t| t.id == id)
    }

    pub fn active(&self) -> Option<&ConversationThread> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut ConversationThread> {
        let id = self.active?;
        self.get_mut(id)
    }

    pub fn set_active(&mut self, id: Uuid) -> Result<()> {
        if self.get(id).is_none() {
            return Err(PlannerError::ThreadNotFound { thread_id: id });
        }
        self.active = Some(id);
        Ok(())
    }

    /// Start over: no thread is active until the next one is inserted.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Remove a thread, clearing the cursor if it was active.
    pub fn delete(&mut self, id: Uuid) -> Result<ConversationThread> {
        let position = self
            .threads
            .iter()
            .position(|t| t.id == id)
            .ok_or(PlannerError::ThreadNotFound { thread_id: id })?;
        if self.active == Some(id) {
            self.active = None;
        }
        info!(thread_id = %id, "thread deleted");
        Ok(self.threads.remove(position))
    }

    /// Threads newest first.
    pub fn iter_recent(&self) -> impl Iterator<Item = &ConversationThread> {
        self.threads.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
