use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Date, OffsetDateTime};

use super::{IdeaId, NoteId, TodoId, UserId};

/// Workflow state of a todo.
///
/// `status` is the single source of truth for done-ness; `Todo::completed`
/// is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TodoStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    Working,
    Done,
    Archived,
}

impl TodoStatus {
    /// Returns the stored/display label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Working => "Working",
            Self::Done => "Done",
            Self::Archived => "Archived",
        }
    }

    /// Reconciles a legacy `(status, completed)` pair into one status.
    ///
    /// A completed flag always wins over a stale non-done status. A missing
    /// or unknown status falls back to `Done`/`Not Started` by the flag.
    pub fn reconcile(status: Option<&str>, completed: bool) -> Self {
        match status.and_then(|s| s.parse::<TodoStatus>().ok()) {
            Some(Self::Done) => Self::Done,
            Some(_) if completed => Self::Done,
            Some(status) => status,
            None if completed => Self::Done,
            None => Self::NotStarted,
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "not started" => Ok(Self::NotStarted),
            "working" => Ok(Self::Working),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown todo status: {other}")),
        }
    }
}

/// A checklist item on an idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    id: TodoId,
    idea_id: IdeaId,
    text: String,
    status: TodoStatus,
    is_urgent: bool,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    completed_at: Option<OffsetDateTime>,
    due_date: Option<Date>,
    assignee_id: Option<UserId>,
    origin_note_id: Option<NoteId>,
}

impl Todo {
    /// Returns the todo ID.
    pub fn id(&self) -> TodoId {
        self.id
    }

    /// Returns the idea this todo belongs to.
    pub fn idea_id(&self) -> IdeaId {
        self.idea_id
    }

    /// Returns the todo text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the workflow status.
    pub fn status(&self) -> TodoStatus {
        self.status
    }

    /// Whether the todo is done. Derived from `status`.
    pub fn completed(&self) -> bool {
        self.status == TodoStatus::Done
    }

    /// Whether the todo is flagged urgent.
    pub fn is_urgent(&self) -> bool {
        self.is_urgent
    }

    /// Returns when the todo was created.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Returns when the todo was last moved to `Done`.
    pub fn completed_at(&self) -> Option<OffsetDateTime> {
        self.completed_at
    }

    /// Returns the due date, if any.
    pub fn due_date(&self) -> Option<Date> {
        self.due_date
    }

    /// Returns the assigned user, if any.
    pub fn assignee_id(&self) -> Option<UserId> {
        self.assignee_id
    }

    /// Returns the note this todo was promoted from, if any.
    pub fn origin_note_id(&self) -> Option<NoteId> {
        self.origin_note_id
    }

    /// Moves the todo to `status`, stamping or clearing `completed_at`.
    pub fn set_status(&mut self, status: TodoStatus, now: OffsetDateTime) {
        if status == TodoStatus::Done && self.status != TodoStatus::Done {
            self.completed_at = Some(now);
        } else if status != TodoStatus::Done {
            self.completed_at = None;
        }
        self.status = status;
    }
}

/// Builder for constructing `Todo` instances.
///
/// # Examples
///
/// ```
/// use idealog::{IdeaId, TodoBuilder, TodoId, TodoStatus};
///
/// let todo = TodoBuilder::new()
///     .id(TodoId::new(1))
///     .idea_id(IdeaId::new(7))
///     .text("Call the printer")
///     .build();
///
/// assert_eq!(todo.status(), TodoStatus::NotStarted);
/// assert!(!todo.completed());
/// ```
#[derive(Debug, Default)]
pub struct TodoBuilder {
    id: Option<TodoId>,
    idea_id: Option<IdeaId>,
    text: Option<String>,
    status: Option<TodoStatus>,
    is_urgent: bool,
    created_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
    due_date: Option<Date>,
    assignee_id: Option<UserId>,
    origin_note_id: Option<NoteId>,
}

impl TodoBuilder {
    /// Creates a new `TodoBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: TodoId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn idea_id(mut self, idea_id: IdeaId) -> Self {
        self.idea_id = Some(idea_id);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn status(mut self, status: TodoStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn urgent(mut self, is_urgent: bool) -> Self {
        self.is_urgent = is_urgent;
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn completed_at(mut self, completed_at: Option<OffsetDateTime>) -> Self {
        self.completed_at = completed_at;
        self
    }

    pub fn due_date(mut self, due_date: Option<Date>) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn assignee_id(mut self, assignee_id: Option<UserId>) -> Self {
        self.assignee_id = assignee_id;
        self
    }

    pub fn origin_note_id(mut self, origin_note_id: Option<NoteId>) -> Self {
        self.origin_note_id = origin_note_id;
        self
    }

    /// Builds the `Todo`.
    ///
    /// # Panics
    ///
    /// Panics if `id`, `idea_id` or `text` have not been set.
    pub fn build(self) -> Todo {
        Todo {
            id: self.id.expect("id is required"),
            idea_id: self.idea_id.expect("idea_id is required"),
            text: self.text.expect("text is required"),
            status: self.status.unwrap_or_default(),
            is_urgent: self.is_urgent,
            created_at: self.created_at.unwrap_or_else(OffsetDateTime::now_utc),
            completed_at: self.completed_at,
            due_date: self.due_date,
            assignee_id: self.assignee_id,
            origin_note_id: self.origin_note_id,
        }
    }
}
