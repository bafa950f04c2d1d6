//! Idea checklist helpers: promoting call-minute "To do" segments into
//! todos, and importing legacy JSON-encoded todo lists.

use serde::Deserialize;
use serde_json::Value;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::models::{CallMinute, NoteId, Segment, Todo, TodoStatus, UserId};

/// Storage and display format for due dates.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// How many layers of string-wrapped JSON `parse_legacy_todos` unwraps.
const MAX_ENCODING_DEPTH: usize = 3;

/// A todo that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub text: String,
    pub status: TodoStatus,
    pub is_urgent: bool,
    pub due_date: Option<Date>,
    pub assignee_id: Option<UserId>,
    pub origin_note_id: Option<NoteId>,
}

impl NewTodo {
    /// A manually entered todo with default flags.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: TodoStatus::NotStarted,
            is_urgent: false,
            due_date: None,
            assignee_id: None,
            origin_note_id: None,
        }
    }
}

/// Checklist text for a "To do" segment: the topic, then ` - comments`
/// when comments are present.
pub fn segment_todo_text(segment: &Segment) -> String {
    let topic = segment.topic.trim();
    let comments = segment.comments.trim();
    if comments.is_empty() {
        topic.to_string()
    } else {
        format!("{topic} - {comments}")
    }
}

/// Returns the todos a saved call-minute should add to its idea.
///
/// Every "To do" segment with a topic becomes a `Not Started`, non-urgent
/// todo pointing back at `note_id`, unless a todo from the same note
/// already contains that topic. Saving the same minute twice therefore
/// adds nothing the second time.
///
/// # Examples
///
/// ```
/// use idealog::todos::promote_todos;
/// use idealog::{CallMinute, NoteId, Segment, SegmentType};
///
/// let mut minute = CallMinute::new("2024-04-01", "");
/// minute.push(Segment::new(SegmentType::ToDo, "Follow up", ""));
/// minute.push(Segment::new(SegmentType::Insight, "Not a task", ""));
///
/// let promoted = promote_todos(&minute, NoteId::new(9), &[]);
/// assert_eq!(promoted.len(), 1);
/// assert_eq!(promoted[0].text, "Follow up");
/// assert_eq!(promoted[0].origin_note_id, Some(NoteId::new(9)));
/// ```
pub fn promote_todos(minute: &CallMinute, note_id: NoteId, existing: &[Todo]) -> Vec<NewTodo> {
    let mut promoted: Vec<NewTodo> = Vec::new();

    for segment in minute.todo_segments() {
        let topic = segment.topic.trim();
        if topic.is_empty() {
            continue;
        }

        let already_stored = existing
            .iter()
            .any(|todo| todo.origin_note_id() == Some(note_id) && todo.text().contains(topic));
        let already_queued = promoted.iter().any(|todo| todo.text.contains(topic));
        if already_stored || already_queued {
            continue;
        }

        promoted.push(NewTodo {
            origin_note_id: Some(note_id),
            ..NewTodo::new(segment_todo_text(segment))
        });
    }

    promoted
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTodo {
    #[serde(default)]
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    is_urgent: bool,
    status: Option<String>,
    due_date: Option<String>,
    assignee_id: Option<Value>,
    origin_note_id: Option<Value>,
}

fn legacy_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn legacy_date(value: Option<&str>) -> Option<Date> {
    let value = value?.trim();
    let day = value.get(..10).unwrap_or(value);
    Date::parse(day, DATE_FORMAT).ok()
}

/// Parses a legacy todo list stored as JSON text.
///
/// Accepts a JSON array, an array that was stringified a second time, or
/// `null`. `status` and `completed` are reconciled into one status. Items
/// with blank text are dropped; IDs that are not integers are dropped.
pub fn parse_legacy_todos(raw: &str) -> serde_json::Result<Vec<NewTodo>> {
    let mut value: Value = serde_json::from_str(raw)?;
    for _ in 0..MAX_ENCODING_DEPTH {
        match value {
            Value::String(inner) => value = serde_json::from_str(&inner)?,
            _ => break,
        }
    }

    if value.is_null() {
        return Ok(Vec::new());
    }

    let items: Vec<LegacyTodo> = serde_json::from_value(value)?;
    Ok(items
        .into_iter()
        .filter(|item| !item.text.trim().is_empty())
        .map(|item| NewTodo {
            status: TodoStatus::reconcile(item.status.as_deref(), item.completed),
            is_urgent: item.is_urgent,
            due_date: legacy_date(item.due_date.as_deref()),
            assignee_id: legacy_id(item.assignee_id.as_ref()).map(UserId::new),
            origin_note_id: legacy_id(item.origin_note_id.as_ref()).map(NoteId::new),
            text: item.text.trim().to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IdeaId, SegmentType, TodoBuilder, TodoId};
    use time::macros::date;

    fn minute_with(segments: &[(SegmentType, &str, &str)]) -> CallMinute {
        let mut minute = CallMinute::new("2024-04-01", "");
        for (kind, topic, comments) in segments {
            minute.push(Segment::new(kind.clone(), *topic, *comments));
        }
        minute
    }

    fn stored(text: &str, origin: Option<NoteId>) -> Todo {
        TodoBuilder::new()
            .id(TodoId::new(1))
            .idea_id(IdeaId::new(1))
            .text(text)
            .origin_note_id(origin)
            .build()
    }

    #[test]
    fn promoted_todo_text_includes_comments() {
        let minute = minute_with(&[(SegmentType::ToDo, "Follow up", "send pricing")]);
        let promoted = promote_todos(&minute, NoteId::new(1), &[]);

        assert_eq!(promoted[0].text, "Follow up - send pricing");
        assert_eq!(promoted[0].status, TodoStatus::NotStarted);
        assert!(!promoted[0].is_urgent);
    }

    #[test]
    fn existing_todo_from_same_note_blocks_promotion() {
        let minute = minute_with(&[(SegmentType::ToDo, "Follow up", "")]);
        let existing = vec![stored("Follow up - call back", Some(NoteId::new(1)))];

        assert!(promote_todos(&minute, NoteId::new(1), &existing).is_empty());
    }

    #[test]
    fn same_text_from_other_note_does_not_block() {
        let minute = minute_with(&[(SegmentType::ToDo, "Follow up", "")]);
        let existing = vec![
            stored("Follow up", Some(NoteId::new(2))),
            stored("Follow up", None),
        ];

        assert_eq!(promote_todos(&minute, NoteId::new(1), &existing).len(), 1);
    }

    #[test]
    fn duplicate_segments_promote_once() {
        let minute = minute_with(&[
            (SegmentType::ToDo, "Book venue", ""),
            (SegmentType::ToDo, "Book venue", "again"),
        ]);
        assert_eq!(promote_todos(&minute, NoteId::new(1), &[]).len(), 1);
    }

    #[test]
    fn blank_topics_and_other_types_are_skipped() {
        let minute = minute_with(&[
            (SegmentType::ToDo, "   ", "orphan comment"),
            (SegmentType::Decision, "Go", ""),
        ]);
        assert!(promote_todos(&minute, NoteId::new(1), &[]).is_empty());
    }

    #[test]
    fn legacy_list_parses_plain_array() {
        let raw = r#"[{"text":"Ship","completed":true,"isUrgent":true,"dueDate":"2024-06-01T00:00:00.000Z"}]"#;
        let todos = parse_legacy_todos(raw).unwrap();

        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].status, TodoStatus::Done);
        assert!(todos[0].is_urgent);
        assert_eq!(todos[0].due_date, Some(date!(2024 - 06 - 01)));
    }

    #[test]
    fn legacy_list_unwraps_double_encoding() {
        let inner = r#"[{"text":"Draft","status":"Working","originNoteId":"12","assigneeId":"ck9x"}]"#;
        let raw = serde_json::to_string(inner).unwrap();
        let todos = parse_legacy_todos(&raw).unwrap();

        assert_eq!(todos[0].status, TodoStatus::Working);
        assert_eq!(todos[0].origin_note_id, Some(NoteId::new(12)));
        assert_eq!(todos[0].assignee_id, None);
    }

    #[test]
    fn legacy_list_handles_null_and_blank_items() {
        assert!(parse_legacy_todos("null").unwrap().is_empty());
        let todos = parse_legacy_todos(r#"[{"text":"  "},{"text":"Keep"}]"#).unwrap();
        assert_eq!(todos.len(), 1);
    }

    #[test]
    fn legacy_list_rejects_non_list_json() {
        assert!(parse_legacy_todos(r#"{"text":"x"}"#).is_err());
        assert!(parse_legacy_todos("not json").is_err());
    }
}
