use std::collections::BTreeSet;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, types::FromSql};
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::codec::{BodyKind, NoteBody};
use crate::error::NoteError;
use crate::mention::{MentionCandidate, MentionCandidates, MentionDirectory, resolve_body};
use crate::models::{
    Contact, ContactId, Idea, IdeaId, MentionTarget, Note, NoteBuilder, NoteId, NoteIntent,
    TaggedIds, Todo, TodoBuilder, TodoId, TodoStatus, User, UserId,
};
use crate::notify::{MentionContext, NotificationDispatcher, newly_tagged};
use crate::render::{RenderOptions, RenderedNote, render};
use crate::todos::{DATE_FORMAT, NewTodo, parse_legacy_todos, promote_todos};
use crate::Database;

const NOTE_COLUMNS: &str = "id, body, body_kind, idea_id, contact_id, intent, is_pinned, is_hidden, created_by, created_at, updated_at";
const TODO_COLUMNS: &str = "id, idea_id, text, status, is_urgent, created_at, completed_at, due_date, assignee_id, origin_note_id";

/// Service layer for users, contacts, ideas, notes and todos.
///
/// NoteService owns a Database instance and runs every save flow: empty
/// body guard, mention resolution, one transaction for the note and its
/// derived rows, then best-effort mention emails.
///
/// # Examples
///
/// ```
/// use idealog::{Database, NewNote, NoteBody, NoteService};
///
/// # fn main() -> anyhow::Result<()> {
/// let service = NoteService::new(Database::in_memory()?);
/// let ann = service.create_user("Ann", "ann@example.com")?;
/// let jane = service.create_contact(ann.id, "Jane Doe", None)?;
///
/// let note = service.create_note(
///     ann.id,
///     NewNote::new(NoteBody::PlainText("Great call with @Jane Doe today".to_string())),
/// )?;
/// assert!(note.tagged().contacts.contains(&jane.id));
/// # Ok(())
/// # }
/// ```
pub struct NoteService {
    db: Database,
    notifier: NotificationDispatcher,
}

/// Input for [`NoteService::create_note`].
#[derive(Debug, Clone)]
pub struct NewNote {
    pub body: NoteBody,
    pub idea_id: Option<IdeaId>,
    pub contact_id: Option<ContactId>,
    pub categories: Vec<String>,
    pub intent: NoteIntent,
    pub is_pinned: bool,
    /// Entities picked in the mention popup. Merged with the mentions
    /// resolved from the body.
    pub tagged: TaggedIds,
}

impl NewNote {
    pub fn new(body: NoteBody) -> Self {
        Self {
            body,
            idea_id: None,
            contact_id: None,
            categories: Vec::new(),
            intent: NoteIntent::default(),
            is_pinned: false,
            tagged: TaggedIds::new(),
        }
    }

    pub fn on_idea(mut self, idea_id: IdeaId) -> Self {
        self.idea_id = Some(idea_id);
        self
    }

    pub fn about_contact(mut self, contact_id: ContactId) -> Self {
        self.contact_id = Some(contact_id);
        self
    }
}

/// Changes for [`NoteService::update_note`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub body: Option<NoteBody>,
    pub categories: Option<Vec<String>>,
    pub intent: Option<NoteIntent>,
    /// Replaces the stored tag sets before mentions are re-resolved.
    pub tagged: Option<TaggedIds>,
}

/// Sort order for listing notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest notes first (ascending by creation time)
    Ascending,
    /// Newest notes first (descending by creation time)
    #[default]
    Descending,
}

/// Filters for [`NoteService::list_notes`].
///
/// Pinned notes always come first; hidden notes are left out unless
/// `include_hidden` is set.
///
/// # Examples
///
/// ```
/// use idealog::{ContactId, ListNotesOptions, MentionTarget};
///
/// let options = ListNotesOptions {
///     mentioning: Some(MentionTarget::Contact(ContactId::new(3))),
///     limit: Some(10),
///     ..Default::default()
/// };
/// assert!(!options.include_hidden);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListNotesOptions {
    pub idea_id: Option<IdeaId>,
    pub contact_id: Option<ContactId>,
    /// Only notes tagged with this entity.
    pub mentioning: Option<MentionTarget>,
    pub include_hidden: bool,
    pub limit: Option<usize>,
    pub order: SortOrder,
}

struct NoteRow {
    id: i64,
    body: String,
    body_kind: String,
    idea_id: Option<i64>,
    contact_id: Option<i64>,
    intent: String,
    is_pinned: bool,
    is_hidden: bool,
    created_by: i64,
    created_at: i64,
    updated_at: i64,
}

struct TodoRow {
    id: i64,
    idea_id: i64,
    text: String,
    status: String,
    is_urgent: bool,
    created_at: i64,
    completed_at: Option<i64>,
    due_date: Option<String>,
    assignee_id: Option<i64>,
    origin_note_id: Option<i64>,
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn timestamp(seconds: i64) -> Result<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp(seconds)?)
}

/// Collects the first column of `sql`, bound to a single id parameter.
fn column<T: FromSql>(conn: &Connection, sql: &str, id: i64) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([id], |row| row.get::<_, T>(0))?;

    let mut values = Vec::new();
    for row_result in rows {
        values.push(row_result?);
    }
    Ok(values)
}

fn exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
    let found = conn
        .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?1"), [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn clean_categories(categories: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
        .map(String::from)
        .collect()
}

fn write_categories(conn: &Connection, note_id: NoteId, categories: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM note_categories WHERE note_id = ?1",
        [note_id.get()],
    )?;
    for (position, name) in categories.iter().enumerate() {
        conn.execute(
            "INSERT INTO note_categories (note_id, position, name) VALUES (?1, ?2, ?3)",
            (note_id.get(), position as i64, name),
        )?;
    }
    Ok(())
}

fn write_tags(conn: &Connection, note_id: NoteId, tagged: &TaggedIds) -> Result<()> {
    conn.execute(
        "DELETE FROM note_contact_tags WHERE note_id = ?1",
        [note_id.get()],
    )?;
    conn.execute(
        "DELETE FROM note_user_tags WHERE note_id = ?1",
        [note_id.get()],
    )?;

    for contact_id in &tagged.contacts {
        conn.execute(
            "INSERT INTO note_contact_tags (note_id, contact_id) VALUES (?1, ?2)",
            (note_id.get(), contact_id.get()),
        )?;
    }
    for user_id in &tagged.users {
        conn.execute(
            "INSERT INTO note_user_tags (note_id, user_id) VALUES (?1, ?2)",
            (note_id.get(), user_id.get()),
        )?;
    }
    Ok(())
}

fn insert_todo(conn: &Connection, idea_id: IdeaId, todo: &NewTodo, now: i64) -> Result<TodoId> {
    let due_date = todo.due_date.map(|d| d.format(DATE_FORMAT)).transpose()?;
    let completed_at = (todo.status == TodoStatus::Done).then_some(now);

    conn.execute(
        "INSERT INTO todos (idea_id, text, status, is_urgent, created_at, completed_at, due_date, assignee_id, origin_note_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        (
            idea_id.get(),
            &todo.text,
            todo.status.as_str(),
            todo.is_urgent,
            now,
            completed_at,
            due_date,
            todo.assignee_id.map(UserId::get),
            todo.origin_note_id.map(NoteId::get),
        ),
    )?;
    Ok(TodoId::new(conn.last_insert_rowid()))
}

fn read_todo_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoRow> {
    Ok(TodoRow {
        id: row.get(0)?,
        idea_id: row.get(1)?,
        text: row.get(2)?,
        status: row.get(3)?,
        is_urgent: row.get(4)?,
        created_at: row.get(5)?,
        completed_at: row.get(6)?,
        due_date: row.get(7)?,
        assignee_id: row.get(8)?,
        origin_note_id: row.get(9)?,
    })
}

fn build_todo(row: TodoRow) -> Result<Todo> {
    let status: TodoStatus = row.status.parse().map_err(anyhow::Error::msg)?;
    let due_date = row
        .due_date
        .map(|d| Date::parse(&d, DATE_FORMAT))
        .transpose()?;

    Ok(TodoBuilder::new()
        .id(TodoId::new(row.id))
        .idea_id(IdeaId::new(row.idea_id))
        .text(row.text)
        .status(status)
        .urgent(row.is_urgent)
        .created_at(timestamp(row.created_at)?)
        .completed_at(row.completed_at.map(timestamp).transpose()?)
        .due_date(due_date)
        .assignee_id(row.assignee_id.map(UserId::new))
        .origin_note_id(row.origin_note_id.map(NoteId::new))
        .build())
}

fn load_todos(conn: &Connection, idea_id: IdeaId) -> Result<Vec<Todo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE idea_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map([idea_id.get()], read_todo_row)?;

    let mut todos = Vec::new();
    for row_result in rows {
        todos.push(build_todo(row_result?)?);
    }
    Ok(todos)
}

fn load_todo(conn: &Connection, id: TodoId) -> Result<Option<Todo>> {
    let row = conn
        .query_row(
            &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"),
            [id.get()],
            read_todo_row,
        )
        .optional()?;
    row.map(build_todo).transpose()
}

fn load_note(conn: &Connection, id: NoteId) -> Result<Option<Note>> {
    let row = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
            [id.get()],
            |row| {
                Ok(NoteRow {
                    id: row.get(0)?,
                    body: row.get(1)?,
                    body_kind: row.get(2)?,
                    idea_id: row.get(3)?,
                    contact_id: row.get(4)?,
                    intent: row.get(5)?,
                    is_pinned: row.get(6)?,
                    is_hidden: row.get(7)?,
                    created_by: row.get(8)?,
                    created_at: row.get(9)?,
                    updated_at: row.get(10)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let categories: Vec<String> = column(
        conn,
        "SELECT name FROM note_categories WHERE note_id = ?1 ORDER BY position",
        row.id,
    )?;
    let contact_ids: Vec<i64> = column(
        conn,
        "SELECT contact_id FROM note_contact_tags WHERE note_id = ?1",
        row.id,
    )?;
    let user_ids: Vec<i64> = column(
        conn,
        "SELECT user_id FROM note_user_tags WHERE note_id = ?1",
        row.id,
    )?;

    let tagged = contact_ids
        .into_iter()
        .map(|id| MentionTarget::Contact(ContactId::new(id)))
        .chain(
            user_ids
                .into_iter()
                .map(|id| MentionTarget::User(UserId::new(id))),
        )
        .collect();

    let kind: BodyKind = row.body_kind.parse().map_err(anyhow::Error::msg)?;
    let intent: NoteIntent = row.intent.parse().map_err(anyhow::Error::msg)?;

    let note = NoteBuilder::new()
        .id(NoteId::new(row.id))
        .body(NoteBody::from_stored(kind, row.body))
        .idea_id(row.idea_id.map(IdeaId::new))
        .contact_id(row.contact_id.map(ContactId::new))
        .tagged(tagged)
        .categories(categories)
        .intent(intent)
        .pinned(row.is_pinned)
        .hidden(row.is_hidden)
        .created_by(UserId::new(row.created_by))
        .created_at(timestamp(row.created_at)?)
        .updated_at(timestamp(row.updated_at)?)
        .build();

    Ok(Some(note))
}

impl NoteService {
    /// Creates a service that logs mention emails instead of sending them.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            notifier: NotificationDispatcher::default(),
        }
    }

    /// Replaces the mention notifier.
    pub fn with_notifier(mut self, notifier: NotificationDispatcher) -> Self {
        self.notifier = notifier;
        self
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ---- people and ideas ----

    pub fn create_user(&self, name: &str, email: &str) -> Result<User> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(NoteError::InvalidInput("user name cannot be empty".to_string()).into());
        }
        if !email.contains('@') {
            return Err(NoteError::InvalidInput(format!("invalid email address: {email}")).into());
        }

        let conn = self.db.connection();
        let taken = conn
            .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |_| Ok(()))
            .optional()?
            .is_some();
        if taken {
            return Err(NoteError::InvalidInput(format!("email already registered: {email}")).into());
        }

        conn.execute(
            "INSERT INTO users (name, email) VALUES (?1, ?2)",
            (name, email),
        )
        .context("Failed to insert user")?;

        Ok(User::new(UserId::new(conn.last_insert_rowid()), name, email))
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let user = self
            .db
            .connection()
            .query_row(
                "SELECT name, email FROM users WHERE id = ?1",
                [id.get()],
                |row| Ok(User::new(id, row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(user)
    }

    fn require_user(&self, id: UserId) -> Result<User> {
        self.get_user(id)?
            .ok_or_else(|| NoteError::not_found("user", id.get()).into())
    }

    pub fn create_contact(&self, owner: UserId, full_name: &str, email: Option<&str>) -> Result<Contact> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(NoteError::InvalidInput("contact name cannot be empty".to_string()).into());
        }
        self.require_user(owner)?;

        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO contacts (full_name, email, owner_id) VALUES (?1, ?2, ?3)",
            (full_name, email, owner.get()),
        )
        .context("Failed to insert contact")?;

        let mut contact = Contact::new(ContactId::new(conn.last_insert_rowid()), full_name, owner);
        contact.email = email.map(String::from);
        Ok(contact)
    }

    pub fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        let contact = self
            .db
            .connection()
            .query_row(
                "SELECT full_name, email, owner_id FROM contacts WHERE id = ?1",
                [id.get()],
                |row| {
                    Ok(Contact {
                        id,
                        full_name: row.get(0)?,
                        email: row.get(1)?,
                        owner_id: UserId::new(row.get(2)?),
                    })
                },
            )
            .optional()?;
        Ok(contact)
    }

    /// Contacts owned by `owner`, in creation order.
    pub fn list_contacts(&self, owner: UserId) -> Result<Vec<Contact>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, full_name, email FROM contacts WHERE owner_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([owner.get()], |row| {
            Ok(Contact {
                id: ContactId::new(row.get(0)?),
                full_name: row.get(1)?,
                email: row.get(2)?,
                owner_id: owner,
            })
        })?;

        let mut contacts = Vec::new();
        for row_result in rows {
            contacts.push(row_result?);
        }
        Ok(contacts)
    }

    pub fn create_idea(&self, owner: UserId, title: &str) -> Result<Idea> {
        let title = title.trim();
        if title.is_empty() {
            return Err(NoteError::InvalidInput("idea title cannot be empty".to_string()).into());
        }
        self.require_user(owner)?;

        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO ideas (title, owner_id, created_at) VALUES (?1, ?2, ?3)",
            (title, owner.get(), now()),
        )
        .context("Failed to insert idea")?;

        Ok(Idea {
            id: IdeaId::new(conn.last_insert_rowid()),
            title: title.to_string(),
            owner_id: owner,
            collaborator_ids: Vec::new(),
        })
    }

    pub fn get_idea(&self, id: IdeaId) -> Result<Option<Idea>> {
        let conn = self.db.connection();
        let row = conn
            .query_row(
                "SELECT title, owner_id FROM ideas WHERE id = ?1",
                [id.get()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let Some((title, owner_id)) = row else {
            return Ok(None);
        };

        let collaborators: Vec<i64> = column(
            conn,
            "SELECT user_id FROM idea_collaborators WHERE idea_id = ?1 ORDER BY rowid",
            id.get(),
        )?;

        Ok(Some(Idea {
            id,
            title,
            owner_id: UserId::new(owner_id),
            collaborator_ids: collaborators.into_iter().map(UserId::new).collect(),
        }))
    }

    fn require_idea(&self, id: IdeaId) -> Result<Idea> {
        self.get_idea(id)?
            .ok_or_else(|| NoteError::not_found("idea", id.get()).into())
    }

    /// Adds `user` as a collaborator. Adding an existing member is a no-op.
    pub fn add_collaborator(&self, idea_id: IdeaId, user: UserId) -> Result<Idea> {
        let idea = self.require_idea(idea_id)?;
        self.require_user(user)?;

        if !idea.has_member(user) {
            self.db.connection().execute(
                "INSERT OR IGNORE INTO idea_collaborators (idea_id, user_id) VALUES (?1, ?2)",
                (idea_id.get(), user.get()),
            )?;
        }
        self.require_idea(idea_id)
    }

    fn members_of(&self, idea: &Idea) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for id in idea.member_ids() {
            if let Some(user) = self.get_user(id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Names that `@` mentions in a note by `author` can resolve to: the
    /// author's contacts, then the idea's members.
    fn mention_directory(&self, author: UserId, idea: Option<&Idea>) -> Result<MentionDirectory> {
        let contacts = self.list_contacts(author)?;
        let users = match idea {
            Some(idea) => self.members_of(idea)?,
            None => Vec::new(),
        };
        Ok(MentionDirectory::from_people(&contacts, &users))
    }

    /// Suggests people for an `@query` typed by `actor`.
    ///
    /// Lists idea members first, then the actor's contacts, each entity
    /// once, capped at `limit`.
    pub fn mention_candidates(
        &self,
        actor: UserId,
        idea_id: Option<IdeaId>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MentionCandidate>> {
        let idea = idea_id.map(|id| self.require_idea(id)).transpose()?;
        let users = match &idea {
            Some(idea) => self.members_of(idea)?,
            None => Vec::new(),
        };
        let contacts = self.list_contacts(actor)?;

        let candidates = MentionCandidates::collect(idea.as_ref(), &users, &contacts);
        Ok(candidates.suggest(query, limit).into_iter().cloned().collect())
    }

    /// Drops tagged IDs that do not refer to stored rows.
    fn retain_existing(&self, tagged: &TaggedIds) -> Result<TaggedIds> {
        let conn = self.db.connection();
        let mut kept = TaggedIds::new();
        for &id in &tagged.contacts {
            if exists(conn, "contacts", id.get())? {
                kept.insert(MentionTarget::Contact(id));
            } else {
                warn!(contact_id = %id, "ignoring tag for unknown contact");
            }
        }
        for &id in &tagged.users {
            if exists(conn, "users", id.get())? {
                kept.insert(MentionTarget::User(id));
            } else {
                warn!(user_id = %id, "ignoring tag for unknown user");
            }
        }
        Ok(kept)
    }

    // ---- notes ----

    /// Saves a new note written by `author`.
    ///
    /// Mentions in the body are resolved and merged with `new.tagged`.
    /// The note, its categories, its tag rows and any todos promoted from
    /// "To do" segments are written in one transaction. Tagged users are
    /// emailed after the commit.
    ///
    /// # Errors
    ///
    /// [`NoteError::EmptyBody`] when the body has no visible content, and
    /// [`NoteError::NotFound`] for an unknown author, idea or contact.
    /// Nothing is written in either case.
    pub fn create_note(&self, author: UserId, new: NewNote) -> Result<Note> {
        if new.body.is_actually_empty() {
            return Err(NoteError::EmptyBody.into());
        }
        let author_user = self.require_user(author)?;
        let idea = new.idea_id.map(|id| self.require_idea(id)).transpose()?;
        if let Some(contact_id) = new.contact_id
            && self.get_contact(contact_id)?.is_none()
        {
            return Err(NoteError::not_found("contact", contact_id.get()).into());
        }

        let directory = self.mention_directory(author, idea.as_ref())?;
        let mut tagged = self.retain_existing(&new.tagged)?;
        tagged.merge(&resolve_body(&new.body, &directory));

        let categories = clean_categories(&new.categories);
        let stored_body = new.body.to_stored()?;
        let timestamp_now = now();

        let note_id = self.db.in_transaction(|conn| {
            conn.execute(
                "INSERT INTO notes (body, body_kind, idea_id, contact_id, intent, is_pinned, is_hidden, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
                (
                    &stored_body,
                    new.body.kind().as_str(),
                    new.idea_id.map(IdeaId::get),
                    new.contact_id.map(ContactId::get),
                    new.intent.as_str(),
                    new.is_pinned,
                    author.get(),
                    timestamp_now,
                ),
            )?;
            let note_id = NoteId::new(conn.last_insert_rowid());

            write_categories(conn, note_id, &categories)?;
            write_tags(conn, note_id, &tagged)?;
            self.promote_into(conn, &new.body, idea.as_ref(), note_id, timestamp_now)?;

            Ok(note_id)
        })?;

        info!(
            note_id = %note_id,
            kind = %new.body.kind(),
            contacts = tagged.contacts.len(),
            users = tagged.users.len(),
            "note created"
        );

        let note = load_note(self.db.connection(), note_id)?
            .ok_or_else(|| anyhow::anyhow!("note {note_id} vanished after insert"))?;

        self.notify_mentions(&note, idea.as_ref(), &author_user, &BTreeSet::new());
        Ok(note)
    }

    fn promote_into(
        &self,
        conn: &Connection,
        body: &NoteBody,
        idea: Option<&Idea>,
        note_id: NoteId,
        now: i64,
    ) -> Result<usize> {
        let (Some(minute), Some(idea)) = (body.as_call_minute(), idea) else {
            return Ok(0);
        };

        let existing = load_todos(conn, idea.id)?;
        let promoted = promote_todos(minute, note_id, &existing);
        for todo in &promoted {
            insert_todo(conn, idea.id, todo, now)?;
        }
        if !promoted.is_empty() {
            debug!(note_id = %note_id, idea_id = %idea.id, count = promoted.len(), "promoted todos");
        }
        Ok(promoted.len())
    }

    fn notify_mentions(
        &self,
        note: &Note,
        idea: Option<&Idea>,
        actor: &User,
        previous: &BTreeSet<UserId>,
    ) {
        let Some(idea) = idea else {
            return;
        };
        let recipients = newly_tagged(previous, &note.tagged().users);
        if recipients.is_empty() {
            return;
        }

        let text = note.body().plain_text();
        let report = self.notifier.dispatch(
            MentionContext {
                idea,
                author: actor,
                text: &text,
            },
            &recipients,
            |id| match self.get_user(id) {
                Ok(user) => user,
                Err(e) => {
                    warn!(user_id = %id, error = %e, "failed to load mentioned user");
                    None
                }
            },
        );
        debug!(
            note_id = %note.id(),
            sent = report.sent.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "mention notifications dispatched"
        );
    }

    /// Retrieves a note by its ID. Returns `None` if it does not exist.
    pub fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        load_note(self.db.connection(), id)
    }

    fn require_note(&self, id: NoteId) -> Result<Note> {
        self.get_note(id)?
            .ok_or_else(|| NoteError::not_found("note", id.get()).into())
    }

    /// Allows the note's author, the idea owner or the contact owner.
    fn authorize(&self, actor: UserId, note: &Note) -> Result<()> {
        if note.created_by() == actor {
            return Ok(());
        }
        if let Some(idea_id) = note.idea_id()
            && let Some(idea) = self.get_idea(idea_id)?
            && idea.owner_id == actor
        {
            return Ok(());
        }
        if let Some(contact_id) = note.contact_id()
            && let Some(contact) = self.get_contact(contact_id)?
            && contact.owner_id == actor
        {
            return Ok(());
        }

        Err(NoteError::PermissionDenied {
            user: actor.get(),
            note: note.id().get(),
        }
        .into())
    }

    /// Edits a note. Users tagged now but not before are emailed.
    ///
    /// # Errors
    ///
    /// [`NoteError::NotFound`], [`NoteError::PermissionDenied`] or
    /// [`NoteError::EmptyBody`]; the note is unchanged in each case.
    pub fn update_note(&self, actor: UserId, id: NoteId, update: NoteUpdate) -> Result<Note> {
        let existing = self.require_note(id)?;
        self.authorize(actor, &existing)?;
        let actor_user = self.require_user(actor)?;

        let body = update.body.unwrap_or_else(|| existing.body().clone());
        if body.is_actually_empty() {
            return Err(NoteError::EmptyBody.into());
        }

        let idea = existing.idea_id().map(|i| self.require_idea(i)).transpose()?;
        let directory = self.mention_directory(existing.created_by(), idea.as_ref())?;

        let base = update.tagged.unwrap_or_else(|| existing.tagged().clone());
        let mut tagged = self.retain_existing(&base)?;
        tagged.merge(&resolve_body(&body, &directory));

        let categories = match update.categories {
            Some(categories) => clean_categories(&categories),
            None => existing.categories().to_vec(),
        };
        let intent = update.intent.unwrap_or(existing.intent());
        let stored_body = body.to_stored()?;
        let timestamp_now = now();

        self.db.in_transaction(|conn| {
            conn.execute(
                "UPDATE notes SET body = ?1, body_kind = ?2, intent = ?3, updated_at = ?4 WHERE id = ?5",
                (
                    &stored_body,
                    body.kind().as_str(),
                    intent.as_str(),
                    timestamp_now,
                    id.get(),
                ),
            )?;
            write_categories(conn, id, &categories)?;
            write_tags(conn, id, &tagged)?;
            self.promote_into(conn, &body, idea.as_ref(), id, timestamp_now)?;
            Ok(())
        })?;

        info!(note_id = %id, "note updated");

        let note = self.require_note(id)?;
        self.notify_mentions(&note, idea.as_ref(), &actor_user, &existing.tagged().users);
        Ok(note)
    }

    /// Deletes a note. Tag rows and categories go with it; promoted todos
    /// stay on the idea with their origin cleared.
    pub fn delete_note(&self, actor: UserId, id: NoteId) -> Result<()> {
        let note = self.require_note(id)?;
        self.authorize(actor, &note)?;

        self.db
            .connection()
            .execute("DELETE FROM notes WHERE id = ?1", [id.get()])?;
        info!(note_id = %id, "note deleted");
        Ok(())
    }

    fn set_flag(&self, actor: UserId, id: NoteId, column: &str, value: bool) -> Result<Note> {
        let note = self.require_note(id)?;
        self.authorize(actor, &note)?;

        self.db.connection().execute(
            &format!("UPDATE notes SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
            (value, now(), id.get()),
        )?;
        self.require_note(id)
    }

    pub fn set_pinned(&self, actor: UserId, id: NoteId, pinned: bool) -> Result<Note> {
        self.set_flag(actor, id, "is_pinned", pinned)
    }

    pub fn set_hidden(&self, actor: UserId, id: NoteId, hidden: bool) -> Result<Note> {
        self.set_flag(actor, id, "is_hidden", hidden)
    }

    /// Lists notes matching `options`, pinned notes first.
    pub fn list_notes(&self, options: ListNotesOptions) -> Result<Vec<Note>> {
        let conn = self.db.connection();

        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<i64> = Vec::new();
        if let Some(idea_id) = options.idea_id {
            clauses.push("idea_id = ?");
            params.push(idea_id.get());
        }
        if let Some(contact_id) = options.contact_id {
            clauses.push("contact_id = ?");
            params.push(contact_id.get());
        }
        match options.mentioning {
            Some(MentionTarget::Contact(id)) => {
                clauses.push("id IN (SELECT note_id FROM note_contact_tags WHERE contact_id = ?)");
                params.push(id.get());
            }
            Some(MentionTarget::User(id)) => {
                clauses.push("id IN (SELECT note_id FROM note_user_tags WHERE user_id = ?)");
                params.push(id.get());
            }
            None => {}
        }
        if !options.include_hidden {
            clauses.push("is_hidden = 0");
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let order_clause = match options.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let limit_clause = options
            .limit
            .map(|limit| format!(" LIMIT {limit}"))
            .unwrap_or_default();

        let query = format!(
            "SELECT id FROM notes{where_clause} ORDER BY is_pinned DESC, created_at {order_clause}, id {order_clause}{limit_clause}"
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            row.get::<_, i64>(0)
        })?;

        let mut ids = Vec::new();
        for row_result in rows {
            ids.push(row_result?);
        }

        let mut notes = Vec::new();
        for id in ids {
            if let Some(note) = load_note(conn, NoteId::new(id))? {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    /// Renders a note, highlighting the entities it is tagged with.
    pub fn render_note(&self, id: NoteId, options: &RenderOptions) -> Result<RenderedNote> {
        let note = self.require_note(id)?;

        let mut contacts = Vec::new();
        for &contact_id in &note.tagged().contacts {
            if let Some(contact) = self.get_contact(contact_id)? {
                contacts.push(contact);
            }
        }
        let mut users = Vec::new();
        for &user_id in &note.tagged().users {
            if let Some(user) = self.get_user(user_id)? {
                users.push(user);
            }
        }

        Ok(render(&note, &contacts, &users, options))
    }

    // ---- todos ----

    pub fn list_todos(&self, idea_id: IdeaId) -> Result<Vec<Todo>> {
        self.require_idea(idea_id)?;
        load_todos(self.db.connection(), idea_id)
    }

    pub fn add_todo(&self, idea_id: IdeaId, todo: NewTodo) -> Result<Todo> {
        if todo.text.trim().is_empty() {
            return Err(NoteError::InvalidInput("todo text cannot be empty".to_string()).into());
        }
        self.require_idea(idea_id)?;

        let conn = self.db.connection();
        let id = insert_todo(conn, idea_id, &todo, now())?;
        load_todo(conn, id)?.ok_or_else(|| anyhow::anyhow!("todo {id} vanished after insert"))
    }

    /// Moves a todo to `status`; entering `Done` stamps the completion
    /// time and leaving it clears the stamp.
    pub fn set_todo_status(&self, id: TodoId, status: TodoStatus) -> Result<Todo> {
        let conn = self.db.connection();
        let mut todo = load_todo(conn, id)?.ok_or_else(|| NoteError::not_found("todo", id.get()))?;

        todo.set_status(status, timestamp(now())?);
        conn.execute(
            "UPDATE todos SET status = ?1, completed_at = ?2 WHERE id = ?3",
            (
                todo.status().as_str(),
                todo.completed_at().map(|t| t.unix_timestamp()),
                id.get(),
            ),
        )?;
        Ok(todo)
    }

    /// Imports a legacy JSON todo list into `idea_id`.
    ///
    /// References to users or notes that no longer exist are dropped.
    pub fn import_legacy_todos(&self, idea_id: IdeaId, raw: &str) -> Result<Vec<Todo>> {
        self.require_idea(idea_id)?;
        let parsed = parse_legacy_todos(raw)
            .map_err(|e| NoteError::InvalidInput(format!("legacy todo list: {e}")))?;

        let conn = self.db.connection();
        let mut cleaned = Vec::with_capacity(parsed.len());
        for mut todo in parsed {
            if let Some(user) = todo.assignee_id
                && !exists(conn, "users", user.get())?
            {
                todo.assignee_id = None;
            }
            if let Some(note) = todo.origin_note_id
                && !exists(conn, "notes", note.get())?
            {
                todo.origin_note_id = None;
            }
            cleaned.push(todo);
        }

        let timestamp_now = now();
        let ids = self.db.in_transaction(|conn| {
            let mut ids = Vec::with_capacity(cleaned.len());
            for todo in &cleaned {
                ids.push(insert_todo(conn, idea_id, todo, timestamp_now)?);
            }
            Ok(ids)
        })?;
        info!(idea_id = %idea_id, count = ids.len(), "imported legacy todos");

        let mut todos = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(todo) = load_todo(conn, id)? {
                todos.push(todo);
            }
        }
        Ok(todos)
    }
}

#[cfg(test)]
#[path = "service/tests.rs"]
mod tests;
