//! Core of a personal idea and contact CRM: `@` mentions in notes,
//! structured call-minute notes, todo promotion, note rendering and
//! mention notifications, on an embedded SQLite store.

pub mod codec;
pub mod compose;
pub mod config;
pub mod db;
pub mod error;
pub mod mention;
pub mod models;
pub mod notify;
pub mod render;
pub mod service;
pub mod todos;
pub mod utils;

pub use codec::{BodyKind, NoteBody};
pub use config::{Config, ConfigBuilder};
pub use db::Database;
pub use error::NoteError;
pub use models::{
    CallMinute, Contact, ContactId, Idea, IdeaId, MentionTarget, Note, NoteBuilder, NoteId,
    NoteIntent, Segment, SegmentType, TaggedIds, Todo, TodoBuilder, TodoId, TodoStatus, User,
    UserId,
};
pub use service::{ListNotesOptions, NewNote, NoteService, NoteUpdate, SortOrder};
