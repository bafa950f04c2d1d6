//! Domain errors surfaced by [`NoteService`](crate::NoteService).
//!
//! Service methods return `anyhow::Result`; callers that need to tell user
//! mistakes from internal failures downcast to [`NoteError`].

use thiserror::Error;

/// Errors caused by the request rather than by storage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteError {
    /// The note body has no visible content.
    #[error("note body cannot be empty")]
    EmptyBody,

    /// A referenced record does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    /// The acting user may not change this note.
    #[error("user {user} is not allowed to modify note {note}")]
    PermissionDenied { user: i64, note: i64 },

    /// A field failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl NoteError {
    pub(crate) fn not_found(kind: &'static str, id: i64) -> Self {
        Self::NotFound { kind, id }
    }
}

/// True when `error` wraps a [`NoteError`].
pub fn is_user_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<NoteError>().is_some()
}
