use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database ID.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying ID value.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a note.
    NoteId
);

define_id!(
    /// Unique identifier for an idea.
    IdeaId
);

define_id!(
    /// Unique identifier for a contact.
    ContactId
);

define_id!(
    /// Unique identifier for a user account.
    ///
    /// Users are collaborators and idea owners; they are never navigable
    /// from rendered notes, only contacts are.
    UserId
);

define_id!(
    /// Unique identifier for a todo on an idea's checklist.
    TodoId
);
