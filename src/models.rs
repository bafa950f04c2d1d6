mod call_minute;
mod ids;
mod note;
mod people;
mod tagged;
mod todo;

pub use call_minute::{CallMinute, Segment, SegmentType, Template};
pub use ids::{ContactId, IdeaId, NoteId, TodoId, UserId};
pub use note::{Note, NoteBuilder, NoteIntent};
pub use people::{Contact, Idea, User};
pub use tagged::{MentionTarget, TaggedIds};
pub use todo::{Todo, TodoBuilder, TodoStatus};
