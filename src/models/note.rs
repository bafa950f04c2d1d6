use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use super::{ContactId, IdeaId, NoteId, TaggedIds, UserId};
use crate::codec::NoteBody;

/// Why a note was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteIntent {
    FollowUp,
    ActedUpon,
    #[default]
    Reflection,
    Memoir,
}

impl NoteIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FollowUp => "follow_up",
            Self::ActedUpon => "acted_upon",
            Self::Reflection => "reflection",
            Self::Memoir => "memoir",
        }
    }
}

impl fmt::Display for NoteIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "follow_up" => Ok(Self::FollowUp),
            "acted_upon" => Ok(Self::ActedUpon),
            "reflection" => Ok(Self::Reflection),
            "memoir" => Ok(Self::Memoir),
            other => Err(format!("unknown note intent: {other}")),
        }
    }
}

/// A note attached to an idea, a contact, or both.
///
/// The tagged ID sets record who was mentioned at the last save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: NoteId,
    body: NoteBody,
    idea_id: Option<IdeaId>,
    contact_id: Option<ContactId>,
    tagged: TaggedIds,
    categories: Vec<String>,
    intent: NoteIntent,
    is_pinned: bool,
    is_hidden: bool,
    created_by: UserId,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl Note {
    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn body(&self) -> &NoteBody {
        &self.body
    }

    pub fn idea_id(&self) -> Option<IdeaId> {
        self.idea_id
    }

    pub fn contact_id(&self) -> Option<ContactId> {
        self.contact_id
    }

    /// Returns both tagged ID sets.
    pub fn tagged(&self) -> &TaggedIds {
        &self.tagged
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn intent(&self) -> NoteIntent {
        self.intent
    }

    pub fn is_pinned(&self) -> bool {
        self.is_pinned
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use idealog::{NoteBuilder, NoteBody, NoteId, NoteIntent, UserId};
///
/// let note = NoteBuilder::new()
///     .id(NoteId::new(1))
///     .body(NoteBody::PlainText("Met @Jane Doe".to_string()))
///     .created_by(UserId::new(1))
///     .build();
///
/// assert_eq!(note.intent(), NoteIntent::Reflection);
/// assert!(note.tagged().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    body: Option<NoteBody>,
    idea_id: Option<IdeaId>,
    contact_id: Option<ContactId>,
    tagged: Option<TaggedIds>,
    categories: Option<Vec<String>>,
    intent: Option<NoteIntent>,
    is_pinned: bool,
    is_hidden: bool,
    created_by: Option<UserId>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn body(mut self, body: NoteBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn idea_id(mut self, idea_id: Option<IdeaId>) -> Self {
        self.idea_id = idea_id;
        self
    }

    pub fn contact_id(mut self, contact_id: Option<ContactId>) -> Self {
        self.contact_id = contact_id;
        self
    }

    pub fn tagged(mut self, tagged: TaggedIds) -> Self {
        self.tagged = Some(tagged);
        self
    }

    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn intent(mut self, intent: NoteIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn pinned(mut self, is_pinned: bool) -> Self {
        self.is_pinned = is_pinned;
        self
    }

    pub fn hidden(mut self, is_hidden: bool) -> Self {
        self.is_hidden = is_hidden;
        self
    }

    pub fn created_by(mut self, created_by: UserId) -> Self {
        self.created_by = Some(created_by);
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the `Note`, using defaults for optional fields.
    ///
    /// # Panics
    ///
    /// Panics if `id`, `body` or `created_by` have not been set.
    pub fn build(self) -> Note {
        let now = OffsetDateTime::now_utc();
        Note {
            id: self.id.expect("id is required"),
            body: self.body.expect("body is required"),
            idea_id: self.idea_id,
            contact_id: self.contact_id,
            tagged: self.tagged.unwrap_or_default(),
            categories: self.categories.unwrap_or_default(),
            intent: self.intent.unwrap_or_default(),
            is_pinned: self.is_pinned,
            is_hidden: self.is_hidden,
            created_by: self.created_by.expect("created_by is required"),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MentionTarget;

    #[test]
    fn builder_allows_setting_all_fields() {
        let now = OffsetDateTime::now_utc();
        let tagged: TaggedIds = [MentionTarget::Contact(ContactId::new(3))]
            .into_iter()
            .collect();

        let note = NoteBuilder::new()
            .id(NoteId::new(42))
            .body(NoteBody::PlainText("Complete note".to_string()))
            .idea_id(Some(IdeaId::new(7)))
            .contact_id(Some(ContactId::new(3)))
            .tagged(tagged.clone())
            .categories(vec!["sales".to_string()])
            .intent(NoteIntent::FollowUp)
            .pinned(true)
            .created_by(UserId::new(1))
            .created_at(now)
            .updated_at(now)
            .build();

        assert_eq!(note.id(), NoteId::new(42));
        assert_eq!(note.idea_id(), Some(IdeaId::new(7)));
        assert_eq!(note.tagged(), &tagged);
        assert_eq!(note.categories().to_vec(), vec!["sales".to_string()]);
        assert_eq!(note.intent(), NoteIntent::FollowUp);
        assert!(note.is_pinned());
        assert!(!note.is_hidden());
        assert_eq!(note.created_at(), now);
    }

    #[test]
    fn note_serialization_roundtrip() {
        let note = NoteBuilder::new()
            .id(NoteId::new(1))
            .body(NoteBody::RichHtml("<p>Hi</p>".to_string()))
            .created_by(UserId::new(1))
            .build();

        let json = serde_json::to_string(&note).unwrap();
        let deserialized: Note = serde_json::from_str(&json).unwrap();

        assert_eq!(note, deserialized);
    }

    #[test]
    fn intent_parses_loose_spellings() {
        assert_eq!("follow-up".parse::<NoteIntent>(), Ok(NoteIntent::FollowUp));
        assert_eq!("Memoir".parse::<NoteIntent>(), Ok(NoteIntent::Memoir));
        assert!("diary".parse::<NoteIntent>().is_err());
    }
}
