use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ContactId, UserId};

/// The entity a mention points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum MentionTarget {
    Contact(ContactId),
    User(UserId),
}

/// The contact and user ID sets a note was tagged with.
///
/// Both sets have set semantics: mentioning the same person twice records
/// one ID. They serialize as sorted arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedIds {
    #[serde(default)]
    pub contacts: BTreeSet<ContactId>,
    #[serde(default)]
    pub users: BTreeSet<UserId>,
}

impl TaggedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mention target. Returns `false` if it was already present.
    pub fn insert(&mut self, target: MentionTarget) -> bool {
        match target {
            MentionTarget::Contact(id) => self.contacts.insert(id),
            MentionTarget::User(id) => self.users.insert(id),
        }
    }

    /// Whether the target is tagged.
    pub fn contains(&self, target: MentionTarget) -> bool {
        match target {
            MentionTarget::Contact(id) => self.contacts.contains(&id),
            MentionTarget::User(id) => self.users.contains(&id),
        }
    }

    /// Adds every ID from `other`.
    pub fn merge(&mut self, other: &TaggedIds) {
        self.contacts.extend(other.contacts.iter().copied());
        self.users.extend(other.users.iter().copied());
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.users.is_empty()
    }
}

impl FromIterator<MentionTarget> for TaggedIds {
    fn from_iter<I: IntoIterator<Item = MentionTarget>>(iter: I) -> Self {
        let mut tagged = Self::new();
        for target in iter {
            tagged.insert(target);
        }
        tagged
    }
}
