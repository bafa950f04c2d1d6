//! `@Name` mentions: trigger detection while composing, span tokenization
//! over saved text, resolution to tagged ID sets, and candidate lookup.
//!
//! Mentions are matched against a [`MentionDirectory`] of known display
//! names. Tokenizing produces explicit byte spans; renderers splice those
//! spans instead of searching and replacing names in the text.

mod candidates;
mod resolver;
mod spans;
mod trigger;

pub use candidates::{MentionCandidate, MentionCandidates};
pub use resolver::{resolve_body, resolve_mentions};
pub use spans::{MentionSpan, find_mentions};
pub use trigger::{MentionTrigger, Selection, apply_selection, detect_trigger};

use crate::models::{Contact, MentionTarget, User};

/// A display name a mention can resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub target: MentionTarget,
}

/// Known display names, in priority order.
///
/// When two entries share a name the one added first wins. Contacts are
/// registered before users by [`MentionDirectory::from_people`].
#[derive(Debug, Clone, Default)]
pub struct MentionDirectory {
    entries: Vec<DirectoryEntry>,
}

impl MentionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory with every contact followed by every user.
    pub fn from_people<'a>(
        contacts: impl IntoIterator<Item = &'a Contact>,
        users: impl IntoIterator<Item = &'a User>,
    ) -> Self {
        let mut directory = Self::new();
        for contact in contacts {
            directory.add(&contact.full_name, MentionTarget::Contact(contact.id));
        }
        for user in users {
            directory.add(&user.name, MentionTarget::User(user.id));
        }
        directory
    }

    /// Registers a name. Blank names are ignored.
    pub fn add(&mut self, name: &str, target: MentionTarget) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.entries.push(DirectoryEntry {
            name: name.to_string(),
            target,
        });
    }

    /// Returns the first target registered under exactly `name`.
    pub fn find_by_name(&self, name: &str) -> Option<MentionTarget> {
        let name = name.trim();
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.target)
    }

    /// Returns the display name registered for `target`.
    pub fn name_of(&self, target: MentionTarget) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.target == target)
            .map(|entry| entry.name.as_str())
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactId, UserId};

    #[test]
    fn contacts_take_priority_over_users_with_same_name() {
        let contacts = vec![Contact::new(ContactId::new(1), "Alex Kim", UserId::new(9))];
        let users = vec![User::new(UserId::new(2), "Alex Kim", "alex@example.com")];

        let directory = MentionDirectory::from_people(&contacts, &users);

        assert_eq!(
            directory.find_by_name("Alex Kim"),
            Some(MentionTarget::Contact(ContactId::new(1)))
        );
        assert_eq!(directory.entries().len(), 2);
    }

    #[test]
    fn blank_names_are_not_registered() {
        let mut directory = MentionDirectory::new();
        directory.add("   ", MentionTarget::User(UserId::new(1)));
        assert!(directory.is_empty());
    }

    #[test]
    fn name_of_returns_registered_display_name() {
        let mut directory = MentionDirectory::new();
        directory.add(" Jane Doe ", MentionTarget::Contact(ContactId::new(4)));
        assert_eq!(
            directory.name_of(MentionTarget::Contact(ContactId::new(4))),
            Some("Jane Doe")
        );
        assert_eq!(directory.name_of(MentionTarget::User(UserId::new(4))), None);
    }
}
