use serde::{Deserialize, Serialize};

use super::{ContactId, IdeaId, UserId};

/// An account holder: idea owners and collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A person in a user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub full_name: String,
    pub email: Option<String>,
    pub owner_id: UserId,
}

impl Contact {
    pub fn new(id: ContactId, full_name: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: None,
            owner_id,
        }
    }
}

/// An idea with its owner and collaborators.
///
/// Todos are loaded separately through `NoteService::list_todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: IdeaId,
    pub title: String,
    pub owner_id: UserId,
    pub collaborator_ids: Vec<UserId>,
}

impl Idea {
    /// Owner first, then collaborators, without repeats.
    pub fn member_ids(&self) -> Vec<UserId> {
        let mut members = vec![self.owner_id];
        for id in &self.collaborator_ids {
            if !members.contains(id) {
                members.push(*id);
            }
        }
        members
    }

    /// Whether `user` owns or collaborates on the idea.
    pub fn has_member(&self, user: UserId) -> bool {
        self.owner_id == user || self.collaborator_ids.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_ids_lists_owner_first_without_duplicates() {
        let idea = Idea {
            id: IdeaId::new(1),
            title: "Podcast".to_string(),
            owner_id: UserId::new(1),
            collaborator_ids: vec![UserId::new(2), UserId::new(1), UserId::new(3)],
        };

        assert_eq!(
            idea.member_ids(),
            vec![UserId::new(1), UserId::new(2), UserId::new(3)]
        );
        assert!(idea.has_member(UserId::new(3)));
        assert!(!idea.has_member(UserId::new(4)));
    }
}
