use crate::models::{Contact, Idea, MentionTarget, User};

/// Someone who can be picked from the mention popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionCandidate {
    pub target: MentionTarget,
    pub name: String,
    /// Extra line shown under the name (email when known).
    pub detail: Option<String>,
}

/// The pickable people for one compose surface.
///
/// Built from the idea owner, then idea collaborators, then contacts.
/// Each entity appears once.
#[derive(Debug, Clone, Default)]
pub struct MentionCandidates {
    entries: Vec<MentionCandidate>,
}

impl MentionCandidates {
    /// Collects candidates for a note on `idea` (if any).
    ///
    /// `users` must contain the idea's members; users that are not members
    /// are skipped.
    pub fn collect(idea: Option<&Idea>, users: &[User], contacts: &[Contact]) -> Self {
        let mut candidates = Self::default();

        if let Some(idea) = idea {
            for member_id in idea.member_ids() {
                if let Some(user) = users.iter().find(|u| u.id == member_id) {
                    candidates.push(MentionCandidate {
                        target: MentionTarget::User(user.id),
                        name: user.name.clone(),
                        detail: Some(user.email.clone()),
                    });
                }
            }
        }

        for contact in contacts {
            candidates.push(MentionCandidate {
                target: MentionTarget::Contact(contact.id),
                name: contact.full_name.clone(),
                detail: contact.email.clone(),
            });
        }

        candidates
    }

    fn push(&mut self, candidate: MentionCandidate) {
        if candidate.name.trim().is_empty() {
            return;
        }
        if self.entries.iter().any(|c| c.target == candidate.target) {
            return;
        }
        self.entries.push(candidate);
    }

    /// Returns up to `limit` candidates whose name contains `query`,
    /// ignoring case. An empty query lists the first `limit` candidates.
    ///
    /// # Examples
    ///
    /// ```
    /// use idealog::mention::MentionCandidates;
    /// use idealog::{Contact, ContactId, UserId};
    ///
    /// let contacts = vec![
    ///     Contact::new(ContactId::new(1), "Jane Doe", UserId::new(1)),
    ///     Contact::new(ContactId::new(2), "Sam Lee", UserId::new(1)),
    /// ];
    /// let candidates = MentionCandidates::collect(None, &[], &contacts);
    ///
    /// assert_eq!(candidates.suggest("", 5).len(), 2);
    /// assert_eq!(candidates.suggest("jan", 5)[0].name, "Jane Doe");
    /// ```
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<&MentionCandidate> {
        let needle = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|c| needle.is_empty() || c.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
