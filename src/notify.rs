//! Mention notifications.
//!
//! After a note is saved, every user that is tagged now but was not
//! tagged before gets one "you were mentioned" email. Sending is best
//! effort: failures are logged and never reach the caller.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Idea, IdeaId, User, UserId};

/// Default excerpt length in characters.
pub const DEFAULT_EXCERPT_CHARS: usize = 100;

/// Errors a mailer can report.
#[derive(Debug, Error)]
pub enum MailError {
    /// The recipient address was rejected.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The delivery backend failed.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Payload of a mention email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEmail {
    pub to: String,
    pub idea_title: String,
    pub excerpt: String,
    pub sender_name: String,
    pub idea_id: IdeaId,
}

/// Outbound mail seam.
///
/// Implementations must be thread-safe so a dispatcher can be shared.
pub trait MentionMailer: Send + Sync {
    fn send_note_mention(&self, email: &MentionEmail) -> Result<(), MailError>;
}

/// Mailer that only logs what it would send.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl MentionMailer for LogMailer {
    fn send_note_mention(&self, email: &MentionEmail) -> Result<(), MailError> {
        info!(
            to = %email.to,
            idea_id = %email.idea_id,
            sender = %email.sender_name,
            "mention email: {}",
            email.excerpt
        );
        Ok(())
    }
}

/// Users present in `current` but not in `previous`.
pub fn newly_tagged(previous: &BTreeSet<UserId>, current: &BTreeSet<UserId>) -> Vec<UserId> {
    current.difference(previous).copied().collect()
}

/// First `max_chars` characters of `text` with whitespace collapsed.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

/// What a dispatch did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: Vec<UserId>,
    pub failed: Vec<UserId>,
    /// Newly tagged users that were skipped (the author, or unknown ids).
    pub skipped: Vec<UserId>,
}

/// Context of one saved note.
#[derive(Debug, Clone, Copy)]
pub struct MentionContext<'a> {
    pub idea: &'a Idea,
    pub author: &'a User,
    /// Plain text of the note body.
    pub text: &'a str,
}

/// Sends one email per newly tagged user.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn MentionMailer>,
    excerpt_chars: usize,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("excerpt_chars", &self.excerpt_chars)
            .finish_non_exhaustive()
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(LogMailer))
    }
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn MentionMailer>) -> Self {
        Self {
            mailer,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars;
        self
    }

    /// Mails every user in `recipients` except the author.
    ///
    /// `lookup` resolves ids to users; ids it cannot resolve are skipped.
    pub fn dispatch(
        &self,
        context: MentionContext<'_>,
        recipients: &[UserId],
        lookup: impl Fn(UserId) -> Option<User>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let excerpt = excerpt(context.text, self.excerpt_chars);

        for &user_id in recipients {
            if user_id == context.author.id {
                report.skipped.push(user_id);
                continue;
            }
            let Some(user) = lookup(user_id) else {
                warn!(user_id = %user_id, "tagged user not found, skipping mention email");
                report.skipped.push(user_id);
                continue;
            };

            let email = MentionEmail {
                to: user.email,
                idea_title: context.idea.title.clone(),
                excerpt: excerpt.clone(),
                sender_name: context.author.name.clone(),
                idea_id: context.idea.id,
            };
            match self.mailer.send_note_mention(&email) {
                Ok(()) => report.sent.push(user_id),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "failed to send mention email");
                    report.failed.push(user_id);
                }
            }
        }

        report
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    fn users() -> Vec<User> {
        vec![
            User::new(UserId::new(1), "Ann Author", "ann@example.com"),
            User::new(UserId::new(2), "Bo", "bo@example.com"),
            User::new(UserId::new(3), "Cy", "cy@example.com"),
        ]
    }

    fn idea() -> Idea {
        Idea {
            id: IdeaId::new(7),
            title: "Launch".to_string(),
            owner_id: UserId::new(1),
            collaborator_ids: vec![UserId::new(2), UserId::new(3)],
        }
    }

    #[test]
    fn newly_tagged_is_set_difference() {
        let previous: BTreeSet<UserId> = [UserId::new(1), UserId::new(2)].into();
        let current: BTreeSet<UserId> = [UserId::new(2), UserId::new(3)].into();
        assert_eq!(newly_tagged(&previous, &current), vec![UserId::new(3)]);
        assert!(newly_tagged(&current, &current).is_empty());
    }

    #[test]
    fn excerpt_is_capped_by_characters() {
        let long = "é".repeat(150);
        assert_eq!(excerpt(&long, 100).chars().count(), 100);
        assert_eq!(excerpt("a \n  b", 100), "a b");
    }

    #[test]
    fn dispatch_sends_one_email_per_new_user_except_author() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = NotificationDispatcher::new(mailer.clone());
        let users = users();
        let idea = idea();

        let report = dispatcher.dispatch(
            MentionContext {
                idea: &idea,
                author: &users[0],
                text: "Sync with Bo and Cy",
            },
            &[UserId::new(1), UserId::new(2), UserId::new(3)],
            |id| users.iter().find(|u| u.id == id).cloned(),
        );

        assert_eq!(report.sent, vec![UserId::new(2), UserId::new(3)]);
        assert_eq!(report.skipped, vec![UserId::new(1)]);
        assert_eq!(mailer.recipients(), vec!["bo@example.com", "cy@example.com"]);

        let first = mailer.sent.lock().unwrap()[0].clone();
        assert_eq!(first.idea_title, "Launch");
        assert_eq!(first.sender_name, "Ann Author");
        assert_eq!(first.idea_id, IdeaId::new(7));
    }

    #[test]
    fn mail_failures_are_reported_not_raised() {
        let mailer = Arc::new(RecordingMailer::failing_for("bo@example.com"));
        let dispatcher = NotificationDispatcher::new(mailer.clone());
        let users = users();
        let idea = idea();

        let report = dispatcher.dispatch(
            MentionContext {
                idea: &idea,
                author: &users[0],
                text: "hi",
            },
            &[UserId::new(2), UserId::new(3)],
            |id| users.iter().find(|u| u.id == id).cloned(),
        );

        assert_eq!(report.failed, vec![UserId::new(2)]);
        assert_eq!(report.sent, vec![UserId::new(3)]);
    }

    #[test]
    fn unknown_users_are_skipped() {
        let dispatcher = NotificationDispatcher::default().with_excerpt_chars(10);
        let users = users();
        let idea = idea();

        let report = dispatcher.dispatch(
            MentionContext {
                idea: &idea,
                author: &users[0],
                text: "hi",
            },
            &[UserId::new(42)],
            |_| None,
        );
        assert_eq!(report.skipped, vec![UserId::new(42)]);
    }
}
