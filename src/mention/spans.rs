use super::{DirectoryEntry, MentionDirectory};
use crate::models::MentionTarget;

/// A resolved mention over some canonical text.
///
/// `start..end` are byte offsets covering the `@` and the display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionSpan {
    pub start: usize,
    pub end: usize,
    pub target: MentionTarget,
    pub name: String,
}

impl MentionSpan {
    /// Returns the spanned slice of `text`, including the `@`.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Finds every `@Name` occurrence of a directory name in `text`.
///
/// At each `@` the longest registered name that is followed by a word
/// boundary wins, so `@Ann` never claims the start of `@Anna Lee`. An `@`
/// glued to a preceding word character (as in an email address) is not a
/// mention. Spans are returned left to right and never overlap.
///
/// # Examples
///
/// ```
/// use idealog::mention::{MentionDirectory, find_mentions};
/// use idealog::{ContactId, MentionTarget};
///
/// let mut directory = MentionDirectory::new();
/// directory.add("Ann", MentionTarget::Contact(ContactId::new(1)));
/// directory.add("Anna Lee", MentionTarget::Contact(ContactId::new(2)));
///
/// let spans = find_mentions("@Anna Lee and @Ann", &directory);
/// assert_eq!(spans.len(), 2);
/// assert_eq!(spans[0].name, "Anna Lee");
/// assert_eq!(spans[1].name, "Ann");
/// ```
pub fn find_mentions(text: &str, directory: &MentionDirectory) -> Vec<MentionSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('@') {
        let at = pos + offset;
        let after = &text[at + 1..];

        let glued = text[..at].chars().next_back().is_some_and(is_word_char);

        let best = if glued {
            None
        } else {
            directory
                .entries()
                .iter()
                .filter(|entry| {
                    after.starts_with(entry.name.as_str())
                        && !after[entry.name.len()..]
                            .chars()
                            .next()
                            .is_some_and(is_word_char)
                })
                .fold(None, |best: Option<&DirectoryEntry>, entry| match best {
                    Some(current) if current.name.len() >= entry.name.len() => Some(current),
                    _ => Some(entry),
                })
        };

        match best {
            Some(entry) => {
                let end = at + 1 + entry.name.len();
                spans.push(MentionSpan {
                    start: at,
                    end,
                    target: entry.target,
                    name: entry.name.clone(),
                });
                pos = end;
            }
            None => pos = at + 1,
        }
    }

    spans
}
