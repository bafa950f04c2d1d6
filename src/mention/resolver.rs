use super::{MentionDirectory, find_mentions};
use crate::codec::{NoteBody, strip_markup};
use crate::models::TaggedIds;

/// Resolves every `@Name` in `text` to its entity ID.
///
/// A name mentioned several times is recorded once.
pub fn resolve_mentions(text: &str, directory: &MentionDirectory) -> TaggedIds {
    find_mentions(text, directory)
        .into_iter()
        .map(|span| span.target)
        .collect()
}

/// Resolves the mentions in any body shape.
///
/// Rich HTML is resolved over its text content. For call-minutes every
/// segment's topic and comments are scanned, and each attendee whose name
/// matches a directory entry exactly is tagged as well.
pub fn resolve_body(body: &NoteBody, directory: &MentionDirectory) -> TaggedIds {
    let tagged = match body {
        NoteBody::PlainText(text) => resolve_mentions(text, directory),
        NoteBody::RichHtml(html) => resolve_mentions(&strip_markup(html), directory),
        NoteBody::CallMinute(minute) => {
            let mut tagged = TaggedIds::new();
            for segment in &minute.segments {
                tagged.merge(&resolve_mentions(&segment.topic, directory));
                tagged.merge(&resolve_mentions(&segment.comments, directory));
            }
            for name in minute.attendee_names() {
                if let Some(target) = directory.find_by_name(name) {
                    tagged.insert(target);
                }
            }
            tagged
        }
    };

    tracing::debug!(
        contacts = tagged.contacts.len(),
        users = tagged.users.len(),
        "resolved note mentions"
    );
    tagged
}
