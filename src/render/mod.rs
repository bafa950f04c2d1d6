//! Turns a note body into an annotated view.
//!
//! - Call-minutes become one block per segment, in order.
//! - Rich HTML gets URLs linked in its text nodes first, then mention
//!   chips spliced in.
//! - Plain text is split into fragments: mention spans first, then URL
//!   links inside the remaining text.
//!
//! Only entities present in the note's tagged ID sets are highlighted.

mod html;
mod linkify;

pub use html::escape_html;

use serde::Serialize;

use crate::codec::NoteBody;
use crate::config::Config;
use crate::mention::{MentionDirectory, find_mentions};
use crate::models::{CallMinute, Contact, ContactId, MentionTarget, Note, SegmentType, User};

use html::{link_markup, mention_markup, render_text_node};
use linkify::{linkify_text, map_text_nodes};

/// Settings that affect generated markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Prefix for contact detail links. Empty yields relative links.
    pub base_url: String,
}

impl RenderOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Link to a contact's detail page.
    pub fn contact_href(&self, id: ContactId) -> String {
        format!("{}/contacts/{}", self.base_url.trim_end_matches('/'), id)
    }
}

impl From<&Config> for RenderOptions {
    fn from(config: &Config) -> Self {
        Self::new(config.base_url.clone())
    }
}

/// One piece of rendered plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Fragment {
    Text(String),
    Mention { target: MentionTarget, name: String },
    Link { href: String },
}

impl Fragment {
    fn to_html(&self, options: &RenderOptions) -> String {
        match self {
            Self::Text(text) => escape_html(text).replace('\n', "<br>"),
            Self::Mention { target, name } => mention_markup(*target, name, options),
            Self::Link { href } => link_markup(href),
        }
    }
}

/// One call-minute segment as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentBlock {
    pub kind: SegmentType,
    pub topic: Vec<Fragment>,
    /// `None` when the segment has no comments.
    pub comments: Option<Vec<Fragment>>,
}

/// A rendered note body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "kebab-case")]
pub enum RenderedNote {
    Minutes {
        date: String,
        attendees: Vec<String>,
        blocks: Vec<SegmentBlock>,
    },
    Html {
        html: String,
    },
    Parts {
        fragments: Vec<Fragment>,
    },
}

impl RenderedNote {
    /// Groups call-minute blocks by segment type, types in order of first
    /// appearance. Empty for other shapes.
    pub fn group_by_type(&self) -> Vec<(SegmentType, Vec<&SegmentBlock>)> {
        let Self::Minutes { blocks, .. } = self else {
            return Vec::new();
        };

        let mut groups: Vec<(SegmentType, Vec<&SegmentBlock>)> = Vec::new();
        for block in blocks {
            match groups.iter_mut().find(|(kind, _)| *kind == block.kind) {
                Some((_, members)) => members.push(block),
                None => groups.push((block.kind.clone(), vec![block])),
            }
        }
        groups
    }

    /// Serializes the view to an HTML fragment.
    pub fn to_html(&self, options: &RenderOptions) -> String {
        match self {
            Self::Html { html } => html.clone(),
            Self::Parts { fragments } => fragments_to_html(fragments, options),
            Self::Minutes {
                date,
                attendees,
                blocks,
            } => {
                let mut out = String::from(r#"<div class="call-minute">"#);
                if !date.is_empty() || !attendees.is_empty() {
                    out.push_str(r#"<div class="call-minute-meta">"#);
                    if !date.is_empty() {
                        out.push_str(&format!(
                            r#"<span class="call-minute-date">{}</span>"#,
                            escape_html(date)
                        ));
                    }
                    if !attendees.is_empty() {
                        out.push_str(&format!(
                            r#"<span class="call-minute-attendees">{}</span>"#,
                            escape_html(&attendees.join(", "))
                        ));
                    }
                    out.push_str("</div>");
                }
                for block in blocks {
                    let slug: String = block
                        .kind
                        .label()
                        .to_lowercase()
                        .chars()
                        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                        .collect();
                    out.push_str(&format!(
                        r#"<div class="segment segment-{slug}"><span class="segment-badge">{}</span><div class="segment-topic">{}</div>"#,
                        escape_html(block.kind.label()),
                        fragments_to_html(&block.topic, options),
                    ));
                    if let Some(comments) = &block.comments {
                        out.push_str(&format!(
                            r#"<div class="segment-comments">{}</div>"#,
                            fragments_to_html(comments, options)
                        ));
                    }
                    out.push_str("</div>");
                }
                out.push_str("</div>");
                out
            }
        }
    }
}

fn fragments_to_html(fragments: &[Fragment], options: &RenderOptions) -> String {
    fragments.iter().map(|f| f.to_html(options)).collect()
}

/// Splits plain text into mention, link and text fragments.
pub fn render_plain(text: &str, directory: &MentionDirectory) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut cursor = 0;

    for span in find_mentions(text, directory) {
        fragments.extend(linkify_text(&text[cursor..span.start]));
        fragments.push(Fragment::Mention {
            target: span.target,
            name: span.name,
        });
        cursor = span.end;
    }
    fragments.extend(linkify_text(&text[cursor..]));

    fragments
}

/// Links URLs in text nodes, then replaces mentions with chips.
///
/// Tags and the contents of existing anchors are copied unchanged.
pub fn render_html(html: &str, directory: &MentionDirectory, options: &RenderOptions) -> String {
    map_text_nodes(html, |text| render_text_node(text, directory, options))
}

fn render_minutes(minute: &CallMinute, directory: &MentionDirectory) -> RenderedNote {
    let blocks = minute
        .segments
        .iter()
        .map(|segment| SegmentBlock {
            kind: segment.kind.clone(),
            topic: render_plain(&segment.topic, directory),
            comments: (!segment.comments.trim().is_empty())
                .then(|| render_plain(&segment.comments, directory)),
        })
        .collect();

    RenderedNote::Minutes {
        date: minute.date.clone(),
        attendees: minute
            .attendee_names()
            .into_iter()
            .map(String::from)
            .collect(),
        blocks,
    }
}

/// Renders a body against an explicit directory.
pub fn render_body(
    body: &NoteBody,
    directory: &MentionDirectory,
    options: &RenderOptions,
) -> RenderedNote {
    match body {
        NoteBody::CallMinute(minute) => render_minutes(minute, directory),
        NoteBody::RichHtml(html) => RenderedNote::Html {
            html: render_html(html, directory, options),
        },
        NoteBody::PlainText(text) => RenderedNote::Parts {
            fragments: render_plain(text, directory),
        },
    }
}

/// Renders a note, highlighting only the contacts and users it is
/// tagged with.
///
/// # Examples
///
/// ```
/// use idealog::render::{RenderOptions, RenderedNote, render};
/// use idealog::{Contact, ContactId, MentionTarget, NoteBody, NoteBuilder, NoteId, UserId};
///
/// let contacts = vec![Contact::new(ContactId::new(1), "Jane Doe", UserId::new(1))];
/// let note = NoteBuilder::new()
///     .id(NoteId::new(1))
///     .body(NoteBody::PlainText("Great call with @Jane Doe today".to_string()))
///     .tagged([MentionTarget::Contact(ContactId::new(1))].into_iter().collect())
///     .created_by(UserId::new(1))
///     .build();
///
/// let html = render(&note, &contacts, &[], &RenderOptions::default())
///     .to_html(&RenderOptions::default());
/// assert!(html.contains(r#"class="mention mention-contact""#));
/// assert!(!html.contains("@Jane Doe"));
/// ```
pub fn render(
    note: &Note,
    contacts: &[Contact],
    users: &[User],
    options: &RenderOptions,
) -> RenderedNote {
    let tagged = note.tagged();
    let directory = MentionDirectory::from_people(
        contacts.iter().filter(|c| tagged.contacts.contains(&c.id)),
        users.iter().filter(|u| tagged.users.contains(&u.id)),
    );
    render_body(note.body(), &directory, options)
}
