//! Markup helpers shared by the render paths.

use crate::codec::decode_entities;
use crate::mention::{MentionDirectory, find_mentions};
use crate::models::MentionTarget;

use super::RenderOptions;
use super::linkify::url_ranges;

/// Escapes text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Anchor for an autolinked URL.
pub(crate) fn link_markup(href: &str) -> String {
    let href = escape_html(href);
    format!(r#"<a href="{href}" target="_blank" rel="noopener noreferrer">{href}</a>"#)
}

/// Chip for a mention. Contacts link to their detail page; users are
/// identity badges only.
pub(crate) fn mention_markup(target: MentionTarget, name: &str, options: &RenderOptions) -> String {
    let name = escape_html(name);
    match target {
        MentionTarget::Contact(id) => format!(
            r#"<a href="{}" class="mention mention-contact" data-contact-id="{id}">{name}</a>"#,
            escape_html(&options.contact_href(id)),
        ),
        MentionTarget::User(id) => {
            format!(r#"<span class="mention mention-user" data-user-id="{id}">{name}</span>"#)
        }
    }
}

/// Escapes decoded text, replacing its mention spans with chips.
pub(crate) fn splice_mentions(
    text: &str,
    directory: &MentionDirectory,
    options: &RenderOptions,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in find_mentions(text, directory) {
        out.push_str(&escape_html(&text[cursor..span.start]));
        out.push_str(&mention_markup(span.target, &span.name, options));
        cursor = span.end;
    }
    out.push_str(&escape_html(&text[cursor..]));
    out
}

/// Rewrites one HTML text node: URLs become anchors, then mentions become
/// chips in the text between them.
///
/// The node is entity-decoded first, so names and URLs match the same text
/// the resolver sees, and every piece is escaped exactly once on the way out.
pub(crate) fn render_text_node(
    node: &str,
    directory: &MentionDirectory,
    options: &RenderOptions,
) -> String {
    let text = decode_entities(node);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in url_ranges(&text) {
        out.push_str(&splice_mentions(&text[cursor..start], directory, options));
        out.push_str(&link_markup(&text[start..end]));
        cursor = end;
    }
    out.push_str(&splice_mentions(&text[cursor..], directory, options));
    out
}
