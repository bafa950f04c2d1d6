//! URL autolinking for plain text fragments and HTML text nodes.

use std::sync::OnceLock;

use regex::Regex;

use super::Fragment;

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid url regex"))
}

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid markup regex"))
}

fn anchor_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^<a(\s|>)").expect("valid anchor regex"))
}

fn anchor_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^</a\s*>").expect("valid anchor regex"))
}

/// Byte ranges of the URLs in `text`, with trailing sentence punctuation
/// left outside the link.
pub(crate) fn url_ranges(text: &str) -> Vec<(usize, usize)> {
    url_re()
        .find_iter(text)
        .filter_map(|m| {
            let trimmed = m
                .as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
            // a bare scheme is not a link
            if trimmed.ends_with("://") {
                None
            } else {
                Some((m.start(), m.start() + trimmed.len()))
            }
        })
        .collect()
}

/// Splits a text fragment into text and link fragments.
pub(crate) fn linkify_text(text: &str) -> Vec<Fragment> {
    let mut parts = Vec::new();
    let mut cursor = 0;

    for (start, end) in url_ranges(text) {
        if start > cursor {
            parts.push(Fragment::Text(text[cursor..start].to_string()));
        }
        parts.push(Fragment::Link {
            href: text[start..end].to_string(),
        });
        cursor = end;
    }
    if cursor < text.len() {
        parts.push(Fragment::Text(text[cursor..].to_string()));
    }

    parts
}

/// Walks an HTML fragment, handing each text node outside of tags and
/// outside existing anchors to `rewrite`. Markup and anchor contents are
/// copied unchanged.
pub(crate) fn map_text_nodes(html: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    let mut anchor_depth = 0usize;
    let mut cursor = 0;

    let mut emit_text = |out: &mut String, text: &str, depth: usize| {
        if depth == 0 {
            out.push_str(&rewrite(text));
        } else {
            out.push_str(text);
        }
    };

    for tag in markup_re().find_iter(html) {
        emit_text(&mut out, &html[cursor..tag.start()], anchor_depth);

        let markup = tag.as_str();
        if anchor_open_re().is_match(markup) {
            anchor_depth += 1;
        } else if anchor_close_re().is_match(markup) {
            anchor_depth = anchor_depth.saturating_sub(1);
        }
        out.push_str(markup);
        cursor = tag.end();
    }
    emit_text(&mut out, &html[cursor..], anchor_depth);

    out
}
