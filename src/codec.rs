//! Note body shapes and the call-minute codec.
//!
//! A note body is persisted as text plus an explicit `BodyKind`
//! discriminant. Shape sniffing is only needed when importing raw text
//! whose kind is unknown.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::models::CallMinute;

fn html_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<[a-z].*>").expect("valid html regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(?:amp|lt|gt|quot|apos|nbsp|#39|#x27);").expect("valid entity regex")
    })
}

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</p>|</div>").expect("valid br regex"))
}

/// Serializes a call-minute to the JSON text stored in a note body.
pub fn encode(payload: &CallMinute) -> serde_json::Result<String> {
    serde_json::to_string(payload)
}

/// Decodes a call-minute from a note body.
///
/// Returns `None` when the body is not JSON, has no `template` marker, or
/// names a template other than `call-minute`. Missing or `null` fields
/// decode as empty, and unknown segment types keep their label.
///
/// # Examples
///
/// ```
/// use idealog::codec::decode;
///
/// let minute = decode(r#"{"template":"call-minute","segments":[]}"#).unwrap();
/// assert!(minute.attendees.is_empty());
///
/// assert!(decode("not json").is_none());
/// assert!(decode(r#"{"segments":[]}"#).is_none());
/// ```
pub fn decode(body: &str) -> Option<CallMinute> {
    serde_json::from_str(body).ok()
}

/// Persisted discriminant for `NoteBody`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyKind {
    Plain,
    Html,
    CallMinute,
}

impl BodyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
            Self::CallMinute => "call-minute",
        }
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "html" => Ok(Self::Html),
            "call-minute" => Ok(Self::CallMinute),
            other => Err(format!("unknown body kind: {other}")),
        }
    }
}

/// The three shapes a note body can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "kebab-case")]
pub enum NoteBody {
    PlainText(String),
    RichHtml(String),
    CallMinute(CallMinute),
}

impl NoteBody {
    /// Classifies raw text of unknown shape.
    ///
    /// A body starting with `{` that mentions `"template"` and decodes as a
    /// call-minute is structured; anything containing an HTML element is
    /// rich text; the rest is plain.
    pub fn sniff(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{')
            && raw.contains("\"template\"")
            && let Some(minute) = decode(raw)
        {
            return Self::CallMinute(minute);
        }

        if html_re().is_match(raw) {
            Self::RichHtml(raw.to_string())
        } else {
            Self::PlainText(raw.to_string())
        }
    }

    /// Rebuilds a body from its persisted parts.
    ///
    /// A stored call-minute that no longer decodes falls back to plain text.
    pub fn from_stored(kind: BodyKind, raw: String) -> Self {
        match kind {
            BodyKind::Plain => Self::PlainText(raw),
            BodyKind::Html => Self::RichHtml(raw),
            BodyKind::CallMinute => match decode(&raw) {
                Some(minute) => Self::CallMinute(minute),
                None => {
                    tracing::warn!("stored call-minute body failed to decode, showing as plain text");
                    Self::PlainText(raw)
                }
            },
        }
    }

    /// Returns the persisted discriminant.
    pub fn kind(&self) -> BodyKind {
        match self {
            Self::PlainText(_) => BodyKind::Plain,
            Self::RichHtml(_) => BodyKind::Html,
            Self::CallMinute(_) => BodyKind::CallMinute,
        }
    }

    /// Returns the text stored in the body column.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        match self {
            Self::PlainText(text) | Self::RichHtml(text) => Ok(text.clone()),
            Self::CallMinute(minute) => encode(minute),
        }
    }

    /// Returns the call-minute payload if this is a structured note.
    pub fn as_call_minute(&self) -> Option<&CallMinute> {
        match self {
            Self::CallMinute(minute) => Some(minute),
            _ => None,
        }
    }

    /// True when the body carries no visible content.
    ///
    /// Whitespace, `<br>`, `&nbsp;` and empty markup do not count.
    pub fn is_actually_empty(&self) -> bool {
        match self {
            Self::PlainText(text) | Self::RichHtml(text) => strip_markup(text).trim().is_empty(),
            Self::CallMinute(minute) => minute.is_blank(),
        }
    }

    /// Flattens the body to readable plain text.
    ///
    /// Used for notification excerpts. Call-minutes flatten to
    /// `Type: topic - comments` lines.
    pub fn plain_text(&self) -> String {
        match self {
            Self::PlainText(text) => text.clone(),
            Self::RichHtml(html) => strip_markup(html).trim().to_string(),
            Self::CallMinute(minute) => minute
                .segments
                .iter()
                .filter(|s| !s.is_blank())
                .map(|s| {
                    if s.comments.trim().is_empty() {
                        format!("{}: {}", s.kind, s.topic.trim())
                    } else {
                        format!("{}: {} - {}", s.kind, s.topic.trim(), s.comments.trim())
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Decodes the handful of entities rich editors emit, in a single pass.
///
/// `&nbsp;` becomes U+00A0, which still counts as whitespace.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    entity_re().replace_all(text, |caps: &Captures<'_>| match &caps[0] {
        "&amp;" => "&",
        "&lt;" => "<",
        "&gt;" => ">",
        "&quot;" => "\"",
        "&nbsp;" => "\u{a0}",
        _ => "'",
    })
}

/// Removes tags and decodes entities.
pub fn strip_markup(html: &str) -> String {
    let with_breaks = line_break_re().replace_all(html, "\n");
    let without_tags = tag_re().replace_all(&with_breaks, "");
    decode_entities(&without_tags).into_owned()
}
