use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Marker identifying which structured template a note body carries.
///
/// Only one template exists today. A body whose `template` field holds
/// anything else is not a structured note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Template {
    #[default]
    #[serde(rename = "call-minute")]
    CallMinute,
}

/// Kind of entry inside a call-minute.
///
/// Labels outside the known set are kept verbatim in `Other` so a minute
/// written by a newer editor still decodes and re-encodes unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SegmentType {
    #[default]
    Insight,
    Agreement,
    ToDo,
    Decision,
    DataPoint,
    Reference,
    Other(String),
}

impl SegmentType {
    /// Known segment types in the order the compose surface offers them.
    pub const ALL: [SegmentType; 6] = [
        Self::Insight,
        Self::Agreement,
        Self::ToDo,
        Self::Decision,
        Self::DataPoint,
        Self::Reference,
    ];

    /// Returns the label used on the wire and on rendered badges.
    pub fn label(&self) -> &str {
        match self {
            Self::Insight => "Insight",
            Self::Agreement => "Agreement",
            Self::ToDo => "To do",
            Self::Decision => "Decision",
            Self::DataPoint => "Data Point",
            Self::Reference => "Reference",
            Self::Other(label) => label,
        }
    }

    /// Parses a known label case-insensitively, accepting `todo`/`to-do`
    /// spellings. Returns `None` for labels outside the known set.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded = fold_label(label);
        Self::ALL
            .into_iter()
            .find(|kind| fold_label(kind.label()) == folded)
    }
}

fn fold_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

impl From<String> for SegmentType {
    fn from(label: String) -> Self {
        Self::from_label(&label).unwrap_or(Self::Other(label))
    }
}

impl From<SegmentType> for String {
    fn from(kind: SegmentType) -> Self {
        match kind {
            SegmentType::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One typed entry in a call-minute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: SegmentType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: String,
}

impl Segment {
    /// Creates a segment of the given type.
    pub fn new(kind: SegmentType, topic: impl Into<String>, comments: impl Into<String>) -> Self {
        Self {
            kind,
            topic: topic.into(),
            comments: comments.into(),
        }
    }

    /// True when neither topic nor comments carry any text.
    pub fn is_blank(&self) -> bool {
        self.topic.trim().is_empty() && self.comments.trim().is_empty()
    }
}

/// Structured meeting log stored inside a note body.
///
/// Segment order is user controlled and preserved, but carries no meaning
/// beyond display.
///
/// # Examples
///
/// ```
/// use idealog::{CallMinute, Segment, SegmentType};
///
/// let mut minute = CallMinute::new("2024-05-02", "Jane Doe, Sam Lee");
/// minute.push(Segment::new(SegmentType::ToDo, "Send deck", ""));
///
/// assert_eq!(minute.attendee_names(), vec!["Jane Doe", "Sam Lee"]);
/// assert_eq!(minute.segments.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMinute {
    pub template: Template,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attendees: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<Segment>,
}

impl CallMinute {
    /// Creates an empty call-minute.
    pub fn new(date: impl Into<String>, attendees: impl Into<String>) -> Self {
        Self {
            template: Template::CallMinute,
            date: date.into(),
            attendees: attendees.into(),
            segments: Vec::new(),
        }
    }

    /// Appends a segment.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Splits the comma-joined attendee list into trimmed, non-empty names.
    pub fn attendee_names(&self) -> Vec<&str> {
        self.attendees
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Iterates over the "To do" segments in order.
    pub fn todo_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.kind == SegmentType::ToDo)
    }

    /// True when there are no attendees and every segment is blank.
    pub fn is_blank(&self) -> bool {
        self.attendee_names().is_empty() && self.segments.iter().all(Segment::is_blank)
    }
}
