use std::sync::OnceLock;

use regex::Regex;

fn trigger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([A-Za-z0-9_]*)$").expect("valid trigger regex"))
}

/// An in-progress `@query` directly before the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionTrigger {
    /// Byte offset of the `@`.
    pub start: usize,
    /// Characters typed after the `@`, possibly empty.
    pub query: String,
}

/// Text and caret after a mention was inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub text: String,
    pub caret: usize,
}

/// Detects a mention trigger ending at `caret` (a byte offset into `text`).
///
/// Returns `None` when the text before the caret does not end in
/// `@word-chars`, or when `caret` does not fall on a char boundary.
///
/// # Examples
///
/// ```
/// use idealog::mention::detect_trigger;
///
/// let trigger = detect_trigger("Lunch with @Ja", 14).unwrap();
/// assert_eq!(trigger.query, "Ja");
/// assert_eq!(trigger.start, 11);
///
/// assert!(detect_trigger("Lunch with Ja", 13).is_none());
/// ```
pub fn detect_trigger(text: &str, caret: usize) -> Option<MentionTrigger> {
    let caret = caret.min(text.len());
    if !text.is_char_boundary(caret) {
        return None;
    }

    let captures = trigger_re().captures(&text[..caret])?;
    let whole = captures.get(0)?;
    let query = captures.get(1).map_or("", |m| m.as_str());

    Some(MentionTrigger {
        start: whole.start(),
        query: query.to_string(),
    })
}

/// Replaces the `@partial` of `trigger` with `@name ` and moves the caret
/// past the inserted space.
pub fn apply_selection(text: &str, caret: usize, trigger: &MentionTrigger, name: &str) -> Selection {
    let caret = caret.min(text.len()).max(trigger.start);

    let mut result = String::with_capacity(text.len() + name.len() + 2);
    result.push_str(&text[..trigger.start]);
    result.push('@');
    result.push_str(name);
    result.push(' ');
    let new_caret = result.len();
    result.push_str(&text[caret..]);

    Selection {
        text: result,
        caret: new_caret,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_trigger_yields_empty_query() {
        let trigger = detect_trigger("Hello @", 7).unwrap();
        assert_eq!(trigger.query, "");
        assert_eq!(trigger.start, 6);
    }

    #[test]
    fn only_text_before_caret_is_considered() {
        let text = "@Jan and more";
        let trigger = detect_trigger(text, 4).unwrap();
        assert_eq!(trigger.query, "Jan");
        assert!(detect_trigger(text, text.len()).is_none());
    }

    #[test]
    fn space_after_query_ends_the_trigger() {
        assert!(detect_trigger("@Jane ", 6).is_none());
    }

    #[test]
    fn innermost_at_wins() {
        let trigger = detect_trigger("@@sa", 4).unwrap();
        assert_eq!(trigger.start, 1);
        assert_eq!(trigger.query, "sa");
    }

    #[test]
    fn caret_inside_multibyte_char_is_rejected() {
        let text = "é@";
        assert!(detect_trigger(text, 1).is_none());
        assert!(detect_trigger(text, text.len()).is_some());
    }

    #[test]
    fn caret_past_end_is_clamped() {
        assert!(detect_trigger("@jo", 99).is_some());
    }

    #[test]
    fn selection_replaces_partial_and_appends_space() {
        let text = "Met @Ja yesterday";
        let trigger = detect_trigger(text, 7).unwrap();
        let selection = apply_selection(text, 7, &trigger, "Jane Doe");

        assert_eq!(selection.text, "Met @Jane Doe  yesterday");
        assert_eq!(&selection.text[..selection.caret], "Met @Jane Doe ");
    }

    #[test]
    fn selection_at_end_of_text() {
        let trigger = detect_trigger("cc @", 4).unwrap();
        let selection = apply_selection("cc @", 4, &trigger, "Sam");
        assert_eq!(selection.text, "cc @Sam ");
        assert_eq!(selection.caret, selection.text.len());
    }
}
