//! Compose-session state for writing a note.
//!
//! A [`Draft`] owns the text being typed, the caret, the active `@`
//! trigger and the IDs tagged through the mention popup. Observers
//! subscribe with [`Draft::subscribe`] and receive [`DraftEvent`]s over a
//! channel; subscriptions end when either side is dropped.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::codec::NoteBody;
use crate::mention::{MentionCandidate, MentionTrigger, apply_selection, detect_trigger};
use crate::models::{MentionTarget, TaggedIds};

/// Changes published by a [`Draft`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEvent {
    /// The text or caret changed.
    Edited { text: String, caret: usize },
    /// A trigger opened, changed its query, or closed (`None`).
    Trigger(Option<MentionTrigger>),
    /// An entity was added to the tagged set.
    Tagged(MentionTarget),
    /// The draft was taken or discarded.
    Cleared,
}

/// State of one compose surface.
#[derive(Debug, Default)]
pub struct Draft {
    text: String,
    caret: usize,
    trigger: Option<MentionTrigger>,
    tagged: TaggedIds,
    subscribers: Vec<Sender<DraftEvent>>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing note text, e.g. when editing.
    pub fn with_text(text: impl Into<String>, tagged: TaggedIds) -> Self {
        let text = text.into();
        Self {
            caret: text.len(),
            text,
            tagged,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn trigger(&self) -> Option<&MentionTrigger> {
        self.trigger.as_ref()
    }

    pub fn tagged(&self) -> &TaggedIds {
        &self.tagged
    }

    /// Returns a receiver for every event from now on.
    pub fn subscribe(&mut self) -> Receiver<DraftEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: DraftEvent) {
        // dropped receivers unsubscribe
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_trigger(&mut self, trigger: Option<MentionTrigger>) {
        if self.trigger != trigger {
            self.trigger = trigger.clone();
            self.publish(DraftEvent::Trigger(trigger));
        }
    }

    /// Replaces the text after a keystroke and re-detects the trigger.
    pub fn on_input(&mut self, text: impl Into<String>, caret: usize) -> Option<&MentionTrigger> {
        self.text = text.into();
        self.caret = caret.min(self.text.len());
        self.publish(DraftEvent::Edited {
            text: self.text.clone(),
            caret: self.caret,
        });

        let trigger = detect_trigger(&self.text, self.caret);
        self.set_trigger(trigger);
        self.trigger.as_ref()
    }

    /// Confirms a candidate from the popup.
    ///
    /// Replaces the partial `@query` with `@Name `, moves the caret past
    /// it and tags the candidate. Returns `false` when no trigger is open.
    pub fn select(&mut self, candidate: &MentionCandidate) -> bool {
        let Some(trigger) = self.trigger.clone() else {
            return false;
        };

        let selection = apply_selection(&self.text, self.caret, &trigger, &candidate.name);
        self.text = selection.text;
        self.caret = selection.caret;
        self.publish(DraftEvent::Edited {
            text: self.text.clone(),
            caret: self.caret,
        });
        self.set_trigger(None);
        self.tag(candidate.target);
        true
    }

    /// Adds `target` to the tagged set. Publishes only when it is new.
    pub fn tag(&mut self, target: MentionTarget) -> bool {
        let added = self.tagged.insert(target);
        if added {
            self.publish(DraftEvent::Tagged(target));
        }
        added
    }

    /// The draft as a note body, classified by shape.
    pub fn body(&self) -> NoteBody {
        NoteBody::sniff(&self.text)
    }

    /// True when saving would store an empty note.
    pub fn is_actually_empty(&self) -> bool {
        self.body().is_actually_empty()
    }

    /// Hands out the body and tags and resets the draft.
    ///
    /// Returns `None` (and keeps the draft) when the body is empty.
    pub fn take(&mut self) -> Option<(NoteBody, TaggedIds)> {
        if self.is_actually_empty() {
            return None;
        }
        let body = self.body();
        let tagged = std::mem::take(&mut self.tagged);
        self.text.clear();
        self.caret = 0;
        self.trigger = None;
        self.publish(DraftEvent::Cleared);
        Some((body, tagged))
    }

    /// Drops the text and tags without saving.
    pub fn discard(&mut self) {
        self.text.clear();
        self.caret = 0;
        self.trigger = None;
        self.tagged = TaggedIds::new();
        self.publish(DraftEvent::Cleared);
    }
}
