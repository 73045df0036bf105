//! Diagnostics channel for the extraction engine.
//!
//! The engine reports its decisions (rejected headers, extended etymologies,
//! split cells, discarded idioms) through a [`Trace`] passed alongside the
//! patterns. The same code path runs whether or not anyone listens.

use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RootAccepted { index: usize, stem_seen: bool },
    RootRejected { index: usize, text: String },
    EtymologyExtended { paragraphs: usize },
    EtymologyUndershot { appended: String },
    EtymologyExhausted { partial: String },
    StemEntered { label: String, forms: usize },
    UnknownStemLabel { text: String },
    TableRow { conjugation: String, examples: usize },
    OrphanTable { rows: usize },
    IdiomAccepted { phrase: String },
    IdiomDiscarded { text: String },
    FormattingDesync { text: String },
}

pub trait Trace: Sync {
    fn emit(&self, root: &str, event: Event);
}

/// Discards every event.
pub struct NoTrace;

impl Trace for NoTrace {
    fn emit(&self, _root: &str, _event: Event) {}
}

/// Forwards events to `tracing` at debug level.
pub struct LogTrace;

impl Trace for LogTrace {
    fn emit(&self, root: &str, event: Event) {
        tracing::debug!(root, ?event, "engine");
    }
}

/// Keeps events in memory.
#[derive(Default)]
pub struct CollectTrace {
    events: Mutex<Vec<(String, Event)>>,
}

impl CollectTrace {
    pub fn events(&self) -> Vec<(String, Event)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn for_root(&self, root: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|(r, _)| r == root)
            .map(|(_, e)| e)
            .collect()
    }
}

impl Trace for CollectTrace {
    fn emit(&self, root: &str, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push((root.to_string(), event));
        }
    }
}
