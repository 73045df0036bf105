pub mod cells;
pub mod etymology;
pub mod idioms;
pub mod stems;

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::entries::EntrySpan;
use super::trace::{Event, Trace};
use crate::config::Patterns;
use crate::model::{Confidence, Flag, FlagKind, VerbEntry};
use crate::source::{Block, Paragraph, Table};

static SEE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsee\s+([^\s.,;:()\[\]]+)(?:\s+(\d+)\b)?").unwrap());

/// One logical unit handed to the stem parser. Paragraphs are borrowed from
/// the block stream except for a header tail re-routed after the etymology.
#[derive(Debug, Clone)]
pub enum Item<'a> {
    Para(Cow<'a, Paragraph>),
    Table(&'a Table),
}

/// Build the record for one span. All parse state lives in this call.
pub fn assemble_entry(span: &EntrySpan, blocks: &[Block], patterns: &Patterns, trace: &dyn Trace) -> VerbEntry {
    let root = span.key.as_str();
    let Some(header) = blocks.get(span.blocks.start).and_then(Block::as_paragraph) else {
        return header_only(span);
    };
    let tail = header.tail(span.header.rest());
    let body = blocks.get(span.blocks.start + 1..span.blocks.end).unwrap_or(&[]);

    // Prose paragraphs before the first table or stem header, by body index.
    let mut prelude: Vec<(usize, &Paragraph)> = Vec::new();
    for (i, b) in body.iter().enumerate() {
        match b {
            Block::Table(_) => break,
            Block::Paragraph(p) if stems::stem_header(&p.text, patterns).is_some() => break,
            Block::Paragraph(p) if p.is_blank() => {}
            Block::Paragraph(p) => prelude.push((i, p)),
        }
    }
    let following: Vec<&Paragraph> = prelude.iter().map(|(_, p)| *p).collect();
    let ety = etymology::extract_etymology(&tail, &following, patterns, trace, root);
    let skip: Vec<usize> = prelude.iter().take(ety.consumed).map(|(i, _)| *i).collect();

    let mut items: Vec<Item> = Vec::with_capacity(body.len() + 1);
    if let Some(rest) = ety.remainder {
        items.push(Item::Para(Cow::Owned(rest)));
    }
    for (i, b) in body.iter().enumerate() {
        if skip.contains(&i) {
            continue;
        }
        items.push(match b {
            Block::Paragraph(p) => Item::Para(Cow::Borrowed(p)),
            Block::Table(t) => Item::Table(t),
        });
    }

    let parsed = stems::parse_stems(&items, patterns, trace, root);
    let idioms = idioms::extract_idioms(&parsed.deferred, &parsed.stems, patterns, trace, root);

    let cross_reference = ety
        .etymology
        .iter()
        .map(|e| e.raw_text.as_str())
        .chain(parsed.prose.iter().map(|p| p.text.as_str()))
        .chain(idioms.idioms.iter().filter_map(|i| i.meaning.as_deref()))
        .find_map(|text| see_root(text, patterns));

    let mut flags = span.flags.clone();
    flags.extend(ety.flags);
    flags.extend(parsed.flags);
    let desync = parsed.desync + idioms.desync + usize::from(!header.runs_in_sync());
    if desync > 0 {
        trace.emit(
            root,
            Event::FormattingDesync {
                text: header.text.trim().to_string(),
            },
        );
        flags.push(Flag::new(FlagKind::FormattingDesync, format!("{} paragraphs", desync)));
    }

    VerbEntry {
        root: span.key.clone(),
        base_root: span.header.base().to_string(),
        homonym: span.homonym,
        etymology: ety.etymology,
        cross_reference,
        stems: parsed.stems,
        idioms: idioms.idioms,
        confidence: confidence(&flags),
        flags,
    }
}

/// The record left when an entry cannot be built: key and header flags only.
pub fn header_only(span: &EntrySpan) -> VerbEntry {
    let mut flags = span.flags.clone();
    flags.push(Flag::bare(FlagKind::EntryPanicked));
    VerbEntry {
        root: span.key.clone(),
        base_root: span.header.base().to_string(),
        homonym: span.homonym,
        etymology: None,
        cross_reference: None,
        stems: Vec::new(),
        idioms: Vec::new(),
        confidence: Confidence::Low,
        flags,
    }
}

fn confidence(flags: &[Flag]) -> Confidence {
    if flags.iter().any(|f| f.kind.lowers_confidence()) {
        Confidence::Low
    } else {
        Confidence::High
    }
}

/// Root named by the first `see <root>` in `text`.
fn see_root(text: &str, patterns: &Patterns) -> Option<String> {
    SEE_RE.captures_iter(text).find_map(|caps| {
        let word = caps.get(1)?.as_str();
        let n = word.chars().count();
        if !(2..=6).contains(&n) || !word.chars().all(|c| patterns.is_root_letter(c)) {
            return None;
        }
        Some(match caps.get(2) {
            Some(index) => format!("{} {}", word, index.as_str()),
            None => word.to_string(),
        })
    })
}
