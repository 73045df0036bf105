//! Etymology recovery.
//!
//! The field is the delimited text right after the root: `(< Arab. ʕdl ...)`.
//! Authors routinely left it unbalanced or broke it across paragraphs, so the
//! scan keeps a nesting depth and pulls in following paragraphs until the
//! depth returns to zero or the lookahead runs out.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::Patterns;
use crate::model::{Etymology, Etymon, Flag, FlagKind};
use crate::parser::tokens::collapse_ws;
use crate::parser::trace::{Event, Trace};
use crate::source::Paragraph;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\p{Lu}[\p{L}-]*\.)").unwrap());
static BARE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:\d{1,4}[a-z]?|\p{Lu}\p{L}{0,4})$").unwrap());

#[derive(Debug, Default)]
pub struct EtymologyOutcome {
    pub etymology: Option<Etymology>,
    /// Number of `following` paragraphs that belong to the field.
    pub consumed: usize,
    /// Text after the field on the paragraph where it closed.
    pub remainder: Option<Paragraph>,
    pub flags: Vec<Flag>,
}

struct Piece<'a> {
    /// Start of this paragraph's text in the joined buffer.
    at: usize,
    para: &'a Paragraph,
    /// Leading whitespace trimmed off the paragraph.
    offset: usize,
}

/// Recover the etymology from the header tail and the prose paragraphs that
/// follow it (everything before the first table or stem header).
pub fn extract_etymology(
    tail: &Paragraph,
    following: &[&Paragraph],
    patterns: &Patterns,
    trace: &dyn Trace,
    root: &str,
) -> EtymologyOutcome {
    let mut out = EtymologyOutcome::default();

    let (source, rest, mut consumed) = if tail.is_blank() {
        match following.first() {
            Some(p) if starts_field(&p.text, patterns) => (*p, &following[1..], 1),
            _ => return out,
        }
    } else {
        (tail, following, 0)
    };

    let lead = source.text.len() - source.text.trim_start().len();
    let text = &source.text[lead..];

    if let Some(marker) = leading_marker(text, patterns) {
        let raw_text = collapse_ws(text);
        out.etymology = Some(Etymology {
            etymons: vec![Etymon {
                source_label: Some(marker.to_string()),
                raw_text: raw_text.clone(),
            }],
            raw_text,
        });
        out.consumed = consumed;
        return out;
    }
    if !text.starts_with(['(', '[']) {
        out.remainder = Some(tail.clone()).filter(|p| !p.is_blank());
        return out;
    }

    let mut pieces = vec![Piece {
        at: 0,
        para: source,
        offset: lead,
    }];
    let mut joined = text.to_string();
    let mut appended = 0;
    let mut depth = 0;
    let mut scanned = 0;

    let close = loop {
        if let Some(i) = scan(&joined[scanned..], &mut depth, 0) {
            break scanned + i;
        }
        scanned = joined.len();
        if !pull(&mut joined, &mut pieces, rest, &mut appended, patterns.etymology_lookahead) {
            let partial = collapse_ws(&joined);
            trace.emit(root, Event::EtymologyExhausted { partial: partial.clone() });
            out.flags.push(Flag::new(FlagKind::EtymologyTruncated, partial));
            return out;
        }
    };
    if appended > 0 {
        trace.emit(root, Event::EtymologyExtended { paragraphs: appended });
    }

    let mut field = joined[..=close].to_string();
    let mut end = close + 1;

    // A field closed right after a page number or abbreviation, with a
    // stray closer further on, was closed too early.
    let last_word = joined[..close].split_whitespace().last().unwrap_or("");
    if BARE_RE.is_match(last_word) {
        let before = (joined.len(), pieces.len(), appended);
        let mut depth = 0;
        let mut scanned = end;
        let stray = loop {
            if let Some(i) = scan(&joined[scanned..], &mut depth, -1) {
                break Some(scanned + i);
            }
            scanned = joined.len();
            if !pull(&mut joined, &mut pieces, rest, &mut appended, patterns.etymology_lookahead) {
                break None;
            }
        };
        match stray {
            Some(j) => {
                let added = joined[end..j].trim().to_string();
                field = format!("{}{}", &joined[..close], &joined[close + 1..=j]);
                end = j + 1;
                trace.emit(root, Event::EtymologyUndershot { appended: added.clone() });
                out.flags.push(Flag::new(FlagKind::EtymologyExtended, added));
            }
            None => {
                joined.truncate(before.0);
                pieces.truncate(before.1);
                appended = before.2;
            }
        }
    }
    consumed += appended;

    let piece = pieces.iter().rev().find(|p| p.at < end).unwrap_or(&pieces[0]);
    let rest_text = piece.para.tail(piece.offset + (end - piece.at));
    if !rest_text.is_blank() {
        out.remainder = Some(rest_text);
    }
    out.consumed = consumed;

    let inner = field[1..field.len() - 1].trim();
    let raw_text = collapse_ws(inner.strip_prefix('<').unwrap_or(inner).trim());
    if !raw_text.is_empty() {
        out.etymology = Some(Etymology {
            etymons: split_etymons(&raw_text, patterns),
            raw_text,
        });
    }
    out
}

/// Append the next following paragraph to the scan buffer, within the bound.
fn pull<'a>(
    joined: &mut String,
    pieces: &mut Vec<Piece<'a>>,
    rest: &[&'a Paragraph],
    appended: &mut usize,
    lookahead: usize,
) -> bool {
    if *appended >= lookahead {
        return false;
    }
    let Some(next) = rest.get(*appended) else {
        return false;
    };
    let trimmed = next.text.trim_start();
    joined.push(' ');
    pieces.push(Piece {
        at: joined.len(),
        para: next,
        offset: next.text.len() - trimmed.len(),
    });
    joined.push_str(trimmed.trim_end());
    *appended += 1;
    true
}

/// Byte index of the closer that brings `depth` down to `floor`.
fn scan(s: &str, depth: &mut i32, floor: i32) -> Option<usize> {
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => *depth += 1,
            ')' | ']' => {
                *depth -= 1;
                if *depth == floor {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn starts_field(text: &str, patterns: &Patterns) -> bool {
    let t = text.trim_start();
    t.starts_with(['(', '[']) || leading_marker(t, patterns).is_some()
}

/// An alternate marker (`see`, `cf.`, `unknown`) at the start of `text`.
fn leading_marker<'p>(text: &str, patterns: &'p Patterns) -> Option<&'p str> {
    patterns
        .etymology_markers
        .iter()
        .find(|m| {
            text.get(..m.len()).is_some_and(|head| head.eq_ignore_ascii_case(m))
                && !text[m.len()..].starts_with(|c: char| c.is_alphanumeric())
        })
        .map(String::as_str)
}

/// Split at top-level `;` where the next segment starts a new `<` source.
pub fn split_etymons(raw: &str, patterns: &Patterns) -> Vec<Etymon> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ';' if depth == 0 && raw[i + 1..].trim_start().starts_with('<') => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);

    parts
        .into_iter()
        .map(|p| p.trim().trim_start_matches('<').trim())
        .filter(|p| !p.is_empty())
        .map(|p| Etymon {
            source_label: source_label(p, patterns),
            raw_text: p.to_string(),
        })
        .collect()
}

fn source_label(text: &str, patterns: &Patterns) -> Option<String> {
    if let Some(m) = leading_marker(text, patterns) {
        return Some(m.to_string());
    }
    LABEL_RE.captures(text).map(|c| c[1].to_string())
}

/// Net delimiter depth of `text`; zero when balanced.
pub fn depth(text: &str) -> i32 {
    text.chars().fold(0, |d, c| match c {
        '(' | '[' => d + 1,
        ')' | ']' => d - 1,
        _ => d,
    })
}
