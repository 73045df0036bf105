//! Entry segmentation: split the block stream into one span per verb root.
//!
//! A root header is a paragraph that opens with 2 to 6 root letters. Because
//! example sentences and idioms sometimes start with a bare root too, a
//! candidate is only taken as a new entry when the surrounding stem headers
//! agree (see [`segment`]).

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use crate::config::Patterns;
use crate::model::{Flag, FlagKind, Token, TokenKind};
use crate::parser::extract::stems::{contains_stem_header, stem_header};
use crate::parser::trace::{Event, Trace};
use crate::source::Block;

#[derive(Debug, Clone, PartialEq)]
pub struct RootHeader {
    /// The header text up to the end of the root (and index), kind `Root`.
    pub token: Token,
    pub explicit: Option<u32>,
    pub has_delimiter: bool,
}

impl RootHeader {
    pub fn base(&self) -> &str {
        self.token.text().split_whitespace().next().unwrap_or("")
    }

    /// Byte offset where the header tail starts.
    pub fn rest(&self) -> usize {
        self.token.span.end
    }

    fn is_bare(&self) -> bool {
        !self.has_delimiter && self.explicit.is_none()
    }
}

pub fn parse_root_header(text: &str, patterns: &Patterns) -> Option<RootHeader> {
    let lead = text.len() - text.trim_start().len();
    let body = &text[lead..];
    let letters_end = body
        .char_indices()
        .find(|(_, c)| !patterns.is_root_letter(*c))
        .map_or(body.len(), |(i, _)| i);
    if !(2..=6).contains(&body[..letters_end].chars().count()) {
        return None;
    }

    let after = &body[letters_end..];
    let trimmed = after.trim_start();
    let opens = |s: &str| s.starts_with(['(', '[']);

    let (consumed, explicit, has_delimiter) = if trimmed.is_empty() {
        (0, None, false)
    } else if opens(trimmed) {
        (0, None, true)
    } else if trimmed.len() < after.len() && trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        let digits_end = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(trimmed.len());
        let post = &trimmed[digits_end..];
        if !(post.is_empty() || post.starts_with(char::is_whitespace) || opens(post)) {
            return None;
        }
        let index = trimmed[..digits_end].parse::<u32>().ok()?;
        (after.len() - post.len(), Some(index), opens(post.trim_start()))
    } else {
        return None;
    };

    let end = lead + letters_end + consumed;
    Some(RootHeader {
        token: Token {
            kind: TokenKind::Root,
            value: text[..end].to_string(),
            span: 0..end,
        },
        explicit,
        has_delimiter,
    })
}

#[derive(Debug, Clone)]
pub struct EntrySpan {
    pub header: RootHeader,
    /// Half-open block range, header paragraph included.
    pub blocks: Range<usize>,
    /// Unique record key after homonym numbering.
    pub key: String,
    pub homonym: Option<u32>,
    pub flags: Vec<Flag>,
}

#[derive(Debug, Default)]
pub struct Segmentation {
    pub spans: Vec<EntrySpan>,
    /// Blocks before the first accepted header.
    pub preamble: usize,
}

struct Candidate {
    index: usize,
    header: RootHeader,
    /// A stem header appears between this candidate and the next one.
    stem_follows: bool,
}

/// Split `blocks` into entry spans.
///
/// Every candidate is accepted unless it is a bare root, the running span has
/// already seen a stem header, and no stem header follows before the next
/// candidate. Such a line is an example or idiom that happens to start with
/// root letters and stays in the running span. Accepted candidates without a
/// following stem header get `no_stem_header`.
pub fn segment(blocks: &[Block], patterns: &Patterns, trace: &dyn Trace) -> Segmentation {
    let mut candidates: Vec<Candidate> = blocks
        .iter()
        .enumerate()
        .filter_map(|(index, b)| {
            let p = b.as_paragraph()?;
            let header = parse_root_header(&p.text, patterns)?;
            let stem_follows = contains_stem_header(&p.text[header.rest()..], patterns);
            Some(Candidate {
                index,
                header,
                stem_follows,
            })
        })
        .collect();

    for i in 0..candidates.len() {
        let from = candidates[i].index + 1;
        let to = candidates.get(i + 1).map_or(blocks.len(), |c| c.index);
        let found = blocks[from..to]
            .iter()
            .filter_map(Block::as_paragraph)
            .any(|p| stem_header(&p.text, patterns).is_some());
        candidates[i].stem_follows |= found;
    }

    let mut accepted: Vec<(Candidate, Vec<Flag>)> = Vec::new();
    // Rejected lines stay in the running span; their events wait for its key.
    let mut rejected: Vec<(usize, Event)> = Vec::new();
    let mut running_stem_seen = false;
    for c in candidates {
        if !accepted.is_empty() && running_stem_seen && c.header.is_bare() && !c.stem_follows {
            rejected.push((
                accepted.len() - 1,
                Event::RootRejected {
                    index: c.index,
                    text: c.header.token.text().to_string(),
                },
            ));
            continue;
        }
        let mut flags = Vec::new();
        if !c.stem_follows {
            flags.push(Flag::bare(FlagKind::NoStemHeader));
        }
        running_stem_seen = c.stem_follows;
        accepted.push((c, flags));
    }

    let preamble = accepted.first().map_or(blocks.len(), |(c, _)| c.index);
    let ends: Vec<usize> = accepted
        .iter()
        .skip(1)
        .map(|(c, _)| c.index)
        .chain(std::iter::once(blocks.len()))
        .collect();

    let numbering = number_homonyms(&accepted.iter().map(|(c, _)| &c.header).collect::<Vec<_>>());

    let spans: Vec<EntrySpan> = accepted
        .into_iter()
        .zip(ends)
        .zip(numbering)
        .map(|(((c, mut flags), end), (homonym, renumbered))| {
            let base = c.header.base().to_string();
            let key = match homonym {
                Some(n) => format!("{} {}", base, n),
                None => base,
            };
            trace.emit(
                &key,
                Event::RootAccepted {
                    index: c.index,
                    stem_seen: c.stem_follows,
                },
            );
            if let Some(from) = renumbered {
                flags.push(Flag::new(FlagKind::HomonymRenumbered, format!("{} -> {}", from, key)));
            }
            EntrySpan {
                blocks: c.index..end,
                header: c.header,
                key,
                homonym,
                flags,
            }
        })
        .collect();

    for (span, event) in rejected {
        trace.emit(&spans[span].key, event);
    }

    Segmentation { spans, preamble }
}

/// Homonym index per header, plus the original index when it was renumbered.
fn number_homonyms(headers: &[&RootHeader]) -> Vec<(Option<u32>, Option<u32>)> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        groups.entry(h.base()).or_default().push(i);
    }

    let mut out = vec![(None, None); headers.len()];
    for members in groups.values() {
        if members.iter().all(|&i| headers[i].explicit.is_none()) {
            if members.len() > 1 {
                for (n, &i) in members.iter().enumerate() {
                    out[i] = (Some(n as u32 + 1), None);
                }
            }
            continue;
        }

        let mut used = BTreeSet::new();
        let mut pending = Vec::new();
        for &i in members {
            match headers[i].explicit {
                Some(n) if used.insert(n) => out[i] = (Some(n), None),
                _ => pending.push(i),
            }
        }
        let mut next = 1;
        for i in pending {
            while used.contains(&next) {
                next += 1;
            }
            used.insert(next);
            out[i] = (Some(next), headers[i].explicit);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::trace::{CollectTrace, NoTrace};
    use crate::source::{Paragraph, Table};

    fn patterns() -> Patterns {
        Patterns::defaults().unwrap()
    }

    fn p(text: &str) -> Block {
        Block::Paragraph(Paragraph::plain(text))
    }

    fn table() -> Block {
        Block::Table(Table::default())
    }

    fn keys(s: &Segmentation) -> Vec<&str> {
        s.spans.iter().map(|e| e.key.as_str()).collect()
    }

    #[test]
    fn header_shapes() {
        let pt = patterns();
        let h = parse_root_header("dyq (< Arab. dqq)", &pt).unwrap();
        assert_eq!(h.base(), "dyq");
        assert!(h.has_delimiter);
        assert_eq!(h.rest(), 3);

        let h = parse_root_header("dyq 2", &pt).unwrap();
        assert_eq!(h.explicit, Some(2));
        assert_eq!(h.token.kind, TokenKind::Root);
        assert_eq!(h.token.text(), "dyq 2");

        let h = parse_root_header("ʕdl 1 (< Arab.)", &pt).unwrap();
        assert_eq!(h.explicit, Some(1));
        assert!(h.has_delimiter);

        assert!(parse_root_header("ḥlq  ", &pt).unwrap().is_bare());
        assert!(parse_root_header("dyq[< Arab.]", &pt).unwrap().has_delimiter);
    }

    #[test]
    fn non_headers() {
        let pt = patterns();
        assert!(parse_root_header("d", &pt).is_none());
        assert!(parse_root_header("qərfle to break", &pt).is_none());
        assert!(parse_root_header("dyq said", &pt).is_none());
        assert!(parse_root_header("dyq2", &pt).is_none());
        assert!(parse_root_header("dyq 2nd", &pt).is_none());
        assert!(parse_root_header("I: daqle", &pt).is_none());
        assert!(parse_root_header("bcdfghk", &pt).is_none());
    }

    #[test]
    fn scenario_d_explicit_then_unnumbered() {
        let blocks = vec![p("dyq 1 (< Arab.)"), p("I: daqle"), table(), p("dyq (< Syr.)"), p("I: dayiq")];
        let s = segment(&blocks, &patterns(), &NoTrace);
        assert_eq!(keys(&s), ["dyq 1", "dyq 2"]);
        assert!(s.spans.iter().all(|e| e.flags.is_empty()));
        assert_eq!(s.spans[0].blocks, 0..3);
        assert_eq!(s.spans[1].blocks, 3..5);
    }

    #[test]
    fn two_unnumbered_get_indices() {
        let blocks = vec![p("dyq (< a)"), p("I: x"), p("dyq (< b)"), p("I: y")];
        let s = segment(&blocks, &patterns(), &NoTrace);
        assert_eq!(keys(&s), ["dyq 1", "dyq 2"]);
        assert_eq!(s.spans[1].homonym, Some(2));
    }

    #[test]
    fn segmentation_events_use_numbered_key() {
        let trace = CollectTrace::default();
        let blocks = vec![p("dyq (< a)"), p("I: x"), p("dyq (< b)"), p("I: y"), table(), p("dyq")];
        let s = segment(&blocks, &patterns(), &trace);
        assert_eq!(keys(&s), ["dyq 1", "dyq 2"]);
        assert!(trace.for_root("dyq").is_empty());
        assert_eq!(trace.for_root("dyq 1"), [Event::RootAccepted { index: 0, stem_seen: true }]);
        let second = trace.for_root("dyq 2");
        assert_eq!(second[0], Event::RootAccepted { index: 2, stem_seen: true });
        assert!(matches!(second[1], Event::RootRejected { index: 5, .. }));
    }

    #[test]
    fn single_root_keeps_no_suffix() {
        let blocks = vec![p("intro"), p("qrf (< Arab.)"), p("I: qərfle")];
        let s = segment(&blocks, &patterns(), &NoTrace);
        assert_eq!(keys(&s), ["qrf"]);
        assert_eq!(s.spans[0].homonym, None);
        assert_eq!(s.preamble, 1);
    }

    #[test]
    fn duplicate_explicit_index_is_renumbered() {
        let blocks = vec![p("dyq 1"), p("I: a"), p("dyq 1"), p("I: b"), p("dyq"), p("I: c")];
        let s = segment(&blocks, &patterns(), &NoTrace);
        assert_eq!(keys(&s), ["dyq 1", "dyq 2", "dyq 3"]);
        assert_eq!(s.spans[1].flags[0].kind, FlagKind::HomonymRenumbered);
        assert!(s.spans[2].flags.is_empty());
    }

    #[test]
    fn bare_root_inside_stem_is_rejected() {
        let trace = CollectTrace::default();
        let blocks = vec![p("qrf (< Arab.)"), p("I: qərfle"), table(), p("qrf"), p("ḥlq (< Arab.)"), p("I: ḥalaq")];
        let s = segment(&blocks, &patterns(), &trace);
        assert_eq!(keys(&s), ["qrf", "ḥlq"]);
        assert_eq!(s.spans[0].blocks, 0..4);
        assert!(trace.for_root("qrf").iter().any(|e| matches!(e, Event::RootRejected { index: 3, .. })));
    }

    #[test]
    fn header_without_stem_is_flagged() {
        let blocks = vec![p("qrf (< Arab.)"), p("I: qərfle"), p("ṭlb (< Arab.)"), p("prose only")];
        let s = segment(&blocks, &patterns(), &NoTrace);
        assert_eq!(keys(&s), ["qrf", "ṭlb"]);
        assert_eq!(s.spans[1].flags, vec![Flag::bare(FlagKind::NoStemHeader)]);
    }

    #[test]
    fn inline_stem_counts() {
        let blocks = vec![p("qrf (< Arab.) I: qərfle to break"), table()];
        let s = segment(&blocks, &patterns(), &NoTrace);
        assert!(s.spans[0].flags.is_empty());
    }

    #[test]
    fn first_bare_candidate_is_accepted() {
        let blocks = vec![p("qrf"), p("prose")];
        let s = segment(&blocks, &patterns(), &NoTrace);
        assert_eq!(keys(&s), ["qrf"]);
        assert_eq!(s.spans[0].flags[0].kind, FlagKind::NoStemHeader);
    }
}
