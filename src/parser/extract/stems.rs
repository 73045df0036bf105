use std::sync::LazyLock;

use regex::Regex;

use super::cells;
use super::Item;
use crate::config::Patterns;
use crate::model::{Flag, FlagKind, Stem, Token};
use crate::parser::tokens::tokenize_paragraph;
use crate::parser::trace::{Event, Trace};
use crate::source::{Paragraph, Table};

static ROMAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(X|IX|VIII|VII|VI|V|IV|III|II|I)\s*:").unwrap());
static ROMAN_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[IVXLC]+\s*:").unwrap());
static INNER_ROMAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s)\]])(?:X|IX|VIII|VII|VI|V|IV|III|II|I)\s*:\s").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct StemHeader {
    pub label: String,
    /// Byte offset of the text after the label delimiter.
    pub body: usize,
}

/// Roman numeral I–X followed by `:`, or a named stem followed by `:` or end.
pub fn stem_header(text: &str, patterns: &Patterns) -> Option<StemHeader> {
    if let Some(caps) = ROMAN_RE.captures(text) {
        return Some(StemHeader {
            label: caps[1].to_string(),
            body: caps.get(0).map_or(0, |m| m.end()),
        });
    }

    let lead = text.len() - text.trim_start().len();
    let trimmed = &text[lead..];
    for name in patterns.named_stems() {
        let Some(head) = trimmed.get(..name.len()) else {
            continue;
        };
        if patterns.named_stem(head) != Some(name.as_str()) {
            continue;
        }
        let rest = &trimmed[name.len()..];
        let after = rest.trim_start();
        if after.is_empty() {
            return Some(StemHeader {
                label: name.clone(),
                body: text.len(),
            });
        }
        if let Some(body) = after.strip_prefix(':') {
            return Some(StemHeader {
                label: name.clone(),
                body: text.len() - body.len(),
            });
        }
    }
    None
}

/// A paragraph that resembles a stem label without being one of the known set.
pub fn looks_like_stem_label(text: &str, patterns: &Patterns) -> bool {
    if stem_header(text, patterns).is_some() {
        return false;
    }
    if ROMAN_LIKE_RE.is_match(text) {
        return true;
    }
    let lower = text.trim_start().to_lowercase();
    let head = lower.split(':').next().unwrap_or("");
    text.contains(':')
        && head.len() <= 24
        && patterns.named_stems().iter().any(|n| {
            let stub: String = n.to_lowercase().chars().take(6).collect();
            head.starts_with(&stub)
        })
}

/// Whether a stem header begins somewhere inside `text` (a root header line
/// that carries its first stem inline).
pub fn contains_stem_header(text: &str, patterns: &Patterns) -> bool {
    INNER_ROMAN_RE.is_match(text)
        || patterns
            .named_stems()
            .iter()
            .any(|n| text.to_lowercase().contains(&format!("{}:", n.to_lowercase())))
}

#[derive(Debug, Default)]
pub struct StemParse {
    pub stems: Vec<Stem>,
    /// Paragraphs after a stem's tables, by stem index, for idiom extraction.
    pub deferred: Vec<(usize, Paragraph)>,
    /// Prose before the first stem header.
    pub prose: Vec<Paragraph>,
    pub flags: Vec<Flag>,
    pub desync: usize,
}

enum State {
    SeekingStem,
    InStem {
        stem: Stem,
        tables: usize,
        last_conjugation: Option<String>,
    },
}

pub fn parse_stems(items: &[Item], patterns: &Patterns, trace: &dyn Trace, root: &str) -> StemParse {
    let mut out = StemParse::default();
    let mut state = State::SeekingStem;

    for item in items {
        match item {
            Item::Para(p) if p.is_blank() => {}
            Item::Para(p) => {
                if let Some(h) = stem_header(&p.text, patterns) {
                    if let State::InStem { stem, .. } = std::mem::replace(&mut state, State::SeekingStem) {
                        out.stems.push(stem);
                    }
                    let (stem, desync) = open_stem(p, &h, patterns);
                    out.desync += desync as usize;
                    trace.emit(
                        root,
                        Event::StemEntered {
                            label: stem.label.clone(),
                            forms: stem.forms.len(),
                        },
                    );
                    state = State::InStem {
                        stem,
                        tables: 0,
                        last_conjugation: None,
                    };
                    continue;
                }

                if looks_like_stem_label(&p.text, patterns) {
                    out.flags.push(Flag::new(FlagKind::UnknownStemLabel, p.text.trim()));
                    trace.emit(root, Event::UnknownStemLabel { text: p.text.trim().to_string() });
                }

                match &mut state {
                    State::SeekingStem => out.prose.push(Paragraph::clone(p)),
                    State::InStem { tables: 0, stem, .. } => {
                        let t = tokenize_paragraph(p, patterns);
                        out.desync += t.desync as usize;
                        continue_gloss(stem, t.tokens);
                    }
                    State::InStem { .. } => out.deferred.push((out.stems.len(), Paragraph::clone(p))),
                }
            }
            Item::Table(t) => match &mut state {
                State::SeekingStem => {
                    out.flags.push(Flag::new(FlagKind::OrphanTable, format!("{} rows", t.rows.len())));
                    trace.emit(root, Event::OrphanTable { rows: t.rows.len() });
                }
                State::InStem {
                    stem,
                    tables,
                    last_conjugation,
                } => {
                    *tables += 1;
                    read_table(t, stem, last_conjugation, &mut out, patterns, trace, root);
                }
            },
        }
    }

    if let State::InStem { stem, .. } = state {
        out.stems.push(stem);
    }
    out
}

fn read_table(
    table: &Table,
    stem: &mut Stem,
    last_conjugation: &mut Option<String>,
    out: &mut StemParse,
    patterns: &Patterns,
    trace: &dyn Trace,
    root: &str,
) {
    for (i, row) in table.rows.iter().enumerate() {
        let Some((first, rest)) = row.cells.split_first() else {
            continue;
        };
        if rest.is_empty() {
            if !first.text().is_empty() {
                out.flags.push(Flag::new(
                    FlagKind::MalformedRow,
                    format!("stem {} row {}: single cell", stem.label, i + 1),
                ));
            }
            continue;
        }

        let name = first.text().trim().trim_end_matches(':').trim().to_string();
        let name = if name.is_empty() {
            match last_conjugation.clone() {
                Some(prev) => prev,
                None => {
                    out.flags.push(Flag::new(
                        FlagKind::MalformedRow,
                        format!("stem {} row {}: no conjugation type", stem.label, i + 1),
                    ));
                    continue;
                }
            }
        } else {
            name
        };

        let mut examples = Vec::new();
        for cell in rest {
            let tokenized = cells::tokenize_cell(cell, patterns);
            out.desync += tokenized.desync as usize;
            examples.extend(cells::parse_table_cell(&tokenized.tokens));
        }
        trace.emit(
            root,
            Event::TableRow {
                conjugation: name.clone(),
                examples: examples.len(),
            },
        );
        stem.push_examples(&name, examples);
        *last_conjugation = Some(name);
    }
}

fn open_stem(p: &Paragraph, header: &StemHeader, patterns: &Patterns) -> (Stem, bool) {
    let mut stem = Stem::new(header.label.clone());
    let body = p.tail(header.body);
    let (forms, gloss_at) = parse_forms(&body, patterns);
    stem.forms = forms;
    let gloss = tokenize_paragraph(&body.tail(gloss_at), patterns);
    stem.gloss = gloss.tokens;
    (stem, gloss.desync || !p.runs_in_sync())
}

fn continue_gloss(stem: &mut Stem, mut tokens: Vec<Token>) {
    if let Some(first) = tokens.first_mut() {
        if !stem.gloss.is_empty() {
            first.value.insert(0, ' ');
        }
    }
    stem.gloss.extend(tokens);
}

/// Split the stem body into surface forms and the byte offset where the gloss
/// starts. Forms are slash-separated words of form letters; a parenthesized
/// single word right after a form is its variant.
pub fn parse_forms(body: &Paragraph, patterns: &Patterns) -> (Vec<String>, usize) {
    let text = body.text.as_str();
    let mut forms: Vec<String> = Vec::new();
    let mut expect_form = true;
    let mut first_form_at: Option<usize> = None;
    // When some of the body is italic, forms must be too.
    let require_italic = body.runs_in_sync() && body.runs.iter().any(|r| r.italic);

    for (start, chunk) in chunks(text) {
        let core = chunk.trim_end_matches([',', ';', ':']);
        let closes = core.len() != chunk.len();

        if !expect_form && core.starts_with('(') && core.ends_with(')') && core.len() > 2 {
            let inner = &core[1..core.len() - 1];
            let italic_ok = match (first_form_at.and_then(|at| italic_at(body, at)), italic_at(body, start)) {
                (Some(true), Some(false)) => false,
                _ => true,
            };
            if italic_ok && is_form_word(inner, patterns) {
                if let Some(last) = forms.last_mut() {
                    last.push(' ');
                    last.push_str(core);
                }
                if closes {
                    return (forms, start + chunk.len());
                }
                continue;
            }
            return (forms, start);
        }

        if !expect_form && !core.starts_with('/') {
            return (forms, start);
        }

        let parts: Vec<&str> = core.split('/').filter(|s| !s.is_empty()).collect();
        if parts.is_empty() {
            expect_form = true;
            continue;
        }
        if !parts.iter().all(|w| is_form_word(w, patterns)) {
            return (forms, start);
        }
        // Without italics to go by, a lone English function word opens the gloss.
        if forms.is_empty() && !require_italic && parts.len() == 1 && !core.ends_with('/') && is_gloss_word(parts[0]) {
            return (forms, start);
        }
        if require_italic && italic_at(body, start) == Some(false) {
            return (forms, start);
        }
        first_form_at.get_or_insert(start);
        forms.extend(parts.iter().map(|s| s.to_string()));
        expect_form = core.ends_with('/');
        if closes {
            return (forms, start + chunk.len());
        }
    }
    (forms, text.len())
}

fn chunks(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_whitespace().map(move |w| {
        let offset = w.as_ptr() as usize - text.as_ptr() as usize;
        (offset, w)
    })
}

const GLOSS_WORDS: &[&str] = &["a", "an", "be", "become", "do", "get", "make", "one", "the", "to"];

fn is_gloss_word(w: &str) -> bool {
    GLOSS_WORDS.contains(&w.to_lowercase().as_str())
}

fn is_form_word(w: &str, patterns: &Patterns) -> bool {
    !w.is_empty()
        && w.chars().any(|c| c.is_alphabetic())
        && w.chars().all(|c| patterns.is_form_letter(c) || c.to_lowercase().all(|l| patterns.is_form_letter(l)))
}

/// Italic state at a byte offset, `None` when the paragraph has no usable runs.
fn italic_at(p: &Paragraph, offset: usize) -> Option<bool> {
    if p.runs.is_empty() || !p.runs_in_sync() {
        return None;
    }
    let mut pos = 0;
    for r in &p.runs {
        pos += r.text.len();
        if offset < pos {
            return Some(r.italic);
        }
    }
    None
}
