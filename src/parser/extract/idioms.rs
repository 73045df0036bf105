//! Idioms: prose after a stem's tables that uses one of the verb's forms.

use std::collections::HashSet;

use crate::config::Patterns;
use crate::model::{Idiom, Stem, Token, TokenKind};
use crate::parser::tokens::{collapse_ws, join_text, tokenize_paragraph};
use crate::parser::trace::{Event, Trace};
use crate::source::Paragraph;

use super::stems::stem_header;

const SEPARATORS: &[char] = &[':', '=', '"', '“', '‘', '«'];
const WORD_BREAKS: &[char] = &[',', ';', ':', '.', '!', '?', '(', ')', '[', ']', '"', '“', '”', '=', '/'];

#[derive(Debug, Default)]
pub struct IdiomParse {
    pub idioms: Vec<Idiom>,
    pub desync: usize,
}

/// Every surface form of the verb, lowercased, with slash alternates and
/// parenthesized variants split out.
pub fn known_forms(stems: &[Stem]) -> HashSet<String> {
    stems
        .iter()
        .flat_map(|s| s.forms.iter())
        .flat_map(|f| words(f))
        .map(|w| w.to_lowercase())
        .collect()
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || WORD_BREAKS.contains(&c))
        .filter(|w| !w.is_empty())
}

fn mentions(text: &str, forms: &HashSet<String>) -> bool {
    words(text).any(|w| forms.contains(&w.to_lowercase()))
}

/// Classify deferred paragraphs (tagged with the index of their stem) as
/// idioms. Paragraphs that do not read as an idiom are dropped.
pub fn extract_idioms(
    deferred: &[(usize, Paragraph)],
    stems: &[Stem],
    patterns: &Patterns,
    trace: &dyn Trace,
    root: &str,
) -> IdiomParse {
    let forms = known_forms(stems);
    let mut out = IdiomParse::default();

    for (index, p) in deferred {
        if p.is_blank() || stem_header(&p.text, patterns).is_some() {
            continue;
        }
        let tokenized = tokenize_paragraph(p, patterns);
        out.desync += tokenized.desync as usize;

        match split_idiom(p, &tokenized.tokens, &forms) {
            Some((phrase, meaning)) => {
                trace.emit(root, Event::IdiomAccepted { phrase: phrase.clone() });
                out.idioms.push(Idiom {
                    stem: stems.get(*index).map(|s| s.label.clone()).unwrap_or_default(),
                    phrase: Some(phrase),
                    meaning: Some(meaning),
                });
            }
            None => trace.emit(
                root,
                Event::IdiomDiscarded {
                    text: p.text.trim().to_string(),
                },
            ),
        }
    }
    out
}

fn split_idiom(p: &Paragraph, tokens: &[Token], forms: &HashSet<String>) -> Option<(String, String)> {
    let hit = tokens
        .iter()
        .position(|t| matches!(t.kind, TokenKind::Turoyo | TokenKind::Translation) && mentions(&t.value, forms))?;

    let (phrase, meaning) = if tokens[hit].kind == TokenKind::Turoyo {
        let mut start = hit;
        while start > 0 && matches!(tokens[start - 1].kind, TokenKind::Turoyo | TokenKind::Punct) {
            start -= 1;
        }
        let split = hit + tokens[hit..].iter().position(|t| t.kind == TokenKind::Translation)?;
        (join_text(&tokens[start..split]), join_text(&tokens[split..]))
    } else {
        let text = p.text.as_str();
        let at = text.find(SEPARATORS)?;
        let phrase = &text[..at];
        if !mentions(phrase, forms) {
            return None;
        }
        (collapse_ws(phrase), collapse_ws(&text[at..]))
    };

    let phrase = clean(&phrase);
    let meaning = clean(&meaning);
    (!phrase.is_empty() && !meaning.is_empty()).then_some((phrase, meaning))
}

fn clean(s: &str) -> String {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '=' | ',' | ';' | '"' | '“' | '”' | '‘' | '’' | '«' | '»'))
        .to_string()
}
