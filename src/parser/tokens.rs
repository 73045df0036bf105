//! Run tokenizer: formatting runs → classified tokens.
//!
//! Italic text is Turoyo, roman text is translation, and either may be a
//! reference when it looks like a citation. `; , ( )` are isolated as punct so
//! later stages can find example boundaries regardless of formatting.

use crate::config::Patterns;
use crate::model::{Token, TokenKind};
use crate::source::{Paragraph, Run};

const PUNCT: &[char] = &[';', ',', '(', ')'];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tokenized {
    pub tokens: Vec<Token>,
    /// Runs did not match the text; the whole text is one translation token.
    pub desync: bool,
}

enum Piece {
    Space,
    Punct,
    Text(TokenKind),
}

pub fn tokenize_paragraph(p: &Paragraph, patterns: &Patterns) -> Tokenized {
    tokenize(&p.text, &p.runs, patterns)
}

pub fn tokenize(text: &str, runs: &[Run], patterns: &Patterns) -> Tokenized {
    if text.trim().is_empty() {
        return Tokenized::default();
    }

    let implicit;
    let runs = if runs.is_empty() {
        implicit = [Run::plain(text)];
        &implicit[..]
    } else {
        runs
    };

    let joined_len: usize = runs.iter().map(|r| r.text.len()).sum();
    if joined_len != text.len() || !runs_match(text, runs) {
        return Tokenized {
            tokens: vec![Token {
                kind: TokenKind::Translation,
                value: text.to_string(),
                span: 0..text.len(),
            }],
            desync: true,
        };
    }

    let mut tokens: Vec<Token> = Vec::new();
    let mut pending_space: Option<usize> = None;
    let mut pos = 0;

    for run in runs {
        for (range, piece) in split_run(&run.text, run.italic, patterns) {
            let start = pos + range.start;
            let end = pos + range.end;
            match piece {
                Piece::Space => match tokens.last_mut() {
                    Some(last) => last.span.end = end,
                    None => {
                        pending_space.get_or_insert(start);
                    }
                },
                Piece::Punct => {
                    let start = pending_space.take().unwrap_or(start);
                    tokens.push(Token {
                        kind: TokenKind::Punct,
                        value: String::new(),
                        span: start..end,
                    });
                }
                Piece::Text(kind) => {
                    let start = pending_space.take().unwrap_or(start);
                    match tokens.last_mut() {
                        Some(last) if last.kind == kind => last.span.end = end,
                        _ => tokens.push(Token {
                            kind,
                            value: String::new(),
                            span: start..end,
                        }),
                    }
                }
            }
        }
        pos += run.text.len();
    }

    for t in &mut tokens {
        t.value = text[t.span.clone()].to_string();
    }
    Tokenized { tokens, desync: false }
}

fn runs_match(text: &str, runs: &[Run]) -> bool {
    let mut rest = text;
    for r in runs {
        match rest.strip_prefix(r.text.as_str()) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }
    rest.is_empty()
}

/// Split one run at punctuation, classifying each piece. Ranges are byte
/// offsets inside the run text.
fn split_run(text: &str, italic: bool, patterns: &Patterns) -> Vec<(std::ops::Range<usize>, Piece)> {
    let mut out = Vec::new();
    let mut start = 0;
    let push_text = |out: &mut Vec<_>, from: usize, to: usize| {
        if from == to {
            return;
        }
        let s = &text[from..to];
        let piece = if s.trim().is_empty() {
            Piece::Space
        } else {
            Piece::Text(classify(s, italic, patterns))
        };
        out.push((from..to, piece));
    };

    for (i, c) in text.char_indices() {
        if PUNCT.contains(&c) {
            push_text(&mut out, start, i);
            out.push((i..i + c.len_utf8(), Piece::Punct));
            start = i + c.len_utf8();
        }
    }
    push_text(&mut out, start, text.len());
    out
}

pub fn classify(text: &str, italic: bool, patterns: &Patterns) -> TokenKind {
    if italic {
        if patterns.is_citation(text) {
            TokenKind::Reference
        } else {
            TokenKind::Turoyo
        }
    } else if patterns.is_reference(text) {
        TokenKind::Reference
    } else {
        TokenKind::Translation
    }
}

/// Concatenate token values and collapse whitespace.
pub fn join_text(tokens: &[Token]) -> String {
    let raw: String = tokens.iter().map(|t| t.value.as_str()).collect();
    collapse_ws(&raw)
}

pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Patterns {
        Patterns::defaults().unwrap()
    }

    fn kinds(t: &Tokenized) -> Vec<(TokenKind, &str)> {
        t.tokens.iter().map(|t| (t.kind, t.text())).collect()
    }

    fn assert_covers(text: &str, t: &Tokenized) {
        let mut pos = 0;
        for tok in &t.tokens {
            assert_eq!(tok.span.start, pos, "gap or overlap before {:?}", tok);
            assert_eq!(&text[tok.span.clone()], tok.value);
            pos = tok.span.end;
        }
        assert_eq!(pos, text.len());
    }

    #[test]
    fn italic_is_turoyo_roman_is_translation() {
        let runs = vec![Run::italic("qərfle"), Run::plain(" to break")];
        let p = Paragraph::from_runs(runs);
        let t = tokenize_paragraph(&p, &patterns());
        assert_eq!(kinds(&t), vec![(TokenKind::Turoyo, "qərfle"), (TokenKind::Translation, "to break")]);
        assert_covers(&p.text, &t);
        assert!(!t.desync);
    }

    #[test]
    fn punct_and_references() {
        let runs = vec![
            Run::italic("qərfle"),
            Run::plain(" to break; KED 9; "),
            Run::italic("oxelle"),
            Run::plain(" to eat"),
        ];
        let p = Paragraph::from_runs(runs);
        let t = tokenize_paragraph(&p, &patterns());
        assert_eq!(
            kinds(&t),
            vec![
                (TokenKind::Turoyo, "qərfle"),
                (TokenKind::Translation, "to break"),
                (TokenKind::Punct, ";"),
                (TokenKind::Reference, "KED 9"),
                (TokenKind::Punct, ";"),
                (TokenKind::Turoyo, "oxelle"),
                (TokenKind::Translation, "to eat"),
            ]
        );
        assert_covers(&p.text, &t);
    }

    #[test]
    fn italic_citation_is_reference() {
        let p = Paragraph::from_runs(vec![Run::italic("MT 1.5")]);
        let t = tokenize_paragraph(&p, &patterns());
        assert_eq!(kinds(&t), vec![(TokenKind::Reference, "MT 1.5")]);
    }

    #[test]
    fn adjacent_runs_of_same_kind_merge() {
        let p = Paragraph::from_runs(vec![Run::italic("qə"), Run::italic("rfle"), Run::plain(" "), Run::plain("to break")]);
        let t = tokenize_paragraph(&p, &patterns());
        assert_eq!(kinds(&t), vec![(TokenKind::Turoyo, "qərfle"), (TokenKind::Translation, "to break")]);
        assert_covers(&p.text, &t);
    }

    #[test]
    fn leading_space_attaches_forward() {
        let p = Paragraph::from_runs(vec![Run::plain("  "), Run::italic("daqle")]);
        let t = tokenize_paragraph(&p, &patterns());
        assert_eq!(t.tokens.len(), 1);
        assert_eq!(t.tokens[0].span, 0..p.text.len());
    }

    #[test]
    fn unformatted_text_is_one_run() {
        let t = tokenize("to break (a pencil)", &[], &patterns());
        assert!(!t.desync);
        assert_eq!(join_text(&t.tokens), "to break (a pencil)");
        assert_eq!(t.tokens.iter().filter(|t| t.kind == TokenKind::Punct).count(), 2);
        assert_covers("to break (a pencil)", &t);
    }

    #[test]
    fn desync_falls_back_to_single_translation() {
        let t = tokenize("qərfle to break", &[Run::italic("qərfle")], &patterns());
        assert!(t.desync);
        assert_eq!(kinds(&t), vec![(TokenKind::Translation, "qərfle to break")]);
    }

    #[test]
    fn same_length_different_text_is_desync() {
        let t = tokenize("abc", &[Run::plain("xyz")], &patterns());
        assert!(t.desync);
    }

    #[test]
    fn blank_text_has_no_tokens() {
        assert!(tokenize("   ", &[], &patterns()).tokens.is_empty());
    }
}
