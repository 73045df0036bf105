//! Table cell example splitter.
//!
//! A conjugation cell holds several examples run together:
//! `qərfle to break; KED 9; oxelle to eat`. The cell is tokenized first and
//! the token stream is cut into [`Example`]s by [`parse_table_cell`].

use crate::config::Patterns;
use crate::model::{Example, Token, TokenKind};
use crate::parser::tokens::{collapse_ws, tokenize_paragraph, Tokenized};
use crate::source::Cell;

/// Tokenize every paragraph of a cell. A paragraph break reads as `;`.
pub fn tokenize_cell(cell: &Cell, patterns: &Patterns) -> Tokenized {
    let mut out = Tokenized::default();
    for p in cell.paragraphs.iter().filter(|p| !p.is_blank()) {
        let t = tokenize_paragraph(p, patterns);
        if !out.tokens.is_empty() && !t.tokens.is_empty() {
            out.tokens.push(Token::new(TokenKind::Punct, "; "));
        }
        out.desync |= t.desync;
        out.tokens.extend(t.tokens);
    }
    out
}

#[derive(Default)]
struct Builder {
    done: Vec<Example>,
    turoyo: String,
    translations: Vec<String>,
    references: Vec<String>,
    open: Option<String>,
    closed: bool,
    /// `(` or `[` held back until we know whether a citation follows.
    bracket: Option<String>,
    after_reference: bool,
}

impl Builder {
    fn seen_translation(&self) -> bool {
        !self.translations.is_empty() || self.open.is_some()
    }

    fn flush(&mut self) {
        if let Some(t) = self.open.take() {
            let t = clean(&t);
            if !t.is_empty() {
                self.translations.push(t);
            }
        }
    }

    fn finish(&mut self) {
        self.flush();
        let example = Example {
            turoyo: clean(&std::mem::take(&mut self.turoyo)),
            translations: std::mem::take(&mut self.translations),
            references: std::mem::take(&mut self.references),
        };
        if !example.is_empty() {
            self.done.push(example);
        }
        self.closed = false;
    }

    fn append(&mut self, value: &str) {
        match self.open.as_mut() {
            Some(open) => open.push_str(value),
            None => self.open = Some(value.to_string()),
        }
    }

    fn turoyo(&mut self, value: &str) {
        if self.closed {
            self.finish();
        }
        if self.seen_translation() {
            self.append(value);
        } else {
            self.turoyo.push_str(value);
        }
    }

    fn translation(&mut self, value: &str) {
        if self.closed {
            self.finish();
        }
        self.append(value);
    }

    fn reference(&mut self, text: &str) {
        self.flush();
        if !text.is_empty() {
            self.references.push(text.to_string());
        }
    }

    fn semicolon(&mut self) {
        self.flush();
        if !self.translations.is_empty() && !self.references.is_empty() {
            self.closed = true;
        }
    }

    fn punct(&mut self, tok: &Token) {
        if self.open.is_some() {
            self.append(&tok.value);
        } else if !self.seen_translation() {
            self.turoyo.push_str(&tok.value);
        } else if !tok.is_punct(',') {
            self.append(&tok.value);
        }
    }
}

fn clean(s: &str) -> String {
    collapse_ws(s).trim_matches(|c: char| c == ',' || c.is_whitespace()).to_string()
}

fn opens(tok: &Token) -> bool {
    tok.is_punct('(') || tok.is_punct('[')
}

fn closes(tok: &Token) -> bool {
    tok.is_punct(')') || tok.is_punct(']')
}

/// Split one cell's tokens into examples.
///
/// An example is closed by a `;` once it has both a translation and a
/// reference; the next Turoyo or translation token then starts a new one.
/// Turoyo text after a translation is an embedded form and joins the
/// translation. Brackets around a citation are dropped with it.
pub fn parse_table_cell(tokens: &[Token]) -> Vec<Example> {
    let mut b = Builder::default();

    for tok in tokens {
        let bracket = b.bracket.take();
        let after_reference = std::mem::take(&mut b.after_reference);

        if tok.kind != TokenKind::Reference {
            if after_reference && closes(tok) {
                continue;
            }
            if let Some(open) = bracket {
                b.punct(&Token::new(TokenKind::Punct, open));
            }
        }

        match tok.kind {
            TokenKind::Turoyo | TokenKind::Root => b.turoyo(&tok.value),
            TokenKind::Translation => b.translation(&tok.value),
            TokenKind::Reference => {
                b.reference(tok.text());
                b.after_reference = true;
            }
            TokenKind::Punct if tok.is_punct(';') => b.semicolon(),
            TokenKind::Punct if opens(tok) => b.bracket = Some(tok.value.clone()),
            TokenKind::Punct => b.punct(tok),
        }
    }
    if let Some(open) = b.bracket.take() {
        b.punct(&Token::new(TokenKind::Punct, open));
    }
    b.finish();
    b.done
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Paragraph, Run};

    fn tok(kind: TokenKind, v: &str) -> Token {
        Token::new(kind, v)
    }

    fn patterns() -> Patterns {
        Patterns::defaults().unwrap()
    }

    #[test]
    fn scenario_a_two_examples() {
        use TokenKind::*;
        let tokens = vec![
            tok(Turoyo, "qərfle"),
            tok(Translation, " to break"),
            tok(Punct, "; "),
            tok(Reference, "KED 9"),
            tok(Punct, "; "),
            tok(Turoyo, "oxelle"),
            tok(Translation, " to eat"),
        ];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[0].turoyo, "qərfle");
        assert_eq!(ex[0].translations, ["to break"]);
        assert_eq!(ex[0].references, ["KED 9"]);
        assert_eq!(ex[1].turoyo, "oxelle");
        assert_eq!(ex[1].translations, ["to eat"]);
        assert!(ex[1].references.is_empty());
    }

    #[test]
    fn scenario_a_from_runs() {
        let cell = Cell {
            paragraphs: vec![Paragraph::from_runs(vec![
                Run::italic("qərfle"),
                Run::plain(" to break; KED 9; "),
                Run::italic("oxelle"),
                Run::plain(" to eat"),
            ])],
        };
        let t = tokenize_cell(&cell, &patterns());
        let ex = parse_table_cell(&t.tokens);
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[0].references, ["KED 9"]);
        assert_eq!(ex[1].turoyo, "oxelle");
    }

    #[test]
    fn embedded_form_joins_translation() {
        use TokenKind::*;
        let tokens = vec![
            tok(Turoyo, "qərfle "),
            tok(Translation, "he broke it, as in "),
            tok(Turoyo, "qərfle ḥaṣe"),
            tok(Translation, " he broke his back"),
        ];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex.len(), 1);
        assert_eq!(ex[0].translations, ["he broke it, as in qərfle ḥaṣe he broke his back"]);
    }

    #[test]
    fn semicolon_without_reference_keeps_translating() {
        use TokenKind::*;
        let tokens = vec![
            tok(Turoyo, "qərfle"),
            tok(Translation, " he broke"),
            tok(Punct, "; "),
            tok(Translation, "he smashed"),
            tok(Punct, "; "),
            tok(Reference, "MT 1.5"),
        ];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex.len(), 1);
        assert_eq!(ex[0].translations, ["he broke", "he smashed"]);
        assert_eq!(ex[0].references, ["MT 1.5"]);
    }

    #[test]
    fn reference_before_translation_still_closes() {
        use TokenKind::*;
        let tokens = vec![
            tok(Turoyo, "qərfle"),
            tok(Reference, " KED 9"),
            tok(Translation, " he broke"),
            tok(Punct, "; "),
            tok(Translation, "another"),
        ];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[1].turoyo, "");
        assert_eq!(ex[1].translations, ["another"]);
    }

    #[test]
    fn paragraph_break_acts_like_semicolon() {
        let cell = Cell {
            paragraphs: vec![
                Paragraph::from_runs(vec![Run::italic("qərfle"), Run::plain(" he broke "), Run::plain("[MT]")]),
                Paragraph::from_runs(vec![Run::italic("qrəfli"), Run::plain(" I broke")]),
            ],
        };
        let t = tokenize_cell(&cell, &patterns());
        let ex = parse_table_cell(&t.tokens);
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[0].references, ["[MT]"]);
        assert_eq!(ex[1].turoyo, "qrəfli");
    }

    #[test]
    fn turoyo_after_unreferenced_semicolon_stays_in_example() {
        use TokenKind::*;
        let tokens = vec![
            tok(Turoyo, "qərfle"),
            tok(Translation, " he broke"),
            tok(Punct, "; "),
            tok(Turoyo, "qrəfli"),
            tok(Translation, " I broke"),
        ];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex.len(), 1);
        assert_eq!(ex[0].turoyo, "qərfle");
        assert_eq!(ex[0].translations, ["he broke", "qrəfli I broke"]);
    }

    #[test]
    fn bracketed_citation_is_dropped_from_translation() {
        let cell = Cell {
            paragraphs: vec![Paragraph::from_runs(vec![Run::italic("qərfle"), Run::plain(" he broke (MT 1.5)")])],
        };
        let ex = parse_table_cell(&tokenize_cell(&cell, &patterns()).tokens);
        assert_eq!(ex.len(), 1);
        assert_eq!(ex[0].turoyo, "qərfle");
        assert_eq!(ex[0].translations, ["he broke"]);
        assert_eq!(ex[0].references, ["MT 1.5"]);
    }

    #[test]
    fn bracketed_citation_then_next_example() {
        let cell = Cell {
            paragraphs: vec![Paragraph::from_runs(vec![
                Run::italic("qərfle"),
                Run::plain(" he broke (MT 1.5); "),
                Run::italic("qrəfli"),
                Run::plain(" I broke"),
            ])],
        };
        let ex = parse_table_cell(&tokenize_cell(&cell, &patterns()).tokens);
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[0].translations, ["he broke"]);
        assert_eq!(ex[0].references, ["MT 1.5"]);
        assert_eq!(ex[1].turoyo, "qrəfli");
        assert_eq!(ex[1].translations, ["I broke"]);
    }

    #[test]
    fn parenthesized_gloss_is_kept() {
        use TokenKind::*;
        let tokens = vec![
            tok(Turoyo, "qərfle"),
            tok(Translation, " he broke "),
            tok(Punct, "("),
            tok(Translation, "a pencil"),
            tok(Punct, ")"),
        ];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex[0].translations, ["he broke (a pencil)"]);
    }

    #[test]
    fn parenthesized_turoyo_stays_with_text() {
        use TokenKind::*;
        let tokens = vec![
            tok(Turoyo, "qərfle "),
            tok(Punct, "("),
            tok(Turoyo, "qarfo"),
            tok(Punct, ") "),
            tok(Translation, "he broke"),
        ];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex[0].turoyo, "qərfle (qarfo)");
    }

    #[test]
    fn every_example_keeps_a_token() {
        use TokenKind::*;
        let tokens = vec![tok(Punct, "; "), tok(Punct, ", "), tok(Turoyo, "x")];
        let ex = parse_table_cell(&tokens);
        assert_eq!(ex.len(), 1);
        assert!(ex.iter().all(|e| !e.is_empty()));
    }
}
