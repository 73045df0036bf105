//! Lexicon records produced by the engine.
//!
//! Everything here is built once per root span and never mutated after the
//! entry is assembled. Downstream consumers (the JSON writer, the SQLite
//! store, the validator) only read these shapes.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Root,
    Turoyo,
    Translation,
    Reference,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// Byte range of `value` in the tokenized text.
    #[serde(skip)]
    pub span: Range<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        let value = value.into();
        let span = 0..value.len();
        Self { kind, value, span }
    }

    pub fn text(&self) -> &str {
        self.value.trim()
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text().starts_with(c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerbEntry {
    pub root: String,
    pub base_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homonym: Option<u32>,
    #[serde(default)]
    pub etymology: Option<Etymology>,
    #[serde(default)]
    pub cross_reference: Option<String>,
    #[serde(default)]
    pub stems: Vec<Stem>,
    #[serde(default)]
    pub idioms: Vec<Idiom>,
    pub confidence: Confidence,
    #[serde(default)]
    pub flags: Vec<Flag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Etymology {
    pub raw_text: String,
    pub etymons: Vec<Etymon>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Etymon {
    pub source_label: Option<String>,
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stem {
    pub label: String,
    pub forms: Vec<String>,
    #[serde(default)]
    pub gloss: Vec<Token>,
    #[serde(default)]
    pub conjugations: Vec<Conjugation>,
}

impl Stem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            forms: Vec::new(),
            gloss: Vec::new(),
            conjugations: Vec::new(),
        }
    }

    pub fn gloss_text(&self) -> String {
        let joined: String = self.gloss.iter().map(|t| t.value.as_str()).collect();
        joined.trim().to_string()
    }

    /// Append to the named conjugation list, creating it on first use.
    pub fn push_examples(&mut self, name: &str, examples: Vec<Example>) {
        match self.conjugations.iter_mut().find(|c| c.name == name) {
            Some(c) => c.examples.extend(examples),
            None => self.conjugations.push(Conjugation {
                name: name.to_string(),
                examples,
            }),
        }
    }

    pub fn conjugation(&self, name: &str) -> Option<&Conjugation> {
        self.conjugations.iter().find(|c| c.name == name)
    }

    pub fn example_count(&self) -> usize {
        self.conjugations.iter().map(|c| c.examples.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conjugation {
    pub name: String,
    pub examples: Vec<Example>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub turoyo: String,
    pub translations: Vec<String>,
    pub references: Vec<String>,
}

impl Example {
    pub fn is_empty(&self) -> bool {
        self.turoyo.is_empty() && self.translations.is_empty() && self.references.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idiom {
    pub stem: String,
    pub phrase: Option<String>,
    pub meaning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    NoStemHeader,
    EtymologyTruncated,
    EtymologyExtended,
    FormattingDesync,
    UnknownStemLabel,
    OrphanTable,
    HomonymRenumbered,
    MalformedRow,
    EntryPanicked,
}

impl FlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKind::NoStemHeader => "no_stem_header",
            FlagKind::EtymologyTruncated => "etymology_truncated",
            FlagKind::EtymologyExtended => "etymology_extended",
            FlagKind::FormattingDesync => "formatting_desync",
            FlagKind::UnknownStemLabel => "unknown_stem_label",
            FlagKind::OrphanTable => "orphan_table",
            FlagKind::HomonymRenumbered => "homonym_renumbered",
            FlagKind::MalformedRow => "malformed_row",
            FlagKind::EntryPanicked => "entry_panicked",
        }
    }

    /// Informational flags record a recovery that succeeded.
    pub fn lowers_confidence(&self) -> bool {
        !matches!(self, FlagKind::EtymologyExtended | FlagKind::HomonymRenumbered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub kind: FlagKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Flag {
    pub fn new(kind: FlagKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    pub fn bare(kind: FlagKind) -> Self {
        Self { kind, detail: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    pub entries: Vec<VerbEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub verbs: usize,
    pub stems: usize,
    pub examples: usize,
    pub idioms: usize,
    pub low_confidence: usize,
    pub flags: BTreeMap<String, usize>,
}

impl Lexicon {
    pub fn get(&self, root: &str) -> Option<&VerbEntry> {
        self.entries.iter().find(|e| e.root == root)
    }

    pub fn manifest(&self) -> Manifest {
        let mut m = Manifest {
            verbs: self.entries.len(),
            ..Manifest::default()
        };
        for e in &self.entries {
            m.stems += e.stems.len();
            m.examples += e.stems.iter().map(Stem::example_count).sum::<usize>();
            m.idioms += e.idioms.len();
            if e.confidence == Confidence::Low {
                m.low_confidence += 1;
            }
            for f in &e.flags {
                *m.flags.entry(f.kind.as_str().to_string()).or_default() += 1;
            }
        }
        m
    }
}
