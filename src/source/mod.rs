//! Block stream adapters.
//!
//! Every input format is normalized into an ordered `Vec<Block>`: paragraphs
//! carrying their formatting runs, and tables of cells of paragraphs. The
//! engine only ever reads these values.

pub mod docx;
pub mod json;

use std::path::Path;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid block JSON at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid document XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("cannot infer input format from {0:?}; pass --format")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Auto,
    Json,
    DocxXml,
}

/// Load a document from disk and normalize it into blocks.
pub fn load(path: &Path, format: Format) -> Result<Vec<Block>, SourceError> {
    let format = match format {
        Format::Auto => detect_format(path)?,
        f => f,
    };
    let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let blocks = match format {
        Format::Json => json::parse_blocks(&raw)?,
        Format::DocxXml => docx::parse_document(&raw)?,
        Format::Auto => unreachable!("resolved above"),
    };
    Ok(blocks.into_iter().map(Block::normalized).collect())
}

fn detect_format(path: &Path) -> Result<Format, SourceError> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("json") | Some("jsonl") => Ok(Format::Json),
        Some("xml") => Ok(Format::DocxXml),
        _ => Err(SourceError::UnknownFormat(path.display().to_string())),
    }
}

impl Block {
    /// NFC-normalize all text and fill missing paragraph text from its runs.
    pub fn normalized(self) -> Block {
        match self {
            Block::Paragraph(p) => Block::Paragraph(p.normalized()),
            Block::Table(t) => Block::Table(Table {
                rows: t
                    .rows
                    .into_iter()
                    .map(|r| Row {
                        cells: r
                            .cells
                            .into_iter()
                            .map(|c| Cell {
                                paragraphs: c.paragraphs.into_iter().map(Paragraph::normalized).collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            }),
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        }
    }
}

impl Paragraph {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runs: Vec::new(),
        }
    }

    /// Build a paragraph from runs, deriving the text by concatenation.
    pub fn from_runs(runs: Vec<Run>) -> Self {
        let text = runs.iter().map(|r| r.text.as_str()).collect();
        Self { text, runs }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// No runs at all, or runs that concatenate to exactly the text.
    pub fn runs_in_sync(&self) -> bool {
        self.runs.is_empty() || self.runs.iter().map(|r| r.text.as_str()).collect::<String>() == self.text
    }

    fn normalized(self) -> Paragraph {
        let runs: Vec<Run> = self
            .runs
            .into_iter()
            .map(|r| Run {
                text: r.text.nfc().collect(),
                ..r
            })
            .collect();
        let text = if self.text.is_empty() {
            runs.iter().map(|r| r.text.as_str()).collect()
        } else {
            self.text.nfc().collect()
        };
        Paragraph { text, runs }
    }

    /// The tail of this paragraph starting at byte `offset`, with runs cut
    /// to match. Runs that do not concatenate to the text are dropped so the
    /// tail is tokenized as plain text.
    pub fn tail(&self, offset: usize) -> Paragraph {
        let offset = offset.min(self.text.len());
        let text = self.text[offset..].to_string();
        if !self.runs_in_sync() {
            return Paragraph::plain(text);
        }
        let mut runs = Vec::new();
        let mut pos = 0;
        for run in &self.runs {
            let end = pos + run.text.len();
            if end > offset {
                let from = offset.saturating_sub(pos);
                runs.push(Run {
                    text: run.text[from..].to_string(),
                    ..run.clone()
                });
            }
            pos = end;
        }
        Paragraph { text, runs }
    }
}

impl Cell {
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            italic: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_text_from_runs() {
        let b = Block::Paragraph(Paragraph {
            text: String::new(),
            runs: vec![Run::italic("qərfle"), Run::plain(" to break")],
        })
        .normalized();
        assert_eq!(b.as_paragraph().unwrap().text, "qərfle to break");
    }

    #[test]
    fn composes_decomposed_diacritics() {
        let b = Block::Paragraph(Paragraph::plain("h\u{0323}lq")).normalized();
        assert_eq!(b.as_paragraph().unwrap().text, "ḥlq");
    }

    #[test]
    fn tail_cuts_runs() {
        let p = Paragraph::from_runs(vec![Run::plain("dyq (< Arab.) "), Run::italic("daqle"), Run::plain(" to knock")]);
        let t = p.tail(14);
        assert_eq!(t.text, "daqle to knock");
        assert_eq!(t.runs.len(), 2);
        assert!(t.runs[0].italic);
    }

    #[test]
    fn tail_mid_run() {
        let p = Paragraph::from_runs(vec![Run::plain("abc def")]);
        let t = p.tail(4);
        assert_eq!(t.runs, vec![Run::plain("def")]);
    }

    #[test]
    fn tail_of_desynced_paragraph_is_plain() {
        let p = Paragraph {
            text: "abc def".into(),
            runs: vec![Run::plain("abc")],
        };
        let t = p.tail(4);
        assert_eq!(t.text, "def");
        assert!(t.runs.is_empty());
    }

    #[test]
    fn detects_format() {
        assert_eq!(detect_format(Path::new("a.json")).unwrap(), Format::Json);
        assert_eq!(detect_format(Path::new("document.XML")).unwrap(), Format::DocxXml);
        assert!(detect_format(Path::new("a.docx")).is_err());
    }

    #[test]
    fn cell_text_joins_paragraphs() {
        let c = Cell {
            paragraphs: vec![Paragraph::plain(" Preterite "), Paragraph::plain(""), Paragraph::plain("I")],
        };
        assert_eq!(c.text(), "Preterite I");
    }
}
