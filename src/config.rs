//! Engine configuration.
//!
//! `defaults/engine.toml` is embedded into the binary. A user file and
//! `TUROYO_*` environment variables are layered on top through [`Loader`]
//! before the result is compiled into [`Patterns`], the single value the
//! extraction engine reads its alphabet and pattern tables from.

use std::collections::HashSet;
use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

const DEFAULT_TOML: &str = include_str!("../defaults/engine.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub alphabet: String,
    pub form_letters: String,
    pub named_stems: Vec<String>,
    pub citation_abbreviations: Vec<String>,
    pub reference_patterns: Vec<String>,
    pub etymology_markers: Vec<String>,
    pub etymology_lookahead: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("root alphabet is empty")]
    EmptyAlphabet,
    #[error("invalid reference pattern {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a TOML file. Missing files are an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.builder = self.builder.add_source(Environment::with_prefix("TUROYO"));
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load_defaults() -> Result<EngineConfig, ConfigError> {
    Loader::new().build()
}

/// Compiled form of [`EngineConfig`], shared read-only by every entry build.
#[derive(Debug)]
pub struct Patterns {
    root_letters: HashSet<char>,
    form_letters: HashSet<char>,
    named_stems: Vec<String>,
    citation: Regex,
    references: Vec<Regex>,
    pub etymology_markers: Vec<String>,
    pub etymology_lookahead: usize,
}

impl Patterns {
    pub fn compile(cfg: &EngineConfig) -> Result<Self, PatternError> {
        if cfg.alphabet.trim().is_empty() {
            return Err(PatternError::EmptyAlphabet);
        }
        let root_letters: HashSet<char> = cfg.alphabet.chars().filter(|c| !c.is_whitespace()).collect();
        let mut form_letters = root_letters.clone();
        form_letters.extend(cfg.form_letters.chars().filter(|c| !c.is_whitespace()));

        let abbrevs = cfg
            .citation_abbreviations
            .iter()
            .map(|a| regex::escape(a))
            .collect::<Vec<_>>()
            .join("|");
        let citation_src = format!(
            r"^\[?(?:{})\.?(?:\s*\d+(?:[.:/,-]\s?\d+)*[a-z]?)?\.?\]?$",
            abbrevs
        );
        let citation = compile_one(&citation_src)?;
        let references = cfg
            .reference_patterns
            .iter()
            .map(|p| compile_one(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root_letters,
            form_letters,
            named_stems: cfg.named_stems.clone(),
            citation,
            references,
            etymology_markers: cfg.etymology_markers.clone(),
            etymology_lookahead: cfg.etymology_lookahead.max(1),
        })
    }

    pub fn defaults() -> anyhow::Result<Self> {
        Ok(Self::compile(&load_defaults()?)?)
    }

    pub fn is_root_letter(&self, c: char) -> bool {
        self.root_letters.contains(&c)
    }

    pub fn is_form_letter(&self, c: char) -> bool {
        self.form_letters.contains(&c)
    }

    /// Canonical spelling of a named pseudo-stem, matched case-insensitively.
    pub fn named_stem(&self, text: &str) -> Option<&str> {
        let wanted = text.to_lowercase();
        self.named_stems
            .iter()
            .find(|s| s.to_lowercase() == wanted)
            .map(String::as_str)
    }

    pub fn named_stems(&self) -> &[String] {
        &self.named_stems
    }

    /// Citation abbreviation, optionally with page numbers: `KED 9`, `[MT 1.5]`.
    pub fn is_citation(&self, text: &str) -> bool {
        self.citation.is_match(text.trim())
    }

    /// Any reference shape for roman text: citation or a configured pattern.
    pub fn is_reference(&self, text: &str) -> bool {
        let t = text.trim();
        !t.is_empty() && (self.citation.is_match(t) || self.references.iter().any(|r| r.is_match(t)))
    }
}

fn compile_one(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_config() {
        let cfg = load_defaults().expect("defaults deserialize");
        assert_eq!(cfg.etymology_lookahead, 5);
        assert!(cfg.named_stems.iter().any(|s| s == "Action Noun"));
        assert!(cfg.alphabet.contains('ʕ'));
    }

    #[test]
    fn compiles_patterns() {
        let p = Patterns::defaults().unwrap();
        assert!(p.is_root_letter('ḥ'));
        assert!(!p.is_root_letter('a'));
        assert!(p.is_form_letter('ə'));
        assert_eq!(p.named_stem("action noun"), Some("Action Noun"));
        assert_eq!(p.named_stem("Passive"), None);
    }

    #[test]
    fn citations_and_references() {
        let p = Patterns::defaults().unwrap();
        assert!(p.is_citation("KED 9"));
        assert!(p.is_citation("[MT 1.5:12]"));
        assert!(p.is_citation("Prym-Socin 203"));
        assert!(!p.is_citation("qərfle"));
        assert!(p.is_reference("Wehr 818"));
        assert!(p.is_reference("[unpublished]"));
        assert!(p.is_reference("123"));
        assert!(!p.is_reference("to break"));
        assert!(!p.is_reference("   "));
    }

    #[test]
    fn rejects_bad_reference_pattern() {
        let mut cfg = load_defaults().unwrap();
        cfg.reference_patterns.push("([".into());
        assert!(matches!(Patterns::compile(&cfg), Err(PatternError::Regex { .. })));
    }

    #[test]
    fn lookahead_override() {
        let mut cfg = load_defaults().unwrap();
        cfg.etymology_lookahead = 0;
        let p = Patterns::compile(&cfg).unwrap();
        assert_eq!(p.etymology_lookahead, 1);
    }
}
