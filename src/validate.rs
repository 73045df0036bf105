//! Regression comparison between two lexicons.
//!
//! `expected` is a reference lexicon (a previous run, or a hand-checked
//! export); `actual` is the lexicon under test. Every difference becomes a
//! [`Discrepancy`] keyed by root.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::model::{Etymology, Lexicon, VerbEntry};
use crate::parser::tokens::collapse_ws;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    MissingEntry,
    ExtraEntry,
    MissingEtymology,
    ExtraEtymology,
    EtymologyMismatch,
    MissingEtymologyFields,
    MissingStem,
    ExtraStem,
    FormMismatch,
    ExampleCountMismatch,
    IdiomCountMismatch,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MissingEntry => "missing_entry",
            Category::ExtraEntry => "extra_entry",
            Category::MissingEtymology => "missing_etymology",
            Category::ExtraEtymology => "extra_etymology",
            Category::EtymologyMismatch => "etymology_mismatch",
            Category::MissingEtymologyFields => "missing_etymology_fields",
            Category::MissingStem => "missing_stem",
            Category::ExtraStem => "extra_stem",
            Category::FormMismatch => "form_mismatch",
            Category::ExampleCountMismatch => "example_count_mismatch",
            Category::IdiomCountMismatch => "idiom_count_mismatch",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub root: String,
    pub category: Category,
    pub detail: String,
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub compared: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn counts(&self) -> BTreeMap<Category, usize> {
        let mut m = BTreeMap::new();
        for d in &self.discrepancies {
            *m.entry(d.category).or_default() += 1;
        }
        m
    }

    fn push(&mut self, root: &str, category: Category, detail: impl Into<String>) {
        self.discrepancies.push(Discrepancy {
            root: root.to_string(),
            category,
            detail: detail.into(),
        });
    }
}

pub fn compare(expected: &Lexicon, actual: &Lexicon) -> Report {
    let mut report = Report::default();
    let by_root: HashMap<&str, &VerbEntry> = actual.entries.iter().map(|e| (e.root.as_str(), e)).collect();
    let known: HashSet<&str> = expected.entries.iter().map(|e| e.root.as_str()).collect();

    for want in &expected.entries {
        match by_root.get(want.root.as_str()) {
            Some(got) => {
                report.compared += 1;
                compare_entry(want, got, &mut report);
            }
            None => report.push(&want.root, Category::MissingEntry, ""),
        }
    }
    for got in &actual.entries {
        if !known.contains(got.root.as_str()) {
            report.push(&got.root, Category::ExtraEntry, "");
        }
    }
    report
}

fn compare_entry(want: &VerbEntry, got: &VerbEntry, report: &mut Report) {
    let root = want.root.as_str();
    match (&want.etymology, &got.etymology) {
        (Some(w), None) => report.push(root, Category::MissingEtymology, w.raw_text.clone()),
        (None, Some(g)) => report.push(root, Category::ExtraEtymology, g.raw_text.clone()),
        (Some(w), Some(g)) => compare_etymology(root, w, g, report),
        (None, None) => {}
    }

    for ws in &want.stems {
        match got.stems.iter().find(|s| s.label == ws.label) {
            None => report.push(root, Category::MissingStem, ws.label.clone()),
            Some(gs) => {
                if ws.forms != gs.forms {
                    report.push(
                        root,
                        Category::FormMismatch,
                        format!("{}: {:?} vs {:?}", ws.label, ws.forms, gs.forms),
                    );
                }
                let (we, ge) = (ws.example_count(), gs.example_count());
                if we != ge {
                    report.push(root, Category::ExampleCountMismatch, format!("{}: {} vs {}", ws.label, we, ge));
                }
            }
        }
    }
    for gs in &got.stems {
        if !want.stems.iter().any(|s| s.label == gs.label) {
            report.push(root, Category::ExtraStem, gs.label.clone());
        }
    }

    if want.idioms.len() != got.idioms.len() {
        report.push(
            root,
            Category::IdiomCountMismatch,
            format!("{} vs {}", want.idioms.len(), got.idioms.len()),
        );
    }
}

fn compare_etymology(root: &str, want: &Etymology, got: &Etymology, report: &mut Report) {
    if collapse_ws(&want.raw_text) != collapse_ws(&got.raw_text) {
        report.push(
            root,
            Category::EtymologyMismatch,
            format!("{:?} vs {:?}", want.raw_text, got.raw_text),
        );
    }
    let labels = |e: &Etymology| e.etymons.iter().filter(|m| m.source_label.is_some()).count();
    if got.etymons.len() < want.etymons.len() || labels(got) < labels(want) {
        report.push(
            root,
            Category::MissingEtymologyFields,
            format!("{} etymons vs {}", want.etymons.len(), got.etymons.len()),
        );
    }
}
