pub mod entries;
pub mod extract;
pub mod tokens;
pub mod trace;

use std::panic::{catch_unwind, AssertUnwindSafe};

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::config::Patterns;
use crate::model::{Lexicon, VerbEntry};
use crate::source::Block;
use entries::EntrySpan;
use trace::Trace;

const CHUNK: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("input contains no blocks")]
    NoBlocks,
}

/// Two-pass pipeline: blocks → entry spans → assembled entries.
///
/// Segmentation is sequential. Entries are assembled in parallel, one chunk
/// at a time, and come back in document order.
pub fn extract_lexicon(
    blocks: &[Block],
    patterns: &Patterns,
    trace: &dyn Trace,
    progress: Option<&ProgressBar>,
) -> Result<Lexicon, ExtractError> {
    if blocks.is_empty() {
        return Err(ExtractError::NoBlocks);
    }

    let seg = entries::segment(blocks, patterns, trace);
    tracing::info!(entries = seg.spans.len(), preamble = seg.preamble, "segmented {} blocks", blocks.len());
    if let Some(pb) = progress {
        pb.set_length(seg.spans.len() as u64);
    }

    let mut out = Vec::with_capacity(seg.spans.len());
    for chunk in seg.spans.chunks(CHUNK) {
        let built: Vec<VerbEntry> = chunk
            .par_iter()
            .map(|span| guarded(span, || extract::assemble_entry(span, blocks, patterns, trace)))
            .collect();
        out.extend(built);
        if let Some(pb) = progress {
            pb.inc(chunk.len() as u64);
        }
    }
    Ok(Lexicon { entries: out })
}

/// Run `build`; a panic degrades the entry to its header.
fn guarded(span: &EntrySpan, build: impl FnOnce() -> VerbEntry) -> VerbEntry {
    match catch_unwind(AssertUnwindSafe(build)) {
        Ok(entry) => entry,
        Err(_) => {
            tracing::warn!(root = %span.key, "entry build panicked");
            extract::header_only(span)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Confidence, FlagKind};
    use crate::parser::extract::etymology::depth;
    use crate::parser::trace::{CollectTrace, NoTrace};
    use crate::source::{self, Format};
    use std::path::Path;

    fn patterns() -> Patterns {
        Patterns::defaults().unwrap()
    }

    fn fixture() -> Vec<Block> {
        source::load(Path::new("tests/fixtures/sample.json"), Format::Auto).unwrap()
    }

    #[test]
    fn empty_input_is_fatal() {
        let err = extract_lexicon(&[], &patterns(), &NoTrace, None).unwrap_err();
        assert!(matches!(err, ExtractError::NoBlocks));
    }

    #[test]
    fn one_entry_per_accepted_header() {
        let blocks = fixture();
        let trace = CollectTrace::default();
        let lex = extract_lexicon(&blocks, &patterns(), &trace, None).unwrap();
        let accepted = trace
            .events()
            .iter()
            .filter(|(_, e)| matches!(e, trace::Event::RootAccepted { .. }))
            .count();
        assert_eq!(lex.entries.len(), accepted);
        let roots: Vec<_> = lex.entries.iter().map(|e| e.root.as_str()).collect();
        assert_eq!(roots, ["ʕdl", "dyq 1", "dyq 2", "qrf", "ṭlb"]);
    }

    #[test]
    fn fixture_entries() {
        let lex = extract_lexicon(&fixture(), &patterns(), &NoTrace, None).unwrap();

        let adl = lex.get("ʕdl").unwrap();
        assert_eq!(
            adl.etymology.as_ref().unwrap().raw_text,
            "Arab. ʕdl (II) cf. Wehr 818: in Ordnung bringen; wieder herstellen"
        );

        let qrf = lex.get("qrf").unwrap();
        assert_eq!(qrf.stems[0].forms, ["qərfle", "qoraf"]);
        assert_eq!(qrf.stems[0].gloss_text(), "to break (a pencil)");
        let pret = qrf.stems[0].conjugation("Preterite").unwrap();
        assert_eq!(pret.examples.len(), 2);
        assert_eq!(pret.examples[0].turoyo, "qərfle");
        assert_eq!(pret.examples[0].references, ["KED 9"]);
        assert_eq!(pret.examples[1].turoyo, "oxelle");
        assert_eq!(qrf.idioms.len(), 1);

        let dyq2 = lex.get("dyq 2").unwrap();
        assert_eq!(dyq2.cross_reference.as_deref(), Some("dqq"));

        let tlb = lex.get("ṭlb").unwrap();
        assert_eq!(tlb.confidence, Confidence::Low);
        assert!(tlb.flags.iter().any(|f| f.kind == FlagKind::NoStemHeader));
    }

    #[test]
    fn etymologies_are_balanced() {
        let lex = extract_lexicon(&fixture(), &patterns(), &NoTrace, None).unwrap();
        for e in &lex.entries {
            if let Some(ety) = &e.etymology {
                assert_eq!(depth(&ety.raw_text), 0, "{}", e.root);
            }
        }
    }

    #[test]
    fn examples_are_never_empty() {
        let lex = extract_lexicon(&fixture(), &patterns(), &NoTrace, None).unwrap();
        let all = lex.entries.iter().flat_map(|e| &e.stems).flat_map(|s| &s.conjugations).flat_map(|c| &c.examples);
        for ex in all {
            assert!(!ex.is_empty());
        }
    }

    #[test]
    fn output_is_idempotent() {
        let blocks = fixture();
        let a = serde_json::to_string_pretty(&extract_lexicon(&blocks, &patterns(), &NoTrace, None).unwrap().entries).unwrap();
        let b = serde_json::to_string_pretty(&extract_lexicon(&blocks, &patterns(), &NoTrace, None).unwrap().entries).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn panicking_build_degrades() {
        let blocks = fixture();
        let seg = entries::segment(&blocks, &patterns(), &NoTrace);
        let span = &seg.spans[0];
        let entry = guarded(span, || panic!("boom"));
        assert_eq!(entry.root, span.key);
        assert_eq!(entry.confidence, Confidence::Low);
        assert!(entry.flags.iter().any(|f| f.kind == FlagKind::EntryPanicked));
    }
}
