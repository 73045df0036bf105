//! JSON output: `lexicon.json`, `manifest.json` and optional per-verb files.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::{Lexicon, VerbEntry};

pub const LEXICON_FILE: &str = "lexicon.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const VERBS_DIR: &str = "verbs";

#[derive(Debug)]
pub struct Written {
    pub lexicon: PathBuf,
    pub manifest: PathBuf,
    pub verb_files: usize,
}

pub fn write_lexicon(lex: &Lexicon, out_dir: &Path, split: bool) -> Result<Written> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let lexicon = out_dir.join(LEXICON_FILE);
    write_json(&lexicon, &lex.entries)?;
    let manifest = out_dir.join(MANIFEST_FILE);
    write_json(&manifest, &lex.manifest())?;

    let mut verb_files = 0;
    if split {
        let dir = out_dir.join(VERBS_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        for entry in &lex.entries {
            write_json(&dir.join(verb_file_name(&entry.root)), entry)?;
            verb_files += 1;
        }
    }

    tracing::info!(path = %lexicon.display(), entries = lex.entries.len(), verb_files, "wrote lexicon");
    Ok(Written {
        lexicon,
        manifest,
        verb_files,
    })
}

/// `dyq 2` → `dyq_2.json`.
pub fn verb_file_name(root: &str) -> String {
    format!("{}.json", root.replace(char::is_whitespace, "_"))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::with_capacity(256 * 1024, file);
    serde_json::to_writer_pretty(&mut writer, value).with_context(|| format!("writing {}", path.display()))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Read a `lexicon.json` written by [`write_lexicon`].
pub fn read_lexicon(path: &Path) -> Result<Lexicon> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let entries: Vec<VerbEntry> =
        serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Lexicon { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Confidence, Stem};

    fn lexicon() -> Lexicon {
        let mut stem = Stem::new("I");
        stem.forms = vec!["daqle".into()];
        Lexicon {
            entries: ["dyq 1", "dyq 2"]
                .iter()
                .map(|root| VerbEntry {
                    root: root.to_string(),
                    base_root: "dyq".into(),
                    homonym: root[4..].parse().ok(),
                    etymology: None,
                    cross_reference: None,
                    stems: vec![stem.clone()],
                    idioms: Vec::new(),
                    confidence: Confidence::High,
                    flags: Vec::new(),
                })
                .collect(),
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("turoyo-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn writes_and_reads_back() {
        let dir = scratch("write");
        let lex = lexicon();
        let w = write_lexicon(&lex, &dir, true).unwrap();
        assert_eq!(w.verb_files, 2);
        assert!(dir.join("verbs/dyq_2.json").exists());

        let back = read_lexicon(&w.lexicon).unwrap();
        assert_eq!(back, lex);

        let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(&w.manifest).unwrap()).unwrap();
        assert_eq!(manifest["verbs"], 2);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn identical_input_gives_identical_bytes() {
        let dir = scratch("idem");
        let lex = lexicon();
        write_lexicon(&lex, &dir, false).unwrap();
        let a = fs::read(dir.join(LEXICON_FILE)).unwrap();
        write_lexicon(&lex, &dir, false).unwrap();
        let b = fs::read(dir.join(LEXICON_FILE)).unwrap();
        assert_eq!(a, b);
        assert!(!dir.join(VERBS_DIR).exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
