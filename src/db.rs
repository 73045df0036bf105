use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::model::{Confidence, Lexicon};

pub const DEFAULT_DB_PATH: &str = "data/lexicon.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id             INTEGER PRIMARY KEY,
            input          TEXT NOT NULL,
            verbs          INTEGER NOT NULL,
            low_confidence INTEGER NOT NULL,
            manifest       TEXT NOT NULL,
            started_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS verbs (
            root            TEXT PRIMARY KEY,
            run_id          INTEGER NOT NULL REFERENCES runs(id),
            position        INTEGER NOT NULL,
            base_root       TEXT NOT NULL,
            homonym         INTEGER,
            etymology       TEXT,
            cross_reference TEXT,
            confidence      TEXT NOT NULL CHECK(confidence IN ('high','low')),
            flags           TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_verbs_base ON verbs(base_root);

        CREATE TABLE IF NOT EXISTS etymons (
            id           INTEGER PRIMARY KEY,
            verb_root    TEXT NOT NULL REFERENCES verbs(root),
            position     INTEGER NOT NULL,
            source_label TEXT,
            raw_text     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_etymons_verb ON etymons(verb_root);

        CREATE TABLE IF NOT EXISTS stems (
            id        INTEGER PRIMARY KEY,
            verb_root TEXT NOT NULL REFERENCES verbs(root),
            position  INTEGER NOT NULL,
            label     TEXT NOT NULL,
            forms     TEXT NOT NULL,
            gloss     TEXT,
            UNIQUE(verb_root, position)
        );
        CREATE INDEX IF NOT EXISTS idx_stems_verb ON stems(verb_root);
        CREATE INDEX IF NOT EXISTS idx_stems_label ON stems(label);

        CREATE TABLE IF NOT EXISTS examples (
            id           INTEGER PRIMARY KEY,
            stem_id      INTEGER NOT NULL REFERENCES stems(id),
            conjugation  TEXT NOT NULL,
            position     INTEGER NOT NULL,
            turoyo       TEXT NOT NULL,
            translations TEXT NOT NULL,
            refs         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_examples_stem ON examples(stem_id);

        CREATE TABLE IF NOT EXISTS idioms (
            id         INTEGER PRIMARY KEY,
            verb_root  TEXT NOT NULL REFERENCES verbs(root),
            stem_label TEXT NOT NULL,
            phrase     TEXT,
            meaning    TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_idioms_verb ON idioms(verb_root);
        ",
    )?;
    Ok(())
}

// ── Saving ──

/// Replace the stored lexicon with `lex` and record the run. Returns the run id.
pub fn save_lexicon(conn: &Connection, lex: &Lexicon, input: &str) -> Result<i64> {
    let manifest = lex.manifest();
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "DELETE FROM examples; DELETE FROM stems; DELETE FROM etymons; DELETE FROM idioms; DELETE FROM verbs;",
    )?;
    tx.execute(
        "INSERT INTO runs (input, verbs, low_confidence, manifest, started_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            input,
            manifest.verbs as i64,
            manifest.low_confidence as i64,
            serde_json::to_string(&manifest)?,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    let run_id = tx.last_insert_rowid();

    {
        let mut v_stmt = tx.prepare(
            "INSERT INTO verbs
             (root, run_id, position, base_root, homonym, etymology, cross_reference, confidence, flags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        let mut e_stmt = tx.prepare(
            "INSERT INTO etymons (verb_root, position, source_label, raw_text) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut s_stmt = tx.prepare(
            "INSERT INTO stems (verb_root, position, label, forms, gloss) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut x_stmt = tx.prepare(
            "INSERT INTO examples (stem_id, conjugation, position, turoyo, translations, refs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut i_stmt =
            tx.prepare("INSERT INTO idioms (verb_root, stem_label, phrase, meaning) VALUES (?1, ?2, ?3, ?4)")?;

        for (pos, v) in lex.entries.iter().enumerate() {
            let flags = if v.flags.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&v.flags)?)
            };
            v_stmt.execute(rusqlite::params![
                v.root,
                run_id,
                pos as i64,
                v.base_root,
                v.homonym,
                v.etymology.as_ref().map(|e| e.raw_text.as_str()),
                v.cross_reference,
                confidence_str(v.confidence),
                flags,
            ])?;

            if let Some(ety) = &v.etymology {
                for (i, m) in ety.etymons.iter().enumerate() {
                    e_stmt.execute(rusqlite::params![v.root, i as i64, m.source_label, m.raw_text])?;
                }
            }

            for (i, s) in v.stems.iter().enumerate() {
                let gloss = s.gloss_text();
                s_stmt.execute(rusqlite::params![
                    v.root,
                    i as i64,
                    s.label,
                    s.forms.join("/"),
                    (!gloss.is_empty()).then_some(gloss),
                ])?;
                let stem_id = tx.last_insert_rowid();
                for c in &s.conjugations {
                    for (j, ex) in c.examples.iter().enumerate() {
                        x_stmt.execute(rusqlite::params![
                            stem_id,
                            c.name,
                            j as i64,
                            ex.turoyo,
                            serde_json::to_string(&ex.translations)?,
                            serde_json::to_string(&ex.references)?,
                        ])?;
                    }
                }
            }

            for idiom in &v.idioms {
                i_stmt.execute(rusqlite::params![v.root, idiom.stem, idiom.phrase, idiom.meaning])?;
            }
        }
    }
    tx.commit()?;
    Ok(run_id)
}

fn confidence_str(c: Confidence) -> &'static str {
    match c {
        Confidence::High => "high",
        Confidence::Low => "low",
    }
}

// ── Queries ──

pub struct OverviewRow {
    pub root: String,
    pub etymology: String,
    pub stems: String,
    pub examples: i64,
    pub idioms: i64,
    pub confidence: String,
}

pub fn fetch_overview(
    conn: &Connection,
    confidence: Option<&str>,
    stem: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut sql = String::from(
        "SELECT v.root,
                COALESCE(v.etymology, ''),
                COALESCE((SELECT GROUP_CONCAT(label, ',') FROM stems WHERE verb_root = v.root), ''),
                (SELECT COUNT(*) FROM examples x JOIN stems s ON s.id = x.stem_id WHERE s.verb_root = v.root),
                (SELECT COUNT(*) FROM idioms i WHERE i.verb_root = v.root),
                v.confidence
         FROM verbs v
         WHERE 1=1",
    );
    let mut params: Vec<String> = Vec::new();

    if let Some(c) = confidence {
        params.push(c.to_lowercase());
        sql.push_str(&format!(" AND v.confidence = ?{}", params.len()));
    }
    if let Some(label) = stem {
        params.push(label.to_string());
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM stems s WHERE s.verb_root = v.root AND s.label = ?{})",
            params.len()
        ));
    }
    sql.push_str(&format!(" ORDER BY v.position LIMIT {}", limit));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(OverviewRow {
                root: row.get(0)?,
                etymology: row.get(1)?,
                stems: row.get(2)?,
                examples: row.get(3)?,
                idioms: row.get(4)?,
                confidence: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct Stats {
    pub runs: i64,
    pub last_run: Option<String>,
    pub verbs: i64,
    pub homonyms: i64,
    pub stems: i64,
    pub examples: i64,
    pub idioms: i64,
    pub with_etymology: i64,
    pub low_confidence: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    let last_run = conn
        .query_row("SELECT started_at FROM runs ORDER BY id DESC LIMIT 1", [], |r| r.get(0))
        .ok();

    Ok(Stats {
        runs: count("SELECT COUNT(*) FROM runs")?,
        last_run,
        verbs: count("SELECT COUNT(*) FROM verbs")?,
        homonyms: count("SELECT COUNT(*) FROM verbs WHERE homonym IS NOT NULL")?,
        stems: count("SELECT COUNT(*) FROM stems")?,
        examples: count("SELECT COUNT(*) FROM examples")?,
        idioms: count("SELECT COUNT(*) FROM idioms")?,
        with_etymology: count("SELECT COUNT(*) FROM verbs WHERE etymology IS NOT NULL")?,
        low_confidence: count("SELECT COUNT(*) FROM verbs WHERE confidence = 'low'")?,
    })
}
