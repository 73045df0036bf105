mod config;
mod db;
mod model;
mod output;
mod parser;
mod source;
mod validate;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Loader, Patterns};
use crate::parser::trace::{CollectTrace, LogTrace, NoTrace, Trace};
use crate::source::Format;

#[derive(Parser)]
#[command(name = "turoyo_lexicon", about = "Turoyo verb lexicon extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the verb lexicon from a dictionary document
    Extract {
        /// Block stream (.json/.jsonl) or WordprocessingML document.xml
        input: PathBuf,
        /// Output directory for lexicon.json and manifest.json
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
        /// Input format (default: by extension)
        #[arg(long, value_enum, default_value_t = Format::Auto)]
        format: Format,
        /// Also write one verbs/<root>.json per entry
        #[arg(long)]
        split: bool,
        /// Also store the lexicon in this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
        /// Engine config TOML layered over the built-in defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the engine's decisions for one root (e.g. "dyq 2")
        #[arg(long)]
        trace: Option<String>,
    },
    /// Compare two lexicon.json files
    Validate {
        /// Reference lexicon
        expected: PathBuf,
        /// Lexicon under test
        actual: PathBuf,
        /// Max discrepancies to list
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show lexicon store statistics
    Stats {
        #[arg(long, default_value = db::DEFAULT_DB_PATH)]
        db: PathBuf,
    },
    /// Verbs overview table
    Overview {
        #[arg(long, default_value = db::DEFAULT_DB_PATH)]
        db: PathBuf,
        /// Filter by confidence (high, low)
        #[arg(short, long)]
        confidence: Option<String>,
        /// Only verbs with this stem (e.g. "II", "Detransitive")
        #[arg(short, long)]
        stem: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input,
            out,
            format,
            split,
            db: db_path,
            config,
            trace,
        } => {
            let patterns = load_patterns(config.as_deref())?;
            let blocks = source::load(&input, format).with_context(|| format!("loading {}", input.display()))?;
            println!("Loaded {} blocks from {}", blocks.len(), input.display());

            let collect = CollectTrace::default();
            let tracer: &dyn Trace = if trace.is_some() {
                &collect
            } else if tracing::enabled!(tracing::Level::DEBUG) {
                &LogTrace
            } else {
                &NoTrace
            };

            let pb = progress_bar();
            let lex = parser::extract_lexicon(&blocks, &patterns, tracer, Some(&pb))?;
            pb.finish_and_clear();

            let written = output::write_lexicon(&lex, &out, split)?;
            print_manifest(&lex.manifest());
            println!("Wrote {}", written.lexicon.display());
            if written.verb_files > 0 {
                println!("Wrote {} verb files", written.verb_files);
            }

            if let Some(path) = db_path {
                let conn = db::connect(&path)?;
                db::init_schema(&conn)?;
                let run = db::save_lexicon(&conn, &lex, &input.display().to_string())?;
                println!("Stored run {} in {}", run, path.display());
            }

            if let Some(root) = trace {
                let events = collect.for_root(&root);
                if events.is_empty() {
                    println!("\nNo trace events for {:?}", root);
                } else {
                    println!("\n--- Trace: {} ---", root);
                    for e in events {
                        println!("  {:?}", e);
                    }
                }
            }
            Ok(())
        }
        Commands::Validate {
            expected,
            actual,
            limit,
            json,
        } => {
            let want = output::read_lexicon(&expected)?;
            let got = output::read_lexicon(&actual)?;
            let report = validate::compare(&want, &got);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Compared {} entries", report.compared);
                for (category, n) in report.counts() {
                    println!("  {:<26} {:>5}", category.as_str(), n);
                }
                if !report.is_clean() {
                    println!("\n{:<16} | {:<26} | Detail", "Root", "Category");
                    println!("{}", "-".repeat(80));
                    for d in report.discrepancies.iter().take(limit) {
                        println!(
                            "{:<16} | {:<26} | {}",
                            truncate(&d.root, 16),
                            d.category.as_str(),
                            truncate(&d.detail, 60)
                        );
                    }
                }
            }

            if report.is_clean() {
                println!("No discrepancies.");
                Ok(())
            } else {
                Err(anyhow::anyhow!("{} discrepancies", report.discrepancies.len()))
            }
        }
        Commands::Overview {
            db: db_path,
            confidence,
            stem,
            limit,
        } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, confidence.as_deref(), stem.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No verbs found. Run 'extract --db' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<10} | {:<32} | {:<20} | {:>5} | {:>4} | {:<4}",
                "#", "Root", "Etymology", "Stems", "Ex.", "Id.", "Conf"
            );
            println!("{}", "-".repeat(96));

            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<10} | {:<32} | {:<20} | {:>5} | {:>4} | {:<4}",
                    i + 1,
                    truncate(&r.root, 10),
                    truncate(&r.etymology, 32),
                    truncate(&r.stems, 20),
                    r.examples,
                    r.idioms,
                    r.confidence
                );
            }

            println!("\n{} verbs", rows.len());
            Ok(())
        }
        Commands::Stats { db: db_path } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Runs:           {}", s.runs);
            println!("Last run:       {}", s.last_run.as_deref().unwrap_or("-"));
            println!("Verbs:          {}", s.verbs);
            println!("Homonyms:       {}", s.homonyms);
            println!("With etymology: {}", s.with_etymology);
            println!("Stems:          {}", s.stems);
            println!("Examples:       {}", s.examples);
            println!("Idioms:         {}", s.idioms);
            println!("Low confidence: {}", s.low_confidence);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_patterns(path: Option<&Path>) -> anyhow::Result<Patterns> {
    let mut loader = Loader::new();
    if let Some(p) = path {
        loader = loader.with_file(p);
    }
    let cfg = loader.with_env().build().context("loading engine config")?;
    Ok(Patterns::compile(&cfg)?)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn print_manifest(m: &model::Manifest) {
    println!(
        "Extracted {} verbs, {} stems, {} examples, {} idioms ({} low confidence).",
        m.verbs, m.stems, m.examples, m.idioms, m.low_confidence,
    );
    if !m.flags.is_empty() {
        println!("\n--- Flags ---");
        for (kind, n) in &m.flags {
            println!("  {:<22} {:>5}", kind, n);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
