//! Lexicon command-line tool
//!
//! Manages a local vocabulary store from the shell.
//!
//! # Usage
//!
//! ```bash
//! # Add a word
//! lexicon --db words.db add serendipity "a happy accident" --pos noun
//!
//! # Restore a gzip-compressed backup
//! lexicon --db words.db import --input backup.csv.gz
//!
//! # LEXICON_DB may be set in the environment or in a .env file
//! lexicon stats
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use lexicon_core::quiz::QuizRecorder;
use lexicon_core::{Lexicon, NewWord, PartOfSpeech, StoreConfig, Word};
use uuid::Uuid;

/// Lexicon - manage a local vocabulary store
#[derive(Parser, Debug)]
#[command(name = "lexicon")]
#[command(author, version, about = "Manage a local Lexicon vocabulary store")]
struct Args {
    /// SQLite store path
    #[arg(long, env = "LEXICON_DB")]
    db: PathBuf,

    /// JSON file overriding store settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Quiet mode - suppress progress bars
    #[arg(short, long, default_value = "false")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a word
    Add {
        text: String,
        definition: String,

        /// Part of speech (noun, verb, adj, ...)
        #[arg(long)]
        pos: Option<String>,

        /// IPA transcription
        #[arg(long)]
        phonetic: Option<String>,

        /// Example sentence; may be repeated
        #[arg(short, long = "example")]
        examples: Vec<String>,
    },

    /// List words, newest first
    List {
        /// Only favorites
        #[arg(long, default_value = "false")]
        favorites: bool,

        /// Only words that need practice, lowest score first
        #[arg(long, default_value = "false")]
        hard: bool,

        /// Maximum number of words to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete a word by id
    Delete { id: Uuid },

    /// Import a CSV backup (.csv or .csv.gz)
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Export all words to CSV (.csv or .csv.gz)
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print practice statistics
    Stats,
}

fn main() -> Result<()> {
    // Pick up LEXICON_DB and RUST_LOG from a .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => StoreConfig::default(),
    };
    config.db_path = Some(args.db.clone());
    // One-shot process; nobody listens for debounced events
    config.debounce_ms = 0;

    let lexicon = Lexicon::open(config)
        .with_context(|| format!("Failed to open store {:?}", args.db))?;
    log::debug!("Opened {:?}", args.db);

    match args.command {
        Command::Add {
            text,
            definition,
            pos,
            phonetic,
            examples,
        } => {
            let word = lexicon.words().add_new(NewWord {
                text,
                definition,
                part_of_speech: pos.as_deref().map(PartOfSpeech::parse),
                phonetic,
                examples,
                language_code: None,
            })?;
            lexicon.save()?;
            println!("Added \"{}\" ({})", word.text, word.id);
        }

        Command::List {
            favorites,
            hard,
            limit,
        } => {
            let candidates = if hard {
                QuizRecorder::new(lexicon.store().clone()).practice_queue(usize::MAX, true)?
            } else {
                lexicon.words_provider().items().to_vec()
            };
            let words = select_words(candidates, favorites, limit);

            for word in &words {
                println!(
                    "{}{:<24} {:<12} {:<12} {}",
                    if word.is_favorite { "*" } else { " " },
                    word.text,
                    word.part_of_speech.as_str(),
                    word.difficulty().as_str(),
                    word.definition
                );
            }
            println!();
            println!("{} words", words.len());
        }

        Command::Delete { id } => {
            lexicon.words().delete(id)?;
            lexicon.save()?;
            println!("Deleted {}", id);
        }

        Command::Import { input } => {
            if !input.exists() {
                anyhow::bail!("Input file does not exist: {:?}", input);
            }
            let start_time = Instant::now();

            let pb = if args.quiet {
                ProgressBar::hidden()
            } else {
                ProgressBar::new(0)
            };
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({eta})")?
                    .progress_chars("#>-"),
            );

            let stats = lexicon
                .words()
                .import_csv(&input, |current, total| {
                    pb.set_length(total);
                    pb.set_position(current);
                })
                .context("Import failed")?;
            lexicon.save()?;
            pb.finish_and_clear();

            println!("Import complete!");
            println!();
            println!("Statistics:");
            println!("  Rows processed:     {:>12}", format_number(stats.rows_processed));
            println!("  Words imported:     {:>12}", format_number(stats.words_imported));
            println!("  Duplicates skipped: {:>12}", format_number(stats.duplicates_skipped));
            println!("  Empty rows:         {:>12}", format_number(stats.empty_rows));
            println!("  Errors:             {:>12}", format_number(stats.errors));
            println!("  Time elapsed:       {:>12}", HumanDuration(start_time.elapsed()));

            log::info!("Imported {} words from {:?}", stats.words_imported, input);
        }

        Command::Export { output } => {
            let count = lexicon
                .words()
                .export_csv(&output)
                .context("Export failed")?;
            println!("Exported {} words to {:?}", format_number(count as u64), output);
        }

        Command::Stats => {
            let vocabulary = lexicon.stats().refresh_vocabulary_size()?;
            let stats = lexicon.stats().load()?;
            lexicon.save()?;

            println!("Vocabulary:           {:>12}", format_number(vocabulary as u64));
            println!("Sessions:             {:>12}", format_number(stats.total_sessions as u64));
            println!("Words studied:        {:>12}", format_number(stats.total_words_studied as u64));
            println!("Average accuracy:     {:>11.1}%", stats.average_accuracy * 100.0);
            println!("Current streak:       {:>12}", stats.current_streak);
            println!("Longest streak:       {:>12}", stats.longest_streak);
            println!(
                "Practice time:        {:>12}",
                HumanDuration(std::time::Duration::from_secs_f64(stats.total_practice_time))
            );
            if let Some(day) = stats.last_practice_date {
                println!("Last practiced:       {:>12}", day);
            }
        }
    }

    Ok(())
}

/// Apply the `list` filters, keeping the incoming order
fn select_words(words: Vec<Word>, favorites_only: bool, limit: Option<usize>) -> Vec<Word> {
    words
        .into_iter()
        .filter(|w| !favorites_only || w.is_favorite)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Format a number with thousand separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_hard_list_honours_favorites() {
        let lexicon = Lexicon::open(StoreConfig {
            debounce_ms: 0,
            ..StoreConfig::default()
        })
        .unwrap();
        let plain = lexicon.words().add_new(NewWord::new("plain", "not starred")).unwrap();
        let starred = lexicon.words().add_new(NewWord::new("starred", "starred")).unwrap();
        lexicon.words().toggle_favorite(starred.id).unwrap();
        for word in [&plain, &starred] {
            lexicon
                .quiz()
                .record_answer(
                    lexicon_core::EntryRef::Word(word.id),
                    false,
                    std::time::Duration::from_secs(2),
                )
                .unwrap();
        }

        let queue = QuizRecorder::new(lexicon.store().clone())
            .practice_queue(usize::MAX, true)
            .unwrap();
        assert_eq!(queue.len(), 2);

        let selected = select_words(queue, true, None);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, starred.id);
        assert!(select_words(selected, true, Some(0)).is_empty());
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "lexicon", "--db", "w.db", "add", "hello", "a greeting", "--pos", "interjection",
            "-e", "Hello there", "-e", "Hello again",
        ])
        .unwrap();
        match args.command {
            Command::Add { examples, pos, .. } => {
                assert_eq!(examples.len(), 2);
                assert_eq!(pos.as_deref(), Some("interjection"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
