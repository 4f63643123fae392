//! CSV import/export
//!
//! Backups use the column layout shared by the mobile apps:
//!
//! ```text
//! word,definition,partOfSpeech,phonetic,is_favorite,timestamp,id,examples
//! ```
//!
//! Examples are joined with `;`. Fields containing commas, quotes or line
//! breaks are quoted, with inner quotes doubled. Files ending in `.gz` are
//! gzip-compressed.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{PartOfSpeech, Word};

/// Header row written on export
pub const HEADER: [&str; 8] = [
    "word",
    "definition",
    "partOfSpeech",
    "phonetic",
    "is_favorite",
    "timestamp",
    "id",
    "examples",
];

/// Statistics returned after an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    /// Data rows read (header excluded)
    pub rows_processed: u64,
    pub words_imported: u64,
    /// Rows whose id is already in the store or earlier in the file
    pub duplicates_skipped: u64,
    pub empty_rows: u64,
    /// Rows that could not be turned into a word
    pub errors: u64,
}

/// Parsed words plus statistics
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub words: Vec<Word>,
    pub stats: ImportStats,
}

/// Render words as CSV, header included
pub fn export_words(words: &[Word]) -> String {
    let mut out = String::new();
    out.push_str(&HEADER.join(","));
    out.push('\n');

    for word in words {
        let fields = [
            escape_field(&word.text),
            escape_field(&word.definition),
            escape_field(word.part_of_speech.as_str()),
            escape_field(word.phonetic.as_deref().unwrap_or("")),
            word.is_favorite.to_string(),
            word.timestamp.to_rfc3339(),
            word.id.to_string(),
            escape_field(&word.examples.join(";")),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Parse CSV text into words
///
/// Rows whose id is in `current_word_ids` (or repeats an id seen earlier in
/// the file) are skipped. Rows without an id get a fresh one; rows without a
/// usable timestamp get the current time. `progress` receives
/// (rows done, total rows).
pub fn import_words(
    text: &str,
    current_word_ids: &HashSet<Uuid>,
    default_language_code: &str,
    progress: impl Fn(u64, u64),
) -> ImportOutcome {
    let mut records = parse_records(text);
    let columns = match records.first() {
        Some(first) if is_header(first) => {
            let columns = Columns::from_header(first);
            records.remove(0);
            columns
        }
        _ => Columns::positional(),
    };

    let total = records.len() as u64;
    let now = Utc::now();
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut outcome = ImportOutcome::default();

    for record in &records {
        outcome.stats.rows_processed += 1;
        if outcome.stats.rows_processed % 100 == 0 {
            progress(outcome.stats.rows_processed, total);
        }

        if record.iter().all(|f| f.trim().is_empty()) {
            outcome.stats.empty_rows += 1;
            continue;
        }

        let word = match columns.to_word(record, default_language_code, now) {
            Ok(word) => word,
            Err(reason) => {
                log::debug!("CSV row {}: {}", outcome.stats.rows_processed, reason);
                outcome.stats.errors += 1;
                continue;
            }
        };

        if current_word_ids.contains(&word.id) || !seen.insert(word.id) {
            outcome.stats.duplicates_skipped += 1;
            continue;
        }

        outcome.stats.words_imported += 1;
        outcome.words.push(word);
    }

    progress(outcome.stats.rows_processed, total);

    log::info!(
        "CSV parsed: {} rows, {} words, {} duplicates, {} errors",
        outcome.stats.rows_processed,
        outcome.stats.words_imported,
        outcome.stats.duplicates_skipped,
        outcome.stats.errors
    );

    outcome
}

/// Read a CSV file, decompressing `.gz` files
pub fn read_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut text = String::new();
    if is_gzipped(path) {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Write a CSV file, compressing when the path ends in `.gz`
pub fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let file = File::create(path)?;
    if is_gzipped(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(contents.as_bytes())?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }
    Ok(())
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().map(|ext| ext == "gz").unwrap_or(false)
}

/// Split CSV text into records of unescaped fields
///
/// Quoted fields may contain commas, doubled quotes and line breaks.
/// Both `\n` and `\r\n` end a record.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Quote a field if it needs it
fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn is_header(record: &[String]) -> bool {
    record
        .first()
        .map(|f| f.trim().eq_ignore_ascii_case(HEADER[0]))
        .unwrap_or(false)
}

/// Column positions, taken from the header when there is one
struct Columns {
    word: Option<usize>,
    definition: Option<usize>,
    part_of_speech: Option<usize>,
    phonetic: Option<usize>,
    is_favorite: Option<usize>,
    timestamp: Option<usize>,
    id: Option<usize>,
    examples: Option<usize>,
}

impl Columns {
    fn positional() -> Self {
        Self {
            word: Some(0),
            definition: Some(1),
            part_of_speech: Some(2),
            phonetic: Some(3),
            is_favorite: Some(4),
            timestamp: Some(5),
            id: Some(6),
            examples: Some(7),
        }
    }

    fn from_header(header: &[String]) -> Self {
        let index: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
            .collect();
        let find = |name: &str| index.get(&name.to_ascii_lowercase()).copied();

        Self {
            word: find("word"),
            definition: find("definition"),
            part_of_speech: find("partOfSpeech"),
            phonetic: find("phonetic"),
            is_favorite: find("is_favorite"),
            timestamp: find("timestamp"),
            id: find("id"),
            examples: find("examples"),
        }
    }

    fn to_word(
        &self,
        record: &[String],
        default_language_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Word, String> {
        let get = |col: Option<usize>| {
            col.and_then(|i| record.get(i))
                .map(|s| s.trim())
                .unwrap_or("")
        };

        let text = get(self.word);
        let definition = get(self.definition);
        if text.is_empty() || definition.is_empty() {
            return Err("word and definition are required".to_string());
        }

        let id = match get(self.id) {
            "" => Uuid::new_v4(),
            raw => Uuid::parse_str(raw).map_err(|e| format!("invalid id '{}': {}", raw, e))?,
        };

        let phonetic = match get(self.phonetic) {
            "" => None,
            p => Some(p.to_string()),
        };

        Ok(Word {
            id,
            text: text.to_string(),
            definition: definition.to_string(),
            part_of_speech: PartOfSpeech::parse(get(self.part_of_speech)),
            phonetic,
            language_code: default_language_code.to_string(),
            timestamp: parse_timestamp(get(self.timestamp)).unwrap_or(now),
            is_favorite: parse_bool(get(self.is_favorite)),
            examples: get(self.examples)
                .split(';')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect(),
            difficulty_score: 0,
            has_been_practiced: false,
            tags: Vec::new(),
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) and Unix seconds
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(secs) = value.parse::<f64>() {
        let millis = (secs * 1000.0).round() as i64;
        return Utc.timestamp_millis_opt(millis).single();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, definition: &str, examples: &[&str]) -> Word {
        Word {
            id: Uuid::new_v4(),
            text: text.to_string(),
            definition: definition.to_string(),
            part_of_speech: PartOfSpeech::Verb,
            phonetic: Some("/test/".to_string()),
            language_code: "en".to_string(),
            timestamp: Utc::now(),
            is_favorite: true,
            examples: examples.iter().map(|e| e.to_string()).collect(),
            difficulty_score: 0,
            has_been_practiced: false,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_parse_quoted_fields() {
        let records = parse_records("a,\"b, c\",\"say \"\"hi\"\"\"\r\n\"multi\nline\",x\n");
        assert_eq!(
            records,
            vec![
                vec!["a".to_string(), "b, c".to_string(), "say \"hi\"".to_string()],
                vec!["multi\nline".to_string(), "x".to_string()],
            ]
        );
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("6\" tall"), "\"6\"\" tall\"");
    }

    #[test]
    fn test_export_then_import_preserves_words() {
        let words = vec![
            word("run", "to move quickly, on foot", &["I run daily", "She runs; he walks"]),
            word("say \"cheese\"", "smile for a photo", &[]),
            word("walk", "to move at a regular pace", &["a long walk"]),
        ];

        let csv = export_words(&words);
        let outcome = import_words(&csv, &HashSet::new(), "en", |_, _| {});

        assert_eq!(outcome.stats.words_imported, 3);
        assert_eq!(outcome.words.len(), 3);
        for (original, imported) in words.iter().zip(&outcome.words) {
            assert_eq!(imported.id, original.id);
            assert_eq!(imported.text, original.text);
            assert_eq!(imported.definition, original.definition);
            assert_eq!(imported.part_of_speech, original.part_of_speech);
            assert_eq!(imported.timestamp, original.timestamp);
            assert!(imported.is_favorite);
        }
        // semicolons inside an example split it; that is the format
        assert_eq!(outcome.words[0].examples, vec!["I run daily", "She runs", "he walks"]);
        assert_eq!(outcome.words[2].examples, words[2].examples);
    }

    #[test]
    fn test_import_skips_known_ids() {
        let words = vec![word("one", "1", &[]), word("two", "2", &[])];
        let csv = export_words(&words);
        let current: HashSet<Uuid> = [words[0].id].into_iter().collect();

        let outcome = import_words(&csv, &current, "en", |_, _| {});
        assert_eq!(outcome.stats.duplicates_skipped, 1);
        assert_eq!(outcome.words.len(), 1);
        assert_eq!(outcome.words[0].text, "two");
    }

    #[test]
    fn test_import_without_header_or_ids() {
        let csv = "apple,a fruit,noun,,no,,,red;green\n\n,missing word,noun\nbanana,yellow fruit\n";
        let outcome = import_words(csv, &HashSet::new(), "fr", |_, _| {});

        assert_eq!(outcome.stats.rows_processed, 4);
        assert_eq!(outcome.stats.empty_rows, 1);
        assert_eq!(outcome.stats.errors, 1);
        assert_eq!(outcome.words.len(), 2);
        assert_eq!(outcome.words[0].examples, vec!["red", "green"]);
        assert_eq!(outcome.words[1].part_of_speech, PartOfSpeech::Unknown);
        assert_eq!(outcome.words[1].language_code, "fr");
        assert_ne!(outcome.words[0].id, outcome.words[1].id);
    }

    #[test]
    fn test_header_columns_in_any_order() {
        let csv = "definition,word,is_favorite\nlarge,big,TRUE\n";
        let outcome = import_words(csv, &HashSet::new(), "en", |_, _| {});
        assert_eq!(outcome.words.len(), 1);
        assert_eq!(outcome.words[0].text, "big");
        assert_eq!(outcome.words[0].definition, "large");
        assert!(outcome.words[0].is_favorite);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("1709296200"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_gzip_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.csv.gz");
        let csv = export_words(&[word("zip", "to compress", &[])]);

        write_file(&path, &csv).unwrap();
        assert_eq!(read_file(&path).unwrap(), csv);
    }
}
