//! SQLite database operations
//!
//! This module handles all database interactions including:
//! - Schema creation and version checks
//! - Row mapping for every entity
//! - Insert / update / delete / query functions over a `&Connection`
//!
//! Functions here return `rusqlite::Result`; the store maps failures onto
//! [`StorageError`](crate::error::StorageError) depending on whether it was
//! reading or writing.

use std::collections::{HashMap, HashSet};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::difficulty::Difficulty;
use crate::models::{
    EntryRef, Idiom, PartOfSpeech, Progress, QuizSession, QuizType, SharedDictionary, SharedWord,
    Tag, TagColor, UserStats, Word,
};

/// Version written to `PRAGMA user_version` once the schema is applied
pub const SCHEMA_VERSION: i32 = 1;

/// SQL schema for the vocabulary database
const SCHEMA: &str = r#"
-- Words
CREATE TABLE IF NOT EXISTS words (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    definition TEXT NOT NULL,
    part_of_speech TEXT NOT NULL,
    phonetic TEXT,
    language_code TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    examples TEXT NOT NULL DEFAULT '[]',  -- JSON array
    difficulty_score INTEGER NOT NULL DEFAULT 0,
    has_been_practiced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_words_timestamp ON words(timestamp);

-- Idioms
CREATE TABLE IF NOT EXISTS idioms (
    id TEXT PRIMARY KEY,
    idiom_itself TEXT NOT NULL,
    definition TEXT NOT NULL,
    language_code TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    examples TEXT NOT NULL DEFAULT '[]',  -- JSON array
    difficulty_score INTEGER NOT NULL DEFAULT 0,
    has_been_practiced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_idioms_timestamp ON idioms(timestamp);

-- Tags
CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name ON tags(name COLLATE NOCASE);

-- Tag links (many-to-many)
CREATE TABLE IF NOT EXISTS word_tags (
    word_id TEXT NOT NULL,
    tag_id TEXT NOT NULL,
    PRIMARY KEY (word_id, tag_id),
    FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS idiom_tags (
    idiom_id TEXT NOT NULL,
    tag_id TEXT NOT NULL,
    PRIMARY KEY (idiom_id, tag_id),
    FOREIGN KEY (idiom_id) REFERENCES idioms(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

-- Practice progress for words and idioms
CREATE TABLE IF NOT EXISTS progress (
    id TEXT PRIMARY KEY,
    entry_kind TEXT NOT NULL,   -- 'word' or 'idiom'
    entry_id TEXT NOT NULL,
    average_response_time REAL NOT NULL DEFAULT 0,
    consecutive_correct INTEGER NOT NULL DEFAULT 0,
    correct_attempts INTEGER NOT NULL DEFAULT 0,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    mastery_level TEXT NOT NULL,
    last_practiced TEXT,
    difficulty_score REAL NOT NULL DEFAULT 0,
    UNIQUE (entry_kind, entry_id)
);

-- Progress rows cannot reference two tables, so clean them up by trigger
CREATE TRIGGER IF NOT EXISTS words_ad AFTER DELETE ON words BEGIN
    DELETE FROM progress WHERE entry_kind = 'word' AND entry_id = old.id;
END;

CREATE TRIGGER IF NOT EXISTS idioms_ad AFTER DELETE ON idioms BEGIN
    DELETE FROM progress WHERE entry_kind = 'idiom' AND entry_id = old.id;
END;

-- Completed quizzes
CREATE TABLE IF NOT EXISTS quiz_sessions (
    id TEXT PRIMARY KEY,
    quiz_type TEXT NOT NULL,
    date TEXT NOT NULL,
    score INTEGER NOT NULL,
    total_words INTEGER NOT NULL,
    correct_answers INTEGER NOT NULL,
    accuracy REAL NOT NULL,
    duration REAL NOT NULL,
    words_practiced TEXT NOT NULL DEFAULT '[]'  -- JSON array of ids
);

CREATE INDEX IF NOT EXISTS idx_quiz_sessions_date ON quiz_sessions(date);

-- Singleton statistics row
CREATE TABLE IF NOT EXISTS user_stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    average_accuracy REAL NOT NULL,
    current_streak INTEGER NOT NULL,
    longest_streak INTEGER NOT NULL,
    total_practice_time REAL NOT NULL,
    total_sessions INTEGER NOT NULL,
    total_words_studied INTEGER NOT NULL,
    vocabulary_size INTEGER NOT NULL,
    last_practice_date TEXT,
    preferences TEXT NOT NULL  -- JSON object
);

-- Cached shared dictionaries
CREATE TABLE IF NOT EXISTS shared_dictionaries (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    collaborators TEXT NOT NULL DEFAULT '[]',  -- JSON array
    created_at TEXT NOT NULL,
    is_public INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS shared_words (
    dictionary_id TEXT NOT NULL,
    id TEXT NOT NULL,
    text TEXT NOT NULL,
    definition TEXT NOT NULL,
    part_of_speech TEXT NOT NULL,
    phonetic TEXT,
    examples TEXT NOT NULL DEFAULT '[]',
    added_by TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    PRIMARY KEY (dictionary_id, id),
    FOREIGN KEY (dictionary_id) REFERENCES shared_dictionaries(id) ON DELETE CASCADE
);
"#;

/// Apply the schema and stamp its version
///
/// Returns the version found before applying, so callers can refuse
/// databases written by a newer build.
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<i32> {
    let found: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Ok(found);
    }
    conn.execute_batch(SCHEMA)?;
    conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
    Ok(found)
}

// ============================================================================
// Column helpers
// ============================================================================

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_enum<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| conversion_error(idx, format!("unknown value '{}'", text)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Table holding the entry itself
fn entry_table(entry: &EntryRef) -> &'static str {
    match entry {
        EntryRef::Word(_) => "words",
        EntryRef::Idiom(_) => "idioms",
    }
}

/// Link table and its entry column
fn link_table(entry: &EntryRef) -> (&'static str, &'static str) {
    match entry {
        EntryRef::Word(_) => ("word_tags", "word_id"),
        EntryRef::Idiom(_) => ("idiom_tags", "idiom_id"),
    }
}

// ============================================================================
// Words
// ============================================================================

const WORD_COLUMNS: &str = "id, text, definition, part_of_speech, phonetic, language_code, \
    timestamp, is_favorite, examples, difficulty_score, has_been_practiced";

fn row_to_word(row: &Row) -> rusqlite::Result<Word> {
    let pos: String = row.get(3)?;
    Ok(Word {
        id: get_uuid(row, 0)?,
        text: row.get(1)?,
        definition: row.get(2)?,
        part_of_speech: PartOfSpeech::parse(&pos),
        phonetic: row.get(4)?,
        language_code: row.get(5)?,
        timestamp: row.get(6)?,
        is_favorite: row.get(7)?,
        examples: get_json(row, 8)?,
        difficulty_score: row.get(9)?,
        has_been_practiced: row.get(10)?,
        tags: Vec::new(),
    })
}

/// Insert a new word (tags are linked separately)
pub fn insert_word(conn: &Connection, word: &Word) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO words ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            WORD_COLUMNS
        ),
        params![
            word.id.to_string(),
            word.text,
            word.definition,
            word.part_of_speech.as_str(),
            word.phonetic,
            word.language_code,
            word.timestamp,
            word.is_favorite,
            to_json(&word.examples)?,
            word.difficulty_score,
            word.has_been_practiced,
        ],
    )?;
    Ok(())
}

/// Insert a word, or overwrite every column of an existing one
pub fn upsert_word(conn: &Connection, word: &Word) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO words ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                definition = excluded.definition,
                part_of_speech = excluded.part_of_speech,
                phonetic = excluded.phonetic,
                language_code = excluded.language_code,
                timestamp = excluded.timestamp,
                is_favorite = excluded.is_favorite,
                examples = excluded.examples,
                difficulty_score = excluded.difficulty_score,
                has_been_practiced = excluded.has_been_practiced",
            WORD_COLUMNS
        ),
        params![
            word.id.to_string(),
            word.text,
            word.definition,
            word.part_of_speech.as_str(),
            word.phonetic,
            word.language_code,
            word.timestamp,
            word.is_favorite,
            to_json(&word.examples)?,
            word.difficulty_score,
            word.has_been_practiced,
        ],
    )?;
    Ok(())
}

/// Update the editable fields of a word
pub fn update_word(conn: &Connection, word: &Word) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE words SET text = ?, definition = ?, part_of_speech = ?, phonetic = ?,
            language_code = ?, is_favorite = ?, examples = ?
         WHERE id = ?",
        params![
            word.text,
            word.definition,
            word.part_of_speech.as_str(),
            word.phonetic,
            word.language_code,
            word.is_favorite,
            to_json(&word.examples)?,
            word.id.to_string(),
        ],
    )?;
    Ok(rows > 0)
}

/// Delete a word; tag links and progress go with it
pub fn delete_word(conn: &Connection, word_id: Uuid) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM words WHERE id = ?", params![word_id.to_string()])?;
    Ok(rows > 0)
}

/// Get a word by ID, with its tags
pub fn get_word(conn: &Connection, word_id: Uuid) -> rusqlite::Result<Option<Word>> {
    let word = conn
        .query_row(
            &format!("SELECT {} FROM words WHERE id = ?", WORD_COLUMNS),
            params![word_id.to_string()],
            row_to_word,
        )
        .optional()?;

    match word {
        Some(mut word) => {
            word.tags = tags_for_entry(conn, &EntryRef::Word(word.id))?;
            Ok(Some(word))
        }
        None => Ok(None),
    }
}

/// Get all words, newest first, with their tags
pub fn list_words(conn: &Connection) -> rusqlite::Result<Vec<Word>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM words ORDER BY timestamp DESC, id",
        WORD_COLUMNS
    ))?;
    let mut words = stmt
        .query_map([], row_to_word)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tags = tags_by_entry(conn, "word_tags", "word_id")?;
    for word in &mut words {
        word.tags = tags.remove(&word.id).unwrap_or_default();
    }
    Ok(words)
}

/// Ids of every stored word
pub fn word_ids(conn: &Connection) -> rusqlite::Result<HashSet<Uuid>> {
    let mut stmt = conn.prepare("SELECT id FROM words")?;
    let rows = stmt.query_map([], |row| get_uuid(row, 0))?;
    rows.collect()
}

// ============================================================================
// Idioms
// ============================================================================

const IDIOM_COLUMNS: &str = "id, idiom_itself, definition, language_code, timestamp, \
    is_favorite, examples, difficulty_score, has_been_practiced";

fn row_to_idiom(row: &Row) -> rusqlite::Result<Idiom> {
    Ok(Idiom {
        id: get_uuid(row, 0)?,
        idiom_itself: row.get(1)?,
        definition: row.get(2)?,
        language_code: row.get(3)?,
        timestamp: row.get(4)?,
        is_favorite: row.get(5)?,
        examples: get_json(row, 6)?,
        difficulty_score: row.get(7)?,
        has_been_practiced: row.get(8)?,
        tags: Vec::new(),
    })
}

/// Insert a new idiom
pub fn insert_idiom(conn: &Connection, idiom: &Idiom) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO idioms ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            IDIOM_COLUMNS
        ),
        params![
            idiom.id.to_string(),
            idiom.idiom_itself,
            idiom.definition,
            idiom.language_code,
            idiom.timestamp,
            idiom.is_favorite,
            to_json(&idiom.examples)?,
            idiom.difficulty_score,
            idiom.has_been_practiced,
        ],
    )?;
    Ok(())
}

/// Insert an idiom, or overwrite every column of an existing one
pub fn upsert_idiom(conn: &Connection, idiom: &Idiom) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO idioms ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                idiom_itself = excluded.idiom_itself,
                definition = excluded.definition,
                language_code = excluded.language_code,
                timestamp = excluded.timestamp,
                is_favorite = excluded.is_favorite,
                examples = excluded.examples,
                difficulty_score = excluded.difficulty_score,
                has_been_practiced = excluded.has_been_practiced",
            IDIOM_COLUMNS
        ),
        params![
            idiom.id.to_string(),
            idiom.idiom_itself,
            idiom.definition,
            idiom.language_code,
            idiom.timestamp,
            idiom.is_favorite,
            to_json(&idiom.examples)?,
            idiom.difficulty_score,
            idiom.has_been_practiced,
        ],
    )?;
    Ok(())
}

/// Update the editable fields of an idiom
pub fn update_idiom(conn: &Connection, idiom: &Idiom) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE idioms SET idiom_itself = ?, definition = ?, language_code = ?,
            is_favorite = ?, examples = ?
         WHERE id = ?",
        params![
            idiom.idiom_itself,
            idiom.definition,
            idiom.language_code,
            idiom.is_favorite,
            to_json(&idiom.examples)?,
            idiom.id.to_string(),
        ],
    )?;
    Ok(rows > 0)
}

/// Delete an idiom; tag links and progress go with it
pub fn delete_idiom(conn: &Connection, idiom_id: Uuid) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM idioms WHERE id = ?",
        params![idiom_id.to_string()],
    )?;
    Ok(rows > 0)
}

/// Get an idiom by ID, with its tags
pub fn get_idiom(conn: &Connection, idiom_id: Uuid) -> rusqlite::Result<Option<Idiom>> {
    let idiom = conn
        .query_row(
            &format!("SELECT {} FROM idioms WHERE id = ?", IDIOM_COLUMNS),
            params![idiom_id.to_string()],
            row_to_idiom,
        )
        .optional()?;

    match idiom {
        Some(mut idiom) => {
            idiom.tags = tags_for_entry(conn, &EntryRef::Idiom(idiom.id))?;
            Ok(Some(idiom))
        }
        None => Ok(None),
    }
}

/// Get all idioms, newest first, with their tags
pub fn list_idioms(conn: &Connection) -> rusqlite::Result<Vec<Idiom>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM idioms ORDER BY timestamp DESC, id",
        IDIOM_COLUMNS
    ))?;
    let mut idioms = stmt
        .query_map([], row_to_idiom)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tags = tags_by_entry(conn, "idiom_tags", "idiom_id")?;
    for idiom in &mut idioms {
        idiom.tags = tags.remove(&idiom.id).unwrap_or_default();
    }
    Ok(idioms)
}

// ============================================================================
// Shared word / idiom operations
// ============================================================================

/// Whether the referenced entry exists
pub fn entry_exists(conn: &Connection, entry: &EntryRef) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE id = ?", entry_table(entry)),
        params![entry.id().to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Current difficulty score and practiced flag of an entry
pub fn entry_score(conn: &Connection, entry: &EntryRef) -> rusqlite::Result<Option<(i32, bool)>> {
    conn.query_row(
        &format!(
            "SELECT difficulty_score, has_been_practiced FROM {} WHERE id = ?",
            entry_table(entry)
        ),
        params![entry.id().to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Store a new difficulty score and practiced flag
pub fn set_entry_score(
    conn: &Connection,
    entry: &EntryRef,
    score: i32,
    practiced: bool,
) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        &format!(
            "UPDATE {} SET difficulty_score = ?, has_been_practiced = ? WHERE id = ?",
            entry_table(entry)
        ),
        params![score, practiced, entry.id().to_string()],
    )?;
    Ok(rows > 0)
}

/// Number of stored words
pub fn count_words(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))
}

/// Number of stored idioms
pub fn count_idioms(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM idioms", [], |row| row.get(0))
}

// ============================================================================
// Tags
// ============================================================================

const TAG_COLUMNS: &str = "id, name, color, timestamp";

fn row_to_tag_at(row: &Row, offset: usize) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: get_uuid(row, offset)?,
        name: row.get(offset + 1)?,
        color: get_enum(row, offset + 2, TagColor::from_str)?,
        timestamp: row.get(offset + 3)?,
    })
}

fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    row_to_tag_at(row, 0)
}

/// Insert a new tag
pub fn insert_tag(conn: &Connection, tag: &Tag) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO tags ({}) VALUES (?, ?, ?, ?)", TAG_COLUMNS),
        params![tag.id.to_string(), tag.name, tag.color.as_str(), tag.timestamp],
    )?;
    Ok(())
}

/// Insert a tag, or overwrite an existing one with the same id
pub fn upsert_tag(conn: &Connection, tag: &Tag) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO tags ({}) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                color = excluded.color,
                timestamp = excluded.timestamp",
            TAG_COLUMNS
        ),
        params![tag.id.to_string(), tag.name, tag.color.as_str(), tag.timestamp],
    )?;
    Ok(())
}

/// Update the name and color of a tag
pub fn update_tag(conn: &Connection, tag: &Tag) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE tags SET name = ?, color = ? WHERE id = ?",
        params![tag.name, tag.color.as_str(), tag.id.to_string()],
    )?;
    Ok(rows > 0)
}

/// Delete a tag and all its links
pub fn delete_tag(conn: &Connection, tag_id: Uuid) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM tags WHERE id = ?", params![tag_id.to_string()])?;
    Ok(rows > 0)
}

/// Get a tag by ID
pub fn get_tag(conn: &Connection, tag_id: Uuid) -> rusqlite::Result<Option<Tag>> {
    conn.query_row(
        &format!("SELECT {} FROM tags WHERE id = ?", TAG_COLUMNS),
        params![tag_id.to_string()],
        row_to_tag,
    )
    .optional()
}

/// Find a tag by name, ignoring case
pub fn find_tag_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Tag>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM tags WHERE name = ? COLLATE NOCASE",
            TAG_COLUMNS
        ),
        params![name],
        row_to_tag,
    )
    .optional()
}

/// Get all tags ordered by name
pub fn list_tags(conn: &Connection) -> rusqlite::Result<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tags ORDER BY name COLLATE NOCASE",
        TAG_COLUMNS
    ))?;
    let rows = stmt.query_map([], row_to_tag)?;
    rows.collect()
}

/// Link a tag to a word or idiom; returns false if already linked
pub fn attach_tag(conn: &Connection, entry: &EntryRef, tag_id: Uuid) -> rusqlite::Result<bool> {
    let (table, column) = link_table(entry);
    let rows = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} ({}, tag_id) VALUES (?, ?)",
            table, column
        ),
        params![entry.id().to_string(), tag_id.to_string()],
    )?;
    Ok(rows > 0)
}

/// Remove a tag link; returns false if there was none
pub fn detach_tag(conn: &Connection, entry: &EntryRef, tag_id: Uuid) -> rusqlite::Result<bool> {
    let (table, column) = link_table(entry);
    let rows = conn.execute(
        &format!("DELETE FROM {} WHERE {} = ? AND tag_id = ?", table, column),
        params![entry.id().to_string(), tag_id.to_string()],
    )?;
    Ok(rows > 0)
}

/// Remove every tag link of an entry
pub fn clear_tags(conn: &Connection, entry: &EntryRef) -> rusqlite::Result<usize> {
    let (table, column) = link_table(entry);
    conn.execute(
        &format!("DELETE FROM {} WHERE {} = ?", table, column),
        params![entry.id().to_string()],
    )
}

/// Tags linked to one entry, ordered by name
pub fn tags_for_entry(conn: &Connection, entry: &EntryRef) -> rusqlite::Result<Vec<Tag>> {
    let (table, column) = link_table(entry);
    let mut stmt = conn.prepare(&format!(
        "SELECT t.id, t.name, t.color, t.timestamp
         FROM {} l JOIN tags t ON t.id = l.tag_id
         WHERE l.{} = ?
         ORDER BY t.name COLLATE NOCASE",
        table, column
    ))?;
    let rows = stmt.query_map(params![entry.id().to_string()], row_to_tag)?;
    rows.collect()
}

/// Replace tag `from` with `to`, moving its links over
///
/// Used when a remote tag carries the name of a different local tag.
pub fn replace_tag(conn: &Connection, from: Uuid, to: &Tag) -> rusqlite::Result<()> {
    let mut linked = Vec::new();
    for (table, column) in [("word_tags", "word_id"), ("idiom_tags", "idiom_id")] {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE tag_id = ?",
            column, table
        ))?;
        let ids = stmt
            .query_map(params![from.to_string()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        linked.push((table, column, ids));
    }

    delete_tag(conn, from)?;
    upsert_tag(conn, to)?;

    for (table, column, ids) in linked {
        for id in ids {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} ({}, tag_id) VALUES (?, ?)",
                    table, column
                ),
                params![id, to.id.to_string()],
            )?;
        }
    }
    Ok(())
}

/// All tag links of one table, grouped by entry id
fn tags_by_entry(
    conn: &Connection,
    table: &str,
    column: &str,
) -> rusqlite::Result<HashMap<Uuid, Vec<Tag>>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT l.{}, t.id, t.name, t.color, t.timestamp
         FROM {} l JOIN tags t ON t.id = l.tag_id
         ORDER BY t.name COLLATE NOCASE",
        column, table
    ))?;
    let rows = stmt.query_map([], |row| Ok((get_uuid(row, 0)?, row_to_tag_at(row, 1)?)))?;

    let mut map: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in rows {
        let (entry_id, tag) = row?;
        map.entry(entry_id).or_default().push(tag);
    }
    Ok(map)
}

// ============================================================================
// Progress
// ============================================================================

fn row_to_progress(row: &Row) -> rusqlite::Result<Progress> {
    let kind: String = row.get(1)?;
    let entry_id = get_uuid(row, 2)?;
    let entry = match kind.as_str() {
        "word" => EntryRef::Word(entry_id),
        "idiom" => EntryRef::Idiom(entry_id),
        other => return Err(conversion_error(1, format!("unknown entry kind '{}'", other))),
    };

    Ok(Progress {
        id: get_uuid(row, 0)?,
        entry,
        average_response_time: row.get(3)?,
        consecutive_correct: row.get(4)?,
        correct_attempts: row.get(5)?,
        total_attempts: row.get(6)?,
        mastery_level: get_enum(row, 7, Difficulty::from_str)?,
        last_practiced: row.get(8)?,
        difficulty_score: row.get(9)?,
    })
}

/// Progress of one entry, if it has ever been answered
pub fn get_progress(conn: &Connection, entry: &EntryRef) -> rusqlite::Result<Option<Progress>> {
    conn.query_row(
        "SELECT id, entry_kind, entry_id, average_response_time, consecutive_correct,
                correct_attempts, total_attempts, mastery_level, last_practiced, difficulty_score
         FROM progress WHERE entry_kind = ? AND entry_id = ?",
        params![entry.kind(), entry.id().to_string()],
        row_to_progress,
    )
    .optional()
}

/// Insert or replace the progress row of an entry
pub fn upsert_progress(conn: &Connection, progress: &Progress) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO progress (id, entry_kind, entry_id, average_response_time,
            consecutive_correct, correct_attempts, total_attempts, mastery_level,
            last_practiced, difficulty_score)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(entry_kind, entry_id) DO UPDATE SET
            average_response_time = excluded.average_response_time,
            consecutive_correct = excluded.consecutive_correct,
            correct_attempts = excluded.correct_attempts,
            total_attempts = excluded.total_attempts,
            mastery_level = excluded.mastery_level,
            last_practiced = excluded.last_practiced,
            difficulty_score = excluded.difficulty_score",
        params![
            progress.id.to_string(),
            progress.entry.kind(),
            progress.entry.id().to_string(),
            progress.average_response_time,
            progress.consecutive_correct,
            progress.correct_attempts,
            progress.total_attempts,
            progress.mastery_level.as_str(),
            progress.last_practiced,
            progress.difficulty_score,
        ],
    )?;
    Ok(())
}

// ============================================================================
// Quiz sessions
// ============================================================================

/// Insert a completed quiz
pub fn insert_quiz_session(conn: &Connection, session: &QuizSession) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO quiz_sessions (id, quiz_type, date, score, total_words, correct_answers,
            accuracy, duration, words_practiced)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            session.id.to_string(),
            session.quiz_type.as_str(),
            session.date,
            session.score,
            session.total_words,
            session.correct_answers,
            session.accuracy,
            session.duration,
            to_json(&session.words_practiced)?,
        ],
    )?;
    Ok(())
}

/// Most recent quizzes first
pub fn list_quiz_sessions(conn: &Connection, limit: u32) -> rusqlite::Result<Vec<QuizSession>> {
    let mut stmt = conn.prepare(
        "SELECT id, quiz_type, date, score, total_words, correct_answers, accuracy, duration,
                words_practiced
         FROM quiz_sessions ORDER BY date DESC LIMIT ?",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(QuizSession {
            id: get_uuid(row, 0)?,
            quiz_type: get_enum(row, 1, QuizType::from_str)?,
            date: row.get(2)?,
            score: row.get(3)?,
            total_words: row.get(4)?,
            correct_answers: row.get(5)?,
            accuracy: row.get(6)?,
            duration: row.get(7)?,
            words_practiced: get_json(row, 8)?,
        })
    })?;
    rows.collect()
}

// ============================================================================
// User stats
// ============================================================================

/// Load the statistics row, if it has been written
pub fn load_user_stats(conn: &Connection) -> rusqlite::Result<Option<UserStats>> {
    conn.query_row(
        "SELECT average_accuracy, current_streak, longest_streak, total_practice_time,
                total_sessions, total_words_studied, vocabulary_size, last_practice_date,
                preferences
         FROM user_stats WHERE id = 1",
        [],
        |row| {
            Ok(UserStats {
                average_accuracy: row.get(0)?,
                current_streak: row.get(1)?,
                longest_streak: row.get(2)?,
                total_practice_time: row.get(3)?,
                total_sessions: row.get(4)?,
                total_words_studied: row.get(5)?,
                vocabulary_size: row.get(6)?,
                last_practice_date: row.get(7)?,
                preferences: get_json(row, 8)?,
            })
        },
    )
    .optional()
}

/// Write the statistics row
pub fn save_user_stats(conn: &Connection, stats: &UserStats) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO user_stats (id, average_accuracy, current_streak, longest_streak,
            total_practice_time, total_sessions, total_words_studied, vocabulary_size,
            last_practice_date, preferences)
         VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            stats.average_accuracy,
            stats.current_streak,
            stats.longest_streak,
            stats.total_practice_time,
            stats.total_sessions,
            stats.total_words_studied,
            stats.vocabulary_size,
            stats.last_practice_date,
            to_json(&stats.preferences)?,
        ],
    )?;
    Ok(())
}

// ============================================================================
// Shared dictionaries
// ============================================================================

/// Insert or replace the cached copy of a shared dictionary
pub fn upsert_shared_dictionary(
    conn: &Connection,
    dict: &SharedDictionary,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO shared_dictionaries (id, name, owner_id, collaborators, created_at, is_public)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            owner_id = excluded.owner_id,
            collaborators = excluded.collaborators,
            created_at = excluded.created_at,
            is_public = excluded.is_public",
        params![
            dict.id,
            dict.name,
            dict.owner_id,
            to_json(&dict.collaborators)?,
            dict.created_at,
            dict.is_public,
        ],
    )?;
    Ok(())
}

/// Delete a shared dictionary and its cached words
pub fn delete_shared_dictionary(conn: &Connection, dict_id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM shared_dictionaries WHERE id = ?",
        params![dict_id],
    )?;
    Ok(rows > 0)
}

fn row_to_shared_dictionary(row: &Row) -> rusqlite::Result<SharedDictionary> {
    Ok(SharedDictionary {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        collaborators: get_json(row, 3)?,
        created_at: row.get(4)?,
        is_public: row.get(5)?,
    })
}

pub fn get_shared_dictionary(
    conn: &Connection,
    dict_id: &str,
) -> rusqlite::Result<Option<SharedDictionary>> {
    conn.query_row(
        "SELECT id, name, owner_id, collaborators, created_at, is_public
         FROM shared_dictionaries WHERE id = ?",
        params![dict_id],
        row_to_shared_dictionary,
    )
    .optional()
}

pub fn list_shared_dictionaries(conn: &Connection) -> rusqlite::Result<Vec<SharedDictionary>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, owner_id, collaborators, created_at, is_public
         FROM shared_dictionaries ORDER BY name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], row_to_shared_dictionary)?;
    rows.collect()
}

/// Insert or replace a word in a shared dictionary
pub fn upsert_shared_word(conn: &Connection, word: &SharedWord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO shared_words (dictionary_id, id, text, definition, part_of_speech,
            phonetic, examples, added_by, timestamp)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(dictionary_id, id) DO UPDATE SET
            text = excluded.text,
            definition = excluded.definition,
            part_of_speech = excluded.part_of_speech,
            phonetic = excluded.phonetic,
            examples = excluded.examples,
            added_by = excluded.added_by,
            timestamp = excluded.timestamp",
        params![
            word.dictionary_id,
            word.id,
            word.text,
            word.definition,
            word.part_of_speech.as_str(),
            word.phonetic,
            to_json(&word.examples)?,
            word.added_by,
            word.timestamp,
        ],
    )?;
    Ok(())
}

pub fn delete_shared_word(conn: &Connection, dict_id: &str, word_id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM shared_words WHERE dictionary_id = ? AND id = ?",
        params![dict_id, word_id],
    )?;
    Ok(rows > 0)
}

/// Words of one shared dictionary, newest first
pub fn list_shared_words(conn: &Connection, dict_id: &str) -> rusqlite::Result<Vec<SharedWord>> {
    let mut stmt = conn.prepare(
        "SELECT dictionary_id, id, text, definition, part_of_speech, phonetic, examples,
                added_by, timestamp
         FROM shared_words WHERE dictionary_id = ? ORDER BY timestamp DESC, id",
    )?;
    let rows = stmt.query_map(params![dict_id], |row| {
        let pos: String = row.get(4)?;
        Ok(SharedWord {
            dictionary_id: row.get(0)?,
            id: row.get(1)?,
            text: row.get(2)?,
            definition: row.get(3)?,
            part_of_speech: PartOfSpeech::parse(&pos),
            phonetic: row.get(5)?,
            examples: get_json(row, 6)?,
            added_by: row.get(7)?,
            timestamp: row.get(8)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    fn sample_word(text: &str) -> Word {
        Word {
            id: Uuid::new_v4(),
            text: text.to_string(),
            definition: format!("definition of {}", text),
            part_of_speech: PartOfSpeech::Noun,
            phonetic: None,
            language_code: "en".to_string(),
            timestamp: Utc::now(),
            is_favorite: false,
            examples: vec!["one".to_string(), "two".to_string()],
            difficulty_score: 0,
            has_been_practiced: false,
            tags: Vec::new(),
        }
    }

    fn sample_tag(name: &str) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: TagColor::Teal,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_apply_schema_stamps_version() {
        let conn = setup_test_db();
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        // second application is harmless
        assert_eq!(apply_schema(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_insert_and_get_word() {
        let conn = setup_test_db();
        let word = sample_word("serendipity");
        insert_word(&conn, &word).unwrap();

        let loaded = get_word(&conn, word.id).unwrap().unwrap();
        assert_eq!(loaded.text, "serendipity");
        assert_eq!(loaded.examples, vec!["one", "two"]);
        assert_eq!(loaded.timestamp, word.timestamp);
    }

    #[test]
    fn test_delete_word_cascades() {
        let conn = setup_test_db();
        let word = sample_word("ephemeral");
        let tag = sample_tag("gre");
        insert_word(&conn, &word).unwrap();
        insert_tag(&conn, &tag).unwrap();
        let entry = EntryRef::Word(word.id);
        attach_tag(&conn, &entry, tag.id).unwrap();
        upsert_progress(&conn, &Progress::new(entry)).unwrap();

        assert!(delete_word(&conn, word.id).unwrap());

        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM word_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
        assert!(get_progress(&conn, &entry).unwrap().is_none());
        // the tag itself survives
        assert!(get_tag(&conn, tag.id).unwrap().is_some());
    }

    #[test]
    fn test_list_words_includes_tags() {
        let conn = setup_test_db();
        let word = sample_word("laconic");
        let other = sample_word("verbose");
        insert_word(&conn, &word).unwrap();
        insert_word(&conn, &other).unwrap();
        let b = sample_tag("b-tag");
        let a = sample_tag("A-tag");
        insert_tag(&conn, &b).unwrap();
        insert_tag(&conn, &a).unwrap();
        attach_tag(&conn, &EntryRef::Word(word.id), b.id).unwrap();
        attach_tag(&conn, &EntryRef::Word(word.id), a.id).unwrap();

        let words = list_words(&conn).unwrap();
        let laconic = words.iter().find(|w| w.id == word.id).unwrap();
        let names: Vec<_> = laconic.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A-tag", "b-tag"]);
        let verbose = words.iter().find(|w| w.id == other.id).unwrap();
        assert!(verbose.tags.is_empty());
    }

    #[test]
    fn test_attach_tag_twice_is_ignored() {
        let conn = setup_test_db();
        let word = sample_word("terse");
        let tag = sample_tag("style");
        insert_word(&conn, &word).unwrap();
        insert_tag(&conn, &tag).unwrap();

        let entry = EntryRef::Word(word.id);
        assert!(attach_tag(&conn, &entry, tag.id).unwrap());
        assert!(!attach_tag(&conn, &entry, tag.id).unwrap());
        assert!(detach_tag(&conn, &entry, tag.id).unwrap());
        assert!(!detach_tag(&conn, &entry, tag.id).unwrap());
    }

    #[test]
    fn test_tag_names_unique_ignoring_case() {
        let conn = setup_test_db();
        insert_tag(&conn, &sample_tag("Travel")).unwrap();
        assert!(insert_tag(&conn, &sample_tag("travel")).is_err());
        assert!(find_tag_by_name(&conn, "TRAVEL").unwrap().is_some());
    }

    #[test]
    fn test_upsert_word_keeps_tags() {
        let conn = setup_test_db();
        let mut word = sample_word("quixotic");
        let tag = sample_tag("lit");
        insert_word(&conn, &word).unwrap();
        insert_tag(&conn, &tag).unwrap();
        attach_tag(&conn, &EntryRef::Word(word.id), tag.id).unwrap();

        word.definition = "idealistic".to_string();
        upsert_word(&conn, &word).unwrap();

        let loaded = get_word(&conn, word.id).unwrap().unwrap();
        assert_eq!(loaded.definition, "idealistic");
        assert_eq!(loaded.tags.len(), 1);
    }

    #[test]
    fn test_corrupt_examples_fail_to_decode() {
        let conn = setup_test_db();
        let word = sample_word("broken");
        insert_word(&conn, &word).unwrap();
        conn.execute("UPDATE words SET examples = 'not json'", [])
            .unwrap();

        let err = get_word(&conn, word.id).unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(8, ..)));
    }

    #[test]
    fn test_replace_tag_moves_links() {
        let conn = setup_test_db();
        let word = sample_word("hola");
        let local = sample_tag("Spanish");
        insert_word(&conn, &word).unwrap();
        insert_tag(&conn, &local).unwrap();
        let entry = EntryRef::Word(word.id);
        attach_tag(&conn, &entry, local.id).unwrap();

        let remote = sample_tag("spanish");
        replace_tag(&conn, local.id, &remote).unwrap();

        assert!(get_tag(&conn, local.id).unwrap().is_none());
        assert_eq!(tags_for_entry(&conn, &entry).unwrap(), vec![remote]);
    }

    #[test]
    fn test_user_stats_round_trip() {
        let conn = setup_test_db();
        assert!(load_user_stats(&conn).unwrap().is_none());

        let mut stats = UserStats::default();
        stats.current_streak = 3;
        stats.last_practice_date = Some(Utc::now().date_naive());
        stats.preferences.words_per_session = 25;
        save_user_stats(&conn, &stats).unwrap();
        save_user_stats(&conn, &stats).unwrap();

        assert_eq!(load_user_stats(&conn).unwrap(), Some(stats));
    }
}
