//! Data models for vocabulary entries
//!
//! This module defines the entities persisted by the store: words, idioms,
//! tags, practice progress, quiz sessions, user statistics and shared
//! dictionaries. All of them serialize to camelCase JSON for the platform
//! layers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::difficulty::Difficulty;

/// Part of speech of a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Preposition,
    Conjunction,
    Interjection,
    Phrase,
    Idiom,
    Unknown,
}

impl PartOfSpeech {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noun => "noun",
            Self::Verb => "verb",
            Self::Adjective => "adjective",
            Self::Adverb => "adverb",
            Self::Pronoun => "pronoun",
            Self::Preposition => "preposition",
            Self::Conjunction => "conjunction",
            Self::Interjection => "interjection",
            Self::Phrase => "phrase",
            Self::Idiom => "idiom",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a part of speech, case-insensitively
    ///
    /// Dictionary APIs and old backups use many spellings; anything not
    /// recognized becomes `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "noun" | "n" => Self::Noun,
            "verb" | "v" => Self::Verb,
            "adjective" | "adj" => Self::Adjective,
            "adverb" | "adv" => Self::Adverb,
            "pronoun" | "pron" => Self::Pronoun,
            "preposition" | "prep" => Self::Preposition,
            "conjunction" | "conj" => Self::Conjunction,
            "interjection" | "exclamation" => Self::Interjection,
            "phrase" => Self::Phrase,
            "idiom" => Self::Idiom,
            _ => Self::Unknown,
        }
    }
}

/// Named colors a tag can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagColor {
    Blue,
    Red,
    Green,
    Orange,
    Purple,
    Pink,
    Yellow,
    Gray,
    Brown,
    Teal,
    Indigo,
    Mint,
    Cyan,
    Lime,
    Amber,
    Navy,
    Maroon,
}

impl TagColor {
    pub const ALL: [TagColor; 17] = [
        Self::Blue,
        Self::Red,
        Self::Green,
        Self::Orange,
        Self::Purple,
        Self::Pink,
        Self::Yellow,
        Self::Gray,
        Self::Brown,
        Self::Teal,
        Self::Indigo,
        Self::Mint,
        Self::Cyan,
        Self::Lime,
        Self::Amber,
        Self::Navy,
        Self::Maroon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Purple => "purple",
            Self::Pink => "pink",
            Self::Yellow => "yellow",
            Self::Gray => "gray",
            Self::Brown => "brown",
            Self::Teal => "teal",
            Self::Indigo => "indigo",
            Self::Mint => "mint",
            Self::Cyan => "cyan",
            Self::Lime => "lime",
            Self::Amber => "amber",
            Self::Navy => "navy",
            Self::Maroon => "maroon",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

/// A user-defined label attached to words and idioms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: TagColor,
    pub timestamp: DateTime<Utc>,
}

/// A word in the user's vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    /// Unique identifier for this word
    pub id: Uuid,
    /// The word itself
    pub text: String,
    pub definition: String,
    pub part_of_speech: PartOfSpeech,
    /// IPA transcription, if known
    pub phonetic: Option<String>,
    pub language_code: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    pub is_favorite: bool,
    /// Example sentences, in user order
    pub examples: Vec<String>,
    /// Raised by correct quiz answers, lowered by incorrect ones
    pub difficulty_score: i32,
    /// Set once the word has appeared in a quiz
    pub has_been_practiced: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Word {
    pub fn difficulty(&self) -> Difficulty {
        Difficulty::from_score(self.difficulty_score, self.has_been_practiced)
    }
}

/// An idiom in the user's vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idiom {
    pub id: Uuid,
    pub idiom_itself: String,
    pub definition: String,
    pub language_code: String,
    pub timestamp: DateTime<Utc>,
    pub is_favorite: bool,
    pub examples: Vec<String>,
    pub difficulty_score: i32,
    pub has_been_practiced: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Idiom {
    pub fn difficulty(&self) -> Difficulty {
        Difficulty::from_score(self.difficulty_score, self.has_been_practiced)
    }
}

/// Reference to either kind of practicable entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum EntryRef {
    Word(Uuid),
    Idiom(Uuid),
}

impl EntryRef {
    pub fn id(&self) -> Uuid {
        match self {
            EntryRef::Word(id) | EntryRef::Idiom(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EntryRef::Word(_) => "word",
            EntryRef::Idiom(_) => "idiom",
        }
    }
}

/// Practice history of one word or idiom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub id: Uuid,
    pub entry: EntryRef,
    /// Running mean, in seconds
    pub average_response_time: f64,
    pub consecutive_correct: u32,
    pub correct_attempts: u32,
    pub total_attempts: u32,
    pub mastery_level: Difficulty,
    pub last_practiced: Option<DateTime<Utc>>,
    pub difficulty_score: f64,
}

impl Progress {
    /// Empty progress for an entry that has not been answered yet
    pub fn new(entry: EntryRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry,
            average_response_time: 0.0,
            consecutive_correct: 0,
            correct_attempts: 0,
            total_attempts: 0,
            mastery_level: Difficulty::New,
            last_practiced: None,
            difficulty_score: 0.0,
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.correct_attempts as f64 / self.total_attempts as f64
        }
    }
}

/// Kind of quiz a session was run with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuizType {
    Spelling,
    ChooseDefinition,
    IdiomSpelling,
    IdiomChooseDefinition,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spelling => "spelling",
            Self::ChooseDefinition => "chooseDefinition",
            Self::IdiomSpelling => "idiomSpelling",
            Self::IdiomChooseDefinition => "idiomChooseDefinition",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "spelling" => Some(Self::Spelling),
            "chooseDefinition" => Some(Self::ChooseDefinition),
            "idiomSpelling" => Some(Self::IdiomSpelling),
            "idiomChooseDefinition" => Some(Self::IdiomChooseDefinition),
            _ => None,
        }
    }
}

/// A completed quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    pub id: Uuid,
    pub quiz_type: QuizType,
    pub date: DateTime<Utc>,
    pub score: i32,
    pub total_words: u32,
    pub correct_answers: u32,
    /// Fraction of correct answers, 0.0 to 1.0
    pub accuracy: f64,
    /// Seconds spent in the quiz
    pub duration: f64,
    pub words_practiced: Vec<Uuid>,
}

/// User preferences stored alongside the statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub practice_hard_words_only: bool,
    pub words_per_session: u32,
    pub daily_reminder_enabled: bool,
    pub difficult_words_alert_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            practice_hard_words_only: false,
            words_per_session: 10,
            daily_reminder_enabled: false,
            difficult_words_alert_enabled: false,
        }
    }
}

/// Aggregate practice statistics, one row per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    /// Mean session accuracy, 0.0 to 1.0
    pub average_accuracy: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Seconds
    pub total_practice_time: f64,
    pub total_sessions: u32,
    pub total_words_studied: u32,
    pub vocabulary_size: u32,
    /// Calendar day (UTC) of the most recent session
    pub last_practice_date: Option<NaiveDate>,
    pub preferences: Preferences,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            average_accuracy: 0.0,
            current_streak: 0,
            longest_streak: 0,
            total_practice_time: 0.0,
            total_sessions: 0,
            total_words_studied: 0,
            vocabulary_size: 0,
            last_practice_date: None,
            preferences: Preferences::default(),
        }
    }
}

/// Role of a collaborator in a shared dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollaboratorRole {
    Viewer,
    Editor,
}

impl CollaboratorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(Self::Viewer),
            "editor" => Some(Self::Editor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub user_id: String,
    pub role: CollaboratorRole,
}

/// A dictionary hosted in the cloud and shared between users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDictionary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub collaborators: Vec<Collaborator>,
    pub created_at: DateTime<Utc>,
    /// Anyone holding the link may view
    pub is_public: bool,
}

impl SharedDictionary {
    pub fn can_view(&self, user_id: &str) -> bool {
        self.is_public || self.owner_id == user_id || self.role_of(user_id).is_some()
    }

    pub fn can_edit(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.role_of(user_id) == Some(CollaboratorRole::Editor)
    }

    fn role_of(&self, user_id: &str) -> Option<CollaboratorRole> {
        self.collaborators
            .iter()
            .find(|c| c.user_id == user_id)
            .map(|c| c.role)
    }
}

/// A word inside a shared dictionary
///
/// Ids are only unique within their dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedWord {
    pub dictionary_id: String,
    pub id: String,
    pub text: String,
    pub definition: String,
    pub part_of_speech: PartOfSpeech,
    pub phonetic: Option<String>,
    pub examples: Vec<String>,
    pub added_by: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_of_speech_parse() {
        assert_eq!(PartOfSpeech::parse("Noun"), PartOfSpeech::Noun);
        assert_eq!(PartOfSpeech::parse(" adj "), PartOfSpeech::Adjective);
        assert_eq!(PartOfSpeech::parse("exclamation"), PartOfSpeech::Interjection);
        assert_eq!(PartOfSpeech::parse("determiner"), PartOfSpeech::Unknown);
    }

    #[test]
    fn test_tag_color_count() {
        assert_eq!(TagColor::ALL.len(), 17);
        assert_eq!(TagColor::from_str("maroon"), Some(TagColor::Maroon));
        assert_eq!(TagColor::from_str("magenta"), None);
    }

    #[test]
    fn test_entry_ref_serialize() {
        let id = Uuid::nil();
        let json = serde_json::to_string(&EntryRef::Idiom(id)).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"idiom","id":"00000000-0000-0000-0000-000000000000"}"#
        );
    }

    #[test]
    fn test_shared_dictionary_permissions() {
        let dict = SharedDictionary {
            id: "d1".to_string(),
            name: "Travel".to_string(),
            owner_id: "alice".to_string(),
            collaborators: vec![
                Collaborator {
                    user_id: "bob".to_string(),
                    role: CollaboratorRole::Editor,
                },
                Collaborator {
                    user_id: "carol".to_string(),
                    role: CollaboratorRole::Viewer,
                },
            ],
            created_at: Utc::now(),
            is_public: false,
        };

        assert!(dict.can_edit("alice"));
        assert!(dict.can_edit("bob"));
        assert!(!dict.can_edit("carol"));
        assert!(dict.can_view("carol"));
        assert!(!dict.can_view("dave"));
    }

    #[test]
    fn test_progress_accuracy() {
        let mut progress = Progress::new(EntryRef::Word(Uuid::new_v4()));
        assert_eq!(progress.accuracy(), 0.0);
        progress.total_attempts = 4;
        progress.correct_attempts = 3;
        assert!((progress.accuracy() - 0.75).abs() < f64::EPSILON);
    }
}
