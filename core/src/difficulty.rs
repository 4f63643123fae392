//! Difficulty buckets derived from a quiz score

use serde::{Deserialize, Serialize};

/// Score at and above which an entry counts as mastered
pub const MASTERED_THRESHOLD: i32 = 50;

/// Learning state of a word or idiom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    New,
    InProgress,
    NeedsReview,
    Mastered,
}

impl Difficulty {
    /// Map a score to its bucket
    ///
    /// `New` is reserved for entries that were never quizzed. An entry whose
    /// score returned to zero after answers is `InProgress`.
    pub fn from_score(score: i32, has_been_practiced: bool) -> Self {
        if !has_been_practiced && score == 0 {
            Difficulty::New
        } else if score < 0 {
            Difficulty::NeedsReview
        } else if score < MASTERED_THRESHOLD {
            Difficulty::InProgress
        } else {
            Difficulty::Mastered
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "inProgress",
            Self::NeedsReview => "needsReview",
            Self::Mastered => "mastered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "inProgress" => Some(Self::InProgress),
            "needsReview" => Some(Self::NeedsReview),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }

    /// Whether a hard-words-only practice session should include this bucket
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::NeedsReview | Self::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(Difficulty::from_score(-1, true), Difficulty::NeedsReview);
        assert_eq!(Difficulty::from_score(0, true), Difficulty::InProgress);
        assert_eq!(Difficulty::from_score(49, true), Difficulty::InProgress);
        assert_eq!(Difficulty::from_score(50, true), Difficulty::Mastered);
    }

    #[test]
    fn test_never_practiced_is_new() {
        assert_eq!(Difficulty::from_score(0, false), Difficulty::New);
        // imported scores still count even without practice
        assert_eq!(Difficulty::from_score(60, false), Difficulty::Mastered);
        assert_eq!(Difficulty::from_score(-5, false), Difficulty::NeedsReview);
    }

    #[test]
    fn test_str_round_trip() {
        for d in [
            Difficulty::New,
            Difficulty::InProgress,
            Difficulty::NeedsReview,
            Difficulty::Mastered,
        ] {
            assert_eq!(Difficulty::from_str(d.as_str()), Some(d));
        }
        assert_eq!(Difficulty::from_str("expert"), None);
    }
}
