//! Quiz recording
//!
//! Each answer moves the entry's difficulty score by the configured
//! [`ScoreRules`](crate::config::ScoreRules) and updates its [`Progress`].
//! A finished quiz is stored as a [`QuizSession`] and folded into the
//! user statistics.

use std::rc::Rc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::db;
use crate::difficulty::Difficulty;
use crate::error::{InternalError, Result, ValidationError};
use crate::models::{EntryRef, Idiom, Progress, QuizSession, QuizType, Word};
use crate::stats::StatsManager;
use crate::store::PersistentStore;

pub struct QuizRecorder {
    store: Rc<PersistentStore>,
    stats: StatsManager,
}

impl QuizRecorder {
    pub fn new(store: Rc<PersistentStore>) -> Self {
        Self {
            stats: StatsManager::new(store.clone()),
            store,
        }
    }

    /// Record one answer
    ///
    /// # Arguments
    /// * `entry` - Word or idiom that was asked
    /// * `correct` - Whether the answer was right
    /// * `response_time` - Time the user took to answer
    ///
    /// # Returns
    /// The entry's updated progress
    pub fn record_answer(
        &self,
        entry: EntryRef,
        correct: bool,
        response_time: Duration,
    ) -> Result<Progress> {
        let (score, _) = self
            .store
            .read(|conn| db::entry_score(conn, &entry))?
            .ok_or_else(|| InternalError::EntryNotFound(entry.id().to_string()))?;

        let rules = &self.store.config().score;
        let delta = if correct {
            rules.correct_delta
        } else {
            rules.incorrect_delta
        };
        let new_score = score.saturating_add(delta);

        let mut progress = self
            .store
            .read(|conn| db::get_progress(conn, &entry))?
            .unwrap_or_else(|| Progress::new(entry));

        progress.total_attempts += 1;
        if correct {
            progress.correct_attempts += 1;
            progress.consecutive_correct += 1;
        } else {
            progress.consecutive_correct = 0;
        }
        let seconds = response_time.as_secs_f64();
        progress.average_response_time +=
            (seconds - progress.average_response_time) / progress.total_attempts as f64;
        progress.mastery_level = Difficulty::from_score(new_score, true);
        progress.difficulty_score = new_score as f64;
        progress.last_practiced = Some(Utc::now());

        self.store.mutate(|conn| {
            db::set_entry_score(conn, &entry, new_score, true)?;
            db::upsert_progress(conn, &progress)
        })?;

        log::debug!(
            "{} {} answered {}: score {} -> {}",
            entry.kind(),
            entry.id(),
            if correct { "correctly" } else { "incorrectly" },
            score,
            new_score
        );
        Ok(progress)
    }

    /// Store a finished quiz and update the statistics
    ///
    /// # Arguments
    /// * `quiz_type` - Kind of quiz
    /// * `words_practiced` - Ids of the entries asked
    /// * `correct_answers` - Number answered correctly
    /// * `score` - Points earned
    /// * `duration` - Time spent in the quiz
    pub fn finish_session(
        &self,
        quiz_type: QuizType,
        words_practiced: Vec<Uuid>,
        correct_answers: u32,
        score: i32,
        duration: Duration,
    ) -> Result<QuizSession> {
        let total_words = u32::try_from(words_practiced.len()).unwrap_or(u32::MAX);
        if correct_answers > total_words {
            return Err(ValidationError::InvalidField {
                field: "correct_answers".to_string(),
                reason: format!("{} exceeds {} words", correct_answers, total_words),
            }
            .into());
        }

        let session = QuizSession {
            id: Uuid::new_v4(),
            quiz_type,
            date: Utc::now(),
            score,
            total_words,
            correct_answers,
            accuracy: if total_words == 0 {
                0.0
            } else {
                correct_answers as f64 / total_words as f64
            },
            duration: duration.as_secs_f64(),
            words_practiced,
        };

        if let Err(e) = self.store.mutate(|conn| db::insert_quiz_session(conn, &session)) {
            log::error!("Saving quiz session failed: {}", e);
            return Err(InternalError::SavingQuizSessionFailed.into());
        }
        self.stats.record_session(&session)?;
        log::info!(
            "Finished {} quiz: {}/{} correct",
            quiz_type.as_str(),
            correct_answers,
            total_words
        );
        Ok(session)
    }

    /// Words to practice, lowest score first
    ///
    /// With `hard_only`, only words that need review or are in progress.
    pub fn practice_queue(&self, limit: usize, hard_only: bool) -> Result<Vec<Word>> {
        let words = self.store.read(db::list_words)?;
        Ok(queue(words, limit, hard_only, |w| (w.difficulty_score, w.difficulty())))
    }

    pub fn idiom_practice_queue(&self, limit: usize, hard_only: bool) -> Result<Vec<Idiom>> {
        let idioms = self.store.read(db::list_idioms)?;
        Ok(queue(idioms, limit, hard_only, |i| (i.difficulty_score, i.difficulty())))
    }

    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<QuizSession>> {
        Ok(self.store.read(|conn| db::list_quiz_sessions(conn, limit))?)
    }

    pub fn save_context(&self) -> Result<()> {
        Ok(self.store.save_context()?)
    }
}

fn queue<E>(
    entries: Vec<E>,
    limit: usize,
    hard_only: bool,
    rank: impl Fn(&E) -> (i32, Difficulty),
) -> Vec<E> {
    let mut entries: Vec<E> = entries
        .into_iter()
        .filter(|e| !hard_only || rank(e).1.is_hard())
        .collect();
    entries.sort_by_key(|e| rank(e).0);
    entries.truncate(limit);
    entries
}
