//! Aggregate practice statistics
//!
//! There is a single [`UserStats`] row per store. Streaks count consecutive
//! calendar days (UTC) with at least one finished quiz.

use std::rc::Rc;

use crate::db;
use crate::error::Result;
use crate::models::{Preferences, QuizSession, UserStats};
use crate::store::PersistentStore;

pub struct StatsManager {
    store: Rc<PersistentStore>,
}

impl StatsManager {
    pub fn new(store: Rc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Current statistics
    ///
    /// The row is created with default values on first access; that write
    /// is pending until the next save.
    pub fn load(&self) -> Result<UserStats> {
        if let Some(stats) = self.store.read(db::load_user_stats)? {
            return Ok(stats);
        }
        let stats = UserStats::default();
        self.store.mutate(|conn| db::save_user_stats(conn, &stats))?;
        log::debug!("Created user stats");
        Ok(stats)
    }

    /// Fold a finished quiz into the statistics
    pub fn record_session(&self, session: &QuizSession) -> Result<UserStats> {
        let mut stats = self.load()?;
        apply_session(&mut stats, session);
        self.store.mutate(|conn| db::save_user_stats(conn, &stats))?;
        Ok(stats)
    }

    /// Recount words and idioms into `vocabulary_size`
    pub fn refresh_vocabulary_size(&self) -> Result<u32> {
        let words = self.store.read(db::count_words)?;
        let idioms = self.store.read(db::count_idioms)?;
        let size = u32::try_from(words + idioms).unwrap_or(u32::MAX);

        let mut stats = self.load()?;
        if stats.vocabulary_size != size {
            stats.vocabulary_size = size;
            self.store.mutate(|conn| db::save_user_stats(conn, &stats))?;
        }
        Ok(size)
    }

    pub fn update_preferences(&self, preferences: Preferences) -> Result<UserStats> {
        let mut stats = self.load()?;
        stats.preferences = preferences;
        self.store.mutate(|conn| db::save_user_stats(conn, &stats))?;
        Ok(stats)
    }

    pub fn save_context(&self) -> Result<()> {
        Ok(self.store.save_context()?)
    }
}

/// Update running totals, the average accuracy and the streak
pub fn apply_session(stats: &mut UserStats, session: &QuizSession) {
    let previous = stats.total_sessions as f64;
    stats.average_accuracy =
        (stats.average_accuracy * previous + session.accuracy) / (previous + 1.0);
    stats.total_sessions += 1;
    stats.total_practice_time += session.duration;
    stats.total_words_studied += session.total_words;

    let day = session.date.date_naive();
    match stats.last_practice_date {
        Some(last) if last == day => {
            stats.current_streak = stats.current_streak.max(1);
        }
        // a session recorded out of order does not touch the streak
        Some(last) if last > day => {}
        Some(last) if last.succ_opt() == Some(day) => {
            stats.current_streak += 1;
            stats.last_practice_date = Some(day);
        }
        _ => {
            stats.current_streak = 1;
            stats.last_practice_date = Some(day);
        }
    }
    stats.longest_streak = stats.longest_streak.max(stats.current_streak);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::models::QuizType;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn session_on(day: u32, accuracy: f64) -> QuizSession {
        QuizSession {
            id: Uuid::new_v4(),
            quiz_type: QuizType::Spelling,
            date: Utc.with_ymd_and_hms(2024, 5, day, 18, 0, 0).unwrap(),
            score: 10,
            total_words: 4,
            correct_answers: 2,
            accuracy,
            duration: 60.0,
            words_practiced: Vec::new(),
        }
    }

    #[test]
    fn test_streak_counts_consecutive_days() {
        let mut stats = UserStats::default();
        apply_session(&mut stats, &session_on(1, 1.0));
        apply_session(&mut stats, &session_on(2, 0.5));
        apply_session(&mut stats, &session_on(2, 0.0));
        apply_session(&mut stats, &session_on(3, 0.5));
        assert_eq!(stats.current_streak, 3);

        apply_session(&mut stats, &session_on(6, 0.5));
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.total_sessions, 5);
        assert_eq!(stats.total_words_studied, 20);
        assert!((stats.average_accuracy - 0.5).abs() < 1e-9);
        assert!((stats.total_practice_time - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_order_session_keeps_streak() {
        let mut stats = UserStats::default();
        apply_session(&mut stats, &session_on(10, 1.0));
        apply_session(&mut stats, &session_on(11, 1.0));
        apply_session(&mut stats, &session_on(4, 1.0));
        assert_eq!(stats.current_streak, 2);
        assert_eq!(
            stats.last_practice_date,
            Some(chrono::NaiveDate::from_ymd_opt(2024, 5, 11).unwrap())
        );
    }

    #[test]
    fn test_load_creates_row_once() {
        let store = Rc::new(
            PersistentStore::open_in_memory(StoreConfig {
                debounce_ms: 0,
                ..StoreConfig::default()
            })
            .unwrap(),
        );
        let stats = StatsManager::new(store.clone());

        assert_eq!(stats.load().unwrap(), UserStats::default());
        assert!(store.has_changes());
        stats.save_context().unwrap();

        let prefs = Preferences {
            words_per_session: 20,
            ..Preferences::default()
        };
        stats.update_preferences(prefs.clone()).unwrap();
        stats.record_session(&session_on(1, 0.75)).unwrap();
        stats.save_context().unwrap();

        let loaded = stats.load().unwrap();
        assert_eq!(loaded.preferences, prefs);
        assert_eq!(loaded.total_sessions, 1);
        assert!(!store.has_changes());
    }
}
