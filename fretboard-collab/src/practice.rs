use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    util::non_blank, ArcedDatabase, CollabContext, CollabError, CollabResult,
    ExerciseProgressData, NewExerciseProgress, NewPracticeSession, PracticeSessionData,
    PrimaryKey,
};

pub struct PracticeManager {
    db: ArcedDatabase,
}

#[derive(Debug, Default)]
pub struct PracticeInput {
    pub song_id: Option<PrimaryKey>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    /// Defaults to now
    pub practiced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeStats {
    pub total_minutes: i64,
    pub session_count: usize,
    pub average_minutes: f64,
    /// Consecutive days with practice, ending today or yesterday
    pub current_streak: u32,
    /// The last seven days, oldest first and ending today
    pub last_seven_days: Vec<DayMinutes>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayMinutes {
    pub date: NaiveDate,
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSummary {
    pub exercise_id: String,
    pub best_bpm: i32,
    pub last_bpm: i32,
    pub attempts: usize,
    pub completed: bool,
}

impl PracticeManager {
    const MAX_DURATION_MINUTES: i32 = 600;
    const MAX_BPM: i32 = 400;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
        }
    }

    pub async fn record(
        &self,
        user_id: PrimaryKey,
        input: PracticeInput,
    ) -> CollabResult<PracticeSessionData> {
        if !(1..=Self::MAX_DURATION_MINUTES).contains(&input.duration_minutes) {
            return Err(CollabError::invalid(
                "La durée doit être comprise entre 1 et 600 minutes",
            ));
        }

        if let Some(song_id) = input.song_id {
            // Only the user's own songs can be practiced
            self.db.song_by_id(user_id, song_id).await?;
        }

        let session = self
            .db
            .create_practice_session(NewPracticeSession {
                user_id,
                song_id: input.song_id,
                duration_minutes: input.duration_minutes,
                notes: non_blank(input.notes),
                practiced_at: input.practiced_at.unwrap_or_else(Utc::now),
            })
            .await?;

        Ok(session)
    }

    pub async fn sessions(
        &self,
        user_id: PrimaryKey,
        since: Option<DateTime<Utc>>,
    ) -> CollabResult<Vec<PracticeSessionData>> {
        Ok(self.db.list_practice_sessions(user_id, since).await?)
    }

    pub async fn stats(&self, user_id: PrimaryKey) -> CollabResult<PracticeStats> {
        let sessions = self.db.list_practice_sessions(user_id, None).await?;
        Ok(compute_stats(&sessions, Utc::now().date_naive()))
    }

    pub async fn record_exercise(
        &self,
        user_id: PrimaryKey,
        exercise_id: String,
        bpm: i32,
        completed: bool,
    ) -> CollabResult<ExerciseProgressData> {
        let exercise_id = non_blank(Some(exercise_id))
            .ok_or_else(|| CollabError::invalid("L'exercice est requis"))?;

        if !(1..=Self::MAX_BPM).contains(&bpm) {
            return Err(CollabError::invalid("Le tempo doit être compris entre 1 et 400 BPM"));
        }

        let progress = self
            .db
            .create_exercise_progress(NewExerciseProgress {
                user_id,
                exercise_id,
                bpm,
                completed,
            })
            .await?;

        Ok(progress)
    }

    /// Every attempt at one exercise, oldest first
    pub async fn exercise_history(
        &self,
        user_id: PrimaryKey,
        exercise_id: &str,
    ) -> CollabResult<Vec<ExerciseProgressData>> {
        Ok(self
            .db
            .list_exercise_progress(user_id, Some(exercise_id))
            .await?)
    }

    pub async fn exercise_summaries(
        &self,
        user_id: PrimaryKey,
    ) -> CollabResult<Vec<ExerciseSummary>> {
        let progress = self.db.list_exercise_progress(user_id, None).await?;
        Ok(summarize_exercises(&progress))
    }
}

pub fn compute_stats(sessions: &[PracticeSessionData], today: NaiveDate) -> PracticeStats {
    let total_minutes: i64 = sessions.iter().map(|s| s.duration_minutes as i64).sum();
    let session_count = sessions.len();

    let average_minutes = if session_count == 0 {
        0.0
    } else {
        total_minutes as f64 / session_count as f64
    };

    let mut minutes_per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for session in sessions {
        *minutes_per_day
            .entry(session.practiced_at.date_naive())
            .or_default() += session.duration_minutes as i64;
    }

    let days: BTreeSet<NaiveDate> = minutes_per_day.keys().copied().collect();

    let last_seven_days = (0..7)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);

            DayMinutes {
                date,
                minutes: minutes_per_day.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    PracticeStats {
        total_minutes,
        session_count,
        average_minutes,
        current_streak: streak(&days, today),
        last_seven_days,
    }
}

/// A streak survives until the end of the day after the last practice
fn streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);

    let mut day = if days.contains(&today) {
        today
    } else if days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut count = 0;
    while days.contains(&day) {
        count += 1;
        day -= Duration::days(1);
    }

    count
}

/// Expects progress oldest first, summaries are sorted by exercise
pub fn summarize_exercises(progress: &[ExerciseProgressData]) -> Vec<ExerciseSummary> {
    let mut summaries: BTreeMap<&str, ExerciseSummary> = BTreeMap::new();

    for attempt in progress {
        let summary = summaries
            .entry(attempt.exercise_id.as_str())
            .or_insert_with(|| ExerciseSummary {
                exercise_id: attempt.exercise_id.clone(),
                best_bpm: attempt.bpm,
                last_bpm: attempt.bpm,
                attempts: 0,
                completed: false,
            });

        summary.best_bpm = summary.best_bpm.max(attempt.bpm);
        summary.last_bpm = attempt.bpm;
        summary.attempts += 1;
        summary.completed |= attempt.completed;
    }

    summaries.into_values().collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn session(day: u32, minutes: i32) -> PracticeSessionData {
        PracticeSessionData {
            id: day as PrimaryKey,
            user_id: 1,
            song_id: None,
            duration_minutes: minutes,
            notes: None,
            practiced_at: Utc.with_ymd_and_hms(2024, 6, day, 18, 0, 0).unwrap(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn empty_history_has_zero_average() {
        let stats = compute_stats(&[], date(10));

        assert_eq!(stats.total_minutes, 0);
        assert_eq!(stats.average_minutes, 0.0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.last_seven_days.len(), 7);
    }

    #[test]
    fn streak_ending_yesterday_still_counts() {
        let sessions = [session(7, 20), session(8, 30), session(9, 10), session(9, 15)];
        let stats = compute_stats(&sessions, date(10));

        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.total_minutes, 75);
        assert_eq!(stats.session_count, 4);
        assert_eq!(stats.average_minutes, 18.75);
    }

    #[test]
    fn gaps_break_the_streak() {
        let sessions = [session(5, 20), session(7, 30), session(8, 10)];

        assert_eq!(compute_stats(&sessions, date(8)).current_streak, 2);
        assert_eq!(compute_stats(&sessions, date(10)).current_streak, 0);
    }

    #[test]
    fn weekly_minutes_end_today() {
        let sessions = [session(1, 60), session(4, 20), session(10, 15), session(10, 5)];
        let stats = compute_stats(&sessions, date(10));

        let first = &stats.last_seven_days[0];
        let last = &stats.last_seven_days[6];

        assert_eq!(first.date, date(4));
        assert_eq!(first.minutes, 20);
        assert_eq!(last.date, date(10));
        assert_eq!(last.minutes, 20);
    }

    #[test]
    fn summarizes_exercises() {
        let attempt = |id: PrimaryKey, exercise: &str, bpm, completed| ExerciseProgressData {
            id,
            user_id: 1,
            exercise_id: exercise.to_string(),
            bpm,
            completed,
            recorded_at: Utc::now(),
        };

        let summaries = summarize_exercises(&[
            attempt(1, "spider", 80, false),
            attempt(2, "spider", 100, true),
            attempt(3, "chromatic", 60, false),
            attempt(4, "spider", 90, false),
        ]);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].exercise_id, "chromatic");
        assert_eq!(summaries[1].best_bpm, 100);
        assert_eq!(summaries[1].last_bpm, 90);
        assert_eq!(summaries[1].attempts, 3);
        assert!(summaries[1].completed);
    }
}
