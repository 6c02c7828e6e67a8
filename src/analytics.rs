use crate::config::{DEFAULT_RECENT_SESSIONS, DEFAULT_WINDOW_DAYS};
use crate::metrics::MAX_STARS;
use crate::store::TypingSessionRecord;
use crate::util::rounded_mean;
use itertools::Itertools;
use serde::Serialize;

const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub recent_sessions: usize,
    pub window_days: u32,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            recent_sessions: DEFAULT_RECENT_SESSIONS,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonAggregate {
    pub lesson_id: String,
    pub lesson_title: String,
    pub attempts: usize,
    pub average_wpm: u32,
    pub average_accuracy: u32,
    pub best_stars: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_sessions: usize,
    pub total_duration_ms: u64,
    pub average_wpm: u32,
    pub average_accuracy: u32,
    pub best_wpm: u32,
    pub best_accuracy: u32,
    /// index is the star rating, 0 through 5
    pub star_counts: [usize; MAX_STARS as usize + 1],
    pub recent_sessions: Vec<TypingSessionRecord>,
    pub window_days: u32,
    pub sessions_in_window: usize,
    pub lessons: Vec<LessonAggregate>,
}

/// Records with `timestamp >= now - days`
pub fn sessions_in_window(
    records: &[TypingSessionRecord],
    now: i64,
    days: u32,
) -> Vec<&TypingSessionRecord> {
    let since = now - i64::from(days) * MS_PER_DAY;
    records.iter().filter(|r| r.timestamp >= since).collect()
}

/// Roll up a newest-first history.
///
/// Returns `None` when there is nothing to aggregate, so callers can tell
/// "no data yet" apart from a history of zero scores.
pub fn aggregate(
    records: &[TypingSessionRecord],
    now: i64,
    options: AggregateOptions,
) -> Option<AnalyticsSnapshot> {
    if records.is_empty() {
        return None;
    }

    let mut star_counts = [0usize; MAX_STARS as usize + 1];
    for r in records {
        star_counts[usize::from(r.summary.star_rating.min(MAX_STARS))] += 1;
    }

    let lessons = records
        .iter()
        .into_group_map_by(|r| r.lesson_id.as_str())
        .into_iter()
        .map(|(lesson_id, attempts)| LessonAggregate {
            lesson_id: lesson_id.to_string(),
            // newest title wins if a lesson was renamed
            lesson_title: attempts[0].lesson_title.clone(),
            attempts: attempts.len(),
            average_wpm: rounded_mean(attempts.iter().map(|r| r.summary.wpm)).unwrap_or(0),
            average_accuracy: rounded_mean(attempts.iter().map(|r| r.summary.accuracy))
                .unwrap_or(0),
            best_stars: attempts
                .iter()
                .map(|r| r.summary.star_rating)
                .max()
                .unwrap_or(0),
        })
        .sorted_by(|a, b| {
            b.attempts
                .cmp(&a.attempts)
                .then_with(|| a.lesson_id.cmp(&b.lesson_id))
        })
        .collect();

    Some(AnalyticsSnapshot {
        total_sessions: records.len(),
        total_duration_ms: records.iter().map(|r| r.summary.duration_ms).sum(),
        average_wpm: rounded_mean(records.iter().map(|r| r.summary.wpm))?,
        average_accuracy: rounded_mean(records.iter().map(|r| r.summary.accuracy))?,
        best_wpm: records.iter().map(|r| r.summary.wpm).max()?,
        best_accuracy: records.iter().map(|r| r.summary.accuracy).max()?,
        star_counts,
        recent_sessions: records
            .iter()
            .take(options.recent_sessions)
            .cloned()
            .collect(),
        window_days: options.window_days,
        sessions_in_window: sessions_in_window(records, now, options.window_days).len(),
        lessons,
    })
}
