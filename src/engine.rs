use crate::analytics::{self, AggregateOptions, AnalyticsSnapshot};
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::curriculum::{self, CurriculumAction, CurriculumState, Recommendation};
use crate::error::{EngineError, Result};
use crate::ids::{IdGenerator, RandomIdGenerator};
use crate::matcher::KeystrokeResult;
use crate::session::{
    ActiveSession, EndReason, FinishedSession, SessionId, SessionStateMachine, SessionSummary,
};
use crate::store::{KeyValueStore, NewRecord, SessionStore, TypingSessionRecord};
use log::{info, warn};
use std::sync::{Arc, Mutex};

/// Engine behind a mutex, for hosts that call in from several threads
pub type SharedEngine<K> = Arc<Mutex<TypingEngine<K>>>;

pub struct EngineBuilder<K: KeyValueStore> {
    backend: K,
    catalog: Catalog,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl<K: KeyValueStore> EngineBuilder<K> {
    pub fn new(backend: K, catalog: Catalog) -> Self {
        Self {
            backend,
            catalog,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIdGenerator),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn build(self) -> TypingEngine<K> {
        let store = SessionStore::with_options(
            self.backend,
            self.ids.clone(),
            &self.config.storage_key,
            self.config.max_records,
        );
        let history = store.list();
        let curriculum = CurriculumState::replay(
            &self.catalog,
            history
                .iter()
                .rev()
                .map(|r| (r.lesson_id.as_str(), r.summary.star_rating)),
        );
        info!(
            "engine ready: {} track(s), {} stored session(s)",
            self.catalog.tracks.len(),
            history.len()
        );

        TypingEngine {
            machine: SessionStateMachine::new(self.config, self.ids),
            store,
            catalog: self.catalog,
            curriculum,
            clock: self.clock,
            last_summary: None,
            last_recommendation: None,
        }
    }
}

/// Entry point for hosts: sessions in, summaries, analytics and
/// recommendations out.
///
/// Keystroke and tick timestamps are milliseconds on the same timeline as
/// the engine's clock.
pub struct TypingEngine<K: KeyValueStore> {
    machine: SessionStateMachine,
    store: SessionStore<K>,
    catalog: Catalog,
    curriculum: CurriculumState,
    clock: Arc<dyn Clock>,
    last_summary: Option<SessionSummary>,
    last_recommendation: Option<Recommendation>,
}

impl<K: KeyValueStore> std::fmt::Debug for TypingEngine<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingEngine")
            .field("machine", &self.machine)
            .field("store", &self.store)
            .field("last_summary", &self.last_summary)
            .finish()
    }
}

impl<K: KeyValueStore> TypingEngine<K> {
    pub fn builder(backend: K, catalog: Catalog) -> EngineBuilder<K> {
        EngineBuilder::new(backend, catalog)
    }

    pub fn shared(self) -> SharedEngine<K> {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &EngineConfig {
        self.machine.config()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn curriculum(&self) -> &CurriculumState {
        &self.curriculum
    }

    pub fn active_session(&self) -> Option<&ActiveSession> {
        self.machine.active()
    }

    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    pub fn last_recommendation(&self) -> Option<&Recommendation> {
        self.last_recommendation.as_ref()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Start typing `text` for a catalog lesson
    pub fn start_session(&mut self, lesson_id: &str, text: &str) -> Result<SessionId> {
        let (_, lesson) = self
            .catalog
            .lesson(lesson_id)
            .ok_or_else(|| EngineError::InvalidLesson(lesson_id.to_string()))?;
        let bands = self.machine.config().bands_for(lesson.difficulty.speed);
        let now = self.clock.now_ms();
        let id = self.machine.start_session_with(lesson_id, text, bands, now)?;
        self.dispatch(CurriculumAction::SelectLesson(lesson_id.to_string()));
        Ok(id)
    }

    /// Start a lesson with its catalog text
    pub fn start_lesson(&mut self, lesson_id: &str) -> Result<SessionId> {
        let text = self
            .catalog
            .lesson(lesson_id)
            .and_then(|(_, lesson)| self.catalog.lesson_text(lesson))
            .ok_or_else(|| EngineError::InvalidLesson(lesson_id.to_string()))?;
        self.start_session(lesson_id, &text)
    }

    pub fn record_keystroke(&mut self, key: &str, timestamp: i64) -> Result<KeystrokeResult> {
        let outcome = self.machine.record_keystroke(key, timestamp)?;
        if let Some(finished) = outcome.finished {
            self.finish(finished)?;
        }
        Ok(outcome.result)
    }

    pub fn record_key_up(&mut self, key: &str, timestamp: i64) -> Result<()> {
        self.machine.record_key_up(key, timestamp)
    }

    pub fn record_autoscroll(&mut self, timestamp: i64) -> Result<()> {
        self.machine.record_autoscroll(timestamp)
    }

    pub fn tick(&mut self, timestamp: i64) -> Result<()> {
        self.machine.tick(timestamp)
    }

    pub fn end_session(&mut self, reason: EndReason) -> Result<SessionSummary> {
        let finished = self.machine.end_session(reason)?;
        self.finish(finished)
    }

    /// Navigate away: drop the session, persist nothing
    pub fn reset_session(&mut self) {
        self.machine.reset_session();
    }

    pub fn history(&self) -> Vec<TypingSessionRecord> {
        self.store.list()
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.store.clear()?;
        self.dispatch(CurriculumAction::Reset);
        self.last_recommendation = None;
        Ok(())
    }

    pub fn get_analytics(&self) -> Option<AnalyticsSnapshot> {
        let config = self.machine.config();
        analytics::aggregate(
            &self.store.list(),
            self.clock.now_ms(),
            AggregateOptions {
                recent_sessions: config.recent_sessions,
                window_days: config.window_days,
            },
        )
    }

    pub fn recommendation_for(
        &self,
        track_id: &str,
        lesson_id: &str,
        summary: &SessionSummary,
    ) -> Result<Recommendation> {
        curriculum::recommend(&self.catalog, track_id, lesson_id, summary)
    }

    pub fn get_recommendations(
        &self,
        track_id: &str,
        lesson_id: &str,
        summary: &SessionSummary,
    ) -> Result<Vec<String>> {
        Ok(self
            .recommendation_for(track_id, lesson_id, summary)?
            .lesson_ids())
    }

    pub fn select_track(&mut self, track_id: &str) {
        self.dispatch(CurriculumAction::SelectTrack(track_id.to_string()));
    }

    pub fn select_lesson(&mut self, lesson_id: &str) {
        self.dispatch(CurriculumAction::SelectLesson(lesson_id.to_string()));
    }

    fn dispatch(&mut self, action: CurriculumAction) {
        self.curriculum = std::mem::take(&mut self.curriculum).apply(action);
    }

    fn finish(&mut self, finished: FinishedSession) -> Result<SessionSummary> {
        let summary = finished.summary;
        self.last_summary = Some(summary.clone());
        if finished.reason == EndReason::Abandoned {
            return Ok(summary);
        }

        let Some((track, lesson)) = self.catalog.lesson(&finished.lesson_id) else {
            warn!("finished lesson {} is not in the catalog", finished.lesson_id);
            return Ok(summary);
        };
        let recommendation =
            curriculum::recommend(&self.catalog, &track.id, &lesson.id, &summary)?;
        let new = NewRecord {
            lesson_id: lesson.id.clone(),
            lesson_title: lesson.title.clone(),
            track_id: Some(track.id.clone()),
            track_name: Some(track.name.clone()),
            summary: summary.clone(),
            timestamp: self.clock.now_ms(),
        };

        self.store.record(new)?;
        self.dispatch(CurriculumAction::LessonCompleted {
            lesson_id: finished.lesson_id,
            stars: summary.star_rating,
            recommendation: recommendation.clone(),
        });
        self.last_recommendation = Some(recommendation);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StorageError;
    use crate::ids::SequentialIdGenerator;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;

    fn engine(clock: Arc<ManualClock>) -> TypingEngine<MemoryStore> {
        TypingEngine::builder(MemoryStore::new(), Catalog::builtin().unwrap())
            .clock(clock)
            .ids(Arc::new(SequentialIdGenerator::new()))
            .build()
    }

    #[test]
    fn test_unknown_lesson_rejected() {
        let mut e = engine(Arc::new(ManualClock::new(0)));
        assert_matches!(
            e.start_session("missing", "abc"),
            Err(EngineError::InvalidLesson(_))
        );
        assert_matches!(e.start_lesson("missing"), Err(EngineError::InvalidLesson(_)));
    }

    #[test]
    fn test_completed_session_is_persisted_and_recommended() {
        let clock = Arc::new(ManualClock::new(10_000));
        let mut e = engine(clock.clone());
        e.start_session("home-row-1", "ab").unwrap();
        e.record_keystroke("a", 10_100).unwrap();
        let r = e.record_keystroke("b", 10_200).unwrap();
        assert!(r.completed);

        let history = e.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "record-2");
        assert_eq!(history[0].lesson_title, "Anchor keys");
        assert_eq!(history[0].track_name.as_deref(), Some("Home Row"));
        assert_eq!(e.last_summary().unwrap().accuracy, 100);
        assert_eq!(
            e.last_recommendation(),
            Some(&Recommendation::Advance("home-row-2".into()))
        );
        assert_eq!(e.curriculum().progress("home-row-1").unwrap().attempts, 1);
        assert_eq!(e.curriculum().recommended_lesson_ids, vec!["home-row-2".to_string()]);
    }

    #[test]
    fn test_abandoned_session_is_not_persisted() {
        let mut e = engine(Arc::new(ManualClock::new(0)));
        e.start_lesson("home-row-1").unwrap();
        e.record_keystroke("a", 100).unwrap();
        let summary = e.end_session(EndReason::Abandoned).unwrap();
        assert_eq!(summary.correct_count, 1);
        assert!(e.history().is_empty());
        assert!(e.curriculum().completed.is_empty());

        e.start_lesson("home-row-1").unwrap();
        e.reset_session();
        assert!(e.history().is_empty());
        assert!(e.get_analytics().is_none());
    }

    #[test]
    fn test_history_replays_into_curriculum() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = {
            let mut e = TypingEngine::builder(MemoryStore::new(), Catalog::builtin().unwrap())
                .clock(clock.clone())
                .build();
            e.start_session("home-row-1", "a").unwrap();
            e.record_keystroke("a", 1_000).unwrap();
            e.store.backend().clone()
        };
        let e = TypingEngine::builder(backend, Catalog::builtin().unwrap())
            .clock(clock)
            .build();
        assert_eq!(e.curriculum().progress("home-row-1").unwrap().attempts, 1);
    }

    #[test]
    fn test_clear_history_resets_progress() {
        let mut e = engine(Arc::new(ManualClock::new(0)));
        e.start_session("home-row-1", "a").unwrap();
        e.record_keystroke("a", 500).unwrap();
        assert!(e.get_analytics().is_some());
        e.clear_history().unwrap();
        assert!(e.get_analytics().is_none());
        assert!(e.curriculum().completed.is_empty());
        assert!(e.last_recommendation().is_none());
    }

    /// Backend that refuses every write
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("read-only").into())
        }

        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("read-only").into())
        }
    }

    #[test]
    fn test_failed_write_leaves_progress_untouched() {
        let mut e = TypingEngine::builder(ReadOnlyStore, Catalog::builtin().unwrap())
            .clock(Arc::new(ManualClock::new(0)))
            .build();
        e.start_session("home-row-1", "a").unwrap();
        assert_matches!(
            e.record_keystroke("a", 100),
            Err(EngineError::Storage(StorageError::Io(_)))
        );
        assert!(e.curriculum().completed.is_empty());
        assert!(e.curriculum().recommended_lesson_ids.is_empty());
        assert!(e.last_recommendation().is_none());
        assert!(e.active_session().is_none());
    }

    #[test]
    fn test_selection_follows_started_lesson() {
        let mut e = engine(Arc::new(ManualClock::new(0)));
        e.select_track("top-row");
        assert_eq!(e.curriculum().selected_lesson_id.as_deref(), Some("top-row-1"));
        e.start_lesson("home-row-2").unwrap();
        assert_eq!(e.curriculum().selected_track_id.as_deref(), Some("home-row"));
    }
}
