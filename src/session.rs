use crate::clock::elapsed_ms;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ids::IdGenerator;
use crate::keyboard::FingerUsage;
use crate::matcher::{InputMatcher, KeystrokeResult, TypingEvent};
use crate::metrics::{self, HesitationStats, KeyHeat, StarBands};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EndReason {
    Completed,
    Abandoned,
}

/// The one session currently being typed
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session_id: SessionId,
    pub lesson_id: String,
    pub target_text: String,
    pub started_at: i64,
    pub elapsed_ms: u64,
    pub is_running: bool,
    pub bands: StarBands,
    matcher: InputMatcher,
}

impl ActiveSession {
    pub fn cursor_index(&self) -> usize {
        self.matcher.cursor_index()
    }

    pub fn correct_count(&self) -> usize {
        self.matcher.correct_count()
    }

    pub fn error_count(&self) -> usize {
        self.matcher.error_count()
    }

    pub fn characters_typed(&self) -> usize {
        self.matcher.characters_typed()
    }

    pub fn events(&self) -> &[TypingEvent] {
        self.matcher.events()
    }

    fn advance_clock(&mut self, now: i64) {
        let elapsed = elapsed_ms(self.started_at, now);
        if elapsed > self.elapsed_ms {
            self.elapsed_ms = elapsed;
        }
    }
}

/// Metrics derived from a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub duration_ms: u64,
    pub wpm: u32,
    pub cpm: u32,
    pub accuracy: u32,
    pub error_rate: f64,
    pub star_rating: u8,
    pub streak: u32,
    #[serde(default)]
    pub correct_count: usize,
    #[serde(default)]
    pub error_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_speed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hesitation_stats: Option<HesitationStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finger_usage: Option<FingerUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<BTreeMap<String, KeyHeat>>,
}

impl SessionSummary {
    /// Headline metrics only, without the event-derived extras
    pub fn from_counts(
        correct_count: usize,
        error_count: usize,
        duration_ms: u64,
        bands: &StarBands,
    ) -> Self {
        let m = metrics::calculate(correct_count, error_count, duration_ms);
        Self {
            duration_ms,
            wpm: m.wpm,
            cpm: m.cpm,
            accuracy: m.accuracy,
            error_rate: m.error_rate,
            star_rating: bands.rate(m.wpm, m.accuracy),
            streak: 0,
            correct_count,
            error_count,
            burst_speed: None,
            hesitation_stats: None,
            finger_usage: None,
            heatmap: None,
        }
    }

    fn from_session(session: &ActiveSession, config: &EngineConfig) -> Self {
        let events = session.events();
        let mut summary = Self::from_counts(
            session.correct_count(),
            session.error_count(),
            session.elapsed_ms,
            &session.bands,
        );
        summary.streak = metrics::longest_streak(events);
        summary.burst_speed = metrics::burst_speed(events, config.burst_window);
        summary.hesitation_stats = metrics::hesitation(events, config.hesitation_threshold_ms);
        let usage = metrics::finger_usage(events);
        summary.finger_usage = (usage.total() > 0).then_some(usage);
        let heat = metrics::heatmap(events);
        summary.heatmap = (!heat.is_empty()).then_some(heat);
        summary
    }
}

/// How a session ended, handed to the store and the curriculum
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSession {
    pub session_id: SessionId,
    pub lesson_id: String,
    pub reason: EndReason,
    pub started_at: i64,
    pub summary: SessionSummary,
}

/// A keystroke's result plus the finished session if it completed the text
#[derive(Debug, Clone, PartialEq)]
pub struct KeystrokeOutcome {
    pub result: KeystrokeResult,
    pub finished: Option<FinishedSession>,
}

/// Owns the single active session.
///
/// Idle until `start_session`, running until the text is completed or
/// `end_session`/`reset_session` is called, then idle again.
pub struct SessionStateMachine {
    config: EngineConfig,
    ids: Arc<dyn IdGenerator>,
    active: Option<ActiveSession>,
    last_finished: Option<FinishedSession>,
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("active", &self.active)
            .field("last_finished", &self.last_finished)
            .finish()
    }
}

impl SessionStateMachine {
    pub fn new(config: EngineConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            config,
            ids,
            active: None,
            last_finished: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|s| s.is_running)
    }

    pub fn last_finished(&self) -> Option<&FinishedSession> {
        self.last_finished.as_ref()
    }

    pub fn start_session(&mut self, lesson_id: &str, text: &str, now: i64) -> Result<SessionId> {
        let bands = self.config.star_bands.clone();
        self.start_session_with(lesson_id, text, bands, now)
    }

    pub fn start_session_with(
        &mut self,
        lesson_id: &str,
        text: &str,
        bands: StarBands,
        now: i64,
    ) -> Result<SessionId> {
        if self.is_running() {
            return Err(EngineError::SessionAlreadyActive);
        }
        if text.is_empty() {
            return Err(EngineError::EmptyText);
        }

        let session_id = self.ids.next_id("session");
        debug!("starting session {session_id} for lesson {lesson_id}");
        self.active = Some(ActiveSession {
            session_id: session_id.clone(),
            lesson_id: lesson_id.to_string(),
            target_text: text.to_string(),
            started_at: now,
            elapsed_ms: 0,
            is_running: true,
            bands,
            matcher: InputMatcher::new(text, self.config.matching, now),
        });
        Ok(session_id)
    }

    pub fn tick(&mut self, now: i64) -> Result<()> {
        let session = self.running_mut()?;
        session.advance_clock(now);
        Ok(())
    }

    pub fn record_keystroke(&mut self, key: &str, now: i64) -> Result<KeystrokeOutcome> {
        let session = self.running_mut()?;
        let result = session.matcher.feed(key, now);
        if result.accepted {
            session.advance_clock(now);
        }

        let finished = if result.completed {
            Some(self.end_session(EndReason::Completed)?)
        } else {
            None
        };
        Ok(KeystrokeOutcome { result, finished })
    }

    pub fn record_key_up(&mut self, key: &str, now: i64) -> Result<()> {
        self.running_mut()?.matcher.key_up(key, now);
        Ok(())
    }

    pub fn record_autoscroll(&mut self, now: i64) -> Result<()> {
        self.running_mut()?.matcher.autoscroll(now);
        Ok(())
    }

    pub fn end_session(&mut self, reason: EndReason) -> Result<FinishedSession> {
        let mut session = self.active.take().ok_or(EngineError::NoActiveSession)?;
        session.is_running = false;

        let finished = FinishedSession {
            summary: SessionSummary::from_session(&session, &self.config),
            session_id: session.session_id,
            lesson_id: session.lesson_id,
            reason,
            started_at: session.started_at,
        };
        debug!(
            "session {} {} at {} wpm / {}%",
            finished.session_id, reason, finished.summary.wpm, finished.summary.accuracy
        );
        self.last_finished = Some(finished.clone());
        Ok(finished)
    }

    /// Drop the active session without producing a summary
    pub fn reset_session(&mut self) {
        if let Some(session) = self.active.take() {
            debug!("discarding session {}", session.session_id);
        }
    }

    fn running_mut(&mut self) -> Result<&mut ActiveSession> {
        self.active
            .as_mut()
            .filter(|s| s.is_running)
            .ok_or(EngineError::NoActiveSession)
    }
}
