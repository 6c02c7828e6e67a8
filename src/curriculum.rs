use crate::catalog::{Catalog, LessonTrack};
use crate::error::{EngineError, Result};
use crate::session::SessionSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PASSING_STARS: u8 = 3;
pub const PASSING_ACCURACY: u32 = 90;

/// Where a learner should go after finishing a lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "lessonId", rename_all = "camelCase")]
pub enum Recommendation {
    /// not good enough yet, repeat the lesson
    Remediate(String),
    Advance(String),
    /// last lesson of the last track passed
    CourseComplete,
}

impl Recommendation {
    /// Empty for a completed course
    pub fn lesson_ids(&self) -> Vec<String> {
        match self {
            Recommendation::Remediate(id) | Recommendation::Advance(id) => vec![id.clone()],
            Recommendation::CourseComplete => Vec::new(),
        }
    }
}

pub fn needs_remediation(summary: &SessionSummary) -> bool {
    summary.star_rating < PASSING_STARS || summary.accuracy < PASSING_ACCURACY
}

/// Pick the next lesson after `lesson_id` in `track_id` was finished with `summary`
pub fn recommend(
    catalog: &Catalog,
    track_id: &str,
    lesson_id: &str,
    summary: &SessionSummary,
) -> Result<Recommendation> {
    let track_idx = catalog
        .track_index(track_id)
        .ok_or_else(|| EngineError::InvalidLesson(track_id.to_string()))?;
    let track = &catalog.tracks[track_idx];
    let pos = track
        .position(lesson_id)
        .ok_or_else(|| EngineError::InvalidLesson(lesson_id.to_string()))?;

    if needs_remediation(summary) {
        return Ok(Recommendation::Remediate(lesson_id.to_string()));
    }

    if let Some(next) = track.lessons.get(pos + 1) {
        return Ok(Recommendation::Advance(next.id.clone()));
    }

    let next_track_start = catalog.tracks[track_idx + 1..]
        .iter()
        .find_map(|t| t.lessons.first());
    Ok(match next_track_start {
        Some(lesson) => Recommendation::Advance(lesson.id.clone()),
        None => Recommendation::CourseComplete,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub best_stars: u8,
    pub attempts: u32,
}

/// Learner-facing curriculum bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumState {
    pub tracks: Vec<LessonTrack>,
    pub selected_track_id: Option<String>,
    pub selected_lesson_id: Option<String>,
    pub completed: BTreeMap<String, LessonProgress>,
    pub recommended_lesson_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CurriculumAction {
    SelectTrack(String),
    SelectLesson(String),
    LessonCompleted {
        lesson_id: String,
        stars: u8,
        recommendation: Recommendation,
    },
    /// forget progress, keep the tracks
    Reset,
}

impl CurriculumState {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            tracks: catalog.tracks.clone(),
            ..Self::default()
        }
    }

    /// Rebuild progress from stored history, oldest first
    pub fn replay<'a, I>(catalog: &Catalog, completions: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u8)>,
    {
        completions
            .into_iter()
            .fold(Self::new(catalog), |mut state, (lesson_id, stars)| {
                let entry = state.completed.entry(lesson_id.to_string()).or_default();
                entry.best_stars = entry.best_stars.max(stars);
                entry.attempts += 1;
                state
            })
    }

    pub fn progress(&self, lesson_id: &str) -> Option<LessonProgress> {
        self.completed.get(lesson_id).copied()
    }

    fn has_track(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }

    fn track_of(&self, lesson_id: &str) -> Option<&LessonTrack> {
        self.tracks
            .iter()
            .find(|t| t.lessons.iter().any(|l| l.id == lesson_id))
    }

    /// Prerequisites of the track are all finished with at least a passing rating
    pub fn is_unlocked(&self, track_id: &str) -> bool {
        let Some(track) = self.tracks.iter().find(|t| t.id == track_id) else {
            return false;
        };
        track.prerequisites.iter().all(|pre| {
            self.tracks
                .iter()
                .find(|t| &t.id == pre)
                .is_some_and(|t| {
                    t.lessons.iter().all(|l| {
                        self.progress(&l.id)
                            .is_some_and(|p| p.best_stars >= PASSING_STARS)
                    })
                })
        })
    }

    pub fn apply(self, action: CurriculumAction) -> Self {
        match action {
            CurriculumAction::SelectTrack(track_id) => {
                if !self.has_track(&track_id) {
                    return self;
                }
                let first = self
                    .tracks
                    .iter()
                    .find(|t| t.id == track_id)
                    .and_then(|t| t.lessons.first())
                    .map(|l| l.id.clone());
                Self {
                    selected_track_id: Some(track_id),
                    selected_lesson_id: first,
                    ..self
                }
            }
            CurriculumAction::SelectLesson(lesson_id) => {
                let Some(track_id) = self.track_of(&lesson_id).map(|t| t.id.clone()) else {
                    return self;
                };
                Self {
                    selected_track_id: Some(track_id),
                    selected_lesson_id: Some(lesson_id),
                    ..self
                }
            }
            CurriculumAction::LessonCompleted {
                lesson_id,
                stars,
                recommendation,
            } => {
                let mut completed = self.completed;
                let entry = completed.entry(lesson_id).or_default();
                entry.best_stars = entry.best_stars.max(stars);
                entry.attempts += 1;
                Self {
                    completed,
                    recommended_lesson_ids: recommendation.lesson_ids(),
                    ..self
                }
            }
            CurriculumAction::Reset => Self {
                completed: BTreeMap::new(),
                recommended_lesson_ids: Vec::new(),
                selected_lesson_id: None,
                selected_track_id: None,
                ..self
            },
        }
    }
}
