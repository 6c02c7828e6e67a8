use crate::error::CatalogError;
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

static CATALOG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/catalog");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difficulty {
    /// target words per minute
    pub speed: u32,
    /// target accuracy percentage
    pub accuracy: u32,
    pub complexity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    /// name of a text under `texts/` in the embedded catalog
    #[serde(default)]
    pub content_ref: Option<String>,
    /// inline text, takes precedence over `content_ref`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonTrack {
    pub id: String,
    pub name: String,
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub difficulty_index: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl LessonTrack {
    pub fn position(&self, lesson_id: &str) -> Option<usize> {
        self.lessons.iter().position(|l| l.id == lesson_id)
    }
}

/// Ordered set of tracks; order is the order learners progress in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub tracks: Vec<LessonTrack>,
}

impl Catalog {
    /// The catalog compiled into the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        let file = CATALOG_DIR
            .get_file("catalog.json")
            .ok_or_else(|| CatalogError::MissingEmbedded("catalog.json".into()))?;
        let text = file
            .contents_utf8()
            .ok_or_else(|| CatalogError::MissingEmbedded("catalog.json".into()))?;
        Self::from_json(text)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn track(&self, track_id: &str) -> Option<&LessonTrack> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    pub fn track_index(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track_id)
    }

    /// The lesson and the track that contains it
    pub fn lesson(&self, lesson_id: &str) -> Option<(&LessonTrack, &Lesson)> {
        self.tracks.iter().find_map(|track| {
            track
                .lessons
                .iter()
                .find(|l| l.id == lesson_id)
                .map(|lesson| (track, lesson))
        })
    }

    pub fn lessons(&self) -> impl Iterator<Item = (&LessonTrack, &Lesson)> {
        self.tracks
            .iter()
            .flat_map(|track| track.lessons.iter().map(move |l| (track, l)))
    }

    /// Text to type for a lesson, inline content first, then the embedded texts
    pub fn lesson_text(&self, lesson: &Lesson) -> Option<String> {
        if let Some(content) = &lesson.content {
            return Some(content.clone());
        }
        let content_ref = lesson.content_ref.as_ref()?;
        CATALOG_DIR
            .get_file(format!("texts/{content_ref}.txt"))
            .and_then(|f| f.contents_utf8())
            .map(|s| s.trim_end().to_string())
    }
}
