use crate::matcher::MatchPolicy;
use crate::metrics::StarBands;
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_RECORDS: usize = 250;
pub const DEFAULT_RECENT_SESSIONS: usize = 8;
pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const SESSIONS_KEY: &str = "typing-sessions";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub matching: MatchPolicy,
    pub max_records: usize,
    pub recent_sessions: usize,
    pub window_days: u32,
    /// consecutive correct keystrokes measured for burst speed
    pub burst_window: usize,
    pub hesitation_threshold_ms: u64,
    /// accuracy and speed steps; the target wpm is taken from each lesson
    pub star_bands: StarBands,
    pub storage_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchPolicy::default(),
            max_records: MAX_RECORDS,
            recent_sessions: DEFAULT_RECENT_SESSIONS,
            window_days: DEFAULT_WINDOW_DAYS,
            burst_window: 10,
            hesitation_threshold_ms: 1_000,
            star_bands: StarBands::default(),
            storage_key: SESSIONS_KEY.to_string(),
        }
    }
}

impl EngineConfig {
    /// Star bands for a lesson with the given target speed
    pub fn bands_for(&self, target_wpm: u32) -> StarBands {
        StarBands {
            target_wpm,
            ..self.star_bands.clone()
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> EngineConfig;
    fn save(&self, cfg: &EngineConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "keytutor") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("keytutor_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> EngineConfig {
        let Ok(bytes) = fs::read(&self.path) else {
            return EngineConfig::default();
        };
        match serde_json::from_slice::<EngineConfig>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("ignoring unreadable config at {}: {e}", self.path.display());
                EngineConfig::default()
            }
        }
    }

    fn save(&self, cfg: &EngineConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
