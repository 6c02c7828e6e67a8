use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "keytutor";

/// Where history and configuration live by default
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/keytutor/history.db`, or the platform data dir without `HOME`
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME)
                    .join("history.db"),
            )
        } else {
            ProjectDirs::from("", "", APP_NAME).map(|pd| pd.data_local_dir().join("history.db"))
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|pd| pd.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_ends_in_app_dir() {
        if let Some(path) = AppDirs::db_path() {
            assert!(path.ends_with("keytutor/history.db"));
        }
    }
}
