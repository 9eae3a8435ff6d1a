use std::{
    io,
    ops::Not,
    path::{Path, PathBuf},
};

use eframe::egui;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Not for Theme {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl From<Theme> for egui::Visuals {
    fn from(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }
}

/// What happens when the countdown after the alarm runs out.
#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PenaltyExpiry {
    /// move on to a separate penalty screen with its own countdown
    #[default]
    TransitionToPenalty,
    /// the photo counts as sent right away
    MarkSent,
}

/// Whether waking up keeps the alarm for tomorrow.
#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PostWake {
    #[default]
    Disarm,
    RearmNextDay,
}

pub const DEFAULT_PENALTY_SECONDS: u32 = 10;

const fn default_penalty_seconds() -> u32 {
    DEFAULT_PENALTY_SECONDS
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_time_format")]
    pub time_format: String,
    #[serde(default)]
    pub theme: Theme,
    /// length of each countdown, in ticks
    #[serde(default = "default_penalty_seconds")]
    pub penalty_seconds: u32,
    #[serde(default)]
    pub on_penalty_expire: PenaltyExpiry,
    #[serde(default)]
    pub post_wake: PostWake,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
            theme: Theme::Dark,
            penalty_seconds: DEFAULT_PENALTY_SECONDS,
            on_penalty_expire: PenaltyExpiry::default(),
            post_wake: PostWake::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the config, falling back to the defaults if it is missing or broken.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(config) => toml::from_str(&config).unwrap_or_else(|e| {
                log::warn!("couldn't parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("couldn't read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let config = toml::to_string(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, config)
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", "shame_alarm")
    }

    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// where alarm and photo records are kept
    #[must_use]
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().is_some_and(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = toml::from_str("theme = \"Light\"").unwrap();
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.penalty_seconds, 10);
        assert_eq!(config.on_penalty_expire, PenaltyExpiry::TransitionToPenalty);
        assert_eq!(config.post_wake, PostWake::Disarm);
    }

    #[test]
    fn policies_use_kebab_case() {
        let config: Config = toml::from_str(
            "on_penalty_expire = \"mark-sent\"\npost_wake = \"rearm-next-day\"\npenalty_seconds = 5",
        )
        .unwrap();
        assert_eq!(config.on_penalty_expire, PenaltyExpiry::MarkSent);
        assert_eq!(config.post_wake, PostWake::RearmNextDay);
        assert_eq!(config.penalty_seconds, 5);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let config = Config {
            theme: !Theme::Dark,
            post_wake: PostWake::RearmNextDay,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path), config);
    }

    #[test]
    fn broken_or_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load(&path), Config::default());
        std::fs::write(&path, "penalty_seconds = \"ten\"").unwrap();
        assert_eq!(Config::load(&path), Config::default());
    }
}
