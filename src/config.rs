use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::notify::Permission;
use crate::timer::{TimerConfig, DEFAULT_REST_MINUTES, DEFAULT_WORK_MINUTES};

/// Starting permission for desktop notifications
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationsMode {
    /// ask from inside the timer (press n)
    Ask,
    On,
    Off,
}

impl NotificationsMode {
    pub fn permission(&self) -> Permission {
        match self {
            NotificationsMode::Ask => Permission::Default,
            NotificationsMode::On => Permission::Granted,
            NotificationsMode::Off => Permission::Denied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub work_minutes: u32,
    pub rest_minutes: u32,
    pub focus_label: String,
    pub sound: bool,
    pub notifications: NotificationsMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            rest_minutes: DEFAULT_REST_MINUTES,
            focus_label: String::new(),
            sound: true,
            notifications: NotificationsMode::Ask,
        }
    }
}

impl Config {
    /// Durations normalized the same way as typed input
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig::from_raw(&self.work_minutes.to_string(), &self.rest_minutes.to_string())
    }

    /// Apply raw duration overrides, storing the normalized minutes
    pub fn with_durations(mut self, work_raw: Option<&str>, rest_raw: Option<&str>) -> Self {
        let work = work_raw
            .map(str::to_string)
            .unwrap_or_else(|| self.work_minutes.to_string());
        let rest = rest_raw
            .map(str::to_string)
            .unwrap_or_else(|| self.rest_minutes.to_string());
        let normalized = TimerConfig::from_raw(&work, &rest);
        self.work_minutes = normalized.work_duration_seconds() / 60;
        self.rest_minutes = normalized.rest_duration_seconds() / 60;
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "pomo") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("pomo_config.json")
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
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!("ignoring invalid config {}: {}", self.path.display(), e),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
