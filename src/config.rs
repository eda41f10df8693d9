//! Application configuration module
//!
//! This module centralizes all application configuration settings using `confy`
//! for automatic serialization and OS-specific config directory management.

use crate::constant::{
    ADDED_COLOR, APP_NAME, APP_ORGANIZATION, APP_QUALIFIER, DEFAULT_BASE_DELAY_MS,
    DEFAULT_GUTTER_WIDTH, DEFAULT_LINES_PER_STEP, DEFAULT_MAX_DELAY_MS, DEFAULT_TOOLTIP_MAX_LINES,
    DEFAULT_WORKER_THREADS, MAX_RECENT_FILES, MODIFIED_COLOR, REMOVED_COLOR,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Confy(#[from] confy::ConfyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Config {
    pub settings: Settings,
}

impl Config {
    /// Load configuration from disk, creating default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let settings: Settings = confy::load(APP_NAME, None)?;
        info!("Load config from {:?}", Self::config_path()?);
        Ok(Self { settings })
    }

    /// Get the application data directory
    /// Falls back to a local "data" directory if platform dirs are unavailable
    pub fn data_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME) {
            proj_dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from("data")
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }

    /// Add a file to the recent files list
    pub fn add_recent_file(&mut self, path: PathBuf) {
        self.settings.push_recent_file(path);

        // Save changes in background since it's synchronous IO
        let settings = self.settings.clone();
        std::thread::spawn(move || {
            if let Err(e) = confy::store(APP_NAME, None, &settings) {
                tracing::error!("Failed to save recent files: {}", e);
            }
        });
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Falling back to default settings: {}", e);
            Self {
                settings: Settings::default(),
            }
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Debounce and worker settings for the annotation engine
    #[serde(default)]
    pub annotation: AnnotationSettings,

    /// Gutter look and tooltip limits
    #[serde(default)]
    pub gutter: GutterSettings,

    /// Recently opened file paths, most recent first
    #[serde(default)]
    pub recent_files: Vec<PathBuf>,
}

impl Settings {
    fn push_recent_file(&mut self, path: PathBuf) {
        // Move the path to the front
        self.recent_files.retain(|p| p != &path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(MAX_RECENT_FILES);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSettings {
    /// Delay added for every started block of `lines_per_step` lines
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_lines_per_step")]
    pub lines_per_step: usize,

    /// Upper bound of the debounce delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Background threads running baseline lookups and diffs
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Executable used by the git baseline provider
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
}

impl AnnotationSettings {
    /// Debounce delay for a buffer of `line_count` lines:
    /// `min(max_delay, base_delay * (line_count / lines_per_step + 1))`
    pub fn debounce_delay(&self, line_count: usize) -> Duration {
        let steps = ((line_count / self.lines_per_step.max(1)) as u64).saturating_add(1);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(steps)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            lines_per_step: DEFAULT_LINES_PER_STEP,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            worker_threads: DEFAULT_WORKER_THREADS,
            git_binary: default_git_binary(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GutterSettings {
    #[serde(default = "default_gutter_width")]
    pub width: f32,

    /// Hard cap on removed lines shown in a tooltip
    #[serde(default = "default_tooltip_max_lines")]
    pub tooltip_max_lines: usize,

    #[serde(default = "default_added_color")]
    pub added_color: [u8; 3],

    #[serde(default = "default_modified_color")]
    pub modified_color: [u8; 3],

    #[serde(default = "default_removed_color")]
    pub removed_color: [u8; 3],
}

impl Default for GutterSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_GUTTER_WIDTH,
            tooltip_max_lines: DEFAULT_TOOLTIP_MAX_LINES,
            added_color: ADDED_COLOR,
            modified_color: MODIFIED_COLOR,
            removed_color: REMOVED_COLOR,
        }
    }
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_lines_per_step() -> usize {
    DEFAULT_LINES_PER_STEP
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_gutter_width() -> f32 {
    DEFAULT_GUTTER_WIDTH
}

fn default_tooltip_max_lines() -> usize {
    DEFAULT_TOOLTIP_MAX_LINES
}

fn default_added_color() -> [u8; 3] {
    ADDED_COLOR
}

fn default_modified_color() -> [u8; 3] {
    MODIFIED_COLOR
}

fn default_removed_color() -> [u8; 3] {
    REMOVED_COLOR
}
