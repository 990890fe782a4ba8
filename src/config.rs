use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub recordings: RecordingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HotkeyConfig {
    pub modifiers: Vec<String>,
    pub key: String,
    /// Minimum interval between accepted toggle presses, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            modifiers: vec!["Control".to_owned(), "Shift".to_owned()],
            key: "M".to_owned(),
            debounce_ms: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Recordings shorter than this are discarded (accidental double-press).
    pub min_duration_ms: u64,
    /// Upper bound on a single recording; sizes the capture ring buffer.
    pub max_duration_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            min_duration_ms: 1200,
            max_duration_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub path: String,
    pub preload: bool,
    pub threads: usize,
    pub beam_size: usize,
    /// Language code ("en", "pl", ...); None = auto-detect.
    pub language: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "base".to_owned(),
            path: "~/.dictation-hotkey/models/ggml-base.bin".to_owned(),
            preload: true,
            threads: 4,
            beam_size: 1,
            language: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecordingsConfig {
    pub enabled: bool,
    /// Delete recordings older than this many days (0 = no age limit).
    pub retention_days: u32,
    /// Keep at most this many recordings (0 = no count limit).
    pub max_count: usize,
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 7,
            max_count: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_to_file: bool,
    pub log_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_to_file: true,
            log_path: "~/.dictation-hotkey/dictation.log".to_owned(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"[hotkey]
modifiers = ["Control", "Shift"]
key = "M"
debounce_ms = 600

[audio]
sample_rate = 16000
min_duration_ms = 1200
max_duration_secs = 30

[model]
name = "base"
path = "~/.dictation-hotkey/models/ggml-base.bin"
preload = true
threads = 4
beam_size = 1
# language = "en"

[recordings]
enabled = true
retention_days = 7
max_count = 100

[logging]
log_to_file = true
log_path = "~/.dictation-hotkey/dictation.log"
"#;

impl Config {
    /// Load config from `~/.dictation-hotkey.toml`, writing a default file
    /// on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .context("failed to write default config")?;
        }

        let contents = fs::read_to_string(&config_path)
            .context("failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("failed to parse config TOML")?;

        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".dictation-hotkey.toml"))
    }

    /// Expand ~ in paths to home directory
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            let home = std::env::var("HOME")
                .context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }

    /// Directory holding saved recordings.
    pub fn recordings_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .context("HOME environment variable not set")?;
        Ok(PathBuf::from(home)
            .join(".dictation-hotkey")
            .join("recordings"))
    }
}
