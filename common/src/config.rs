use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    /// Recreated at the start of every run.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_samples_per_second")]
    pub samples_per_second: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadConfig {
    /// Where the frame directory is reachable by downstream consumers.
    /// Frames are referenced by local `file://` URIs when unset.
    #[serde(default)]
    pub media_base_uri: Option<String>,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            samples_per_second: default_samples_per_second(),
            jpeg_quality: default_jpeg_quality(),
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            media_base_uri: None,
            mime_type: default_mime_type(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.samples_per_second == 0 {
            return Err(ConfigError::Invalid(
                "sampler.samples_per_second must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.sampler.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "sampler.jpeg_quality must be within 1..=100, got {}",
                self.sampler.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("/tmp/frames")
}
fn default_samples_per_second() -> u32 {
    5
}
fn default_jpeg_quality() -> u8 {
    95
}
fn default_ffmpeg_path() -> String {
    "ffmpeg".into()
}
fn default_ffprobe_path() -> String {
    "ffprobe".into()
}
fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp/videos")
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_timeout() -> u64 {
    300
}
fn default_mime_type() -> String {
    "image/jpeg".into()
}
fn default_log_level() -> String {
    "info".into()
}
