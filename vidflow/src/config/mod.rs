//! Application configuration.
//!
//! Settings come from an optional TOML file (explicit path, or
//! `<config dir>/vidflow/config.toml`), then environment variables (with
//! `.env` support) override individual values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use crate::pipeline::worker_pool::PoolConfig;
use crate::{Error, Result};

/// Where queue state and generated files live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub queue_file: PathBuf,
    /// Published shorts.
    pub shorts_dir: PathBuf,
    pub transcripts_dir: PathBuf,
    /// Central article archive.
    pub articles_dir: PathBuf,
    pub links_file: PathBuf,
    /// Parent of per-item working directories and of dry-run output.
    pub temp_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidflow");
        Self {
            queue_file: root.join("queue.json"),
            shorts_dir: root.join("shorts"),
            transcripts_dir: root.join("transcripts"),
            articles_dir: root.join("articles"),
            links_file: root.join("links.json"),
            temp_dir: std::env::temp_dir().join("vidflow"),
            log_dir: root.join("logs"),
        }
    }
}

/// External tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Encoder used when cutting clips and compositing the overlay. Concatenation
    /// copies streams.
    pub video_encoder: String,
    /// Renderer invocation; `{metadata}` and `{output}` are substituted with
    /// quoted paths.
    pub render_command: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_encoder: "h264_nvenc".to_string(),
            render_command: "npx remotion render src/index.ts Overlay {output} --props={metadata} --codec=prores --prores-profile=4444".to_string(),
        }
    }
}

/// AI service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub transcription_model: String,
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            request_timeout_secs: 300,
        }
    }
}

/// Article generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleConfig {
    /// How many previous articles to show the author for style continuity.
    pub style_examples: usize,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self { style_examples: 3 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub pools: PoolConfig,
    pub tools: ToolsConfig,
    pub ai: AiConfig,
    pub article: ArticleConfig,
}

impl AppConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vidflow").join("config.toml"))
    }

    /// Load configuration from `path` (or the default location), then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let explicit = path.is_some();
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading config file");
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| Error::io_path("reading config", &path, e))?;
                Self::from_toml(&raw)?
            }
            Some(path) if explicit => {
                return Err(Error::config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(format!("invalid config file: {e}")))
    }

    /// Override values from environment variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let path_vars: [(&str, &mut PathBuf); 7] = [
            ("VIDFLOW_QUEUE_FILE", &mut self.paths.queue_file),
            ("VIDFLOW_SHORTS_DIR", &mut self.paths.shorts_dir),
            ("VIDFLOW_TRANSCRIPTS_DIR", &mut self.paths.transcripts_dir),
            ("VIDFLOW_ARTICLES_DIR", &mut self.paths.articles_dir),
            ("VIDFLOW_LINKS_FILE", &mut self.paths.links_file),
            ("VIDFLOW_TEMP_DIR", &mut self.paths.temp_dir),
            ("VIDFLOW_LOG_DIR", &mut self.paths.log_dir),
        ];
        for (key, slot) in path_vars {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = PathBuf::from(value);
            }
        }

        let string_vars: [(&str, &mut String); 5] = [
            ("FFMPEG_PATH", &mut self.tools.ffmpeg_path),
            ("FFPROBE_PATH", &mut self.tools.ffprobe_path),
            ("VIDFLOW_VIDEO_ENCODER", &mut self.tools.video_encoder),
            ("VIDFLOW_RENDER_COMMAND", &mut self.tools.render_command),
            ("OPENAI_BASE_URL", &mut self.ai.api_base),
        ];
        for (key, slot) in string_vars {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.ai.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, size) in [
            ("pools.gpu_encode", self.pools.gpu_encode),
            ("pools.cpu", self.pools.cpu),
            ("pools.transcription", self.pools.transcription),
        ] {
            if size == 0 {
                return Err(Error::config(format!("{name} must be at least 1")));
            }
        }

        for placeholder in ["{metadata}", "{output}"] {
            if !self.tools.render_command.contains(placeholder) {
                return Err(Error::config(format!(
                    "tools.render_command must contain {placeholder}"
                )));
            }
        }

        if self.tools.ffmpeg_path.trim().is_empty() || self.tools.ffprobe_path.trim().is_empty() {
            return Err(Error::config("ffmpeg and ffprobe paths must not be empty"));
        }
        Ok(())
    }
}
