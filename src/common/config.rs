use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_FILENAME_TEMPLATE: &str = "%(title)s [%(id)s]";
pub const DEFAULT_VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("配置文件格式错误 {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("无效的配置项 {0}")]
    Invalid(String),
}

/// 运行配置：默认值 -> JSON 配置文件 -> 环境变量 -> 命令行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// yt-dlp 可执行文件 (可用 YTDLP_PATH 覆盖)
    pub downloader_program: String,
    /// ffmpeg 可执行文件 (可用 FFMPEG_PATH 覆盖)
    pub transcoder_program: String,
    /// yt-dlp 输出模板，不含扩展名
    pub filename_template: String,
    pub video_format: String,
    pub concurrent_fragments: u32,
    pub mp3_bitrate: String,
    pub wav_sample_rate: u32,
    pub wav_channels: u32,
    /// 取消后等待进程退出的时间，超时强制结束
    pub kill_grace_ms: u64,
    /// 单个外部进程的超时时间，默认不限制
    pub process_timeout_secs: Option<u64>,
    pub default_output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            downloader_program: "yt-dlp".to_string(),
            transcoder_program: "ffmpeg".to_string(),
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            video_format: DEFAULT_VIDEO_FORMAT.to_string(),
            concurrent_fragments: 4,
            mp3_bitrate: "320k".to_string(),
            wav_sample_rate: 44100,
            wav_channels: 2,
            kill_grace_ms: 3000,
            process_timeout_secs: None,
            default_output_dir: PathBuf::from("./output"),
        }
    }
}

impl AppConfig {
    /// 从 JSON 文件加载，缺省字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: AppConfig = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 加载配置并应用环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// 环境变量覆盖，`lookup` 便于测试时注入
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("YTDLP_PATH").filter(|v| !v.trim().is_empty()) {
            self.downloader_program = v;
        }
        if let Some(v) = lookup("FFMPEG_PATH").filter(|v| !v.trim().is_empty()) {
            self.transcoder_program = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.downloader_program.trim().is_empty() {
            return Err(ConfigError::Invalid("downloader_program 不能为空".to_string()));
        }
        if self.transcoder_program.trim().is_empty() {
            return Err(ConfigError::Invalid("transcoder_program 不能为空".to_string()));
        }
        if self.filename_template.trim().is_empty() {
            return Err(ConfigError::Invalid("filename_template 不能为空".to_string()));
        }
        if self.concurrent_fragments == 0 {
            return Err(ConfigError::Invalid("concurrent_fragments 必须大于 0".to_string()));
        }
        if self.wav_sample_rate == 0 || self.wav_channels == 0 {
            return Err(ConfigError::Invalid("wav 采样率与声道数必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }
}
