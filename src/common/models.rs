use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::error::JobError;

// -----------------------------------------------------------------------------------------------

/// 输出类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// 只保留下载的视频
    Mp4,
    #[default]
    Mp3,
    Wav,
    /// 同时转换 MP3 和 WAV
    Both,
}

impl OutputKind {
    /// 需要调用 ffmpeg 的音频格式
    pub fn audio_formats(&self) -> &'static [AudioFormat] {
        match self {
            OutputKind::Mp4 => &[],
            OutputKind::Mp3 => &[AudioFormat::Mp3],
            OutputKind::Wav => &[AudioFormat::Wav],
            OutputKind::Both => &[AudioFormat::Mp3, AudioFormat::Wav],
        }
    }

    pub fn needs_conversion(&self) -> bool {
        !self.audio_formats().is_empty()
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputKind::Mp4 => "MP4",
            OutputKind::Mp3 => "MP3",
            OutputKind::Wav => "WAV",
            OutputKind::Both => "MP3+WAV",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OutputKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" | "video" => Ok(OutputKind::Mp4),
            "mp3" => Ok(OutputKind::Mp3),
            "wav" => Ok(OutputKind::Wav),
            "both" | "ambos" | "mp3+wav" => Ok(OutputKind::Both),
            other => Err(JobError::InvalidJob(format!("不支持的输出格式: {}", other))),
        }
    }
}

/// ffmpeg 转换目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

// -----------------------------------------------------------------------------------------------

/// 一次用户请求。任务开始后不可变，由控制器独占。
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    job_id: Uuid,
    source_url: String,
    output_kind: OutputKind,
    destination_dir: PathBuf,
    delete_intermediate: bool,
}

impl JobDescriptor {
    /// 校验并创建任务，目标目录不存在时会被创建
    pub fn new(
        source_url: &str,
        output_kind: OutputKind,
        destination_dir: impl AsRef<Path>,
        delete_intermediate: bool,
    ) -> Result<Self, JobError> {
        let source_url = validate_source_url(source_url)?;
        let destination_dir = destination_dir.as_ref();
        if destination_dir.as_os_str().is_empty() {
            return Err(JobError::InvalidJob("输出目录为空".to_string()));
        }
        if destination_dir.exists() && !destination_dir.is_dir() {
            return Err(JobError::InvalidJob(format!(
                "输出路径不是目录: {}",
                destination_dir.display()
            )));
        }
        std::fs::create_dir_all(destination_dir).map_err(|e| {
            JobError::InvalidJob(format!(
                "无法创建输出目录 {}: {}",
                destination_dir.display(),
                e
            ))
        })?;

        // 外部进程的工作目录就是输出目录，这里统一为绝对路径
        let destination_dir = std::path::absolute(destination_dir).map_err(|e| {
            JobError::InvalidJob(format!(
                "无法解析输出目录 {}: {}",
                destination_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            job_id: Uuid::new_v4(),
            source_url,
            output_kind,
            destination_dir,
            delete_intermediate,
        })
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    pub fn delete_intermediate(&self) -> bool {
        self.delete_intermediate
    }
}

fn validate_source_url(input: &str) -> Result<String, JobError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(JobError::InvalidJob("URL 为空".to_string()));
    }
    let url = Url::parse(input)
        .map_err(|e| JobError::InvalidJob(format!("无效的URL {}: {}", input, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(JobError::InvalidJob(format!("不支持的协议: {}", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(JobError::InvalidJob(format!("URL 缺少主机名: {}", input)));
    }
    Ok(input.to_string())
}

// -----------------------------------------------------------------------------------------------

/// 进度阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Downloading,
    Converting,
    Deleting,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Downloading => "下载中",
            Phase::Converting => "转换中",
            Phase::Deleting => "删除中",
            Phase::Done => "完成",
            Phase::Failed => "失败",
        };
        write!(f, "{}", s)
    }
}

/// 归一化后的进度，后一条覆盖前一条
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// 从 1 开始
    pub item_index: usize,
    pub item_total: usize,
    pub phase: Phase,
    /// 0-100，未知时为 None
    pub percent: Option<f32>,
    pub message: String,
}

impl ProgressUpdate {
    /// 按条目计算的整体进度 (0-100)
    pub fn overall_percent(&self) -> f32 {
        if self.item_total == 0 {
            return 0.0;
        }
        let finished = match self.phase {
            Phase::Done | Phase::Failed => self.item_index,
            _ => self.item_index.saturating_sub(1),
        };
        let current = match self.phase {
            Phase::Done | Phase::Failed => 0.0,
            _ => self.percent.unwrap_or(0.0) / 100.0,
        };
        ((finished as f32 + current) * 100.0 / self.item_total as f32).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// 原样转发给界面的一行文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub text: String,
}

impl LogLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_kind_parses_case_insensitive() {
        assert_eq!("MP3".parse::<OutputKind>().unwrap(), OutputKind::Mp3);
        assert_eq!("wav".parse::<OutputKind>().unwrap(), OutputKind::Wav);
        assert_eq!(" Mp4 ".parse::<OutputKind>().unwrap(), OutputKind::Mp4);
        assert_eq!("both".parse::<OutputKind>().unwrap(), OutputKind::Both);
        assert!(matches!("flac".parse::<OutputKind>(), Err(JobError::InvalidJob(_))));
    }

    #[test]
    fn output_kind_audio_formats() {
        assert!(!OutputKind::Mp4.needs_conversion());
        assert_eq!(OutputKind::Both.audio_formats(), &[AudioFormat::Mp3, AudioFormat::Wav]);
    }

    #[test]
    fn job_rejects_bad_urls() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["", "   ", "not a url", "ftp://example.com/x", "file:///etc/passwd"] {
            let res = JobDescriptor::new(bad, OutputKind::Mp3, dir.path(), true);
            assert!(matches!(res, Err(JobError::InvalidJob(_))), "应当拒绝: {:?}", bad);
        }
    }

    #[test]
    fn job_creates_destination_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a").join("b");
        let job = JobDescriptor::new(
            "https://www.youtube.com/watch?v=abc123",
            OutputKind::Mp4,
            &dest,
            false,
        )
        .unwrap();
        assert!(dest.is_dir());
        assert_eq!(job.destination_dir(), dest.as_path());
        assert!(job.destination_dir().is_absolute());
        assert_eq!(job.source_url(), "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn job_rejects_file_as_destination() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        let res = JobDescriptor::new("https://youtu.be/abc", OutputKind::Mp3, &file, true);
        assert!(matches!(res, Err(JobError::InvalidJob(_))));
    }

    #[test]
    fn overall_percent_counts_items() {
        let update = ProgressUpdate {
            item_index: 2,
            item_total: 4,
            phase: Phase::Downloading,
            percent: Some(50.0),
            message: String::new(),
        };
        assert!((update.overall_percent() - 37.5).abs() < 1e-4);

        let done = ProgressUpdate { phase: Phase::Done, percent: None, ..update };
        assert!((done.overall_percent() - 50.0).abs() < 1e-4);
    }
}
