use std::path::PathBuf;

use thiserror::Error;

use crate::downloader::error::ProcessError;

/// 任务级错误
///
/// `InvalidJob` / `ProcessLaunch` / `PlaylistResolution` 对整个任务是致命的；
/// `Download` / `Conversion` 在条目边界被捕获并记入汇总，只有单条目任务才会因此失败。
#[derive(Debug, Error)]
pub enum JobError {
    #[error("无效的任务: {0}")]
    InvalidJob(String),

    #[error("无法启动外部程序 {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("播放列表解析失败: {0}")]
    PlaylistResolution(String),

    #[error("下载失败: {0}")]
    Download(String),

    #[error("转换失败: {0}")]
    Conversion(String),

    #[error("已有任务在运行")]
    Busy,

    #[error("任务已取消")]
    Cancelled,

    #[error("IO错误 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("进程错误: {0}")]
    Process(ProcessError),
}

impl From<ProcessError> for JobError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Launch { program, source } => JobError::ProcessLaunch { program, source },
            other => JobError::Process(other),
        }
    }
}

impl JobError {
    /// 条目级错误不会中断播放列表
    pub fn is_item_level(&self) -> bool {
        matches!(self, JobError::Download(_) | JobError::Conversion(_))
    }
}
