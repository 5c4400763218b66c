use std::fmt;

#[derive(Debug)]
pub enum ProcessError {
    /// 可执行文件不存在或无法启动
    Launch {
        program: String,
        source: std::io::Error,
    },
    IoError(std::io::Error),
    /// 监督任务异常退出
    Supervisor(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Launch { program, source } => {
                write!(f, "无法启动 {}: {}", program, source)
            }
            ProcessError::IoError(e) => write!(f, "IO错误: {}", e),
            ProcessError::Supervisor(msg) => write!(f, "进程监督任务失败: {}", msg),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::Launch { source, .. } => Some(source),
            ProcessError::IoError(e) => Some(e),
            ProcessError::Supervisor(_) => None,
        }
    }
}

impl From<std::io::Error> for ProcessError {
    fn from(error: std::io::Error) -> Self {
        ProcessError::IoError(error)
    }
}
