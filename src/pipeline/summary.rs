use std::fmt;
use std::path::PathBuf;

use uuid::Uuid;

use super::state::JobState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Done,
    Failed,
    Aborted,
}

impl From<TerminalState> for JobState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Done => JobState::Done,
            TerminalState::Failed => JobState::Failed,
            TerminalState::Aborted => JobState::Aborted,
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&JobState::from(*self), f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub url: String,
    pub title: String,
    pub reason: String,
}

/// 任务汇总，取消时为部分结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub total: usize,
    pub succeeded_count: usize,
    pub failed_count: usize,
    /// 取消后未完成的条目 (包括被中断的那个)
    pub skipped_count: usize,
    pub failed: Vec<ItemFailure>,
    /// 最终保留的文件
    pub outputs: Vec<PathBuf>,
}

impl JobSummary {
    pub fn record_success(&mut self, outputs: impl IntoIterator<Item = PathBuf>) {
        self.succeeded_count += 1;
        self.outputs.extend(outputs);
    }

    pub fn record_failure(&mut self, url: &str, title: &str, reason: impl Into<String>) {
        self.failed_count += 1;
        self.failed.push(ItemFailure {
            url: url.to_string(),
            title: title.to_string(),
            reason: reason.into(),
        });
    }

    pub fn record_skipped(&mut self, count: usize) {
        self.skipped_count += count;
    }

    pub fn failed_urls(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.url.as_str()).collect()
    }

    /// 每个条目恰好被计入一次
    pub fn is_consistent(&self) -> bool {
        self.succeeded_count + self.failed_count + self.skipped_count == self.total
    }
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: Uuid,
    pub state: TerminalState,
    pub summary: JobSummary,
    /// 导致整个任务失败的错误
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts() {
        let mut s = JobSummary { total: 4, ..Default::default() };
        s.record_success([PathBuf::from("/o/a.mp3")]);
        s.record_failure("https://youtu.be/b", "B", "下载失败: 退出码 1");
        assert!(!s.is_consistent());
        s.record_skipped(2);
        assert!(s.is_consistent());
        assert_eq!(s.failed_urls(), vec!["https://youtu.be/b"]);
        assert_eq!(s.outputs, vec![PathBuf::from("/o/a.mp3")]);
    }

    #[test]
    fn terminal_state_maps_to_job_state() {
        assert_eq!(JobState::from(TerminalState::Aborted), JobState::Aborted);
        assert_eq!(TerminalState::Done.to_string(), "完成");
    }
}
