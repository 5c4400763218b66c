use std::fmt;

/// 任务状态机
///
/// `Idle → ExpandingPlaylist → {Downloading → Converting? → Deleting?}* → Done`，
/// 任意非终止状态都可以进入 `Failed` 或 `Aborted`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    ExpandingPlaylist,
    Downloading,
    Converting,
    Deleting,
    Done,
    Failed,
    Aborted,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Aborted)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Aborted) {
            return true;
        }
        match (*self, next) {
            (Idle, ExpandingPlaylist) => true,
            (ExpandingPlaylist, Downloading) => true,
            // 下一个条目从 Downloading 重新开始
            (Downloading | Converting | Deleting, Downloading) => true,
            (Downloading, Converting) => true,
            (Converting, Deleting) => true,
            (Downloading | Converting | Deleting, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "空闲",
            JobState::ExpandingPlaylist => "解析列表",
            JobState::Downloading => "下载中",
            JobState::Converting => "转换中",
            JobState::Deleting => "删除中间文件",
            JobState::Done => "完成",
            JobState::Failed => "失败",
            JobState::Aborted => "已中止",
        };
        write!(f, "{}", s)
    }
}
