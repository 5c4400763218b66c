//! 运行单个外部进程：逐行解析，转发进度和日志

use tracing::trace;

use super::events::EventSink;
use crate::common::error::JobError;
use crate::common::models::ProgressUpdate;
use crate::downloader::runner::{CommandSpec, OutputLine, ProcessOutcome, ProcessRunner};
use crate::parser::progress::{ParsedLine, ProgressParser};

/// 当前条目位置，列表解析阶段为 (0, 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPosition {
    pub index: usize,
    pub total: usize,
}

/// 运行命令直到结束。
///
/// 每一行先交给 `intercept`，返回 true 表示已被调用方消费、不再转发；
/// 其余行经过进度解析后按到达顺序发出，空行也作为日志发出。
pub async fn run_stage<F>(
    runner: &ProcessRunner,
    sink: &EventSink,
    spec: &CommandSpec,
    position: ItemPosition,
    mut intercept: F,
) -> Result<ProcessOutcome, JobError>
where
    F: FnMut(&OutputLine) -> bool,
{
    let mut handle = runner.run(spec)?;
    let mut parser = ProgressParser::new();

    while let Some(line) = handle.next_line().await {
        trace!("[{}] {:?}: {}", spec.program, line.stream, line.text);
        if intercept(&line) {
            continue;
        }
        match parser.parse(&line.text) {
            ParsedLine::Progress { phase, percent, message } => sink.progress(ProgressUpdate {
                item_index: position.index,
                item_total: position.total,
                phase,
                percent,
                message,
            }),
            ParsedLine::Log(log) => sink.log(log),
        }
    }

    Ok(handle.wait().await?)
}
