use tokio::sync::mpsc;

use super::state::JobState;
use super::summary::JobReport;
use crate::common::models::{LogLine, ProgressUpdate};

/// 控制器发给界面的事件
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    State(JobState),
    Progress(ProgressUpdate),
    Log(LogLine),
    Finished(JobReport),
}

/// 事件发送端；界面已关闭接收端时静默丢弃
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn state(&self, state: JobState) {
        self.send(PipelineEvent::State(state));
    }

    pub fn progress(&self, update: ProgressUpdate) {
        self.send(PipelineEvent::Progress(update));
    }

    pub fn log(&self, line: LogLine) {
        self.send(PipelineEvent::Log(line));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogLine::info(text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.log(LogLine::warning(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(LogLine::error(text));
    }

    pub fn finished(&self, report: JobReport) {
        self.send(PipelineEvent::Finished(report));
    }
}
