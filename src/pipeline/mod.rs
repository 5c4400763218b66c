//! 任务控制器
//!
//! 一个控制器同一时间只运行一个任务。任务在独立的 tokio 任务中执行，
//! 进度和日志通过事件通道发给界面，取消信号通过 `CancellationToken` 反向传递。

pub mod events;
mod job;
pub mod stage;
pub mod state;
pub mod summary;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::common::context::AppContext;
use crate::common::error::JobError;
use crate::common::models::JobDescriptor;
use crate::downloader::error::ProcessError;

pub use events::{EventSink, PipelineEvent};
pub use state::JobState;
pub use summary::{ItemFailure, JobReport, JobSummary, TerminalState};

use job::JobWorker;

/// 运行中的任务
pub struct JobHandle {
    job_id: Uuid,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<JobReport, JobError>>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// 请求取消，当前进程会被终止，剩余条目不再开始
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 下一个事件；任务结束且事件取完后返回 None
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// 等待任务结束。致命错误 (工具缺失、列表解析失败等) 以 Err 返回
    pub async fn wait(self) -> Result<JobReport, JobError> {
        drop(self.events);
        self.task
            .await
            .map_err(|e| JobError::Process(ProcessError::Supervisor(e.to_string())))?
    }
}

#[derive(Debug, Clone)]
pub struct PipelineController {
    ctx: AppContext,
    busy: Arc<AtomicBool>,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

/// 任务结束时释放控制器
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PipelineController {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            busy: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// 启动任务，已有任务在运行时返回 `JobError::Busy`。必须在 tokio 运行时中调用。
    pub fn start(&self, job: JobDescriptor) -> Result<JobHandle, JobError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(JobError::Busy);
        }
        let guard = BusyGuard(self.busy.clone());

        let job_id = job.job_id();
        let cancel = CancellationToken::new();
        if let Ok(mut active) = self.active.lock() {
            *active = Some(cancel.clone());
        }

        let (sink, events) = EventSink::channel();
        let worker = JobWorker::new(&self.ctx, job, cancel.clone(), sink);
        let task = tokio::spawn(async move {
            let _guard = guard;
            worker.run().await
        });
        debug!("任务 {} 已启动", job_id);

        Ok(JobHandle {
            job_id,
            events,
            cancel,
            task,
        })
    }

    /// 取消当前任务，没有任务时什么也不做
    pub fn cancel(&self) {
        if let Ok(active) = self.active.lock() {
            if let Some(token) = active.as_ref() {
                token.cancel();
            }
        }
    }
}
