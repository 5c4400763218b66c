//! 外部进程执行器
//!
//! 一次只运行一个进程；stdout/stderr 按到达顺序逐行转发，
//! 取消时先请求退出 (Unix 下 SIGTERM)，超过宽限期后强制结束。

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::error::ProcessError;

/// 一条待执行的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 用于日志显示的命令行
    pub fn display(&self) -> String {
        let mut parts = vec![quote(&self.program)];
        parts.extend(self.args.iter().map(|a| quote(a)));
        parts.join(" ")
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) {
        format!("\"{}\"", s)
    } else {
        s.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub text: String,
}

/// 进程结束后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// 被信号终止时为 None
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && !self.cancelled
    }

    pub fn describe(&self) -> String {
        if self.cancelled {
            "已取消".to_string()
        } else if self.timed_out {
            "超时".to_string()
        } else {
            match self.exit_code {
                Some(code) => format!("退出码 {}", code),
                None => "被信号终止".to_string(),
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------

/// 运行中的进程：先逐行读取输出，再等待结果
pub struct ProcessHandle {
    program: String,
    lines: mpsc::UnboundedReceiver<OutputLine>,
    supervisor: JoinHandle<Result<ProcessOutcome, ProcessError>>,
}

impl ProcessHandle {
    /// 下一行输出；进程输出结束后返回 None
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    pub async fn wait(self) -> Result<ProcessOutcome, ProcessError> {
        drop(self.lines);
        let outcome = self
            .supervisor
            .await
            .map_err(|e| ProcessError::Supervisor(e.to_string()))??;
        debug!("{} 结束: {}", self.program, outcome.describe());
        Ok(outcome)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace: Duration,
    cancel: CancellationToken,
}

impl ProcessRunner {
    pub fn new(grace: Duration, cancel: CancellationToken) -> Self {
        Self { grace, cancel }
    }

    /// 请求终止当前进程 (以及之后的所有进程)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 启动进程并返回句柄，可执行文件不存在时返回 `ProcessError::Launch`
    pub fn run(&self, spec: &CommandSpec) -> Result<ProcessHandle, ProcessError> {
        debug!("$ {}", spec.display());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        // 独立进程组，终止时连同 yt-dlp 派生的 ffmpeg 一起结束
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ProcessError::Launch {
            program: spec.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ProcessError::Supervisor(format!("{} 的 stdout 不可用", spec.program))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            ProcessError::Supervisor(format!("{} 的 stderr 不可用", spec.program))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(supervise(
            child,
            stdout,
            stderr,
            tx,
            self.cancel.clone(),
            self.grace,
            spec.timeout,
        ));

        Ok(ProcessHandle {
            program: spec.program.clone(),
            lines: rx,
            supervisor,
        })
    }

    /// 运行到结束并丢弃输出，用于 `--version` 之类的探测
    pub async fn probe(&self, spec: &CommandSpec) -> Result<ProcessOutcome, ProcessError> {
        let mut handle = self.run(spec)?;
        while let Some(line) = handle.next_line().await {
            trace!("{}: {}", spec.program, line.text);
        }
        handle.wait().await
    }
}

async fn supervise<O, E>(
    mut child: Child,
    stdout: O,
    stderr: E,
    tx: mpsc::UnboundedSender<OutputLine>,
    cancel: CancellationToken,
    grace: Duration,
    timeout: Option<Duration>,
) -> Result<ProcessOutcome, ProcessError>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = BufReader::new(stdout).split(b'\n');
    let mut err = BufReader::new(stderr).split(b'\n');
    let (mut out_open, mut err_open) = (true, true);

    let deadline = timeout.map(|t| Instant::now() + t);
    let expired = async move {
        match deadline {
            Some(d) => tokio::time::sleep_until(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expired);

    let mut cancelled = false;
    let mut timed_out = false;

    // 读取阶段：两个管道都关闭，或被取消/超时
    while out_open || err_open {
        tokio::select! {
            res = out.next_segment(), if out_open => {
                out_open = forward(res, StreamKind::Stdout, &tx);
            }
            res = err.next_segment(), if err_open => {
                err_open = forward(res, StreamKind::Stderr, &tx);
            }
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            _ = &mut expired => {
                timed_out = true;
                break;
            }
        }
    }

    let status = if cancelled || timed_out {
        terminate(&mut child, grace).await?
    } else {
        tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                cancelled = true;
                terminate(&mut child, grace).await?
            }
            _ = &mut expired => {
                timed_out = true;
                terminate(&mut child, grace).await?
            }
        }
    };

    Ok(ProcessOutcome {
        exit_code: status.code(),
        timed_out,
        cancelled,
    })
}

/// 转发一行输出，返回管道是否仍然打开
fn forward(
    res: std::io::Result<Option<Vec<u8>>>,
    stream: StreamKind,
    tx: &mpsc::UnboundedSender<OutputLine>,
) -> bool {
    match res {
        Ok(Some(bytes)) => {
            let text = String::from_utf8_lossy(&bytes)
                .trim_end_matches('\r')
                .to_string();
            // 接收端已关闭时继续读取，避免子进程因管道写满而阻塞
            let _ = tx.send(OutputLine { stream, text });
            true
        }
        Ok(None) => false,
        Err(e) => {
            warn!("读取 {:?} 失败: {}", stream, e);
            false
        }
    }
}

async fn terminate(child: &mut Child, grace: Duration) -> Result<ExitStatus, ProcessError> {
    request_stop(child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => Ok(status?),
        Err(_) => {
            warn!("进程在 {:?} 内未退出，强制结束", grace);
            force_kill(child);
            Ok(child.wait().await?)
        }
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) {
    if let Some(pid) = child.id() {
        // 负 pid 表示整个进程组
        unsafe {
            libc::kill(-(pid as libc::pid_t), signal);
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    signal_group(child, libc::SIGTERM);
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(unix)]
fn force_kill(child: &mut Child) {
    signal_group(child, libc::SIGKILL);
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_display_quotes_spaces() {
        let spec = CommandSpec::new("ffmpeg").args(["-i", "/tmp/My Video.mp4", "-y"]);
        assert_eq!(spec.display(), "ffmpeg -i \"/tmp/My Video.mp4\" -y");
    }

    #[test]
    fn outcome_success_requires_clean_exit() {
        let ok = ProcessOutcome { exit_code: Some(0), timed_out: false, cancelled: false };
        assert!(ok.success());
        assert!(!ProcessOutcome { cancelled: true, ..ok }.success());
        assert!(!ProcessOutcome { timed_out: true, ..ok }.success());
        assert!(!ProcessOutcome { exit_code: Some(1), ..ok }.success());
        assert!(!ProcessOutcome { exit_code: None, ..ok }.success());
    }

    #[tokio::test]
    async fn missing_binary_is_launch_error() {
        let runner = ProcessRunner::new(Duration::from_millis(100), CancellationToken::new());
        let spec = CommandSpec::new("/definitely/not/here/yt-dlp").arg("--version");
        match runner.run(&spec) {
            Err(ProcessError::Launch { program, .. }) => {
                assert_eq!(program, "/definitely/not/here/yt-dlp")
            }
            Err(other) => panic!("期望启动错误, 得到 {}", other),
            Ok(_) => panic!("不应启动成功"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lines_arrive_in_order_with_exit_code() {
        let runner = ProcessRunner::new(Duration::from_millis(500), CancellationToken::new());
        let spec = CommandSpec::new("sh")
            .args(["-c", "for i in 1 2 3 4 5; do echo line$i; done; exit 3"]);
        let mut handle = runner.run(&spec).unwrap();
        let mut seen = Vec::new();
        while let Some(line) = handle.next_line().await {
            assert_eq!(line.stream, StreamKind::Stdout);
            seen.push(line.text);
        }
        let outcome = handle.wait().await.unwrap();
        assert_eq!(seen, vec!["line1", "line2", "line3", "line4", "line5"]);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.cancelled && !outcome.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_is_captured_and_cr_stripped() {
        let runner = ProcessRunner::new(Duration::from_millis(500), CancellationToken::new());
        let spec = CommandSpec::new("sh").args(["-c", "printf 'oops\\r\\n' >&2"]);
        let mut handle = runner.run(&spec).unwrap();
        let line = handle.next_line().await.unwrap();
        assert_eq!(line.stream, StreamKind::Stderr);
        assert_eq!(line.text, "oops");
        assert!(handle.wait().await.unwrap().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_terminates_running_process() {
        let token = CancellationToken::new();
        let runner = ProcessRunner::new(Duration::from_millis(500), token.clone());
        let spec = CommandSpec::new("sh").args(["-c", "echo started; sleep 30"]);
        let mut handle = runner.run(&spec).unwrap();
        assert_eq!(handle.next_line().await.unwrap().text, "started");

        let started = Instant::now();
        runner.cancel();
        let outcome = handle.wait().await.unwrap();
        assert!(outcome.cancelled);
        assert!(!outcome.timed_out);
        assert!(!outcome.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ignored_sigterm_is_force_killed_after_grace() {
        let token = CancellationToken::new();
        let runner = ProcessRunner::new(Duration::from_millis(200), token.clone());
        let spec = CommandSpec::new("sh").args(["-c", "trap '' TERM; echo ready; sleep 30"]);
        let mut handle = runner.run(&spec).unwrap();
        assert_eq!(handle.next_line().await.unwrap().text, "ready");

        token.cancel();
        let outcome = handle.wait().await.unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.exit_code, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_reports_timed_out() {
        let runner = ProcessRunner::new(Duration::from_millis(200), CancellationToken::new());
        let spec = CommandSpec::new("sh")
            .args(["-c", "sleep 30"])
            .timeout(Some(Duration::from_millis(200)));
        let outcome = runner.probe(&spec).await.unwrap();
        assert!(outcome.timed_out);
        assert!(!outcome.cancelled);
    }
}
