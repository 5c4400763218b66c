use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::EventSink;
use super::stage::{ItemPosition, run_stage};
use super::state::JobState;
use super::summary::{JobReport, JobSummary, TerminalState};
use crate::common::context::AppContext;
use crate::common::error::JobError;
use crate::common::models::{AudioFormat, JobDescriptor, Phase, ProgressUpdate};
use crate::common::utils::{find_video_by_id, has_extension};
use crate::downloader::runner::{ProcessRunner, StreamKind};
use crate::downloader::ytdlp::{PlaylistEntry, YtDlp, destination_from_line, parse_listing};
use crate::parser::detector::detect_source_kind;
use crate::post_process::converter::AudioConverter;
use crate::post_process::{remove_intermediate, verify_output};

/// 单个任务的驱动循环，在独立的 tokio 任务中运行
pub(crate) struct JobWorker {
    job: JobDescriptor,
    ytdlp: YtDlp,
    converter: AudioConverter,
    runner: ProcessRunner,
    sink: EventSink,
    state: JobState,
    summary: JobSummary,
}

impl JobWorker {
    pub(crate) fn new(
        ctx: &AppContext,
        job: JobDescriptor,
        cancel: CancellationToken,
        sink: EventSink,
    ) -> Self {
        Self {
            job,
            ytdlp: ctx.downloader(),
            converter: ctx.converter(),
            runner: ProcessRunner::new(ctx.config().kill_grace(), cancel),
            sink,
            state: JobState::Idle,
            summary: JobSummary::default(),
        }
    }

    pub(crate) async fn run(mut self) -> Result<JobReport, JobError> {
        info!(
            "任务 {} 开始: {} -> {} ({:?})",
            self.job.job_id(),
            self.job.source_url(),
            self.job.output_kind(),
            self.job.destination_dir()
        );

        match self.drive().await {
            Ok(state) => {
                self.transition(state.into());
                let report = self.report(state, None);
                self.sink.finished(report.clone());
                Ok(report)
            }
            Err(JobError::Cancelled) => {
                self.transition(JobState::Aborted);
                let report = self.report(TerminalState::Aborted, None);
                self.sink.finished(report.clone());
                Ok(report)
            }
            Err(e) => {
                error!("任务 {} 失败: {}", self.job.job_id(), e);
                self.sink.error(e.to_string());
                self.transition(JobState::Failed);
                self.sink.finished(self.report(TerminalState::Failed, Some(e.to_string())));
                Err(e)
            }
        }
    }

    fn report(&self, state: TerminalState, error: Option<String>) -> JobReport {
        JobReport {
            job_id: self.job.job_id(),
            state,
            summary: self.summary.clone(),
            error,
        }
    }

    fn transition(&mut self, next: JobState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!("非法的状态转换: {:?} -> {:?}", self.state, next);
            return;
        }
        debug!("状态: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.sink.state(next);
    }

    fn check_cancelled(&self) -> Result<(), JobError> {
        if self.runner.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    async fn drive(&mut self) -> Result<TerminalState, JobError> {
        self.preflight().await?;
        self.check_cancelled()?;

        self.transition(JobState::ExpandingPlaylist);
        let entries = self.expand().await?;
        let total = entries.len();
        self.summary.total = total;
        // 单个视频失败即任务失败；播放列表即使只有一个条目也按部分失败处理
        let single = total == 1 && !detect_source_kind(self.job.source_url()).is_playlist();
        self.sink.info(format!("共 {} 个视频", total));

        for (i, entry) in entries.iter().enumerate() {
            let position = ItemPosition { index: i + 1, total };
            if self.runner.is_cancelled() {
                self.summary.record_skipped(total - i);
                break;
            }

            match self.process_item(position, entry).await {
                Ok(outputs) => {
                    self.summary.record_success(outputs);
                    self.progress(position, Phase::Done, Some(100.0), entry.title.clone());
                }
                Err(JobError::Cancelled) => {
                    self.summary.record_skipped(total - i);
                    self.sink.warning(format!(
                        "[{}/{}] 已取消: {}",
                        position.index, total, entry.title
                    ));
                    break;
                }
                Err(e) if e.is_item_level() => {
                    warn!("条目失败 {}: {}", entry.url, e);
                    self.sink
                        .error(format!("[{}/{}] {} 失败: {}", position.index, total, entry.title, e));
                    self.progress(position, Phase::Failed, None, e.to_string());
                    self.summary.record_failure(&entry.url, &entry.title, e.to_string());
                    if single {
                        return Ok(TerminalState::Failed);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        // 最后一个条目完成后才收到的取消不影响结果
        if self.summary.skipped_count > 0 {
            return Ok(TerminalState::Aborted);
        }
        Ok(TerminalState::Done)
    }

    /// 启动前检查外部工具是否可用，失败时不写入任何文件
    async fn preflight(&mut self) -> Result<(), JobError> {
        let mut probes = vec![self.ytdlp.version_command()];
        if self.job.output_kind().needs_conversion() {
            probes.push(self.converter.version_command());
        }

        for spec in probes {
            let outcome = self.runner.probe(&spec).await?;
            if outcome.cancelled {
                return Err(JobError::Cancelled);
            }
            if !outcome.success() {
                return Err(JobError::ProcessLaunch {
                    program: spec.program.clone(),
                    source: std::io::Error::other(format!(
                        "`{}` {}",
                        spec.display(),
                        outcome.describe()
                    )),
                });
            }
            debug!("{} 可用", spec.program);
        }
        Ok(())
    }

    async fn expand(&mut self) -> Result<Vec<PlaylistEntry>, JobError> {
        let url = self.job.source_url().to_string();
        self.sink.info(format!("解析链接: {} [{}]", url, detect_source_kind(&url)));

        let spec = self.ytdlp.list_command(&url);
        let mut listing = Vec::new();
        let outcome = run_stage(
            &self.runner,
            &self.sink,
            &spec,
            ItemPosition { index: 0, total: 0 },
            |line| {
                if line.stream == StreamKind::Stdout && line.text.trim_start().starts_with('{') {
                    listing.push(line.text.clone());
                    return true;
                }
                false
            },
        )
        .await?;

        if outcome.cancelled {
            return Err(JobError::Cancelled);
        }
        if !outcome.success() {
            return Err(JobError::PlaylistResolution(format!(
                "{} 列表模式 {}",
                self.ytdlp.program(),
                outcome.describe()
            )));
        }

        let entries = parse_listing(listing.iter().map(String::as_str), &url);
        if entries.is_empty() {
            return Err(JobError::PlaylistResolution(format!("{} 中没有可下载的视频", url)));
        }
        Ok(entries)
    }

    /// 下载 → 转换 → 删除，返回最终保留的文件
    async fn process_item(
        &mut self,
        position: ItemPosition,
        entry: &PlaylistEntry,
    ) -> Result<Vec<PathBuf>, JobError> {
        self.transition(JobState::Downloading);
        self.sink
            .info(format!("[{}/{}] 下载: {}", position.index, position.total, entry.title));
        self.progress(position, Phase::Downloading, Some(0.0), entry.title.clone());
        let video_path = self.download(position, entry).await?;

        let formats = self.job.output_kind().audio_formats();
        if formats.is_empty() {
            self.sink.info(format!("已保存: {}", video_path.display()));
            return Ok(vec![video_path]);
        }

        self.transition(JobState::Converting);
        let mut outputs = Vec::new();
        for format in formats {
            let output = self.convert(position, &video_path, *format).await?;
            self.sink.info(format!("已保存: {}", output.display()));
            outputs.push(output);
        }

        if self.job.delete_intermediate() {
            self.transition(JobState::Deleting);
            self.progress(position, Phase::Deleting, None, video_path.display().to_string());
            if let Err(e) = remove_intermediate(&video_path).await {
                warn!("删除中间文件失败: {}", e);
                self.sink.warning(format!("无法删除 {}: {}", video_path.display(), e));
                if video_path.is_file() {
                    outputs.push(video_path);
                }
            }
        } else {
            outputs.push(video_path);
        }
        Ok(outputs)
    }

    async fn download(
        &mut self,
        position: ItemPosition,
        entry: &PlaylistEntry,
    ) -> Result<PathBuf, JobError> {
        self.check_cancelled()?;
        let dest = self.job.destination_dir().to_path_buf();
        let spec = self.ytdlp.download_command(&entry.url, &dest);

        let mut reported = Vec::new();
        let outcome = run_stage(&self.runner, &self.sink, &spec, position, |line| {
            if let Some(path) = destination_from_line(&line.text) {
                reported.push(path);
            }
            false
        })
        .await?;

        if outcome.cancelled {
            return Err(JobError::Cancelled);
        }
        if !outcome.success() {
            return Err(JobError::Download(format!(
                "{} {}",
                self.ytdlp.program(),
                outcome.describe()
            )));
        }

        locate_video(&dest, &reported, &entry.id).ok_or_else(|| {
            JobError::Download(format!("未找到下载的 MP4 文件 ({})", entry.id))
        })
    }

    async fn convert(
        &mut self,
        position: ItemPosition,
        video_path: &Path,
        format: AudioFormat,
    ) -> Result<PathBuf, JobError> {
        self.check_cancelled()?;
        let (spec, output) = self.converter.convert_command(video_path, format);
        self.progress(
            position,
            Phase::Converting,
            Some(0.0),
            format!("{} -> {}", video_path.display(), format.extension()),
        );

        let outcome = run_stage(&self.runner, &self.sink, &spec, position, |_| false).await?;
        if outcome.cancelled {
            return Err(JobError::Cancelled);
        }
        if !outcome.success() {
            return Err(JobError::Conversion(format!(
                "{} {}",
                self.converter.program(),
                outcome.describe()
            )));
        }
        verify_output(&output).await?;
        Ok(output)
    }

    fn progress(
        &self,
        position: ItemPosition,
        phase: Phase,
        percent: Option<f32>,
        message: String,
    ) {
        self.sink.progress(ProgressUpdate {
            item_index: position.index,
            item_total: position.total,
            phase,
            percent,
            message,
        });
    }
}

/// 优先使用 yt-dlp 报告的最后一个 MP4 路径，找不到时按视频ID扫描输出目录
fn locate_video(dest: &Path, reported: &[PathBuf], video_id: &str) -> Option<PathBuf> {
    reported
        .iter()
        .rev()
        .map(|p| if p.is_relative() { dest.join(p) } else { p.clone() })
        .find(|p| has_extension(p, "mp4") && p.is_file())
        .or_else(|| find_video_by_id(dest, video_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_prefers_last_reported_existing_mp4() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("Song [abc].mp4");
        std::fs::write(&merged, b"x").unwrap();
        let reported = vec![
            dir.path().join("Song [abc].f137.mp4"),
            dir.path().join("Song [abc].f140.m4a"),
            PathBuf::from("Song [abc].mp4"),
        ];
        assert_eq!(locate_video(dir.path(), &reported, "abc"), Some(merged));
    }

    #[test]
    fn locate_falls_back_to_id_scan() {
        let dir = tempfile::tempdir().unwrap();
        let renamed = dir.path().join("Song_ renamed [abc].mp4");
        std::fs::write(&renamed, b"x").unwrap();
        let reported = vec![dir.path().join("gone.mp4")];
        assert_eq!(locate_video(dir.path(), &reported, "abc"), Some(renamed));
        assert_eq!(locate_video(dir.path(), &[], "zzz"), None);
    }
}
