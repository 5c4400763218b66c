use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ytconv::cli::{self, Cli};
use ytconv::common::config::AppConfig;
use ytconv::common::logger::{PrettyLogger, init_tracing};
use ytconv::common::models::{Phase, ProgressUpdate};
use ytconv::pipeline::{JobReport, PipelineEvent, TerminalState};
use ytconv::{AppContext, JobDescriptor, JobError, JobHandle, PipelineController};
use ytconv::{log_error, log_info, log_success, log_warning};

/// 合并命令行和文件中的链接，保持顺序
fn collect_urls(args: &Cli) -> anyhow::Result<Vec<String>> {
    let mut urls: Vec<String> = args
        .urls
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    if let Some(path) = &args.input_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取链接文件 {:?}", path))?;
        urls.extend(cli::parse_url_list(&text));
    }
    Ok(urls)
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos:>3}% {msg}",
        )?
        .progress_chars("#>-"),
    );
    Ok(bar)
}

fn describe_update(update: &ProgressUpdate) -> String {
    let percent = update
        .percent
        .map(|p| format!(" {:.1}%", p))
        .unwrap_or_default();
    format!(
        "[{}/{}] {}{} {}",
        update.item_index, update.item_total, update.phase, percent, update.message
    )
}

/// 消费事件直到任务结束
async fn run_job(mut handle: JobHandle) -> anyhow::Result<Result<JobReport, JobError>> {
    let bar = progress_bar()?;

    while let Some(event) = handle.next_event().await {
        match event {
            PipelineEvent::State(state) => debug!("状态: {}", state),
            PipelineEvent::Progress(update) => {
                if update.item_total > 0 {
                    bar.set_position(update.overall_percent() as u64);
                }
                if update.phase == Phase::Done {
                    bar.suspend(|| {
                        log_success!(
                            "[{}/{}] {}",
                            update.item_index,
                            update.item_total,
                            update.message
                        )
                    });
                }
                bar.set_message(describe_update(&update));
            }
            PipelineEvent::Log(line) => bar.suspend(|| PrettyLogger::tool_line(&line)),
            PipelineEvent::Finished(report) => {
                debug!("任务 {} 结束: {}", report.job_id, report.state);
                bar.finish_and_clear();
            }
        }
    }
    bar.finish_and_clear();

    Ok(handle.wait().await)
}

fn print_report(report: &JobReport) {
    let summary = &report.summary;
    let mut items = vec![format!(
        "成功 {} / 失败 {} / 跳过 {} (共 {})",
        summary.succeeded_count, summary.failed_count, summary.skipped_count, summary.total
    )];
    items.extend(summary.outputs.iter().map(|p| format!("📁 {}", p.display())));
    items.extend(
        summary
            .failed
            .iter()
            .map(|f| format!("{} {} ({}): {}", "✗".red(), f.title, f.url, f.reason)),
    );

    let (headline, ok) = match report.state {
        TerminalState::Done if summary.failed_count == 0 => ("全部完成！", true),
        TerminalState::Done => ("完成，但部分视频失败", false),
        TerminalState::Failed => ("任务失败", false),
        TerminalState::Aborted => ("任务已取消", false),
    };
    PrettyLogger::completion_summary(headline, ok, &items);
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.verbose, args.quiet);

    let mut config = AppConfig::load(args.config.as_deref()).context("加载配置失败")?;
    args.apply_to(&mut config);
    config.validate()?;

    let urls = collect_urls(&args)?;
    if urls.is_empty() {
        bail!("没有提供任何链接，请在命令行或通过 -i 指定");
    }
    let output_dir: PathBuf = config.default_output_dir.clone();
    info!("输出目录: {:?}, 格式: {}", output_dir, args.format);

    let ctx = AppContext::new(config);
    let controller = PipelineController::new(ctx);

    // Ctrl-C 取消当前任务，并且不再开始后续任务
    let interrupted = CancellationToken::new();
    {
        let controller = controller.clone();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log_warning!("收到中断信号，正在停止...");
                interrupted.cancel();
                controller.cancel();
            }
        });
    }

    let mut all_ok = true;
    for (n, url) in urls.iter().enumerate() {
        if interrupted.is_cancelled() {
            log_warning!("跳过剩余 {} 个链接", urls.len() - n);
            all_ok = false;
            break;
        }
        PrettyLogger::title(format!("任务 {}/{}", n + 1, urls.len()));
        log_info!("{}", url);

        let job = match JobDescriptor::new(
            url,
            args.format,
            &output_dir,
            args.delete_intermediate(),
        ) {
            Ok(job) => job,
            Err(e) => {
                log_error!("{}", e);
                all_ok = false;
                continue;
            }
        };

        let handle = controller.start(job)?;
        match run_job(handle).await? {
            Ok(report) => {
                print_report(&report);
                if report.state != TerminalState::Done {
                    all_ok = false;
                }
            }
            Err(e) => {
                log_error!("{}", e);
                if let JobError::ProcessLaunch { program, .. } = &e {
                    log_error!(
                        "请确认已安装 {} 并在 PATH 中，或通过 YTDLP_PATH / FFMPEG_PATH 指定路径",
                        program
                    );
                }
                all_ok = false;
            }
        }
    }

    PrettyLogger::separator();
    if all_ok {
        log_success!("全部任务完成");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
