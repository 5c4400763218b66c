use colored::*;
use tracing::Level;

use super::models::{LogLevel, LogLine};

/// 初始化 tracing：默认 INFO，`-v` 为 DEBUG，`-vv` 及以上为 TRACE，`--quiet` 为 WARN
///
/// 日志写到 stderr，stdout 留给进度条和结果。
pub fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

const RULE_WIDTH: usize = 48;

/// 终端输出
pub struct PrettyLogger;

impl PrettyLogger {
    fn mark(symbol: ColoredString, message: &str) {
        println!("{} {}", symbol, message);
    }

    pub fn success(message: impl AsRef<str>) {
        Self::mark("✓".green().bold(), message.as_ref());
    }

    pub fn info(message: impl AsRef<str>) {
        Self::mark("ℹ".blue().bold(), message.as_ref());
    }

    pub fn warning(message: impl AsRef<str>) {
        Self::mark("⚠".yellow().bold(), message.as_ref());
    }

    pub fn error(message: impl AsRef<str>) {
        Self::mark("✗".red().bold(), message.as_ref());
    }

    /// yt-dlp / ffmpeg 的原始输出，按级别着色
    pub fn tool_line(line: &LogLine) {
        let text = match line.level {
            LogLevel::Info => line.text.bright_black(),
            LogLevel::Warning => line.text.yellow(),
            LogLevel::Error => line.text.red(),
        };
        println!("  {}", text);
    }

    pub fn separator() {
        println!("{}", "─".repeat(RULE_WIDTH + 2).bright_black());
    }

    /// 居中的标题行，按字符数计算宽度
    pub fn title(text: impl AsRef<str>) {
        let text = text.as_ref();
        let width = text.chars().count().min(RULE_WIDTH);
        let left = (RULE_WIDTH - width) / 2;
        let right = RULE_WIDTH - left - width;
        println!(
            "{} {} {}",
            "─".repeat(left).bright_black(),
            text.bold(),
            "─".repeat(right).bright_black()
        );
    }

    /// 任务汇总，失败时标题为红色
    pub fn completion_summary(headline: impl AsRef<str>, ok: bool, items: &[String]) {
        let headline = headline.as_ref().bold();
        println!("\n{}", if ok { headline.green() } else { headline.red() });
        for item in items {
            println!("  {}", item);
        }
    }
}

#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::success(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::warning(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::error(format!($($arg)*))
    };
}
