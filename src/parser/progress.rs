//! 进度解析
//!
//! 一张正则表，每条规则对应一个阶段。识别 yt-dlp 的 `[download] 42.3%` 行
//! 和 ffmpeg 的时间位置 (`out_time=` / `time=`)，其余行原样作为日志返回。

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::common::models::{LogLevel, LogLine, Phase};

/// 一行输出的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Progress {
        phase: Phase,
        percent: Option<f32>,
        message: String,
    },
    Log(LogLine),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    DownloadPercent,
    AlreadyDownloaded,
    MediaDuration,
    TimePosition,
    ConvertEnd,
    ConvertStatus,
}

struct Matcher {
    rule: Rule,
    phase: Phase,
    pattern: Regex,
}

lazy_static! {
    // 顺序即优先级
    static ref MATCHERS: Vec<Matcher> = vec![
        Matcher {
            rule: Rule::DownloadPercent,
            phase: Phase::Downloading,
            pattern: Regex::new(r"^\[download\]\s+(\d{1,3}(?:\.\d+)?)%").unwrap(),
        },
        Matcher {
            rule: Rule::AlreadyDownloaded,
            phase: Phase::Downloading,
            pattern: Regex::new(r"^\[download\] .+ has already been downloaded").unwrap(),
        },
        Matcher {
            rule: Rule::MediaDuration,
            phase: Phase::Converting,
            pattern: Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap(),
        },
        Matcher {
            rule: Rule::TimePosition,
            phase: Phase::Converting,
            pattern: Regex::new(
                r"(?:^out_time=|\btime=)\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)",
            )
            .unwrap(),
        },
        Matcher {
            rule: Rule::ConvertEnd,
            phase: Phase::Converting,
            pattern: Regex::new(r"^progress=end$").unwrap(),
        },
        Matcher {
            rule: Rule::ConvertStatus,
            phase: Phase::Converting,
            pattern: Regex::new(
                r"^(?:frame|fps|bitrate|total_size|out_time_us|out_time_ms|out_time|dup_frames|drop_frames|speed|stream_\d+_\d+_q|progress)=",
            )
            .unwrap(),
        },
    ];
}

/// 有状态的解析器：ffmpeg 的百分比需要先看到 `Duration:`
///
/// 每个外部进程使用一个新的解析器。
#[derive(Debug, Clone, Default)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
    last_convert_percent: Option<f32>,
    last_convert_message: String,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// 解析一行输出，从不失败；不认识的行作为日志返回
    pub fn parse(&mut self, line: &str) -> ParsedLine {
        let trimmed = line.trim();
        for matcher in MATCHERS.iter() {
            if let Some(caps) = matcher.pattern.captures(trimmed) {
                if let Some(parsed) = self.apply(matcher, &caps, trimmed, line) {
                    return parsed;
                }
            }
        }
        ParsedLine::Log(classify_log(line))
    }

    fn apply(
        &mut self,
        matcher: &Matcher,
        caps: &Captures<'_>,
        line: &str,
        raw: &str,
    ) -> Option<ParsedLine> {
        let phase = matcher.phase;
        match matcher.rule {
            Rule::DownloadPercent => {
                let percent = caps.get(1)?.as_str().parse::<f32>().ok()?;
                let message = line.trim_start_matches("[download]").trim().to_string();
                Some(ParsedLine::Progress {
                    phase,
                    percent: Some(percent.clamp(0.0, 100.0)),
                    message,
                })
            }
            Rule::AlreadyDownloaded => Some(ParsedLine::Progress {
                phase,
                percent: Some(100.0),
                message: line.trim_start_matches("[download]").trim().to_string(),
            }),
            Rule::MediaDuration => {
                self.duration_secs = timestamp_secs(caps).filter(|d| *d > 0.0);
                // 时长行本身作为日志显示
                Some(ParsedLine::Log(classify_log(raw)))
            }
            Rule::TimePosition => {
                let position = timestamp_secs(caps)?;
                let percent = self
                    .duration_secs
                    .map(|d| ((position / d) * 100.0).clamp(0.0, 100.0) as f32);
                let message = match self.duration_secs {
                    Some(d) => format!("{} / {}", format_clock(position), format_clock(d)),
                    None => format_clock(position),
                };
                self.last_convert_percent = percent;
                self.last_convert_message = message.clone();
                Some(ParsedLine::Progress { phase, percent, message })
            }
            Rule::ConvertEnd => {
                self.last_convert_percent = Some(100.0);
                Some(ParsedLine::Progress {
                    phase,
                    percent: Some(100.0),
                    message: self.last_convert_message.clone(),
                })
            }
            // `-progress` 的其他键值，只保持当前进度
            Rule::ConvertStatus => Some(ParsedLine::Progress {
                phase,
                percent: self.last_convert_percent,
                message: self.last_convert_message.clone(),
            }),
        }
    }
}

/// 普通日志行按前缀分级，文本保持原样
pub fn classify_log(line: &str) -> LogLine {
    let head = line.trim_start();
    let level = if starts_with_ignore_case(head, "ERROR:")
        || starts_with_ignore_case(head, "[error]")
    {
        LogLevel::Error
    } else if starts_with_ignore_case(head, "WARNING:")
        || starts_with_ignore_case(head, "[warning]")
    {
        LogLevel::Warning
    } else {
        LogLevel::Info
    };
    LogLine { level, text: line.to_string() }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn timestamp_secs(caps: &Captures<'_>) -> Option<f64> {
    let h = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let m = caps.get(2)?.as_str().parse::<f64>().ok()?;
    let s = caps.get(3)?.as_str().parse::<f64>().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

fn format_clock(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
