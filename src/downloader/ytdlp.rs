use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::runner::CommandSpec;
use crate::common::config::AppConfig;
use crate::common::utils::output_template;

/// 播放列表展开后的单个视频
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// yt-dlp 命令行构造
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    video_format: String,
    concurrent_fragments: u32,
    filename_template: String,
    timeout: Option<Duration>,
}

impl YtDlp {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            program: config.downloader_program.clone(),
            video_format: config.video_format.clone(),
            concurrent_fragments: config.concurrent_fragments,
            filename_template: config.filename_template.clone(),
            timeout: config.process_timeout(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn version_command(&self) -> CommandSpec {
        CommandSpec::new(&self.program).arg("--version")
    }

    /// 只列出条目，不下载
    pub fn list_command(&self, url: &str) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(["--flat-playlist", "--dump-json"])
            .arg(url)
            .timeout(self.timeout)
    }

    /// 下载单个视频为 MP4
    pub fn download_command(&self, url: &str, dest: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(["--newline", "--no-playlist", "--force-overwrites"])
            .arg("-f")
            .arg(&self.video_format)
            .args(["--merge-output-format", "mp4", "--remux-video", "mp4"])
            .arg("-N")
            .arg(self.concurrent_fragments.to_string())
            .arg("-o")
            .arg(output_template(dest, &self.filename_template))
            .arg(url)
            .working_dir(dest)
            .timeout(self.timeout)
    }
}

/// 解析 `--dump-json` 输出，每行一个 JSON 对象；无法解析的行被忽略
pub fn parse_listing<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    source_url: &str,
) -> Vec<PlaylistEntry> {
    lines
        .into_iter()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .filter_map(|l| serde_json::from_str::<Value>(l).ok())
        .filter_map(|v| entry_from_json(&v, source_url))
        .collect()
}

fn entry_from_json(json: &Value, source_url: &str) -> Option<PlaylistEntry> {
    let id = json.get("id").and_then(Value::as_str).unwrap_or("").to_string();
    if id.is_empty() {
        return None;
    }
    let title = json
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(&id)
        .to_string();

    let is_http = |s: &&str| s.starts_with("http://") || s.starts_with("https://");
    let webpage_url = json.get("webpage_url").and_then(Value::as_str).filter(is_http);
    // 扁平列表的条目 `_type` 为 "url"，此时 `url` 指向视频页面而不是媒体流
    let entry_url = json
        .get("_type")
        .and_then(Value::as_str)
        .filter(|t| *t == "url" || *t == "url_transparent")
        .and_then(|_| json.get("url").and_then(Value::as_str))
        .filter(is_http);
    let is_youtube = json
        .get("ie_key")
        .or_else(|| json.get("extractor_key"))
        .and_then(Value::as_str)
        .is_some_and(|k| k.eq_ignore_ascii_case("youtube"));

    let url = match (webpage_url, entry_url) {
        (Some(u), _) | (None, Some(u)) => u.to_string(),
        (None, None) if is_youtube => format!("https://www.youtube.com/watch?v={}", id),
        (None, None) => source_url.to_string(),
    };

    Some(PlaylistEntry { id, title, url })
}

lazy_static! {
    static ref DESTINATION_PATTERNS: Vec<Regex> = vec![
        Regex::new(r#"^\[Merger\] Merging formats into "(.+)"$"#).unwrap(),
        Regex::new(r"^\[VideoRemuxer\] Remuxing video from \S+ to \S+; Destination: (.+)$").unwrap(),
        Regex::new(r#"^\[VideoRemuxer\] Not remuxing media file "(.+)";"#).unwrap(),
        Regex::new(r#"^\[MoveFiles\] Moving file ".+" to "(.+)"$"#).unwrap(),
        Regex::new(r"^\[download\] (.+) has already been downloaded").unwrap(),
        Regex::new(r"^\[download\] Destination: (.+)$").unwrap(),
    ];
}

/// 从 yt-dlp 输出中识别文件路径
pub fn destination_from_line(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    DESTINATION_PATTERNS
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}
