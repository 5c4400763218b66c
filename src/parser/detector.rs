use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

/// 链接类型，仅用于日志提示；真正的条目数以 yt-dlp 的列表结果为准
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Video(String),
    Short(String),
    Playlist(String),
    Channel,
    Other,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Video(id) => write!(f, "视频 ({})", id),
            SourceKind::Short(id) => write!(f, "短视频 ({})", id),
            SourceKind::Playlist(id) => write!(f, "播放列表 ({})", id),
            SourceKind::Channel => write!(f, "频道"),
            SourceKind::Other => write!(f, "其他站点"),
        }
    }
}

impl SourceKind {
    pub fn is_playlist(&self) -> bool {
        matches!(self, SourceKind::Playlist(_) | SourceKind::Channel)
    }
}

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[0-9A-Za-z_-]{11}$").unwrap();
    static ref YOUTUBE_HOST: Regex =
        Regex::new(r"^(www\.|m\.|music\.)?(youtube\.com|youtube-nocookie\.com)$").unwrap();
}

pub fn detect_source_kind(input: &str) -> SourceKind {
    let Ok(url) = Url::parse(input.trim()) else {
        return SourceKind::Other;
    };
    let host = url.host_str().unwrap_or("").to_lowercase();

    if host == "youtu.be" {
        return url
            .path_segments()
            .and_then(|mut s| s.next())
            .filter(|id| VIDEO_ID.is_match(id))
            .map(|id| SourceKind::Video(id.to_string()))
            .unwrap_or(SourceKind::Other);
    }
    if !YOUTUBE_HOST.is_match(&host) {
        return SourceKind::Other;
    }

    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };
    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();

    match segments.as_slice() {
        ["playlist", ..] => query("list")
            .map(SourceKind::Playlist)
            .unwrap_or(SourceKind::Other),
        // 同时带 v 和 list 时 yt-dlp 默认按播放列表处理
        ["watch", ..] => match (query("list"), query("v")) {
            (Some(list), _) => SourceKind::Playlist(list),
            (None, Some(v)) if VIDEO_ID.is_match(&v) => SourceKind::Video(v),
            _ => SourceKind::Other,
        },
        ["shorts", id, ..] | ["live", id, ..] | ["embed", id, ..] if VIDEO_ID.is_match(id) => {
            if segments[0] == "shorts" {
                SourceKind::Short(id.to_string())
            } else {
                SourceKind::Video(id.to_string())
            }
        }
        [first, ..] if first.starts_with('@') || *first == "channel" || *first == "c" => {
            SourceKind::Channel
        }
        _ => SourceKind::Other,
    }
}
