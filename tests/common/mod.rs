//! 集成测试工具：在临时目录中生成假的 yt-dlp / ffmpeg 脚本

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use ytconv::common::config::AppConfig;
use ytconv::pipeline::{JobReport, PipelineEvent};
use ytconv::{AppContext, JobError, JobHandle};

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// 列表模式的一行 JSON
fn listing_line(id: &str) -> String {
    format!(
        r#"{{"_type": "url", "ie_key": "Youtube", "id": "{id}", "title": "Title {id}", "url": "https://www.youtube.com/watch?v={id}"}}"#
    )
}

/// 假 yt-dlp：
/// - `--version` 输出版本号
/// - 列表模式输出给定 ID 的 JSON；`listing_exit` 非 0 时以该退出码失败
/// - 下载模式按模板写出 `Title <id> [<id>].mp4`；ID 以 `bad` 开头时失败，以 `slow` 开头时长时间阻塞
pub fn fake_ytdlp(dir: &Path, ids: &[&str], listing_exit: i32) -> PathBuf {
    let listing: String = ids
        .iter()
        .map(|id| format!("  echo '{}'\n", listing_line(id)))
        .collect();
    let body = format!(
        r#"
if [ "$1" = "--version" ]; then
  echo "2099.01.01"
  exit 0
fi
if [ "$1" = "--flat-playlist" ]; then
  echo "[youtube:tab] Downloading playlist" >&2
{listing}  exit {listing_exit}
fi
out=""
prev=""
url=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
  url="$a"
done
id="${{url##*=}}"
path=$(printf '%s' "$out" | sed -e "s/%(title)s/Title $id/" -e "s/%(id)s/$id/" -e "s/%(ext)s/mp4/")
echo "[youtube] Extracting URL: $url"
echo "odd tool chatter ###"
echo ""
case "$id" in
  bad*)
    echo "ERROR: [youtube] $id: Video unavailable" >&2
    exit 1
    ;;
  slow*)
    echo "[download]  10.0% of 1.00MiB at 10.00KiB/s ETA 01:40"
    sleep 30
    ;;
esac
echo "[download] Destination: $path"
echo "[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01"
echo "[download] 100% of 1.00MiB in 00:00:01"
printf 'fake-mp4' > "$path"
echo "[Merger] Merging formats into \"$path\""
exit 0
"#
    );
    write_script(dir, "yt-dlp", &body)
}

/// 假 ffmpeg 的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ffmpeg {
    Ok,
    /// 解码错误，退出码 1
    Fail,
    /// 输出 20% 进度后长时间阻塞
    Slow,
    /// 把输入的 MP4 换成同名目录，之后的删除会失败
    ReplaceInput,
}

/// 假 ffmpeg：`-i` 后是输入文件，最后一个参数是输出文件
pub fn fake_ffmpeg(dir: &Path, mode: Ffmpeg) -> PathBuf {
    let before_output = match mode {
        Ffmpeg::Ok => "",
        Ffmpeg::Fail => "echo \"Error while decoding stream #0:1\" >&2\nexit 1\n",
        Ffmpeg::Slow => {
            "echo \"size=     100kB time=00:00:02.00 bitrate= 128.0kbits/s speed=1x\" >&2\nsleep 30\n"
        }
        Ffmpeg::ReplaceInput => "rm -f \"$input\"\nmkdir \"$input\"\n",
    };
    let body = format!(
        r#"
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 9.9-fake"
  exit 0
fi
out=""
input=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-i" ]; then input="$a"; fi
  prev="$a"
  out="$a"
done
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s" >&2
{before_output}echo "out_time=00:00:05.000000"
echo "progress=continue"
echo "out_time=00:00:10.000000"
echo "progress=end"
printf 'audio' > "$out"
exit 0
"#
    );
    write_script(dir, "ffmpeg", &body)
}

pub fn context(ytdlp: &Path, ffmpeg: &Path) -> AppContext {
    AppContext::new(AppConfig {
        downloader_program: ytdlp.to_string_lossy().into_owned(),
        transcoder_program: ffmpeg.to_string_lossy().into_owned(),
        kill_grace_ms: 300,
        ..AppConfig::default()
    })
}

pub struct Workspace {
    pub tools: TempDir,
    pub out: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            tools: tempfile::tempdir().unwrap(),
            out: tempfile::tempdir().unwrap(),
        }
    }

    pub fn out_path(&self) -> &Path {
        self.out.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.out.path().join(name)
    }
}

/// 读完所有事件并等待结果
pub async fn finish(mut handle: JobHandle) -> (Vec<PipelineEvent>, Result<JobReport, JobError>) {
    let mut events = Vec::new();
    let drained = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
    })
    .await;
    assert!(drained.is_ok(), "任务未在 30 秒内结束");
    let result = handle.wait().await;
    (events, result)
}
