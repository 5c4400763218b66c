use std::path::{Path, PathBuf};

use super::models::AudioFormat;

/// 音频文件与 MP4 同名，只替换扩展名。重复运行会覆盖旧文件。
pub fn audio_output_path(video_path: &Path, format: AudioFormat) -> PathBuf {
    video_path.with_extension(format.extension())
}

/// yt-dlp `-o` 参数：目录 + 模板 + `.%(ext)s`
pub fn output_template(dir: &Path, filename_template: &str) -> String {
    dir.join(format!("{}.%(ext)s", filename_template))
        .to_string_lossy()
        .into_owned()
}

/// 按视频ID在目录中查找 MP4 (文件名中包含 `[id]`)
///
/// 标题里有特殊字符时 yt-dlp 会改写文件名，这时只能靠 ID 找回文件。
/// 多个候选时取最近修改的那个。
pub fn find_video_by_id(dir: &Path, video_id: &str) -> Option<PathBuf> {
    if video_id.is_empty() {
        return None;
    }
    let marker = format!("[{}]", video_id);
    let entries = std::fs::read_dir(dir).ok()?;

    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| has_extension(p, "mp4"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(&marker))
        })
        .max_by_key(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
}

pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// 目录下的文件数 (不递归)
pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_path_replaces_extension() {
        let mp4 = Path::new("/tmp/out/My Song [abc123].mp4");
        assert_eq!(
            audio_output_path(mp4, AudioFormat::Mp3),
            PathBuf::from("/tmp/out/My Song [abc123].mp3")
        );
        assert_eq!(
            audio_output_path(mp4, AudioFormat::Wav),
            PathBuf::from("/tmp/out/My Song [abc123].wav")
        );
    }

    #[test]
    fn template_appends_ext_placeholder() {
        let t = output_template(Path::new("/data"), "%(title)s [%(id)s]");
        assert_eq!(t, "/data/%(title)s [%(id)s].%(ext)s");
    }

    #[test]
    fn find_by_id_matches_bracketed_id_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Other [zzz].mp4"), b"").unwrap();
        std::fs::write(dir.path().join("Song [abc].mp3"), b"").unwrap();
        std::fs::write(dir.path().join("Song ＂x＂ [abc].mp4"), b"").unwrap();

        let found = find_video_by_id(dir.path(), "abc").unwrap();
        assert_eq!(found.file_name().unwrap().to_str().unwrap(), "Song ＂x＂ [abc].mp4");
        assert!(find_video_by_id(dir.path(), "nope").is_none());
        assert!(find_video_by_id(dir.path(), "").is_none());
    }
}
