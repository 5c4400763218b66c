use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::config::AppConfig;
use crate::common::models::AudioFormat;
use crate::common::utils::audio_output_path;
use crate::downloader::runner::CommandSpec;

/// ffmpeg 命令行构造：MP4 -> MP3 / WAV
#[derive(Debug, Clone)]
pub struct AudioConverter {
    program: String,
    mp3_bitrate: String,
    wav_sample_rate: u32,
    wav_channels: u32,
    timeout: Option<Duration>,
}

impl AudioConverter {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            program: config.transcoder_program.clone(),
            mp3_bitrate: config.mp3_bitrate.clone(),
            wav_sample_rate: config.wav_sample_rate,
            wav_channels: config.wav_channels,
            timeout: config.process_timeout(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// 检查 ffmpeg 是否可用
    pub fn version_command(&self) -> CommandSpec {
        CommandSpec::new(&self.program).arg("-version")
    }

    /// 返回命令和输出路径。输出与 MP4 同名，`-y` 覆盖已有文件。
    ///
    /// `-progress pipe:1` 在 stdout 上输出 `out_time=`，`Duration:` 仍在 stderr 上。
    pub fn convert_command(
        &self,
        video_path: &Path,
        format: AudioFormat,
    ) -> (CommandSpec, PathBuf) {
        let output_path = audio_output_path(video_path, format);

        let mut spec = CommandSpec::new(&self.program)
            .args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(video_path.to_string_lossy())
            .arg("-vn");
        spec = match format {
            AudioFormat::Mp3 => spec
                .args(["-codec:a", "libmp3lame", "-b:a"])
                .arg(&self.mp3_bitrate),
            AudioFormat::Wav => spec
                .args(["-codec:a", "pcm_s16le", "-ar"])
                .arg(self.wav_sample_rate.to_string())
                .arg("-ac")
                .arg(self.wav_channels.to_string())
                .args(["-f", "wav"]),
        };
        let spec = spec
            .args(["-progress", "pipe:1", "-nostats"])
            .arg(output_path.to_string_lossy())
            .timeout(self.timeout);
        if let Some(dir) = video_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            return (spec.working_dir(dir), output_path);
        }
        (spec, output_path)
    }
}
