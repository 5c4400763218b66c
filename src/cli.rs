use clap::Parser;
use std::path::PathBuf;

use crate::common::config::AppConfig;
use crate::common::models::OutputKind;

/// YouTube 视频下载与音频转换
#[derive(Parser, Debug)]
#[command(name = "ytconv")]
#[command(version)]
#[command(about = "使用 yt-dlp 下载 YouTube 视频或播放列表，并用 ffmpeg 转换为 MP3/WAV", long_about = None)]
pub struct Cli {
    /// 视频或播放列表链接，可以有多个
    #[arg(value_name = "URL")]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub urls: Vec<String>,

    /// 从文件读取链接，每行一个 (忽略空行和 # 注释)
    #[arg(short = 'i', long, value_name = "FILE")]
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input_file: Option<PathBuf>,

    /// 输出目录 (默认使用配置中的 default_output_dir)
    #[arg(short, long, value_name = "DIR")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// 输出格式
    #[arg(short, long, value_name = "FORMAT", default_value = "mp3")]
    #[arg(value_parser = parse_output_kind)]
    #[arg(help = "输出格式: mp4, mp3, wav, both (mp3+wav)")]
    pub format: OutputKind,

    /// 转换后保留 MP4 (默认删除)
    #[arg(long)]
    pub keep_mp4: bool,

    /// yt-dlp 文件名模板，不含扩展名
    #[arg(long, value_name = "TEMPLATE")]
    pub template: Option<String>,

    /// JSON 配置文件
    #[arg(long, value_name = "FILE")]
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// 输出更多日志 (-v 调试, -vv 跟踪)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// 只输出警告和错误
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn parse_output_kind(s: &str) -> Result<OutputKind, String> {
    s.parse::<OutputKind>().map_err(|e| e.to_string())
}

impl Cli {
    /// 命令行参数覆盖配置文件
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(template) = self.template.as_ref().filter(|t| !t.trim().is_empty()) {
            config.filename_template = template.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.default_output_dir = dir.clone();
        }
    }

    pub fn delete_intermediate(&self) -> bool {
        !self.keep_mp4
    }
}

/// 读取链接列表：去掉首尾空白，跳过空行和 `#` 开头的注释
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
