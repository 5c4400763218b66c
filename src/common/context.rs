use std::sync::Arc;

use super::config::AppConfig;
use crate::downloader::ytdlp::YtDlp;
use crate::post_process::converter::AudioConverter;

/// 启动时构造一次，传给控制器和界面层，取代全局状态
#[derive(Debug, Clone)]
pub struct AppContext {
    config: Arc<AppConfig>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn downloader(&self) -> YtDlp {
        YtDlp::new(&self.config)
    }

    pub fn converter(&self) -> AudioConverter {
        AudioConverter::new(&self.config)
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
