pub mod converter;

use std::path::Path;

use tracing::debug;

use crate::common::error::JobError;

pub use converter::AudioConverter;

/// 删除中间 MP4
pub async fn remove_intermediate(path: &Path) -> Result<(), JobError> {
    debug!("删除中间文件: {:?}", path);
    tokio::fs::remove_file(path)
        .await
        .map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// 确认转换结果存在且非空
pub async fn verify_output(path: &Path) -> Result<(), JobError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| JobError::Conversion(format!("输出文件不存在 {:?}: {}", path, e)))?;
    if meta.len() == 0 {
        return Err(JobError::Conversion(format!("输出文件为空: {:?}", path)));
    }
    Ok(())
}
