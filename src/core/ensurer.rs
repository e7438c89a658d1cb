//! 远端父目录保证

use crate::storage::RemoteStorage;
use std::sync::Arc;
use tracing::{debug, warn};

/// 单个祖先目录的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirStatus {
    AlreadyExists,
    Created,
    Failed(String),
}

/// 拆分远端文件路径的所有祖先目录（由浅到深，不含文件本身和协议根）
///
/// `/a/b/c.txt` -> `["/a", "/a/b"]`
pub fn ancestors(remote_file: &str) -> Vec<String> {
    let segments: Vec<&str> = remote_file.split('/').filter(|s| !s.is_empty()).collect();
    let mut result = Vec::new();
    let mut current = String::new();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(segment);
        result.push(current.clone());
    }
    result
}

/// 远端目录保证器
///
/// 对每个祖先目录先检查是否存在，缺失时才创建。同一次调用中每个祖先
/// 最多检查一次、创建一次。失败只记录警告，后续上传照常进行
/// （部分服务器在 PUT 时会自动创建父目录）。
pub struct RemoteDirectoryEnsurer {
    storage: Arc<dyn RemoteStorage>,
}

impl RemoteDirectoryEnsurer {
    pub fn new(storage: Arc<dyn RemoteStorage>) -> Self {
        Self { storage }
    }

    pub async fn ensure(&self, remote_file: &str) -> Vec<(String, DirStatus)> {
        let mut results = Vec::new();
        // 上层目录刚被创建时，下层目录必然不存在，无需再检查
        let mut parent_created = false;

        for dir in ancestors(remote_file) {
            let exists = if parent_created {
                Ok(false)
            } else {
                self.storage.is_dir(&dir).await
            };

            let status = match exists {
                Ok(true) => DirStatus::AlreadyExists,
                Ok(false) => match self.storage.mkdir(&dir).await {
                    Ok(()) => {
                        debug!("创建远端目录: {}", dir);
                        DirStatus::Created
                    }
                    Err(e) => {
                        warn!("创建远端目录失败（继续上传）: {} - {}", dir, e);
                        DirStatus::Failed(e.to_string())
                    }
                },
                Err(e) => {
                    warn!("检查远端目录失败（继续上传）: {} - {}", dir, e);
                    DirStatus::Failed(e.to_string())
                }
            };

            parent_created = status == DirStatus::Created;
            results.push((dir, status));
        }

        results
    }
}
