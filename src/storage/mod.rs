pub mod local;
pub mod webdav;

#[cfg(test)]
pub(crate) mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

pub use webdav::WebDavStorage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete 等，可由 WEBDAV_TIMEOUT 覆盖
pub const OP_TIMEOUT_SECS: u64 = 30;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远端条目
///
/// `path` 为以 `/` 开头、不带结尾 `/` 的远端绝对路径。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub path: String,
    pub is_dir: bool,
    /// 文件大小，部分服务器在列表中不返回
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn file(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            size: None,
        }
    }
}

/// 远端存储接口
///
/// 同步核心只依赖这些原语操作，WebDAV 协议细节由实现负责。
/// 所有路径都是远端绝对路径（`/a/b.txt`），根目录为 `/`。
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// 列出目录的直接子条目（不递归，不包含目录自身）
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// 路径是否为已存在的目录
    async fn is_dir(&self, path: &str) -> Result<bool>;

    /// 文件是否存在
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    /// 创建单层目录
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// 上传本地文件
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// 下载远端文件到本地（调用方负责创建父目录）
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    /// 获取文件大小，不存在时返回 None
    async fn stat(&self, path: &str) -> Result<Option<u64>>;

    /// 删除文件
    async fn delete(&self, path: &str) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 写入权限探测文件名，本地和远端遍历都会跳过它
pub const PROBE_FILE_NAME: &str = ".davsync-probe";

/// 写入权限探测：上传并删除一个探测文件
///
/// 无论上传结果如何都会尝试删除，避免探测文件残留在远端。
/// 上传报错但文件实际已写入时视为可写。失败由调用方作为警告处理。
pub async fn probe_write(storage: &dyn RemoteStorage, remote_root: &str) -> Result<()> {
    let probe_path = format!("{}/{}", remote_root.trim_end_matches('/'), PROBE_FILE_NAME);
    let local = std::env::temp_dir().join(format!("davsync-probe-{}", std::process::id()));
    tokio::fs::write(&local, b"davsync").await?;

    let uploaded = match storage.upload(&local, &probe_path).await {
        Ok(()) => Ok(()),
        Err(e) => match storage.exists(&probe_path).await {
            Ok(true) => {
                debug!("探测文件上传报错但已写入: {}", e);
                Ok(())
            }
            _ => Err(e),
        },
    };
    let deleted = storage.delete(&probe_path).await;

    let _ = tokio::fs::remove_file(&local).await;

    uploaded?;
    deleted
}
