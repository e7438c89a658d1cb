//! 本地目录树操作

use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// 下载时临时文件的后缀
pub const TEMP_SUFFIX: &str = ".davsync-tmp";

/// 是否为同步自身产生的文件（下载临时文件、写入权限探测文件），不参与同步
pub fn is_internal_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            let name = name.to_string_lossy();
            name.ends_with(TEMP_SUFFIX) || name == super::PROBE_FILE_NAME
        })
        .unwrap_or(false)
}

/// 递归列出根目录下的所有普通文件（不跟随符号链接）
pub async fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let root = root.to_path_buf();

    // 使用 spawn_blocking 避免阻塞 async runtime
    let files = tokio::task::spawn_blocking(move || {
        WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!("遍历本地目录出错: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && !is_internal_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>()
    })
    .await?;

    Ok(files)
}

/// 获取本地文件大小，不存在或不是普通文件时返回 None
pub async fn file_size(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// 写入文件：先写临时文件，再原子重命名
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("无效的文件路径: {}", path.display()))?
        .to_string_lossy();
    let temp_path = path.with_file_name(format!(".{}{}", file_name, TEMP_SUFFIX));

    fs::write(&temp_path, data).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    Ok(())
}
