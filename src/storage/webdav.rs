use super::local::write_atomic;
use super::{RemoteEntry, RemoteStorage, IO_TIMEOUT_SECS};
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::path::Path;
use std::time::Duration;

pub struct WebDavStorage {
    operator: Operator,
    name: String,
}

impl WebDavStorage {
    pub fn new(endpoint: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        use opendal::services::Webdav;

        // endpoint 可以带路径（如 https://host/dav），远端路径都相对于它
        let builder = Webdav::default()
            .endpoint(endpoint)
            .username(username)
            .password(password);

        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(timeout)
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!("webdav://{}", endpoint.trim_end_matches('/'));

        Ok(Self { operator, name })
    }

    /// 远端绝对路径 -> opendal 文件路径
    fn file_path(path: &str) -> String {
        path.replace('\\', "/").trim_start_matches('/').to_string()
    }

    /// 远端绝对路径 -> opendal 目录路径（以 / 结尾，根目录为 /）
    fn dir_path(path: &str) -> String {
        let trimmed = Self::file_path(path);
        let trimmed = trimmed.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", trimmed)
        }
    }

    /// opendal 返回的条目路径 -> 远端绝对路径
    fn absolute(path: &str) -> String {
        format!("/{}", path.trim_matches('/'))
    }
}

#[async_trait]
impl RemoteStorage for WebDavStorage {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let dir = Self::dir_path(path);
        let own = Self::absolute(&dir);

        let mut lister = self
            .operator
            .lister_with(&dir)
            .metakey(Metakey::ContentLength | Metakey::Mode)
            .await?;

        let mut entries = Vec::new();
        while let Some(entry) = lister.try_next().await? {
            let entry_path = Self::absolute(entry.path());

            // 部分服务器会把目录自身也列出来
            if entry_path == own {
                continue;
            }

            let meta = entry.metadata();
            if meta.is_dir() {
                entries.push(RemoteEntry::dir(entry_path));
            } else {
                entries.push(RemoteEntry::file(entry_path, Some(meta.content_length())));
            }
        }

        Ok(entries)
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        match self.operator.stat(&Self::dir_path(path)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.operator.create_dir(&Self::dir_path(path)).await?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        self.operator
            .write(&Self::file_path(remote_path), data)
            .await?;
        Ok(())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let data = self.operator.read(&Self::file_path(remote_path)).await?;
        write_atomic(local_path, &data.to_vec()).await
    }

    async fn stat(&self, path: &str) -> Result<Option<u64>> {
        match self.operator.stat(&Self::file_path(path)).await {
            Ok(meta) if meta.is_dir() => Ok(None),
            Ok(meta) => Ok(Some(meta.content_length())),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.operator.delete(&Self::file_path(path)).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
