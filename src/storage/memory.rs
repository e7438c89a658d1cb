//! 内存远端存储，仅用于测试
//!
//! 记录每一次调用，并可注入各种 WebDAV 服务器的异常行为。

use super::local::write_atomic;
use super::{RemoteEntry, RemoteStorage};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    IsDir(String),
    Exists(String),
    Mkdir(String),
    Upload(String),
    Download(String),
    Stat(String),
    Delete(String),
}

#[derive(Default)]
struct Faults {
    /// 上传报错但文件已写入（模拟返回 403 的服务器）
    upload_error_but_persist: HashSet<String>,
    /// 上传报错且未写入
    upload_error: HashSet<String>,
    /// 下载报错
    download_error: HashSet<String>,
    /// 列表报错
    list_error: HashSet<String>,
    /// 创建目录报错
    mkdir_error: HashSet<String>,
    /// 删除报错但文件已删除
    delete_error_but_remove: HashSet<String>,
    /// 删除报错且未删除
    delete_error: HashSet<String>,
    /// 存在性检查报错
    exists_error: HashSet<String>,
    /// 列表中额外返回的条目（模拟路径不一致的服务器）
    extra_entries: BTreeMap<String, Vec<RemoteEntry>>,
}

#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Faults>,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn normalize_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        let storage = Self::default();
        storage.dirs.lock().unwrap().insert("/".to_string());
        storage
    }

    /// 预置文件，同时创建所有父目录
    pub fn put_file(&self, path: &str, data: &[u8]) {
        let mut dirs = self.dirs.lock().unwrap();
        let mut current = parent_of(path);
        while current != "/" {
            dirs.insert(current.to_string());
            current = parent_of(current);
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
    }

    pub fn put_dir(&self, path: &str) {
        self.dirs.lock().unwrap().insert(normalize_dir(path));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.lock().unwrap().contains(&normalize_dir(path))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_upload_but_persist(&self, path: &str) {
        self.faults
            .lock()
            .unwrap()
            .upload_error_but_persist
            .insert(path.to_string());
    }

    pub fn fail_upload(&self, path: &str) {
        self.faults.lock().unwrap().upload_error.insert(path.to_string());
    }

    pub fn fail_download(&self, path: &str) {
        self.faults
            .lock()
            .unwrap()
            .download_error
            .insert(path.to_string());
    }

    pub fn fail_list(&self, path: &str) {
        self.faults
            .lock()
            .unwrap()
            .list_error
            .insert(normalize_dir(path));
    }

    pub fn fail_mkdir(&self, path: &str) {
        self.faults
            .lock()
            .unwrap()
            .mkdir_error
            .insert(normalize_dir(path));
    }

    pub fn fail_delete_but_remove(&self, path: &str) {
        self.faults
            .lock()
            .unwrap()
            .delete_error_but_remove
            .insert(path.to_string());
    }

    pub fn fail_delete(&self, path: &str) {
        self.faults.lock().unwrap().delete_error.insert(path.to_string());
    }

    pub fn fail_exists(&self, path: &str) {
        self.faults.lock().unwrap().exists_error.insert(path.to_string());
    }

    pub fn add_listing_entry(&self, dir: &str, entry: RemoteEntry) {
        self.faults
            .lock()
            .unwrap()
            .extra_entries
            .entry(normalize_dir(dir))
            .or_default()
            .push(entry);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn has_fault(&self, pick: impl Fn(&Faults) -> &HashSet<String>, path: &str) -> bool {
        pick(&self.faults.lock().unwrap()).contains(path)
    }
}

#[async_trait]
impl RemoteStorage for MemoryStorage {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let dir = normalize_dir(path);
        self.record(Call::List(dir.clone()));

        if self.has_fault(|f| &f.list_error, &dir) {
            anyhow::bail!("PROPFIND {} failed: 500", dir);
        }
        if !self.has_dir(&dir) {
            anyhow::bail!("PROPFIND {} failed: 404", dir);
        }

        let mut entries: Vec<RemoteEntry> = self
            .dirs
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.as_str() != "/" && parent_of(d) == dir)
            .map(|d| RemoteEntry::dir(d.clone()))
            .collect();
        entries.extend(
            self.files
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _)| parent_of(p) == dir)
                .map(|(p, data)| RemoteEntry::file(p.clone(), Some(data.len() as u64))),
        );
        if let Some(extra) = self.faults.lock().unwrap().extra_entries.get(&dir) {
            entries.extend(extra.iter().cloned());
        }

        Ok(entries)
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        self.record(Call::IsDir(normalize_dir(path)));
        Ok(self.has_dir(path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.record(Call::Exists(path.to_string()));
        if self.has_fault(|f| &f.exists_error, path) {
            anyhow::bail!("PROPFIND {} failed: 502", path);
        }
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let dir = normalize_dir(path);
        self.record(Call::Mkdir(dir.clone()));

        if self.has_fault(|f| &f.mkdir_error, &dir) {
            anyhow::bail!("MKCOL {} failed: 403", dir);
        }
        if self.has_dir(&dir) {
            anyhow::bail!("MKCOL {} failed: 405", dir);
        }
        self.dirs.lock().unwrap().insert(dir);
        Ok(())
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        self.record(Call::Upload(remote_path.to_string()));

        if self.has_fault(|f| &f.upload_error, remote_path) {
            anyhow::bail!("PUT {} failed: 500", remote_path);
        }
        let data = tokio::fs::read(local_path).await?;
        self.files
            .lock()
            .unwrap()
            .insert(remote_path.to_string(), data);
        if self.has_fault(|f| &f.upload_error_but_persist, remote_path) {
            anyhow::bail!("PUT {} failed: 403", remote_path);
        }
        Ok(())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        self.record(Call::Download(remote_path.to_string()));

        if self.has_fault(|f| &f.download_error, remote_path) {
            anyhow::bail!("GET {} failed: 500", remote_path);
        }
        let data = self
            .file(remote_path)
            .ok_or_else(|| anyhow::anyhow!("GET {} failed: 404", remote_path))?;
        write_atomic(local_path, &data).await
    }

    async fn stat(&self, path: &str) -> Result<Option<u64>> {
        self.record(Call::Stat(path.to_string()));
        Ok(self.file(path).map(|d| d.len() as u64))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.record(Call::Delete(path.to_string()));

        if self.has_fault(|f| &f.delete_error, path) {
            anyhow::bail!("DELETE {} failed: 500", path);
        }
        let removed = self.files.lock().unwrap().remove(path);
        if self.has_fault(|f| &f.delete_error_but_remove, path) {
            anyhow::bail!("DELETE {} failed: 403", path);
        }
        if removed.is_none() {
            anyhow::bail!("DELETE {} failed: 404", path);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
