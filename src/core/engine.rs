use crate::config::SyncMode;
use crate::core::actions::SyncActions;
use crate::core::transfer::TransferOutcome;
use crate::storage::{local, RemoteEntry};
use crate::SyncContext;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 初始同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub mode: SyncMode,
    pub start_time: i64,
    pub end_time: i64,
    pub remote_files: u64,
    pub local_files: u64,
    pub files_downloaded: u64,
    pub files_uploaded: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub listings_failed: u64,
    pub cancelled: bool,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            start_time: chrono::Utc::now().timestamp(),
            end_time: 0,
            remote_files: 0,
            local_files: 0,
            files_downloaded: 0,
            files_uploaded: 0,
            files_skipped: 0,
            files_failed: 0,
            listings_failed: 0,
            cancelled: false,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, message: String) {
        self.files_failed += 1;
        self.errors.push(message);
    }
}

/// 远端目录树遍历结果
#[derive(Debug, Default)]
pub struct RemoteTree {
    pub files: Vec<RemoteEntry>,
    /// 列表失败的目录，其子树被跳过
    pub failed_dirs: Vec<String>,
    /// 不在远端根目录下的条目（映射错误信息）
    pub rejected: Vec<String>,
}

/// 初始同步引擎
///
/// 单次执行，两个阶段：先下载后上传。大小相同即视为已同步。
/// 任何单个文件或子树的失败只记录并跳过，不会中止整个过程。
pub struct ReconciliationEngine {
    actions: SyncActions,
    cancel: CancellationToken,
}

impl ReconciliationEngine {
    pub fn new(ctx: SyncContext) -> Self {
        Self::with_cancel(ctx, CancellationToken::new())
    }

    pub fn with_cancel(ctx: SyncContext, cancel: CancellationToken) -> Self {
        Self {
            actions: SyncActions::new(ctx),
            cancel,
        }
    }

    fn ctx(&self) -> &SyncContext {
        self.actions.context()
    }

    /// 检查是否已取消
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 运行初始同步
    pub async fn run(&self, mode: SyncMode) -> SyncReport {
        let mut report = SyncReport::new(mode);
        info!(
            "开始初始同步: 模式={}, 本地={}, 远端={}",
            mode,
            self.ctx().mapper.local_root().display(),
            self.ctx().mapper.remote_root_dir()
        );

        // 两个阶段都需要远端文件大小索引
        let tree = self.collect_remote_tree().await;
        report.remote_files = tree.files.len() as u64;
        report.listings_failed = tree.failed_dirs.len() as u64;
        for message in &tree.rejected {
            report.fail(message.clone());
        }
        for dir in &tree.failed_dirs {
            report.errors.push(format!("列出远端目录失败: {}", dir));
        }

        let mut remote_sizes: HashMap<String, Option<u64>> = tree
            .files
            .iter()
            .map(|e| (e.path.clone(), e.size))
            .collect();
        let mut pull_failed = HashSet::new();

        if mode.includes_download() && !self.is_cancelled() {
            self.pull_phase(&tree.files, &mut remote_sizes, &mut pull_failed, &mut report)
                .await;
        }

        if mode.includes_upload() && !self.is_cancelled() {
            self.push_phase(&remote_sizes, &pull_failed, &mut report).await;
        }

        report.cancelled = self.is_cancelled();
        report.end_time = chrono::Utc::now().timestamp();

        info!(
            "初始同步完成: 下载 {}, 上传 {}, 跳过 {}, 失败 {}, 列表失败 {}{}",
            report.files_downloaded,
            report.files_uploaded,
            report.files_skipped,
            report.files_failed,
            report.listings_failed,
            if report.cancelled { "（已取消）" } else { "" }
        );

        report
    }

    /// 用显式工作队列遍历远端目录树
    pub async fn collect_remote_tree(&self) -> RemoteTree {
        let mapper = &self.ctx().mapper;
        let storage = &self.ctx().storage;

        let mut tree = RemoteTree::default();
        let mut queue = VecDeque::from([mapper.remote_root_dir().to_string()]);
        let mut seen = HashSet::new();

        while let Some(dir) = queue.pop_front() {
            if self.is_cancelled() {
                break;
            }
            // 服务器返回的路径不一致时可能出现重复目录
            if !seen.insert(dir.clone()) {
                continue;
            }

            let entries = match storage.list(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("列出远端目录失败，跳过该子树: {} - {}", dir, e);
                    tree.failed_dirs.push(dir);
                    continue;
                }
            };

            for entry in entries {
                if let Err(e) = mapper.to_local(&entry.path) {
                    warn!("跳过远端条目: {}", e);
                    tree.rejected.push(e.to_string());
                    continue;
                }
                if !entry.is_dir && local::is_internal_file(Path::new(&entry.path)) {
                    debug!("跳过内部文件: {}", entry.path);
                    continue;
                }
                if entry.is_dir {
                    queue.push_back(entry.path);
                } else {
                    tree.files.push(entry);
                }
            }
        }

        debug!(
            "远端遍历完成: {} 个文件, {} 个目录列表失败",
            tree.files.len(),
            tree.failed_dirs.len()
        );
        tree
    }

    /// 下载阶段：本地缺失或大小不同的远端文件
    async fn pull_phase(
        &self,
        files: &[RemoteEntry],
        remote_sizes: &mut HashMap<String, Option<u64>>,
        pull_failed: &mut HashSet<String>,
        report: &mut SyncReport,
    ) {
        for entry in files {
            if self.is_cancelled() {
                return;
            }

            let local_path = match self.ctx().mapper.to_local(&entry.path) {
                Ok(p) => p,
                Err(e) => {
                    report.fail(e.to_string());
                    continue;
                }
            };

            let remote_size = match entry.size {
                Some(size) => Some(size),
                None => match self.ctx().storage.stat(&entry.path).await {
                    Ok(size) => size,
                    Err(e) => {
                        debug!("获取远端文件大小失败，直接下载: {} - {}", entry.path, e);
                        None
                    }
                },
            };
            remote_sizes.insert(entry.path.clone(), remote_size);

            let local_size = match local::file_size(&local_path).await {
                Ok(size) => size,
                Err(e) => {
                    warn!("读取本地文件信息失败: {} - {}", local_path.display(), e);
                    None
                }
            };

            if remote_size.is_some() && local_size == remote_size {
                debug!("大小相同，跳过: {}", entry.path);
                report.files_skipped += 1;
                continue;
            }

            match self.actions.download_file(&entry.path, &local_path).await {
                TransferOutcome::FailedConfirmedAbsent => {
                    pull_failed.insert(entry.path.clone());
                    report.fail(format!("下载失败: {}", entry.path));
                }
                _ => report.files_downloaded += 1,
            }
        }
    }

    /// 上传阶段：远端缺失或大小不同的本地文件
    async fn push_phase(
        &self,
        remote_sizes: &HashMap<String, Option<u64>>,
        pull_failed: &HashSet<String>,
        report: &mut SyncReport,
    ) {
        let local_root = self.ctx().mapper.local_root().to_path_buf();
        let files = match local::list_files(&local_root).await {
            Ok(files) => files,
            Err(e) => {
                error!("遍历本地目录失败: {} - {}", local_root.display(), e);
                report.errors.push(format!("遍历本地目录失败: {}", e));
                return;
            }
        };
        report.local_files = files.len() as u64;

        for path in files {
            if self.is_cancelled() {
                return;
            }

            let remote_path = match self.ctx().mapper.to_remote(&path) {
                Ok(p) => p,
                Err(e) => {
                    report.fail(e.to_string());
                    continue;
                }
            };

            // 下载失败的文件不能用旧的本地内容覆盖远端
            if pull_failed.contains(&remote_path) {
                report.files_skipped += 1;
                continue;
            }

            let local_size = local::file_size(&path).await.ok().flatten();
            if let Some(Some(remote_size)) = remote_sizes.get(&remote_path) {
                if local_size == Some(*remote_size) {
                    debug!("大小相同，跳过: {}", remote_path);
                    report.files_skipped += 1;
                    continue;
                }
            }

            match self.actions.upload_file(&path).await {
                Some(outcome) if outcome.is_success() => report.files_uploaded += 1,
                Some(_) => report.fail(format!("上传失败: {}", path.display())),
                None => report.files_skipped += 1,
            }
        }
    }
}
