//! 文件事件处理 - 把本地变更增量同步到远端

use crate::core::actions::SyncActions;
use crate::core::transfer::TransferOutcome;
use crate::core::watcher::{FileWatcher, FsEvent, SettleQueue};
use crate::storage::local;
use crate::SyncContext;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 文件事件处理器
///
/// 目录事件全部忽略，远端目录在上传其中的文件时隐式创建。
/// 同一路径的重叠传输由 InFlightGuard 丢弃。
pub struct SyncEventHandler {
    actions: SyncActions,
}

impl SyncEventHandler {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            actions: SyncActions::new(ctx),
        }
    }

    /// 处理单个事件，返回执行的传输结果（未执行时为 None）
    ///
    /// 创建/修改事件先等待一个固定的写入时间再上传，删除立即执行。
    pub async fn handle(&self, event: FsEvent) -> Option<TransferOutcome> {
        if Self::is_ignored(&event) {
            return None;
        }

        match event {
            FsEvent::Created { path, .. } | FsEvent::Modified { path, .. } => {
                // 等待写入方完成
                tokio::time::sleep(self.actions.context().options.settle_delay).await;
                self.upload_settled(&path).await
            }
            FsEvent::Deleted { path, .. } => self.actions.delete_remote(&path).await,
        }
    }

    /// 按到达顺序消费事件，直到通道关闭或收到取消信号
    ///
    /// 创建/修改事件进入 [`SettleQueue`]，同一路径在等待期内的事件合并为
    /// 一次上传；删除事件立即执行，不受其它文件等待的影响。
    /// 通道关闭后仍会处理完队列中剩余的文件；取消只在两次传输之间生效，
    /// 尚未开始的上传被丢弃。
    pub async fn run(&self, mut events: mpsc::Receiver<FsEvent>, cancel: CancellationToken) {
        let mut queue = SettleQueue::new(self.actions.context().options.settle_delay);
        let mut open = true;

        loop {
            let deadline = queue.next_deadline();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    for path in queue.poll() {
                        if cancel.is_cancelled() {
                            break;
                        }
                        self.upload_settled(&path).await;
                    }
                }
                event = events.recv(), if open => match event {
                    Some(event) => self.dispatch(event, &mut queue).await,
                    None => open = false,
                },
            }

            if !open && queue.is_empty() {
                break;
            }
        }

        if !queue.is_empty() {
            debug!("丢弃 {} 个尚未上传的文件事件", queue.len());
        }
        info!("文件事件处理已停止");
    }

    /// 监控本地根目录并处理事件，直到取消
    ///
    /// 监控无法启动时记录错误并返回 false：初始同步已经完成，
    /// 进程不会因此失败退出。
    pub async fn watch(&self, cancel: CancellationToken) -> bool {
        let root = self.actions.context().mapper.local_root().to_path_buf();
        let (watcher, rx) = match FileWatcher::new(&root) {
            Ok(started) => started,
            Err(e) => {
                error!("启动文件监控失败，跳过实时同步: {:#}", e);
                return false;
            }
        };

        self.run(rx, cancel).await;
        watcher.stop();
        true
    }

    async fn dispatch(&self, event: FsEvent, queue: &mut SettleQueue) {
        if Self::is_ignored(&event) {
            return;
        }

        match event {
            FsEvent::Created { path, .. } | FsEvent::Modified { path, .. } => {
                queue.push(path);
            }
            FsEvent::Deleted { path, .. } => {
                queue.remove(&path);
                self.actions.delete_remote(&path).await;
            }
        }
    }

    fn is_ignored(event: &FsEvent) -> bool {
        if event.is_dir() {
            debug!("忽略目录事件: {:?}", event);
            return true;
        }
        local::is_internal_file(event.path())
    }

    async fn upload_settled(&self, path: &Path) -> Option<TransferOutcome> {
        if !path.is_file() {
            debug!("文件已不存在，跳过上传: {}", path.display());
            return None;
        }
        self.actions.upload_file(path).await
    }
}
