//! 文件系统监控
//!
//! 把 `notify` 的原始事件转换为封闭的 [`FsEvent`] 变体，通过 mpsc 通道交给
//! [`SyncEventHandler`](crate::core::handler::SyncEventHandler)。
//!
//! 重命名的映射规则：
//! - `Name(To)`：新路径记为 Created（包括从监控目录外移入）
//! - `Name(Both)`：旧路径记为 Deleted（新路径已由 `Name(To)` 覆盖）
//! - `Name(From)`：忽略，无法判断旧路径是否为目录
//! - 其它平台的 `Name(Any)`：按路径当前是否存在记为 Created 或 Deleted
//!
//! 仅元数据变化（touch、chmod）不产生事件。一次写入通常会产生
//! Create + Modify 多个事件，由 [`SettleQueue`] 按路径合并。

use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// 文件系统事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created { path: PathBuf, is_dir: bool },
    Modified { path: PathBuf, is_dir: bool },
    Deleted { path: PathBuf, is_dir: bool },
}

impl FsEvent {
    pub fn path(&self) -> &Path {
        match self {
            FsEvent::Created { path, .. }
            | FsEvent::Modified { path, .. }
            | FsEvent::Deleted { path, .. } => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        match self {
            FsEvent::Created { is_dir, .. }
            | FsEvent::Modified { is_dir, .. }
            | FsEvent::Deleted { is_dir, .. } => *is_dir,
        }
    }
}

/// 通道容量
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 递归监控本地目录，drop 后停止监控
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: &Path) -> Result<(Self, mpsc::Receiver<FsEvent>)> {
        let (tx, rx) = mpsc::channel::<FsEvent>(EVENT_CHANNEL_CAPACITY);

        // 回调运行在 notify 自己的线程上
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for fs_event in map_notify_event(&event) {
                        if let Err(e) = tx.blocking_send(fs_event) {
                            warn!("发送文件事件失败（接收端已关闭）: {}", e);
                        }
                    }
                }
                Err(err) => error!("文件监控出错: {}", err),
            },
            notify::Config::default(),
        )
        .context("创建文件监控失败")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("监控目录失败: {}", root.display()))?;

        info!("开始监控目录: {}", root.display());

        Ok((
            Self {
                watcher,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    /// 停止监控；之后事件通道会关闭
    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            debug!("取消监控失败: {}", e);
        }
        info!("已停止监控: {}", self.root.display());
    }
}

/// 把 notify 事件转换为 FsEvent，访问类事件返回空
fn map_notify_event(event: &notify::Event) -> Vec<FsEvent> {
    let Some(path) = event.paths.first() else {
        return Vec::new();
    };

    match &event.kind {
        EventKind::Create(kind) => vec![FsEvent::Created {
            path: path.clone(),
            is_dir: *kind == CreateKind::Folder || path.is_dir(),
        }],

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![FsEvent::Created {
            path: path.clone(),
            is_dir: path.is_dir(),
        }],

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.get(1) {
            Some(new) => vec![FsEvent::Deleted {
                path: path.clone(),
                is_dir: new.is_dir(),
            }],
            None => Vec::new(),
        },

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            debug!("忽略重命名源事件: {}", path.display());
            Vec::new()
        }

        EventKind::Modify(ModifyKind::Name(_)) => {
            if path.exists() {
                vec![FsEvent::Created {
                    path: path.clone(),
                    is_dir: path.is_dir(),
                }]
            } else {
                vec![FsEvent::Deleted {
                    path: path.clone(),
                    is_dir: false,
                }]
            }
        }

        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),

        EventKind::Modify(_) => vec![FsEvent::Modified {
            path: path.clone(),
            is_dir: path.is_dir(),
        }],

        EventKind::Remove(kind) => vec![FsEvent::Deleted {
            path: path.clone(),
            is_dir: *kind == RemoveKind::Folder,
        }],

        _ => Vec::new(),
    }
}

/// 等待写入完成的文件队列
///
/// 同一路径在等待期内的多次创建/修改事件合并为一项，并重新计时，
/// 只有安静超过等待时间的路径才会被取出。
#[derive(Debug)]
pub struct SettleQueue {
    pending: HashMap<PathBuf, Instant>,
    delay: Duration,
}

impl SettleQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            delay,
        }
    }

    /// 加入或刷新路径，返回该路径此前是否已在队列中
    pub fn push(&mut self, path: PathBuf) -> bool {
        let merged = self.pending.insert(path, Instant::now()).is_some();
        if merged {
            debug!("合并重复的文件事件");
        }
        merged
    }

    /// 移除路径（文件已被删除）
    pub fn remove(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// 最早到期的时间点，队列为空时返回 None
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|t| *t + self.delay)
    }

    /// 取出所有已到期的路径，按到期先后排序
    pub fn poll(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut settled: Vec<(PathBuf, Instant)> = self
            .pending
            .iter()
            .filter(|(_, t)| now.duration_since(**t) >= self.delay)
            .map(|(p, t)| (p.clone(), *t))
            .collect();
        settled.sort_by_key(|(_, t)| *t);

        for (path, _) in &settled {
            self.pending.remove(path);
        }
        settled.into_iter().map(|(p, _)| p).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
