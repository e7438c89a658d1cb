//! 传输中路径集合，防止同一路径的重复并发传输

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 正在传输的本地路径集合
///
/// 路径在传输开始前加入，在传输的每一条退出路径上移除。
/// 已在集合中的路径再次请求时静默返回 false，不排队也不报错。
#[derive(Debug, Default)]
pub struct InFlightGuard {
    paths: Mutex<HashSet<PathBuf>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试标记路径为传输中；已被标记时返回 false
    pub fn try_acquire(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    /// 无条件移除标记
    pub fn release(&self, path: &Path) {
        self.lock().remove(path);
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        // 持锁期间不会 panic，中毒时直接取回数据
        self.paths.lock().unwrap_or_else(|e| e.into_inner())
    }
}
