use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod core;
pub mod logging;
pub mod storage;

pub use crate::core::{
    FsEvent, InFlightGuard, PathMapper, ReconciliationEngine, SyncEventHandler, SyncReport,
    TransferOutcome,
};
pub use config::{AppConfig, SyncMode};
pub use storage::{RemoteEntry, RemoteStorage};

use crate::core::events::EventSink;

/// 同步行为选项
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 创建/修改事件后等待写入完成的时间
    pub settle_delay: Duration,
    /// 删除出错后是否复查远端
    pub verify_deletes: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(config::DEFAULT_SETTLE_DELAY_MS),
            verify_deletes: false,
        }
    }
}

/// 同步上下文，显式传递给每个组件
///
/// 启动时确定的根目录、远端客户端、传输中集合和事件出口都在这里，
/// 初始同步和实时监控共用同一个上下文。
#[derive(Clone)]
pub struct SyncContext {
    pub mapper: Arc<PathMapper>,
    pub storage: Arc<dyn RemoteStorage>,
    pub in_flight: Arc<InFlightGuard>,
    pub options: SyncOptions,
    pub events: EventSink,
}

impl SyncContext {
    pub fn new(
        local_root: impl Into<PathBuf>,
        remote_root: &str,
        storage: Arc<dyn RemoteStorage>,
    ) -> Self {
        Self {
            mapper: Arc::new(PathMapper::new(local_root, remote_root)),
            storage,
            in_flight: Arc::new(InFlightGuard::new()),
            options: SyncOptions::default(),
            events: EventSink::disabled(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }
}
