//! 结构化同步事件
//!
//! 每次单文件操作完成后发送一条 [`SyncEvent`]，由调用方决定如何消费
//! （统计、测试断言等）。未设置接收端时事件直接丢弃。

use crate::core::transfer::TransferOutcome;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Upload,
    Download,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub action: SyncAction,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub outcome: TransferOutcome,
}

/// 事件发送端
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SyncEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// 运行期间的操作统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub uploaded: u64,
    pub downloaded: u64,
    pub deleted: u64,
    /// 报错但复查确认成功的次数
    pub recovered: u64,
    pub failed: u64,
}

impl RunStats {
    pub fn record(&mut self, event: &SyncEvent) {
        match event.outcome {
            TransferOutcome::FailedConfirmedAbsent => {
                self.failed += 1;
                return;
            }
            TransferOutcome::SucceededDespiteReportedError => self.recovered += 1,
            TransferOutcome::Succeeded => {}
        }

        match event.action {
            SyncAction::Upload => self.uploaded += 1,
            SyncAction::Download => self.downloaded += 1,
            SyncAction::Delete => self.deleted += 1,
        }
    }
}
