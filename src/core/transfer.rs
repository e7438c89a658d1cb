//! 传输结果校验
//!
//! 部分 WebDAV 后端在写入成功后仍返回 403 等错误状态码。
//! 出错后重新查询远端状态，判断操作是否实际已经生效。

use crate::storage::{local, RemoteStorage};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// 传输结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    /// 操作直接成功
    Succeeded,
    /// 操作报错，但复查确认已生效
    SucceededDespiteReportedError,
    /// 操作报错，复查未能确认生效
    FailedConfirmedAbsent,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, TransferOutcome::FailedConfirmedAbsent)
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Succeeded => write!(f, "succeeded"),
            TransferOutcome::SucceededDespiteReportedError => {
                write!(f, "succeeded_despite_reported_error")
            }
            TransferOutcome::FailedConfirmedAbsent => write!(f, "failed"),
        }
    }
}

/// 传输校验器，每次调用只包裹一次远端操作，不做重试
pub struct TransferVerifier {
    storage: Arc<dyn RemoteStorage>,
}

impl TransferVerifier {
    pub fn new(storage: Arc<dyn RemoteStorage>) -> Self {
        Self { storage }
    }

    /// 上传；出错后检查远端文件是否存在
    pub async fn upload(&self, local_path: &Path, remote_path: &str) -> TransferOutcome {
        let err = match self.storage.upload(local_path, remote_path).await {
            Ok(()) => return TransferOutcome::Succeeded,
            Err(e) => e,
        };

        match self.storage.exists(remote_path).await {
            Ok(true) => {
                info!(
                    "上传报告错误但文件已存在于远端，视为成功: {} ({})",
                    remote_path, err
                );
                TransferOutcome::SucceededDespiteReportedError
            }
            Ok(false) => {
                error!("上传失败: {} -> {}: {}", local_path.display(), remote_path, err);
                TransferOutcome::FailedConfirmedAbsent
            }
            Err(check_err) => {
                error!(
                    "上传失败且无法复查: {} -> {}: {} (复查错误: {})",
                    local_path.display(),
                    remote_path,
                    err,
                    check_err
                );
                TransferOutcome::FailedConfirmedAbsent
            }
        }
    }

    /// 下载；出错后比较本地文件大小与远端大小
    pub async fn download(&self, remote_path: &str, local_path: &Path) -> TransferOutcome {
        let err = match self.storage.download(remote_path, local_path).await {
            Ok(()) => return TransferOutcome::Succeeded,
            Err(e) => e,
        };

        let remote_size = self.storage.stat(remote_path).await;
        let local_size = local::file_size(local_path).await;

        match (remote_size, local_size) {
            (Ok(Some(remote)), Ok(Some(local))) if remote == local => {
                info!(
                    "下载报告错误但本地文件已完整，视为成功: {} ({})",
                    remote_path, err
                );
                TransferOutcome::SucceededDespiteReportedError
            }
            _ => {
                error!("下载失败: {} -> {}: {}", remote_path, local_path.display(), err);
                TransferOutcome::FailedConfirmedAbsent
            }
        }
    }

    /// 删除；出错后检查远端文件是否已经不存在
    pub async fn delete(&self, remote_path: &str) -> TransferOutcome {
        let err = match self.storage.delete(remote_path).await {
            Ok(()) => return TransferOutcome::Succeeded,
            Err(e) => e,
        };

        match self.storage.exists(remote_path).await {
            Ok(false) => {
                info!(
                    "删除报告错误但文件已不存在于远端，视为成功: {} ({})",
                    remote_path, err
                );
                TransferOutcome::SucceededDespiteReportedError
            }
            _ => {
                error!("删除失败: {}: {}", remote_path, err);
                TransferOutcome::FailedConfirmedAbsent
            }
        }
    }
}
