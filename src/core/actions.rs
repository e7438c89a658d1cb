//! 单文件操作 - 初始同步与实时监控共用的上传、下载、删除路径

use crate::core::ensurer::RemoteDirectoryEnsurer;
use crate::core::events::{SyncAction, SyncEvent};
use crate::core::transfer::{TransferOutcome, TransferVerifier};
use crate::SyncContext;
use std::path::Path;
use tracing::{debug, error, info, warn};

pub struct SyncActions {
    ctx: SyncContext,
    ensurer: RemoteDirectoryEnsurer,
    verifier: TransferVerifier,
}

impl SyncActions {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ensurer: RemoteDirectoryEnsurer::new(ctx.storage.clone()),
            verifier: TransferVerifier::new(ctx.storage.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// 上传单个本地文件
    ///
    /// 返回 None 表示未执行：该路径正在传输中，或无法映射到远端。
    pub async fn upload_file(&self, local_path: &Path) -> Option<TransferOutcome> {
        if !self.ctx.in_flight.try_acquire(local_path) {
            debug!("文件正在传输中，忽略: {}", local_path.display());
            return None;
        }

        let in_flight = self.ctx.in_flight.clone();
        let guarded = local_path.to_path_buf();
        scopeguard::defer! {
            in_flight.release(&guarded);
        }

        let remote_path = match self.ctx.mapper.to_remote(local_path) {
            Ok(p) => p,
            Err(e) => {
                warn!("跳过无法映射的文件: {}", e);
                return None;
            }
        };

        self.ensurer.ensure(&remote_path).await;

        info!("上传: {} -> {}", local_path.display(), remote_path);
        let outcome = self.verifier.upload(local_path, &remote_path).await;
        if outcome == TransferOutcome::Succeeded {
            info!("上传成功: {}", remote_path);
        }

        self.emit(SyncAction::Upload, local_path, remote_path, outcome);
        Some(outcome)
    }

    /// 下载单个远端文件（调用方已完成映射和大小比较）
    pub async fn download_file(&self, remote_path: &str, local_path: &Path) -> TransferOutcome {
        if let Some(parent) = local_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!("创建本地目录失败: {} - {}", parent.display(), e);
                let outcome = TransferOutcome::FailedConfirmedAbsent;
                self.emit(SyncAction::Download, local_path, remote_path.to_string(), outcome);
                return outcome;
            }
        }

        info!("下载: {} -> {}", remote_path, local_path.display());
        let outcome = self.verifier.download(remote_path, local_path).await;
        if outcome == TransferOutcome::Succeeded {
            info!("下载成功: {}", local_path.display());
        }

        self.emit(SyncAction::Download, local_path, remote_path.to_string(), outcome);
        outcome
    }

    /// 删除本地文件对应的远端文件
    ///
    /// 默认不复查：删除报错但实际已删除的情况记为普通失败。
    /// 开启 `verify_deletes` 后复查远端是否仍存在。
    pub async fn delete_remote(&self, local_path: &Path) -> Option<TransferOutcome> {
        let remote_path = match self.ctx.mapper.to_remote(local_path) {
            Ok(p) => p,
            Err(e) => {
                warn!("跳过无法映射的删除: {}", e);
                return None;
            }
        };

        info!("删除: {}", remote_path);
        let outcome = if self.ctx.options.verify_deletes {
            self.verifier.delete(&remote_path).await
        } else {
            match self.ctx.storage.delete(&remote_path).await {
                Ok(()) => TransferOutcome::Succeeded,
                Err(e) => {
                    error!("删除失败: {}: {}", remote_path, e);
                    TransferOutcome::FailedConfirmedAbsent
                }
            }
        };
        if outcome == TransferOutcome::Succeeded {
            info!("删除成功: {}", remote_path);
        }

        self.emit(SyncAction::Delete, local_path, remote_path, outcome);
        Some(outcome)
    }

    fn emit(&self, action: SyncAction, local_path: &Path, remote_path: String, outcome: TransferOutcome) {
        self.ctx.events.emit(SyncEvent {
            action,
            local_path: local_path.to_path_buf(),
            remote_path,
            outcome,
        });
    }
}
