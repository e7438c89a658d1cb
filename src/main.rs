use anyhow::{Context, Result};
use davsync_lib::config::AppConfig;
use davsync_lib::core::{EventSink, RunStats};
use davsync_lib::logging::{init_logging, LogConfig};
use davsync_lib::storage::{probe_write, RemoteStorage, WebDavStorage};
use davsync_lib::{ReconciliationEngine, SyncContext, SyncEventHandler, SyncOptions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // 初始化日志系统
    init_logging(&LogConfig::from_env());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("配置错误: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<()> {
    info!("WebDAV 同步服务启动: {:?}", config.webdav);

    tokio::fs::create_dir_all(&config.local_path)
        .await
        .with_context(|| format!("创建本地目录失败: {}", config.local_path.display()))?;

    let storage: Arc<dyn RemoteStorage> = Arc::new(
        WebDavStorage::new(
            &config.webdav.url,
            &config.webdav.username,
            &config.webdav.password,
            config.webdav.timeout,
        )
        .context("创建 WebDAV 客户端失败")?,
    );

    let ctx = SyncContext::new(&config.local_path, &config.remote_path, storage.clone())
        .with_options(SyncOptions {
            settle_delay: config.settle_delay,
            verify_deletes: config.verify_deletes,
        });

    // 连接测试：列出远端根目录
    let remote_root = ctx.mapper.remote_root_dir().to_string();
    storage.list(&remote_root).await.with_context(|| {
        format!(
            "连接 WebDAV 失败: url={}, 用户={}, 目录={}",
            config.webdav.url, config.webdav.username, remote_root
        )
    })?;
    info!("连接成功: {}", storage.name());

    if config.permission_check {
        match probe_write(storage.as_ref(), &remote_root).await {
            Ok(()) => info!("远端写入权限检查通过"),
            Err(e) => warn!("远端写入权限检查失败，继续运行: {:#}", e),
        }
    }

    // 汇总所有单文件操作
    let (sink, mut events) = EventSink::channel();
    let ctx = ctx.with_events(sink);
    let stats_task = tokio::spawn(async move {
        let mut stats = RunStats::default();
        while let Some(event) = events.recv().await {
            stats.record(&event);
        }
        stats
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("收到退出信号，正在停止...");
                cancel.cancel();
            }
        });
    }

    let engine = ReconciliationEngine::with_cancel(ctx.clone(), cancel.clone());
    let report = engine.run(config.mode).await;
    match serde_json::to_string(&report) {
        Ok(json) => info!("初始同步报告: {}", json),
        Err(e) => warn!("序列化同步报告失败: {}", e),
    }

    if !cancel.is_cancelled() {
        SyncEventHandler::new(ctx.clone()).watch(cancel.clone()).await;
    }

    // 释放所有发送端，统计任务随之结束
    drop(engine);
    drop(ctx);
    match stats_task.await {
        Ok(stats) => info!(
            "运行汇总: 上传 {} 个, 下载 {} 个, 删除 {} 个, 复查成功 {} 个, 失败 {} 个",
            stats.uploaded, stats.downloaded, stats.deleted, stats.recovered, stats.failed
        ),
        Err(e) => warn!("统计任务异常结束: {}", e),
    }

    info!("同步服务已退出");
    Ok(())
}
