//! 日志模块 - 控制台日志初始化

use tracing_subscriber::prelude::*;

/// 日志级别环境变量
pub const LOG_LEVEL_ENV: &str = "SYNC_LOG_LEVEL";

/// 这些依赖在 info 级别下过于啰嗦
const NOISY_TARGETS: &[&str] = &["hyper=warn", "reqwest=warn", "opendal=warn"];

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// 从环境变量加载，未设置时使用 info
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(LOG_LEVEL_ENV) {
            Some(level) if !level.trim().is_empty() => Self {
                level: level.trim().to_lowercase(),
            },
            _ => Self::default(),
        }
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" | "warning" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 初始化日志系统
///
/// `RUST_LOG` 中的指令优先，其余按配置的级别输出到控制台。
pub fn init_logging(config: &LogConfig) {
    let mut env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(config.tracing_level().into());
    for target in NOISY_TARGETS {
        if let Ok(directive) = target.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}
