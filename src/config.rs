//! 应用配置模块 - 从环境变量读取

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// 配置错误，均为致命错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("缺少 WebDAV 凭证: {}（需要 WEBDAV_URL, WEBDAV_USERNAME, WEBDAV_PASSWORD）", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("无效的同步模式: {0}（可选: download, upload, bidirectional）")]
    InvalidMode(String),

    #[error("无效的配置值 {key}={value}")]
    InvalidValue { key: &'static str, value: String },
}

/// 同步方向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// 仅下载
    #[default]
    Download,
    /// 仅上传
    Upload,
    /// 先下载后上传
    Bidirectional,
}

impl SyncMode {
    pub fn includes_download(&self) -> bool {
        matches!(self, SyncMode::Download | SyncMode::Bidirectional)
    }

    pub fn includes_upload(&self) -> bool {
        matches!(self, SyncMode::Upload | SyncMode::Bidirectional)
    }
}

impl FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "download" | "download-only" => Ok(SyncMode::Download),
            "upload" | "upload-only" => Ok(SyncMode::Upload),
            "bidirectional" => Ok(SyncMode::Bidirectional),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Download => write!(f, "download"),
            SyncMode::Upload => write!(f, "upload"),
            SyncMode::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

/// WebDAV 连接配置
#[derive(Clone)]
pub struct WebDavConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// 单次操作超时
    pub timeout: Duration,
}

impl std::fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub webdav: WebDavConfig,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub mode: SyncMode,
    /// 创建/修改事件后的等待时间
    pub settle_delay: Duration,
    /// 删除出错后是否复查远端
    pub verify_deletes: bool,
    /// 启动时是否做写入权限探测
    pub permission_check: bool,
}

pub const DEFAULT_LOCAL_PATH: &str = "/app/output";
pub const DEFAULT_REMOTE_PATH: &str = "/";
pub const DEFAULT_TIMEOUT_SECS: u64 = crate::storage::OP_TIMEOUT_SECS;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

impl AppConfig {
    /// 从进程环境变量加载
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载（便于测试）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空字符串视为未设置
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = get("WEBDAV_URL");
        let username = get("WEBDAV_USERNAME");
        let password = get("WEBDAV_PASSWORD");

        let (url, username, password) = match (url, username, password) {
            (Some(u), Some(n), Some(p)) => (u, n, p),
            (u, n, p) => {
                let missing = [
                    ("WEBDAV_URL", u.is_none()),
                    ("WEBDAV_USERNAME", n.is_none()),
                    ("WEBDAV_PASSWORD", p.is_none()),
                ]
                .into_iter()
                .filter_map(|(key, absent)| absent.then_some(key))
                .collect();
                return Err(ConfigError::MissingCredentials(missing));
            }
        };

        let mode = match get("SYNC_MODE") {
            Some(m) => m.parse()?,
            None => SyncMode::default(),
        };

        let timeout_secs = parse_or("WEBDAV_TIMEOUT", get("WEBDAV_TIMEOUT"), DEFAULT_TIMEOUT_SECS)?;
        let settle_ms = parse_or(
            "SYNC_SETTLE_DELAY_MS",
            get("SYNC_SETTLE_DELAY_MS"),
            DEFAULT_SETTLE_DELAY_MS,
        )?;

        Ok(Self {
            webdav: WebDavConfig {
                url,
                username,
                password,
                timeout: Duration::from_secs(timeout_secs),
            },
            local_path: PathBuf::from(
                get("SYNC_LOCAL_PATH").unwrap_or_else(|| DEFAULT_LOCAL_PATH.to_string()),
            ),
            remote_path: get("SYNC_REMOTE_PATH").unwrap_or_else(|| DEFAULT_REMOTE_PATH.to_string()),
            mode,
            settle_delay: Duration::from_millis(settle_ms),
            verify_deletes: parse_bool("SYNC_VERIFY_DELETES", get("SYNC_VERIFY_DELETES"), false)?,
            permission_check: parse_bool(
                "SYNC_PERMISSION_CHECK",
                get("SYNC_PERMISSION_CHECK"),
                true,
            )?,
        })
    }
}

fn parse_or(key: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: v }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value {
        Some(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { key, value: v }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    const CREDS: [(&str, &str); 3] = [
        ("WEBDAV_URL", "https://dav.example.com/remote.php/dav"),
        ("WEBDAV_USERNAME", "alice"),
        ("WEBDAV_PASSWORD", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&CREDS).unwrap();
        assert_eq!(config.local_path, PathBuf::from("/app/output"));
        assert_eq!(config.remote_path, "/");
        assert_eq!(config.mode, SyncMode::Download);
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.webdav.timeout, Duration::from_secs(30));
        assert!(!config.verify_deletes);
        assert!(config.permission_check);
    }

    #[test]
    fn test_missing_credentials_lists_keys() {
        let err = load(&[("WEBDAV_URL", "https://dav"), ("WEBDAV_PASSWORD", "")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredentials(vec!["WEBDAV_USERNAME", "WEBDAV_PASSWORD"])
        );
    }

    #[test]
    fn test_overrides() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([
            ("SYNC_LOCAL_PATH", "/srv/data"),
            ("SYNC_REMOTE_PATH", "/backup/"),
            ("SYNC_MODE", "Bidirectional"),
            ("SYNC_SETTLE_DELAY_MS", "50"),
            ("SYNC_VERIFY_DELETES", "yes"),
            ("WEBDAV_TIMEOUT", "5"),
        ]);
        let config = load(&pairs).unwrap();
        assert_eq!(config.local_path, PathBuf::from("/srv/data"));
        assert_eq!(config.remote_path, "/backup/");
        assert_eq!(config.mode, SyncMode::Bidirectional);
        assert_eq!(config.settle_delay, Duration::from_millis(50));
        assert_eq!(config.webdav.timeout, Duration::from_secs(5));
        assert!(config.verify_deletes);
    }

    #[test]
    fn test_invalid_mode_and_values() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("SYNC_MODE", "mirror"));
        assert_eq!(
            load(&pairs).unwrap_err(),
            ConfigError::InvalidMode("mirror".to_string())
        );

        let mut pairs = CREDS.to_vec();
        pairs.push(("SYNC_SETTLE_DELAY_MS", "soon"));
        assert!(matches!(
            load(&pairs).unwrap_err(),
            ConfigError::InvalidValue { key: "SYNC_SETTLE_DELAY_MS", .. }
        ));
    }

    #[test]
    fn test_mode_directions() {
        assert!(SyncMode::Download.includes_download());
        assert!(!SyncMode::Download.includes_upload());
        assert!(SyncMode::Upload.includes_upload());
        assert!(!SyncMode::Upload.includes_download());
        assert!(SyncMode::Bidirectional.includes_download());
        assert!(SyncMode::Bidirectional.includes_upload());
        assert_eq!("upload-only".parse::<SyncMode>().unwrap(), SyncMode::Upload);
    }

    #[test]
    fn test_debug_hides_password() {
        let config = load(&CREDS).unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
