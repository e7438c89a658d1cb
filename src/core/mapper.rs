//! 本地路径与远端路径的双向映射
//!
//! 映射纯粹基于位置：`LocalRoot/rel` <-> `RemoteRoot/rel`，其中 `rel`
//! 为 POSIX 风格的相对路径。不在对应根目录下的路径会返回
//! [`MappingError`]，绝不静默地映射到错误位置。

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// 路径映射错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("本地路径不在同步根目录下: {path} (根目录: {root})")]
    OutsideLocalRoot { path: String, root: String },

    #[error("远端路径不在远端根目录下: {path} (根目录: {root:?})")]
    OutsideRemoteRoot { path: String, root: String },

    #[error("路径包含非法片段: {0}")]
    InvalidComponent(String),
}

/// 规范化远端根目录
///
/// 去掉结尾的 `/`；协议根 `/`（或空串）视为空前缀，保证拼接时不会出现 `//`。
/// 缺少前导 `/` 时补上。
pub fn normalize_remote_root(root: &str) -> String {
    let root = root.replace('\\', "/");
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[derive(Debug, Clone)]
pub struct PathMapper {
    local_root: PathBuf,
    remote_root: String,
}

impl PathMapper {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: &str) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: normalize_remote_root(remote_root),
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// 规范化后的远端根目录，空串表示协议根
    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// 远端根目录的可列举形式（协议根为 `/`）
    pub fn remote_root_dir(&self) -> &str {
        if self.remote_root.is_empty() {
            "/"
        } else {
            &self.remote_root
        }
    }

    /// 本地路径 -> 远端路径
    pub fn to_remote(&self, local_path: &Path) -> Result<String, MappingError> {
        let relative =
            local_path
                .strip_prefix(&self.local_root)
                .map_err(|_| MappingError::OutsideLocalRoot {
                    path: local_path.display().to_string(),
                    root: self.local_root.display().to_string(),
                })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(MappingError::InvalidComponent(
                        local_path.display().to_string(),
                    ))
                }
            }
        }

        if segments.is_empty() {
            return Ok(self.remote_root_dir().to_string());
        }

        Ok(format!("{}/{}", self.remote_root, segments.join("/")))
    }

    /// 远端路径 -> 本地路径
    pub fn to_local(&self, remote_path: &str) -> Result<PathBuf, MappingError> {
        let outside = || MappingError::OutsideRemoteRoot {
            path: remote_path.to_string(),
            root: self.remote_root.clone(),
        };

        let rest = if self.remote_root.is_empty() {
            remote_path.strip_prefix('/').ok_or_else(outside)?
        } else {
            let rest = remote_path
                .strip_prefix(self.remote_root.as_str())
                .ok_or_else(outside)?;
            // "/dav2/x" 不属于 "/dav"
            if !rest.is_empty() && !rest.starts_with('/') {
                return Err(outside());
            }
            rest
        };

        let mut local = self.local_root.clone();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(MappingError::InvalidComponent(remote_path.to_string()));
            }
            local.push(segment);
        }

        Ok(local)
    }

    /// 远端路径是否位于远端根目录之下（包含根目录本身）
    pub fn contains_remote(&self, remote_path: &str) -> bool {
        self.to_local(remote_path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(remote_root: &str) -> PathMapper {
        PathMapper::new("/data/sync", remote_root)
    }

    #[test]
    fn test_normalize_remote_root() {
        assert_eq!(normalize_remote_root("/"), "");
        assert_eq!(normalize_remote_root(""), "");
        assert_eq!(normalize_remote_root("/backup/"), "/backup");
        assert_eq!(normalize_remote_root("backup/daily"), "/backup/daily");
    }

    #[test]
    fn test_to_remote_nested_path() {
        let m = mapper("/backup");
        let remote = m.to_remote(Path::new("/data/sync/a/b.txt")).unwrap();
        assert_eq!(remote, "/backup/a/b.txt");
    }

    #[test]
    fn test_to_remote_protocol_root_has_single_slash() {
        let m = mapper("/");
        let remote = m.to_remote(Path::new("/data/sync/x.txt")).unwrap();
        assert_eq!(remote, "/x.txt");
    }

    #[test]
    fn test_to_remote_never_doubles_separator() {
        for root in ["/", "", "/backup/", "backup", "/a/b/"] {
            let m = mapper(root);
            for local in ["/data/sync/x.txt", "/data/sync/d/e/f.bin", "/data/sync"] {
                let remote = m.to_remote(Path::new(local)).unwrap();
                assert!(!remote.contains("//"), "{} -> {}", local, remote);
            }
        }
    }

    #[test]
    fn test_to_remote_root_itself() {
        assert_eq!(mapper("/backup").to_remote(Path::new("/data/sync")).unwrap(), "/backup");
        assert_eq!(mapper("/").to_remote(Path::new("/data/sync")).unwrap(), "/");
    }

    #[test]
    fn test_to_remote_outside_local_root() {
        let err = mapper("/backup")
            .to_remote(Path::new("/data/other/x.txt"))
            .unwrap_err();
        assert!(matches!(err, MappingError::OutsideLocalRoot { .. }));
    }

    #[test]
    fn test_to_remote_rejects_parent_components() {
        let err = mapper("/backup")
            .to_remote(Path::new("/data/sync/../escape.txt"))
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidComponent(_)));
    }

    #[test]
    fn test_to_local_inverse() {
        let m = mapper("/backup");
        assert_eq!(
            m.to_local("/backup/a/b.txt").unwrap(),
            PathBuf::from("/data/sync/a/b.txt")
        );
        assert_eq!(mapper("/").to_local("/a.txt").unwrap(), PathBuf::from("/data/sync/a.txt"));
    }

    #[test]
    fn test_round_trip() {
        let m = mapper("/backup/daily");
        for local in ["/data/sync/x.txt", "/data/sync/deep/er/file name.md"] {
            let local = Path::new(local);
            let remote = m.to_remote(local).unwrap();
            let back = m.to_local(&remote).unwrap();
            assert_eq!(back, local);
            assert_eq!(m.to_remote(&back).unwrap(), remote);
        }
    }

    #[test]
    fn test_to_local_outside_remote_root() {
        let m = mapper("/backup");
        assert!(matches!(
            m.to_local("/other/x.txt"),
            Err(MappingError::OutsideRemoteRoot { .. })
        ));
        // 前缀相同但不是子目录
        assert!(matches!(
            m.to_local("/backup2/x.txt"),
            Err(MappingError::OutsideRemoteRoot { .. })
        ));
        // 大小写不一致同样拒绝
        assert!(m.to_local("/Backup/x.txt").is_err());
    }

    #[test]
    fn test_to_local_rejects_dot_segments() {
        let m = mapper("/backup");
        assert!(matches!(
            m.to_local("/backup/../etc/passwd"),
            Err(MappingError::InvalidComponent(_))
        ));
    }

    #[test]
    fn test_contains_remote() {
        let m = mapper("/backup");
        assert!(m.contains_remote("/backup"));
        assert!(m.contains_remote("/backup/a"));
        assert!(!m.contains_remote("/"));
        assert!(!m.contains_remote("/backupx"));
    }
}
