pub mod ftp;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ftp::FtpStorage;
pub use local::LocalStorage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 文件信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub modified_time: i64,
    pub is_dir: bool,
}

/// 文件元数据（用于快速检查）
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub size: u64,
    pub modified_time: i64,
    pub is_dir: bool,
}

/// 存储层错误分类
#[derive(Debug, Error)]
pub enum StorageError {
    /// 凭据被拒绝，无法继续
    #[error("认证失败: {0}")]
    Auth(String),
    /// 服务器不可达或连接中断
    #[error("网络错误: {0}")]
    Network(String),
    #[error("路径不存在: {0}")]
    NotFound(String),
    #[error("权限不足: {0}")]
    Permission(String),
    #[error("本地 IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("存储错误: {0}")]
    Other(String),
}

impl StorageError {
    /// 将 opendal 错误映射到统一分类，附带出错路径
    fn from_opendal(err: opendal::Error, path: &str) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            opendal::ErrorKind::PermissionDenied => {
                Self::Permission(format!("{}: {}", path, err))
            }
            _ => Self::Other(format!("{}: {}", path, err)),
        }
    }
}

/// 存储抽象接口
///
/// 远端以显式路径参数访问，不依赖"当前目录"游标。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 列出单层目录内容，路径相对存储根
    async fn list_dir(&self, path: &str) -> Result<Vec<FileInfo>, StorageError>;

    /// 获取文件元数据，路径不存在返回 None
    async fn stat(&self, path: &str) -> Result<Option<FileMeta>, StorageError>;

    /// 读取整个文件
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// 写入整个文件，必要时先建立父目录链
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// 删除文件或目录，路径不存在视为成功
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// 创建目录（幂等）
    async fn create_dir(&self, path: &str) -> Result<(), StorageError>;

    /// 检查文件是否存在
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.stat(path).await?.is_some())
    }

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 拼接存储路径并压掉重复斜杠，返回相对存储根的路径
pub fn join_path(base: &str, rel: &str) -> String {
    let joined = format!(
        "{}/{}",
        base.trim_matches('/'),
        rel.trim_start_matches('/')
    );
    let mut out = String::with_capacity(joined.len());
    let mut prev_slash = false;
    for c in joined.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out.trim_start_matches('/').to_string()
}

/// 根据配置创建存储实例
pub async fn create_storage(
    config: &crate::config::StorageConfig,
) -> Result<std::sync::Arc<dyn Storage>, StorageError> {
    use crate::config::StorageType;

    match config.typ {
        StorageType::Local => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| StorageError::Other("本地存储缺少 path 配置".to_string()))?;
            tracing::debug!("初始化本地存储: {}", path);
            Ok(std::sync::Arc::new(LocalStorage::new(path)?) as std::sync::Arc<dyn Storage>)
        }
        StorageType::Ftp => {
            let host = config
                .host
                .as_ref()
                .ok_or_else(|| StorageError::Other("FTP 存储缺少 host 配置".to_string()))?;
            let username = config
                .username
                .as_ref()
                .ok_or_else(|| StorageError::Other("FTP 存储缺少 username 配置".to_string()))?;
            let password = config.password.as_ref().ok_or_else(|| {
                StorageError::Other(
                    "缺少 FTP 密码（配置文件 password 字段、--password 或 FTPMIRROR_PASSWORD 环境变量）"
                        .to_string(),
                )
            })?;
            let port = config.port.unwrap_or(21);
            tracing::info!("连接 FTP 服务器: {}:{}", host, port);
            Ok(std::sync::Arc::new(
                FtpStorage::new(
                    host,
                    port,
                    username,
                    password,
                    config.secure.unwrap_or(true),
                    config.root.clone(),
                )
                .await?,
            ) as std::sync::Arc<dyn Storage>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a.txt"), "a.txt");
        assert_eq!(join_path("/", "a.txt"), "a.txt");
        assert_eq!(join_path("sub", "b/c.txt"), "sub/b/c.txt");
        assert_eq!(join_path("sub/", "/b/c.txt"), "sub/b/c.txt");
        assert_eq!(join_path("/sub//dir/", "x//y.txt"), "sub/dir/x/y.txt");
    }
}
