//! 应用配置模块
//!
//! 所有连接参数和排除规则都来自显式配置：配置文件提供默认值，
//! 命令行和环境变量在启动时覆盖一次，之后不再变化。

use crate::core::scanner::ScanConfig;
use crate::logging::LogConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 存储类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    Ftp,
}

/// 同步模式
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// 镜像：删除远端多余文件
    Mirror,
    /// 仅上传：保留远端多余文件
    Update,
}

/// 单个存储端的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub typ: StorageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl StorageConfig {
    /// 本地目录存储
    pub fn local(path: &str) -> Self {
        Self {
            typ: StorageType::Local,
            path: Some(path.to_string()),
            host: None,
            port: None,
            username: None,
            password: None,
            secure: None,
            root: None,
        }
    }
}

/// 站点镜像配置（配置文件的顶层结构）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    /// FTP 主机名
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// 密码可以留空，由 --password 或 FTPMIRROR_PASSWORD 提供
    #[serde(default)]
    pub password: Option<String>,
    /// 使用 FTPS（显式 TLS）
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default = "default_remote_root")]
    pub remote_root: String,
    #[serde(default = "default_local_root")]
    pub local_root: String,
    /// 排除规则，留空使用内置默认
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_port() -> u16 {
    21
}

fn default_secure() -> bool {
    true
}

fn default_remote_root() -> String {
    "/".to_string()
}

fn default_local_root() -> String {
    ".".to_string()
}

impl MirrorConfig {
    /// 从配置文件加载；未给路径时依次尝试 ./ftpmirror.json 和用户配置目录
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()
                .context("未找到配置文件，请创建 ftpmirror.json 或用 --config 指定")?,
        };

        let content =
            fs::read_to_string(&file).with_context(|| format!("读取配置文件失败: {:?}", file))?;
        let config: MirrorConfig = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {:?}", file))?;

        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        let cwd = PathBuf::from("ftpmirror.json");
        if cwd.exists() {
            return Some(cwd);
        }
        let global = crate::dirs::config_dir()?
            .join("ftpmirror")
            .join("config.json");
        if global.exists() {
            Some(global)
        } else {
            None
        }
    }

    /// 远端存储配置
    pub fn remote_storage(&self) -> StorageConfig {
        StorageConfig {
            typ: StorageType::Ftp,
            path: None,
            host: Some(self.host.clone()),
            port: Some(self.port),
            username: Some(self.username.clone()),
            password: self.password.clone(),
            secure: Some(self.secure),
            root: Some(self.remote_root.clone()),
        }
    }

    /// 本地存储配置
    pub fn local_storage(&self) -> StorageConfig {
        StorageConfig::local(&self.local_root)
    }

    /// 扫描配置（excludes 留空时落回内置默认）
    pub fn scan_config(&self) -> ScanConfig {
        if self.excludes.is_empty() {
            ScanConfig::default()
        } else {
            ScanConfig {
                exclude_patterns: self.excludes.clone(),
                ..ScanConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: MirrorConfig = serde_json::from_str(
            r#"{"host": "ftp.example.com", "username": "deploy"}"#,
        )
        .unwrap();

        assert_eq!(config.port, 21);
        assert!(config.secure);
        assert_eq!(config.remote_root, "/");
        assert_eq!(config.local_root, ".");
        assert!(config.password.is_none());
        assert!(config.excludes.is_empty());
        assert!(config.log.enabled);
    }

    #[test]
    fn test_full_config_roundtrip() {
        let config: MirrorConfig = serde_json::from_str(
            r#"{
                "host": "ftp.example.com",
                "port": 2121,
                "username": "deploy",
                "password": "secret",
                "secure": false,
                "remoteRoot": "/public_html",
                "localRoot": "./site",
                "excludes": ["*.bak"],
                "log": {"enabled": false, "maxSizeMb": 1, "level": "debug"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 2121);
        assert!(!config.secure);
        assert_eq!(config.remote_storage().root.as_deref(), Some("/public_html"));
        assert_eq!(config.local_storage().path.as_deref(), Some("./site"));
        assert_eq!(config.scan_config().exclude_patterns, vec!["*.bak"]);
        assert!(!config.log.enabled);
        assert_eq!(config.log.level, "debug");
    }
}
