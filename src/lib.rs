pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod storage;

pub use config::{MirrorConfig, StorageConfig, StorageType, SyncMode};
pub use core::{SyncEngine, SyncReport};
pub use storage::{FileInfo, Storage, StorageError};

/// 平台相关目录
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }
    }
}
