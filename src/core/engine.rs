use crate::config::SyncMode;
use crate::core::comparator::{FileComparator, SyncAction};
use crate::core::scanner::{FileScanner, ScanConfig};
use crate::storage::{join_path, Storage};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 同步配置
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// 扫描配置
    pub scan_config: ScanConfig,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: i64,
    pub finished_at: i64,
    pub dry_run: bool,
    pub files_scanned: u32,
    pub files_uploaded: u32,
    pub files_deleted: u32,
    pub files_skipped: u32,
    pub files_failed: u32,
    pub bytes_transferred: u64,
    pub duration_secs: u64,
    pub errors: Vec<String>,
}

/// 同步引擎
///
/// 扫描两侧、求差、按固定顺序执行：先删除后上传。
/// 远端连接只有一个，所有操作顺序驱动，不做并发。
pub struct SyncEngine {
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self { config }
    }

    /// 计算差异但不执行
    pub async fn plan(
        &self,
        source: &dyn Storage,
        dest: &dyn Storage,
        prefix: Option<&str>,
        mode: &SyncMode,
    ) -> Result<(Vec<SyncAction>, u32)> {
        let scanner = FileScanner::with_config(self.config.scan_config.clone());

        let local_tree = scanner.scan_storage(source, prefix).await?;
        let remote_tree = scanner.scan_storage(dest, prefix).await?;

        let files_scanned = (local_tree.len() + remote_tree.len()) as u32;
        let actions = FileComparator.compare_trees(&local_tree, &remote_tree, mode);

        Ok((actions, files_scanned))
    }

    /// 运行一次同步
    pub async fn run(
        &self,
        source: Arc<dyn Storage>,
        dest: Arc<dyn Storage>,
        prefix: Option<&str>,
        mode: &SyncMode,
        dry_run: bool,
    ) -> Result<SyncReport> {
        let started_at = chrono::Utc::now().timestamp();

        info!("开始同步: {} -> {}", source.name(), dest.name());
        if dry_run {
            info!("试运行模式：不会对远端做任何修改");
        }

        let (actions, files_scanned) = self
            .plan(source.as_ref(), dest.as_ref(), prefix, mode)
            .await?;
        let summary = FileComparator::summarize_actions(&actions);

        info!(
            "差异计算完成: 上传 {} 个 ({} 字节), 删除 {} 个, 跳过 {} 个",
            summary.upload_count, summary.upload_bytes, summary.delete_count, summary.skip_count
        );

        let mut report = SyncReport {
            started_at,
            finished_at: started_at,
            dry_run,
            files_scanned,
            files_uploaded: 0,
            files_deleted: 0,
            files_skipped: summary.skip_count as u32,
            files_failed: 0,
            bytes_transferred: 0,
            duration_secs: 0,
            errors: Vec::new(),
        };

        let base = prefix.unwrap_or("");

        // 固定顺序：先删除，后上传
        for action in &actions {
            if let SyncAction::Delete { path } = action {
                let remote_path = join_path(base, path);

                if dry_run {
                    info!("[试运行] 删除: {}", remote_path);
                    report.files_deleted += 1;
                    continue;
                }

                match dest.delete(&remote_path).await {
                    Ok(()) => {
                        info!("已删除: {}", remote_path);
                        report.files_deleted += 1;
                    }
                    Err(e) => {
                        // 单个删除失败不终止整批
                        warn!("删除失败: {}: {}", remote_path, e);
                        report.files_failed += 1;
                        report.errors.push(format!("删除 {}: {}", remote_path, e));
                    }
                }
            }
        }

        for action in &actions {
            if let SyncAction::Upload { path, size } = action {
                let full_path = join_path(base, path);

                if dry_run {
                    info!("[试运行] 上传: {} ({} 字节)", full_path, size);
                    report.files_uploaded += 1;
                    report.bytes_transferred += size;
                    continue;
                }

                match Self::upload_one(source.as_ref(), dest.as_ref(), &full_path).await {
                    Ok(bytes) => {
                        debug!("已上传: {} ({} 字节)", full_path, bytes);
                        report.files_uploaded += 1;
                        report.bytes_transferred += bytes;
                    }
                    Err(e) => {
                        warn!("上传失败: {}: {}", full_path, e);
                        report.files_failed += 1;
                        report.errors.push(format!("上传 {}: {}", full_path, e));
                    }
                }
            }
        }

        report.finished_at = chrono::Utc::now().timestamp();
        report.duration_secs = (report.finished_at - report.started_at).max(0) as u64;

        info!(
            "同步完成: 上传 {}, 删除 {}, 失败 {}",
            report.files_uploaded, report.files_deleted, report.files_failed
        );

        Ok(report)
    }

    /// 执行单个上传：读源文件字节写入远端，父目录由写入方按需建立
    async fn upload_one(
        source: &dyn Storage,
        dest: &dyn Storage,
        path: &str,
    ) -> Result<u64> {
        let data = source.read(path).await?;
        let bytes = data.len() as u64;
        dest.write(path, data).await?;
        Ok(bytes)
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    async fn seed(storage: &LocalStorage, files: &[(&str, usize)]) {
        for (path, size) in files {
            storage.write(path, vec![b'x'; *size]).await.unwrap();
        }
    }

    fn open(dir: &TempDir) -> Arc<LocalStorage> {
        Arc::new(LocalStorage::new(dir.path().to_str().unwrap()).unwrap())
    }

    #[tokio::test]
    async fn test_mirror_applies_plan_and_is_idempotent() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let source = open(&local_dir);
        let dest = open(&remote_dir);

        seed(&source, &[("a.txt", 10), ("b/c.txt", 5)]).await;
        seed(&dest, &[("b/c.txt", 5), ("old.txt", 3)]).await;

        let engine = SyncEngine::new();
        let report = engine
            .run(source.clone(), dest.clone(), None, &SyncMode::Mirror, false)
            .await
            .unwrap();

        assert_eq!(report.files_uploaded, 1);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.files_failed, 0);
        assert_eq!(report.bytes_transferred, 10);
        assert!(dest.exists("a.txt").await.unwrap());
        assert!(!dest.exists("old.txt").await.unwrap());

        // 再跑一遍应当无事可做
        let (actions, _) = engine
            .plan(source.as_ref(), dest.as_ref(), None, &SyncMode::Mirror)
            .await
            .unwrap();
        let summary = FileComparator::summarize_actions(&actions);
        assert_eq!(summary.upload_count, 0);
        assert_eq!(summary.delete_count, 0);
    }

    #[tokio::test]
    async fn test_size_mismatch_overwrites_remote() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let source = open(&local_dir);
        let dest = open(&remote_dir);

        seed(&source, &[("x.txt", 100)]).await;
        seed(&dest, &[("x.txt", 50)]).await;

        let report = SyncEngine::new()
            .run(source, dest.clone(), None, &SyncMode::Mirror, false)
            .await
            .unwrap();

        assert_eq!(report.files_uploaded, 1);
        assert_eq!(dest.read("x.txt").await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let source = open(&local_dir);
        let dest = open(&remote_dir);

        seed(&source, &[("a.txt", 10)]).await;
        seed(&dest, &[("old.txt", 3)]).await;

        let engine = SyncEngine::new();
        let report = engine
            .run(source.clone(), dest.clone(), None, &SyncMode::Mirror, true)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.files_uploaded, 1);
        assert_eq!(report.files_deleted, 1);
        assert!(!dest.exists("a.txt").await.unwrap());
        assert!(dest.exists("old.txt").await.unwrap());

        // 试运行后重新计算，差异应与第一次一致
        let (actions, _) = engine
            .plan(source.as_ref(), dest.as_ref(), None, &SyncMode::Mirror)
            .await
            .unwrap();
        let summary = FileComparator::summarize_actions(&actions);
        assert_eq!(summary.upload_count, 1);
        assert_eq!(summary.delete_count, 1);
    }

    #[tokio::test]
    async fn test_update_mode_never_deletes() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let source = open(&local_dir);
        let dest = open(&remote_dir);

        seed(&source, &[("new.txt", 7)]).await;
        seed(&dest, &[("keep.txt", 3)]).await;

        let report = SyncEngine::new()
            .run(source, dest.clone(), None, &SyncMode::Update, false)
            .await
            .unwrap();

        assert_eq!(report.files_uploaded, 1);
        assert_eq!(report.files_deleted, 0);
        assert!(dest.exists("new.txt").await.unwrap());
        assert!(dest.exists("keep.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_with_prefix() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let source = open(&local_dir);
        let dest = open(&remote_dir);

        seed(&source, &[("site/page.html", 4), ("other/skip.txt", 2)]).await;

        let report = SyncEngine::new()
            .run(source, dest.clone(), Some("site"), &SyncMode::Mirror, false)
            .await
            .unwrap();

        assert_eq!(report.files_uploaded, 1);
        assert!(dest.exists("site/page.html").await.unwrap());
        assert!(!dest.exists("other/skip.txt").await.unwrap());
    }
}
