//! 同步类子命令：compare / mirror / deploy

use crate::config::{MirrorConfig, SyncMode};
use crate::core::engine::{SyncConfig, SyncEngine, SyncReport};
use crate::core::scanner::FileScanner;
use crate::storage::{create_storage, Storage};
use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;

/// 打开本地和远端两个存储
async fn open_storages(config: &MirrorConfig) -> Result<(Arc<dyn Storage>, Arc<dyn Storage>)> {
    let source = create_storage(&config.local_storage()).await?;
    let dest = create_storage(&config.remote_storage()).await?;
    Ok((source, dest))
}

fn engine_for(config: &MirrorConfig) -> SyncEngine {
    SyncEngine::with_config(SyncConfig {
        scan_config: config.scan_config(),
    })
}

/// 比较本地与远端文件树，只打印差异报告
pub async fn compare(config: &MirrorConfig, path: Option<&str>) -> Result<()> {
    let (source, dest) = open_storages(config).await?;
    let scanner = FileScanner::with_config(config.scan_config());

    let local = scanner.scan_storage(source.as_ref(), path).await?;
    let remote = scanner.scan_storage(dest.as_ref(), path).await?;

    let all_keys: BTreeSet<_> = local.keys().chain(remote.keys()).collect();

    let mut only_local = Vec::new();
    let mut only_remote = Vec::new();
    let mut size_mismatch = Vec::new();

    for key in all_keys {
        match (local.get(key), remote.get(key)) {
            (Some(_), None) => only_local.push(key),
            (None, Some(_)) => only_remote.push(key),
            (Some(l), Some(r)) if l.size != r.size => size_mismatch.push((key, l.size, r.size)),
            _ => {}
        }
    }

    println!("=== 差异报告 ===");
    println!("本地 {} 个文件, 远端 {} 个文件", local.len(), remote.len());

    if only_local.is_empty() {
        println!("\n[仅本地]: 无");
    } else {
        println!("\n[仅本地] (服务器缺少):");
        for key in &only_local {
            println!("  + {}", key);
        }
    }

    if only_remote.is_empty() {
        println!("\n[仅远端]: 无");
    } else {
        println!("\n[仅远端] (服务器多余):");
        for key in &only_remote {
            println!("  - {}", key);
        }
    }

    if size_mismatch.is_empty() {
        println!("\n[大小不一致]: 无");
    } else {
        println!("\n[大小不一致] (可能已修改):");
        for (key, local_size, remote_size) in &size_mismatch {
            println!("  * {} (本地: {}b | 远端: {}b)", key, local_size, remote_size);
        }
    }

    Ok(())
}

/// 镜像同步：上传新增/变更文件，删除远端多余文件
pub async fn mirror(config: &MirrorConfig, path: Option<&str>, dry_run: bool) -> Result<()> {
    let (source, dest) = open_storages(config).await?;
    let report = engine_for(config)
        .run(source, dest, path, &SyncMode::Mirror, dry_run)
        .await?;
    print_report(&report);
    if report.files_failed > 0 {
        anyhow::bail!("{} 个操作失败", report.files_failed);
    }
    Ok(())
}

/// 部署：仅上传新增/变更文件，远端多余文件保留
pub async fn deploy(config: &MirrorConfig, dry_run: bool) -> Result<()> {
    let (source, dest) = open_storages(config).await?;
    let report = engine_for(config)
        .run(source, dest, None, &SyncMode::Update, dry_run)
        .await?;
    print_report(&report);
    if report.files_failed > 0 {
        anyhow::bail!("{} 个操作失败", report.files_failed);
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[试运行] " } else { "" };
    println!(
        "{}同步完成: 上传 {} 个 ({} 字节), 删除 {} 个, 跳过 {} 个, 失败 {} 个, 耗时 {}s",
        prefix,
        report.files_uploaded,
        report.bytes_transferred,
        report.files_deleted,
        report.files_skipped,
        report.files_failed,
        report.duration_secs
    );
    for error in &report.errors {
        println!("  ! {}", error);
    }
}
