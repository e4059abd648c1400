//! 传输类子命令：upload / download / list / delete-all

use crate::config::MirrorConfig;
use crate::core::scanner::FileScanner;
use crate::storage::{create_storage, join_path, Storage};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 把命令行给的本地路径换算成相对 local_root 的路径
fn relative_to_root(config: &MirrorConfig, path: &str) -> Result<String> {
    let root = Path::new(&config.local_root)
        .canonicalize()
        .with_context(|| format!("本地根目录不存在: {}", config.local_root))?;

    let given = Path::new(path);
    let abs = if given.is_absolute() {
        given.to_path_buf()
    } else {
        std::env::current_dir()?.join(given)
    };
    let abs = abs
        .canonicalize()
        .with_context(|| format!("本地路径不存在: {}", path))?;

    let rel = abs
        .strip_prefix(&root)
        .map_err(|_| anyhow::anyhow!("只能上传本地根目录内的文件: {}", path))?;

    Ok(rel.to_string_lossy().replace('\\', "/"))
}

/// 上传单个文件或整个目录子树
pub async fn upload(
    config: &MirrorConfig,
    local_path: &str,
    remote_path: Option<&str>,
) -> Result<()> {
    let source = create_storage(&config.local_storage()).await?;
    let dest = create_storage(&config.remote_storage()).await?;

    let rel = relative_to_root(config, local_path)?;
    let abs = Path::new(&config.local_root).join(&rel);

    if abs.is_file() {
        let target = remote_path
            .map(|p| p.trim_start_matches('/').to_string())
            .unwrap_or_else(|| rel.clone());
        let data = source.read(&rel).await?;
        let bytes = data.len();
        dest.write(&target, data).await?;
        info!("已上传: {} -> {} ({} 字节)", rel, target, bytes);
        println!("已上传 1 个文件");
        return Ok(());
    }

    if !abs.is_dir() {
        bail!("本地路径不存在: {}", local_path);
    }

    // 目录：扫描子树后逐个上传，单个失败不终止整批
    let scanner = FileScanner::with_config(config.scan_config());
    let prefix = if rel.is_empty() { None } else { Some(rel.as_str()) };
    let tree = scanner.scan_storage(source.as_ref(), prefix).await?;

    let mut keys: Vec<_> = tree.keys().cloned().collect();
    keys.sort();

    let mut uploaded = 0usize;
    let mut failed = 0usize;
    for key in keys {
        let full = join_path(&rel, &key);
        let result = async {
            let data = source.read(&full).await?;
            dest.write(&full, data).await?;
            Ok::<_, crate::storage::StorageError>(())
        }
        .await;

        match result {
            Ok(()) => {
                info!("已上传: {}", full);
                uploaded += 1;
            }
            Err(e) => {
                warn!("上传失败: {}: {}", full, e);
                failed += 1;
            }
        }
    }

    println!("已上传 {} 个文件, {} 个失败", uploaded, failed);
    if failed > 0 {
        bail!("{} 个文件上传失败", failed);
    }
    Ok(())
}

/// 下载远端文件到本地
pub async fn download(config: &MirrorConfig, remote_path: &str, local_path: &str) -> Result<()> {
    let dest = create_storage(&config.remote_storage()).await?;

    let data = dest.read(remote_path.trim_start_matches('/')).await?;

    let target = Path::new(local_path);
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(target, &data).await?;

    println!("已下载: {} -> {} ({} 字节)", remote_path, local_path, data.len());
    Ok(())
}

/// 列出远端目录（单层）
pub async fn list(config: &MirrorConfig, path: Option<&str>) -> Result<()> {
    let dest = create_storage(&config.remote_storage()).await?;

    let dir = path.unwrap_or("").trim_matches('/');
    let mut entries = dest.list_dir(dir).await?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    for entry in &entries {
        let kind = if entry.is_dir { "d" } else { "-" };
        println!("{} {:>12}  {}", kind, entry.size, entry.path);
    }
    println!(
        "{} 个条目于 {}",
        entries.len(),
        if dir.is_empty() { "/" } else { dir }
    );

    Ok(())
}

/// 递归删除远端目录下的全部内容，必须显式 --yes 确认
pub async fn delete_all(config: &MirrorConfig, path: Option<&str>, yes: bool) -> Result<()> {
    let base = path.unwrap_or("").trim_matches('/').to_string();

    if !yes {
        bail!(
            "该操作会删除远端 {} 下的全部内容，确认请加 --yes",
            if base.is_empty() { "/" } else { &base }
        );
    }

    let dest: Arc<dyn Storage> = create_storage(&config.remote_storage()).await?;

    let mut stack = vec![base.clone()];
    let mut dirs = Vec::new();
    let mut deleted = 0usize;
    let mut failed = 0usize;

    while let Some(dir) = stack.pop() {
        let entries = match dest.list_dir(&dir).await {
            Ok(v) => v,
            Err(e) => {
                warn!("列目录失败: {}: {}", dir, e);
                continue;
            }
        };

        for entry in entries {
            if entry.is_dir {
                stack.push(entry.path.clone());
                dirs.push(entry.path);
            } else {
                match dest.delete(&entry.path).await {
                    Ok(()) => {
                        info!("已删除: {}", entry.path);
                        deleted += 1;
                    }
                    Err(e) => {
                        warn!("删除失败: {}: {}", entry.path, e);
                        failed += 1;
                    }
                }
            }
        }
    }

    // 目录从最深层开始删
    dirs.sort_by(|a, b| {
        b.matches('/')
            .count()
            .cmp(&a.matches('/').count())
            .then_with(|| b.cmp(a))
    });
    for dir in dirs {
        if let Err(e) = dest.delete(&format!("{}/", dir)).await {
            warn!("删除目录失败: {}: {}", dir, e);
        }
    }

    println!("删除完成: {} 个文件, {} 个失败", deleted, failed);
    if failed > 0 {
        bail!("{} 个删除失败", failed);
    }
    Ok(())
}
