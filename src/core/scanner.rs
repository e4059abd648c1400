use crate::storage::{FileInfo, Storage};
use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// 文件扫描器配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 排除规则（glob patterns 或文件/目录名精确匹配）
    pub exclude_patterns: Vec<String>,
    /// 最大文件大小（0 表示不限制）
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                // 常见的排除模式
                ".git/**".to_string(),
                ".svn/**".to_string(),
                "__pycache__/**".to_string(),
                "node_modules/**".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "*.tmp".to_string(),
                "~*".to_string(),
            ],
            max_file_size: 0,
        }
    }
}

/// 文件扫描器
///
/// 在存储接口之上做迭代式深度优先遍历，产出"相对路径 -> 文件信息"的树快照。
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 检查路径是否应该被排除
    fn should_exclude(&self, path: &str) -> bool {
        self.config
            .exclude_patterns
            .iter()
            .any(|pattern| Self::matches_pattern(path, pattern))
    }

    /// 简单的 glob 模式匹配
    fn matches_pattern(path: &str, pattern: &str) -> bool {
        let path = path.to_lowercase();
        let pattern = pattern.to_lowercase();

        // 处理 ** 通配符
        if pattern.contains("**") {
            let parts: Vec<&str> = pattern.split("**").collect();
            if parts.len() == 2 {
                let prefix = parts[0].trim_end_matches('/');
                let suffix = parts[1].trim_start_matches('/');

                if prefix.is_empty() && suffix.is_empty() {
                    return true;
                }

                if !prefix.is_empty() && !path.starts_with(prefix) {
                    return false;
                }

                if !suffix.is_empty() && !path.ends_with(suffix) {
                    return false;
                }

                return true;
            }
        }

        // 处理 * 通配符
        if pattern.contains('*') {
            let regex_pattern = pattern.replace('.', "\\.").replace('*', ".*");

            if let Ok(re) = regex::Regex::new(&format!("^{}$", regex_pattern)) {
                return re.is_match(&path);
            }
        }

        // 精确匹配（整个相对路径或最后一段）
        path == pattern || path.ends_with(&format!("/{}", pattern))
    }

    /// 扫描存储并返回文件树
    ///
    /// 键为相对 prefix 的路径；单个目录列举失败只丢掉该子树，不终止整体扫描。
    pub async fn scan_storage(
        &self,
        storage: &dyn Storage,
        prefix: Option<&str>,
    ) -> Result<HashMap<String, FileInfo>> {
        let base = prefix.unwrap_or("").trim_matches('/').to_string();
        info!(
            "开始扫描存储: {}, 起点: {}",
            storage.name(),
            if base.is_empty() { "/" } else { &base }
        );

        let mut tree = HashMap::new();
        let mut excluded_count = 0usize;
        let mut failed_dirs = 0usize;
        let mut stack = vec![base.clone()];

        while let Some(dir) = stack.pop() {
            let entries = match storage.list_dir(&dir).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "列目录失败（跳过该子树）: {}: {}",
                        if dir.is_empty() { "/" } else { &dir },
                        e
                    );
                    failed_dirs += 1;
                    continue;
                }
            };

            for entry in entries {
                let rel = Self::strip_base(&entry.path, &base);

                // 检查排除规则（目录命中则整棵子树剪掉）
                if self.should_exclude(&rel) {
                    debug!("排除: {}", entry.path);
                    excluded_count += 1;
                    continue;
                }

                if entry.is_dir {
                    stack.push(entry.path.clone());
                    continue;
                }

                // 检查文件大小
                if self.config.max_file_size > 0 && entry.size > self.config.max_file_size {
                    debug!("跳过大文件: {} ({})", entry.path, entry.size);
                    excluded_count += 1;
                    continue;
                }

                tree.insert(rel, entry);
            }
        }

        info!(
            "扫描完成: {} 个文件, {} 个被排除, {} 个目录列举失败",
            tree.len(),
            excluded_count,
            failed_dirs
        );

        Ok(tree)
    }

    /// 去掉扫描起点前缀，得到树内的相对键
    ///
    /// 只在完整路径段边界上剥前缀："sub" 不会吃掉 "subway.txt"。
    fn strip_base(path: &str, base: &str) -> String {
        if base.is_empty() {
            return path.to_string();
        }
        match path.strip_prefix(base) {
            Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
            _ => path.to_string(),
        }
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    #[test]
    fn test_matches_pattern() {
        assert!(FileScanner::matches_pattern(".git/config", ".git/**"));
        assert!(FileScanner::matches_pattern(
            "node_modules/pkg/index.js",
            "node_modules/**"
        ));
        assert!(FileScanner::matches_pattern("cache.tmp", "*.tmp"));
        assert!(FileScanner::matches_pattern("sub/dir/.DS_Store", ".DS_Store"));
        assert!(FileScanner::matches_pattern("notes.txt", "notes.txt"));
        assert!(!FileScanner::matches_pattern("notes.txt", "other.txt"));
    }

    #[test]
    fn test_strip_base_keeps_segment_boundaries() {
        assert_eq!(FileScanner::strip_base("sub/a.txt", "sub"), "a.txt");
        assert_eq!(FileScanner::strip_base("subway.txt", "sub"), "subway.txt");
        assert_eq!(FileScanner::strip_base("a.txt", ""), "a.txt");
    }

    #[test]
    fn test_should_exclude_defaults() {
        let scanner = FileScanner::new();
        assert!(scanner.should_exclude(".git/HEAD"));
        assert!(scanner.should_exclude("assets/.DS_Store"));
        assert!(scanner.should_exclude("build/out.tmp"));
        assert!(!scanner.should_exclude("index.html"));
    }

    #[tokio::test]
    async fn test_scan_storage_builds_relative_tree() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();
        storage.write("index.html", vec![0; 10]).await.unwrap();
        storage.write("assets/site.css", vec![0; 5]).await.unwrap();
        storage.write(".git/HEAD", vec![0; 3]).await.unwrap();

        let scanner = FileScanner::new();
        let tree = scanner.scan_storage(&storage, None).await.unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree["index.html"].size, 10);
        assert_eq!(tree["assets/site.css"].size, 5);
        assert!(!tree.contains_key(".git/HEAD"));
    }

    #[tokio::test]
    async fn test_scan_storage_with_prefix() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();
        storage.write("sub/a.txt", vec![0; 1]).await.unwrap();
        storage.write("sub/deep/b.txt", vec![0; 2]).await.unwrap();
        storage.write("other.txt", vec![0; 3]).await.unwrap();

        let scanner = FileScanner::new();
        let tree = scanner.scan_storage(&storage, Some("sub")).await.unwrap();

        assert_eq!(tree.len(), 2);
        assert!(tree.contains_key("a.txt"));
        assert!(tree.contains_key("deep/b.txt"));
    }

    #[tokio::test]
    async fn test_scan_missing_root_yields_empty_tree() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();

        let scanner = FileScanner::new();
        let tree = scanner
            .scan_storage(&storage, Some("does/not/exist"))
            .await
            .unwrap();

        assert!(tree.is_empty());
    }
}
