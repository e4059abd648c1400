use crate::config::SyncMode;
use crate::storage::FileInfo;
use std::collections::{HashMap, HashSet};

/// 同步动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// 上传文件（本地独有，或两侧大小不一致需覆盖）
    Upload { path: String, size: u64 },
    /// 删除远端文件
    Delete { path: String },
    /// 跳过（两侧一致）
    Skip { path: String },
}

impl SyncAction {
    pub fn path(&self) -> &str {
        match self {
            SyncAction::Upload { path, .. } => path,
            SyncAction::Delete { path } => path,
            SyncAction::Skip { path } => path,
        }
    }
}

/// 文件比较器
///
/// 一致性判定只看字节数：路径相同且大小相同即视为已同步。
#[derive(Debug, Default)]
pub struct FileComparator;

impl FileComparator {
    /// 比较两个文件树，返回按执行顺序排序的动作列表
    ///
    /// 纯函数：不做任何 I/O。相同输入总是产出相同顺序的结果。
    pub fn compare_trees(
        &self,
        local: &HashMap<String, FileInfo>,
        remote: &HashMap<String, FileInfo>,
        mode: &SyncMode,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        // 收集所有路径
        let all_paths: HashSet<_> = local.keys().chain(remote.keys()).collect();

        for path in all_paths {
            let action = match (local.get(path), remote.get(path)) {
                // 两边都有
                (Some(src), Some(dst)) => {
                    if src.size == dst.size {
                        SyncAction::Skip { path: path.clone() }
                    } else {
                        SyncAction::Upload {
                            path: path.clone(),
                            size: src.size,
                        }
                    }
                }

                // 只有本地有
                (Some(src), None) => SyncAction::Upload {
                    path: path.clone(),
                    size: src.size,
                },

                // 只有远端有
                (None, Some(_)) => match mode {
                    // 镜像模式：删除远端多余的文件
                    SyncMode::Mirror => SyncAction::Delete { path: path.clone() },
                    // 仅上传模式：保留远端多余的文件
                    SyncMode::Update => SyncAction::Skip { path: path.clone() },
                },

                (None, None) => unreachable!(),
            };

            actions.push(action);
        }

        // 删除排在上传之前，同类按路径字典序，保证结果可复现
        fn order(action: &SyncAction) -> u8 {
            match action {
                SyncAction::Delete { .. } => 0,
                SyncAction::Upload { .. } => 1,
                SyncAction::Skip { .. } => 2,
            }
        }
        actions.sort_by(|a, b| order(a).cmp(&order(b)).then_with(|| a.path().cmp(b.path())));

        actions
    }

    /// 统计同步动作
    pub fn summarize_actions(actions: &[SyncAction]) -> ActionSummary {
        let mut summary = ActionSummary::default();

        for action in actions {
            match action {
                SyncAction::Upload { size, .. } => {
                    summary.upload_count += 1;
                    summary.upload_bytes += size;
                }
                SyncAction::Delete { .. } => summary.delete_count += 1,
                SyncAction::Skip { .. } => summary.skip_count += 1,
            }
        }

        summary
    }
}

/// 动作统计
#[derive(Debug, Clone, Default)]
pub struct ActionSummary {
    pub upload_count: usize,
    pub upload_bytes: u64,
    pub delete_count: usize,
    pub skip_count: usize,
}

impl ActionSummary {
    pub fn total_files(&self) -> usize {
        self.upload_count + self.delete_count + self.skip_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, size: u64) -> (String, FileInfo) {
        (
            path.to_string(),
            FileInfo {
                path: path.to_string(),
                size,
                modified_time: 0,
                is_dir: false,
            },
        )
    }

    fn tree(entries: &[(&str, u64)]) -> HashMap<String, FileInfo> {
        entries.iter().map(|(p, s)| file(p, *s)).collect()
    }

    fn uploads(actions: &[SyncAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                SyncAction::Upload { path, .. } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    fn deletes(actions: &[SyncAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                SyncAction::Delete { path } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_identical_trees_produce_no_work() {
        let local = tree(&[("a.txt", 10), ("b/c.txt", 5)]);
        let remote = tree(&[("a.txt", 10), ("b/c.txt", 5)]);

        let actions = FileComparator.compare_trees(&local, &remote, &SyncMode::Mirror);

        assert!(uploads(&actions).is_empty());
        assert!(deletes(&actions).is_empty());
        assert_eq!(FileComparator::summarize_actions(&actions).skip_count, 2);
    }

    #[test]
    fn test_new_and_stale_files() {
        // 本地新增 a.txt，远端残留 old.txt
        let local = tree(&[("a.txt", 10), ("b/c.txt", 5)]);
        let remote = tree(&[("b/c.txt", 5), ("old.txt", 3)]);

        let actions = FileComparator.compare_trees(&local, &remote, &SyncMode::Mirror);

        assert_eq!(uploads(&actions), vec!["a.txt"]);
        assert_eq!(deletes(&actions), vec!["old.txt"]);
    }

    #[test]
    fn test_size_mismatch_is_reuploaded() {
        let local = tree(&[("x.txt", 100)]);
        let remote = tree(&[("x.txt", 50)]);

        let actions = FileComparator.compare_trees(&local, &remote, &SyncMode::Mirror);

        assert_eq!(uploads(&actions), vec!["x.txt"]);
        assert!(deletes(&actions).is_empty());
    }

    #[test]
    fn test_empty_local_deletes_everything() {
        let local = tree(&[]);
        let remote = tree(&[("y.txt", 1)]);

        let actions = FileComparator.compare_trees(&local, &remote, &SyncMode::Mirror);

        assert!(uploads(&actions).is_empty());
        assert_eq!(deletes(&actions), vec!["y.txt"]);
    }

    #[test]
    fn test_update_mode_keeps_remote_extras() {
        let local = tree(&[("a.txt", 10)]);
        let remote = tree(&[("old.txt", 3)]);

        let actions = FileComparator.compare_trees(&local, &remote, &SyncMode::Update);

        assert_eq!(uploads(&actions), vec!["a.txt"]);
        assert!(deletes(&actions).is_empty());
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let local = tree(&[("b.txt", 1), ("a.txt", 1), ("c.txt", 2)]);
        let remote = tree(&[("z.txt", 9), ("c.txt", 3), ("m.txt", 9)]);

        let first = FileComparator.compare_trees(&local, &remote, &SyncMode::Mirror);
        let second = FileComparator.compare_trees(&local, &remote, &SyncMode::Mirror);

        assert_eq!(first, second);
        // 删除在前，各自按字典序
        assert_eq!(deletes(&first), vec!["m.txt", "z.txt"]);
        assert_eq!(uploads(&first), vec!["a.txt", "b.txt", "c.txt"]);
        assert!(matches!(first[0], SyncAction::Delete { .. }));
    }

    #[test]
    fn test_action_sets_are_disjoint() {
        let local = tree(&[("a.txt", 1), ("b.txt", 2)]);
        let remote = tree(&[("b.txt", 3), ("c.txt", 4)]);

        let actions = FileComparator.compare_trees(&local, &remote, &SyncMode::Mirror);
        let up: HashSet<_> = uploads(&actions).into_iter().collect();
        let del: HashSet<_> = deletes(&actions).into_iter().collect();

        assert!(up.is_disjoint(&del));
        assert_eq!(
            FileComparator::summarize_actions(&actions).total_files(),
            actions.len()
        );
    }
}
