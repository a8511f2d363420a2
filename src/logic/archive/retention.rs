//! Archive Retention Sweep
//!
//! Walks the archive tree breadth-first, one directory level at a time, with
//! at most `workers` directories open concurrently, and deletes files whose
//! modification time is older than the retention window. Individual failures
//! are logged and counted, never returned.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use futures::stream::{self, StreamExt};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Files inspected
    pub scanned: usize,
    /// Files deleted
    pub pruned: usize,
    /// Entries or directories that could not be processed
    pub failed: usize,
}

#[derive(Default)]
struct DirScan {
    subdirs: Vec<PathBuf>,
    report: PruneReport,
}

pub async fn prune_expired(root: &Path, retention: Duration, workers: usize) -> PruneReport {
    let mut report = PruneReport::default();

    if !tokio::fs::try_exists(root).await.unwrap_or(false) {
        return report;
    }

    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut level = vec![root.to_path_buf()];
    while !level.is_empty() {
        let scans: Vec<DirScan> = stream::iter(level)
            .map(|dir| scan_dir(dir, cutoff))
            .buffer_unordered(workers.max(1))
            .collect()
            .await;

        let mut next = Vec::new();
        for scan in scans {
            report.scanned += scan.report.scanned;
            report.pruned += scan.report.pruned;
            report.failed += scan.report.failed;
            next.extend(scan.subdirs);
        }
        level = next;
    }

    tracing::info!(
        "🧹 Archive sweep of {}: {} scanned, {} pruned, {} failed",
        root.display(),
        report.scanned,
        report.pruned,
        report.failed
    );
    report
}

async fn scan_dir(dir: PathBuf, cutoff: SystemTime) -> DirScan {
    let mut scan = DirScan::default();

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Failed to read archive dir {} for pruning: {}", dir.display(), e);
            scan.report.failed += 1;
            return scan;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to list {}: {}", dir.display(), e);
                scan.report.failed += 1;
                break;
            }
        };

        let path = entry.path();
        // Symlinks are left alone
        let file_type = match entry.file_type().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Failed to stat {}: {}", path.display(), e);
                scan.report.failed += 1;
                continue;
            }
        };

        if file_type.is_dir() {
            scan.subdirs.push(path);
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        scan.report.scanned += 1;

        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(time) => time,
            Err(e) => {
                tracing::warn!("Failed to read mtime of {}: {}", path.display(), e);
                scan.report.failed += 1;
                continue;
            }
        };

        if modified >= cutoff {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Pruned archived file {}", path.display());
                scan.report.pruned += 1;
            }
            Err(e) => {
                tracing::error!("Failed to prune archived file {}: {}", path.display(), e);
                scan.report.failed += 1;
            }
        }
    }

    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn write_aged(path: &Path, age: Duration) {
        fs::write(path, b"sample").unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_prunes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archive");
        let success = root.join("success");
        let nested = root.join("error").join("2024").join("01");
        fs::create_dir_all(&success).unwrap();
        fs::create_dir_all(&nested).unwrap();

        let old_top = success.join("old.exe");
        let fresh_top = success.join("fresh.exe");
        let old_deep = nested.join("old.msi");
        write_aged(&old_top, 40 * DAY);
        write_aged(&fresh_top, DAY);
        write_aged(&old_deep, 31 * DAY);

        let report = prune_expired(&root, 30 * DAY, 2).await;

        assert_eq!(report, PruneReport { scanned: 3, pruned: 2, failed: 0 });
        assert!(!old_top.exists());
        assert!(!old_deep.exists());
        assert!(fresh_top.exists());
        // Directories are kept
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn test_missing_root_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let report = prune_expired(&dir.path().join("nope"), 30 * DAY, 4).await;
        assert_eq!(report, PruneReport::default());
    }

    #[tokio::test]
    async fn test_wide_tree_with_single_worker() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archive");
        for i in 0..20 {
            let sub = root.join(format!("batch-{}", i));
            fs::create_dir_all(&sub).unwrap();
            write_aged(&sub.join("sample.exe"), 60 * DAY);
        }

        let report = prune_expired(&root, 30 * DAY, 1).await;

        assert_eq!(report.scanned, 20);
        assert_eq!(report.pruned, 20);
    }
}
