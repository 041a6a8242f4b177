//! Maintenance sweeper — retention cleanup of orphaned staging directories.
//!
//! A coarse backstop for local evidence left behind by failed runs: any
//! claim-named directory whose modification time is older than the
//! retention threshold is force-deleted, whether or not a fulfillment
//! record exists for it. Directories modified inside the retention window
//! are skipped, which also keeps the sweeper away from a claim the
//! orchestrator is actively staging into.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SweeperConfig;
use crate::ids::ClaimId;

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub deleted_dirs: usize,
    pub deleted_files: usize,
}

/// Scans the staging root and deletes expired claim directories.
pub struct Sweeper {
    staging_root: PathBuf,
    retention: Duration,
}

impl Sweeper {
    pub fn new(staging_root: impl Into<PathBuf>, config: &SweeperConfig) -> Self {
        Self {
            staging_root: staging_root.into(),
            retention: Duration::from_secs(config.retention_hours * 3600),
        }
    }

    /// One sweep pass. Filesystem failures are logged, never fatal.
    pub fn sweep_once(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        let entries = match std::fs::read_dir(&self.staging_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(root = %self.staging_root.display(), "Staging root does not exist, nothing to sweep");
                return stats;
            }
            Err(e) => {
                warn!(root = %self.staging_root.display(), error = %e, "Failed to read staging root");
                return stats;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if !path.is_dir() || ClaimId::parse(&name).is_none() {
                continue;
            }

            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .is_some_and(|age| age > self.retention);

            if !expired {
                debug!(dir = %name, "Claim directory inside retention window, skipping");
                continue;
            }

            let file_count = std::fs::read_dir(&path)
                .map(|d| d.flatten().count())
                .unwrap_or(0);

            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    stats.deleted_dirs += 1;
                    stats.deleted_files += file_count;
                    info!(dir = %name, files = file_count, "Deleted expired claim directory");
                }
                Err(e) => {
                    warn!(dir = %name, error = %e, "Failed to delete claim directory");
                }
            }
        }

        if stats.deleted_dirs > 0 {
            info!(
                dirs = stats.deleted_dirs,
                files = stats.deleted_files,
                "Maintenance sweep complete"
            );
        }

        stats
    }
}

/// Spawn the sweep loop on a fixed interval.
///
/// Returns a `JoinHandle` and a shutdown flag.
pub fn spawn_sweeper(sweeper: Sweeper, interval: Duration) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    let sweeper = Arc::new(sweeper);

    let handle = tokio::spawn(async move {
        info!(
            "Maintenance sweeper started, sweeping every {}s",
            interval.as_secs()
        );

        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Maintenance sweeper shutting down");
                return;
            }

            let sweeper = Arc::clone(&sweeper);
            match tokio::task::spawn_blocking(move || sweeper.sweep_once()).await {
                Ok(stats) => debug!(?stats, "Sweep tick finished"),
                Err(e) => warn!(error = %e, "Sweep task panicked"),
            }
        }
    });

    (handle, shutdown_flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(retention_hours: u64) -> SweeperConfig {
        SweeperConfig {
            interval_secs: 3600,
            retention_hours,
        }
    }

    #[test]
    fn deletes_expired_claim_directories() {
        let root = tempfile::tempdir().unwrap();
        let claim_dir = root.path().join("CLAIM_AB12CD34_20250805");
        std::fs::create_dir_all(&claim_dir).unwrap();
        std::fs::write(claim_dir.join("a.jpg"), b"x").unwrap();
        std::fs::write(claim_dir.join("b.pdf"), b"y").unwrap();

        // Zero retention: anything already on disk counts as expired.
        let sweeper = Sweeper::new(root.path(), &config(0));
        std::thread::sleep(std::time::Duration::from_millis(20));
        let stats = sweeper.sweep_once();

        assert_eq!(stats.deleted_dirs, 1);
        assert_eq!(stats.deleted_files, 2);
        assert!(!claim_dir.exists());
    }

    #[test]
    fn skips_directories_inside_retention_window() {
        let root = tempfile::tempdir().unwrap();
        let claim_dir = root.path().join("CLAIM_AB12CD34_20250805");
        std::fs::create_dir_all(&claim_dir).unwrap();

        let sweeper = Sweeper::new(root.path(), &config(24));
        let stats = sweeper.sweep_once();

        assert_eq!(stats, SweepStats::default());
        assert!(claim_dir.exists());
    }

    #[test]
    fn ignores_non_claim_entries() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("not_a_claim")).unwrap();
        std::fs::write(root.path().join("stray.txt"), b"x").unwrap();

        let sweeper = Sweeper::new(root.path(), &config(0));
        std::thread::sleep(std::time::Duration::from_millis(20));
        let stats = sweeper.sweep_once();

        assert_eq!(stats, SweepStats::default());
        assert!(root.path().join("not_a_claim").exists());
        assert!(root.path().join("stray.txt").exists());
    }

    #[test]
    fn missing_staging_root_is_a_noop() {
        let sweeper = Sweeper::new("/nonexistent/staging-root", &config(0));
        assert_eq!(sweeper.sweep_once(), SweepStats::default());
    }
}
