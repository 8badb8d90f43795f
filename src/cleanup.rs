//! Periodic removal of orphaned session directories.
//!
//! Sessions normally delete themselves when their response finishes. This sweep is the
//! safety net for directories left behind by a crash or a killed process: anything in the
//! temp dir older than `min_age` is removed.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CleanupSettings;
use crate::server::metrics;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub skipped_young: usize,
    pub errors: usize,
}

pub struct TempSweeper {
    temp_dir: PathBuf,
    interval: Duration,
    min_age: Duration,
}

impl TempSweeper {
    pub fn new(temp_dir: impl Into<PathBuf>, settings: &CleanupSettings) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            interval: settings.interval,
            min_age: settings.min_age,
        }
    }

    /// Sweeps once immediately, then every `interval` until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Temp sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let report = self.sweep().await;
                    if report.deleted > 0 || report.errors > 0 {
                        info!(
                            "Temp sweep: scanned {}, deleted {}, skipped {} young, {} errors",
                            report.scanned, report.deleted, report.skipped_young, report.errors
                        );
                    }
                }
            }
        }
    }

    pub async fn sweep(&self) -> SweepReport {
        let temp_dir = self.temp_dir.clone();
        let min_age = self.min_age;

        let report = match tokio::task::spawn_blocking(move || sweep_dir(&temp_dir, min_age)).await
        {
            Ok(report) => report,
            Err(e) => {
                warn!("Temp sweep task failed: {}", e);
                SweepReport {
                    errors: 1,
                    ..Default::default()
                }
            }
        };
        metrics::record_sweep(report.deleted, report.errors);
        report
    }
}

fn sweep_dir(temp_dir: &std::path::Path, min_age: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    if !temp_dir.exists() {
        debug!("Temp directory does not exist: {:?}", temp_dir);
        return report;
    }

    let entries = match std::fs::read_dir(temp_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read temp directory {:?}: {}", temp_dir, e);
            report.errors += 1;
            return report;
        }
    };

    let now = SystemTime::now();

    for entry in entries.flatten() {
        report.scanned += 1;
        let path = entry.path();

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);
        if age < min_age {
            report.skipped_young += 1;
            continue;
        }

        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                debug!("Removed orphaned temp entry {:?} (age {}s)", path, age.as_secs());
                report.deleted += 1;
            }
            Err(e) => {
                warn!("Failed to remove orphaned temp entry {:?}: {}", path, e);
                report.errors += 1;
            }
        }
    }

    report
}
