//! Age-based retention for the asset store directory.
//!
//! The sweeper shares the directory with [`super::AssetStore`] without any
//! locking: it only deletes files strictly older than the retention window,
//! which is far longer than any request lifetime, so the delete-while-read
//! race is accepted rather than excluded.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The two durations the sweeper reads; fixed at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub sweep_interval: Duration,
    pub max_age: Duration,
}

/// Summary of a single sweep.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    dir: PathBuf,
    policy: RetentionPolicy,
}

impl RetentionSweeper {
    pub fn new(dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        RetentionSweeper {
            dir: dir.into(),
            policy,
        }
    }

    /// Deletes every file in the directory whose modification age exceeds
    /// the retention window. A single file failing to delete is counted and
    /// skipped; the sweep itself never fails.
    pub fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        if let Ok(age) = chrono::Duration::from_std(self.policy.max_age) {
            debug!(
                "sweeping {} for files modified before {}",
                self.dir.display(),
                chrono::Utc::now() - age
            );
        }

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot list {}: {e}", self.dir.display());
                return report;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            report.scanned += 1;

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            let Some(age) = age else { continue };

            if age > self.policy.max_age {
                match fs::remove_file(&path) {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!("could not delete {}: {e}", path.display());
                    }
                }
            }
        }

        if report.deleted > 0 || report.failed > 0 {
            info!(
                "swept {}: {} deleted, {} failed",
                self.dir.display(),
                report.deleted,
                report.failed
            );
        }
        report
    }

    /// Starts the background loop: sleep one interval, sweep, repeat. Runs
    /// until the returned handle is shut down by the host process.
    pub fn spawn(self) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        info!(
            "retention sweep every {:.1}h, deleting files older than {:.1}h",
            self.policy.sweep_interval.as_secs_f64() / 3600.0,
            self.policy.max_age.as_secs_f64() / 3600.0
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.sweep_interval) => {
                        let sweeper = self.clone();
                        // Directory walk is blocking filesystem work.
                        if let Err(e) =
                            tokio::task::spawn_blocking(move || sweeper.sweep_once()).await
                        {
                            warn!("sweep task panicked: {e}");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        SweeperHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Lifecycle handle for a spawned sweeper.
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the loop and waits for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}
