//! Storage monitor.

use nix::sys::statvfs::statvfs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use verdant_common::actor::{Duty, DutyError};
use verdant_common::consts::LOW_DISK_FRACTION;
use verdant_common::state::{SharedState, Subtree};

/// Free and total bytes of a filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

impl DiskUsage {
    pub fn free_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.free_bytes as f64 / self.total_bytes as f64
    }
}

/// `statvfs` on the filesystem holding `path`. Free space counts only blocks
/// available to unprivileged users.
pub fn disk_usage(path: &Path) -> io::Result<DiskUsage> {
    let stat = statvfs(path)?;
    let block = stat.fragment_size() as u64;
    Ok(DiskUsage {
        free_bytes: stat.blocks_available() as u64 * block,
        total_bytes: stat.blocks() as u64 * block,
    })
}

/// Human-readable size in the style of `df -h`: `512B`, `3.2M`, `14.8G`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["K", "M", "G", "T", "P"];
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1}{unit}")
}

/// Mirrors free space on the data directory's filesystem.
pub struct ResourceDuty {
    data_dir: PathBuf,
    interval: Duration,
    low: bool,
}

impl ResourceDuty {
    pub fn new(data_dir: PathBuf, interval: Duration) -> Self {
        Self {
            data_dir,
            interval,
            low: false,
        }
    }
}

impl Duty for ResourceDuty {
    fn interval(&self, _state: &SharedState) -> Duration {
        self.interval
    }

    fn start(&mut self, state: &SharedState) -> Result<(), DutyError> {
        self.low = false;
        state.set(Subtree::Resource, &["status"], "Initializing");
        Ok(())
    }

    async fn poll(&mut self, state: &SharedState) -> Result<(), DutyError> {
        let usage = disk_usage(&self.data_dir)?;
        let fraction = usage.free_fraction();
        let low = fraction < LOW_DISK_FRACTION;
        if low && !self.low {
            warn!(
                "💾 Low disk space on {}: {} free",
                self.data_dir.display(),
                format_bytes(usage.free_bytes)
            );
        }
        self.low = low;

        state.update(|tree| {
            tree.set(
                Subtree::Resource,
                &["available_disk_space"],
                format_bytes(usage.free_bytes).into(),
            );
            tree.set(
                Subtree::Resource,
                &["free_disk_percent"],
                ((fraction * 1000.0).round() / 10.0).into(),
            );
            tree.set(
                Subtree::Resource,
                &["status"],
                (if low { "Low disk space" } else { "OK" }).into(),
            );
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn formats_like_df() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1536), "1.5K");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0M");
        assert_eq!(format_bytes(15_892_000_000), "14.8G");
    }

    #[test]
    fn free_fraction_handles_empty_filesystems() {
        let empty = DiskUsage {
            free_bytes: 0,
            total_bytes: 0,
        };
        assert_eq!(empty.free_fraction(), 0.0);
        let half = DiskUsage {
            free_bytes: 50,
            total_bytes: 100,
        };
        assert_eq!(half.free_fraction(), 0.5);
    }

    #[test]
    fn statvfs_reads_tempdir() {
        let dir = TempDir::new().unwrap();
        let usage = disk_usage(dir.path()).unwrap();
        assert!(usage.total_bytes > 0);
        assert!(usage.free_bytes <= usage.total_bytes);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(disk_usage(Path::new("/nonexistent/verdant/data")).is_err());
    }

    #[tokio::test]
    async fn poll_mirrors_disk_space() {
        let dir = TempDir::new().unwrap();
        let state = SharedState::new();
        let mut duty = ResourceDuty::new(dir.path().to_path_buf(), Duration::from_secs(60));
        duty.start(&state).unwrap();
        duty.poll(&state).await.unwrap();

        let status = state.get(Subtree::Resource, &["status"]).unwrap();
        assert!(status == json!("OK") || status == json!("Low disk space"));
        assert!(
            state
                .get(Subtree::Resource, &["available_disk_space"])
                .unwrap()
                .is_string()
        );
    }
}
