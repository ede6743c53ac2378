//! System-wide constants for the Verdant workspace.
//!
//! Single source of truth for defaults and well-known names.
//! Configuration sections fall back to these values.

/// Default actor tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 100;

/// Default interval between state snapshots in milliseconds.
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 100;

/// Default interval between environment history records in seconds (10 min).
pub const DEFAULT_ENVIRONMENT_RECORD_INTERVAL_S: u64 = 600;

/// Default poll interval while waiting for actors to leave INIT.
pub const DEFAULT_SETUP_POLL_MS: u64 = 200;

/// Default timeout for dynamic actor teardown during reconfiguration.
pub const DEFAULT_LOAD_TIMEOUT_S: u64 = 10;

/// Poll interval while waiting for actor termination.
pub const TEARDOWN_POLL_MS: u64 = 100;

/// Number of group samples kept before the rolling average is reseeded.
pub const DEFAULT_GROUP_AVERAGE_WINDOW: u64 = 20;

/// Satellite poll cadences in seconds.
pub const DEFAULT_NETWORK_INTERVAL_S: u64 = 10;
pub const DEFAULT_IOT_INTERVAL_S: u64 = 60;
pub const DEFAULT_RESOURCE_INTERVAL_S: u64 = 60;
pub const DEFAULT_UPGRADE_INTERVAL_S: u64 = 3600;

/// Endpoint probed by the network satellite.
pub const DEFAULT_PROBE_ADDRESS: &str = "1.1.1.1:53";

/// Connect timeout for the network probe in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;

/// Free-space fraction below which storage is reported as low.
pub const LOW_DISK_FRACTION: f64 = 0.10;

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/verdant";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/verdant/verdant.toml";

/// Device configuration used when no pointer has been written yet.
pub const UNSPECIFIED_DEVICE_CONFIG: &str = "unspecified";

/// Phase, cycle and environment name of the terminal recipe transition.
pub const RECIPE_END: &str = "End";
