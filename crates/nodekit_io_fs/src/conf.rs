//! Filesystem/probe constants and default presets.

use std::time::Duration;

/// Default bounded timeout for one external command invocation.
pub const N_TIMEOUT_EXECUTE_DEFAULT: Duration = Duration::from_secs(60);
/// Poll interval while waiting for a child process to exit.
pub const N_POLL_INTERVAL_EXECUTE: Duration = Duration::from_millis(10);
/// Permission bits for directories created by [`crate::create_directory`].
pub const N_MODE_DIR_DEFAULT: u32 = 0o755;

/// Filesystem statistics utility.
pub const C_CMD_STAT: &str = "stat";
/// `stat -f` flag requesting filesystem status with a custom format.
pub const C_ARG_STAT_FS_FORMAT: &str = "-fc";
/// Output format handed to `stat -f`; one JSON object with six fields.
pub const C_FMT_STAT_DISK: &str = "{\"path\":\"%n\",\"fsid\":\"%i\",\"type\":\"%T\",\"freeBlock\":%f,\"totalBlock\":%b,\"blockSize\":%S}";
