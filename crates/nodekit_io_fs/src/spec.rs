//! Data models, option structs and top-level error types.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::string::FromUtf8Error;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::{C_CMD_STAT, N_TIMEOUT_EXECUTE_DEFAULT};

////////////////////////////////////////////////////////////////////////////////
// #region DiskStatModels

/// Six-field record reported by the filesystem statistics utility.
///
/// This is the wire contract between the probe and the external process.
/// Unknown, missing and duplicate keys are all rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SpecFsStatRecord {
    /// Filesystem identifier.
    pub fsid: String,
    /// Queried path as echoed by the utility.
    pub path: String,
    /// Filesystem type name.
    #[serde(rename = "type")]
    pub fs_type: String,
    /// Free allocation blocks.
    pub free_block: u64,
    /// Total allocation blocks.
    pub total_block: u64,
    /// Bytes per allocation block.
    pub block_size: u64,
}

/// Normalized filesystem statistics for one probed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStat {
    /// Filesystem identifier (opaque).
    #[serde(rename = "diskID")]
    pub disk_id: String,
    /// Path as reported by the probe; may differ from the input spelling.
    pub path: String,
    /// Filesystem type name, e.g. `ext4`.
    #[serde(rename = "type")]
    pub fs_type: String,
    /// Free allocation blocks.
    pub free_blocks: u64,
    /// Total allocation blocks.
    pub total_blocks: u64,
    /// Bytes per allocation block.
    pub block_size: u64,
    /// `total_blocks * block_size`.
    pub storage_maximum: u64,
    /// `free_blocks * block_size`.
    pub storage_available: u64,
}

impl From<SpecFsStatRecord> for DiskStat {
    fn from(record: SpecFsStatRecord) -> Self {
        Self {
            storage_maximum: record.total_block.saturating_mul(record.block_size),
            storage_available: record.free_block.saturating_mul(record.block_size),
            disk_id: record.fsid,
            path: record.path,
            fs_type: record.fs_type,
            free_blocks: record.free_block,
            total_blocks: record.total_block,
            block_size: record.block_size,
        }
    }
}

/// Input options for [`crate::get_disk_stat`].
#[derive(Debug, Clone)]
pub struct SpecDiskStatOptions {
    /// Statistics utility to run; must accept `-fc <format> <path>`.
    pub path_cmd_stat: PathBuf,
    /// Upper bound on one utility invocation.
    pub timeout: Duration,
}

impl Default for SpecDiskStatOptions {
    fn default() -> Self {
        Self {
            path_cmd_stat: PathBuf::from(C_CMD_STAT),
            timeout: N_TIMEOUT_EXECUTE_DEFAULT,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// External command invocation failures.
#[derive(Debug, Error)]
pub enum ErrorExecute {
    /// The command could not be started (missing binary, permissions).
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The command did not finish before the deadline and was killed.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    /// The command finished unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    ExitFailure {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    /// Waiting for the child or collecting its output failed.
    #[error("Failed to collect output of `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Underlying reason a stat report could not be decoded.
#[derive(Debug, Error)]
pub enum ErrorParseCause {
    #[error("output is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
    #[error("output does not match the disk stat record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Disk statistics probe failures.
#[derive(Debug, Error)]
pub enum ErrorDiskStat {
    /// The statistics utility could not produce a report.
    #[error("Failed to probe disk stat for {}: {source}", .path.display())]
    Execution {
        path: PathBuf,
        #[source]
        source: ErrorExecute,
    },
    /// The report was produced but is not a well-formed record.
    #[error("Failed to parse disk stat output {raw:?}: {source}")]
    Parse {
        raw: String,
        #[source]
        source: ErrorParseCause,
    },
}

/// Filesystem helper failures.
#[derive(Debug, Error)]
pub enum ErrorFs {
    /// One OS-level operation failed on `path`.
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Directory copy was asked to copy something that is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Source contains destination or vice versa.
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        .path_src.display(),
        .path_dst.display()
    )]
    SourceDestinationOverlap { path_src: PathBuf, path_dst: PathBuf },
}

impl ErrorFs {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// `io::ErrorKind` of the underlying OS error, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
