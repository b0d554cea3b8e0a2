//! `nodekit_io_fs` v1:
//! Rust-side filesystem helpers and disk statistics probe.
//!
//! Modules:
//! - `conf` : constants and default presets
//! - `spec` : models/options/errors
//! - `exec` : external command execution with timeout
//! - `disk` : disk statistics probe (`stat -f`)
//! - `file` : directory creation, enumeration, read/sync
//! - `copy` : file/directory copy with overwrite semantics
//! - `util` : shared helper functions

pub mod conf;
pub mod copy;
pub mod disk;
pub mod exec;
pub mod file;
pub mod spec;
mod util;

pub use copy::{copy_directory, copy_file, copy_files};
pub use disk::{DiskStatSource, StatCommandSource, get_disk_stat, parse_stat_output, probe_disk_stat};
pub use exec::{CommandExecutor, ProcessExecutor};
pub use file::{create_directory, find_files, get_empty_files, read_file_content, sync_file};
pub use spec::{
    DiskStat, ErrorDiskStat, ErrorExecute, ErrorFs, ErrorParseCause, SpecDiskStatOptions,
    SpecFsStatRecord,
};
