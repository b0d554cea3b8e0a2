//! Disk statistics probe.
//!
//! The probe is split in two halves:
//! - a [`DiskStatSource`] reports the six-field [`SpecFsStatRecord`] for a path
//!   (the default source runs `stat -f` and parses its output),
//! - [`probe_disk_stat`] turns that record into a byte-normalized [`DiskStat`].

use std::ffi::OsStr;
use std::path::Path;

use tracing::{debug, warn};

use crate::conf::{C_ARG_STAT_FS_FORMAT, C_FMT_STAT_DISK};
use crate::exec::{CommandExecutor, ProcessExecutor};
use crate::spec::{
    DiskStat, ErrorDiskStat, ErrorParseCause, SpecDiskStatOptions, SpecFsStatRecord,
};

/// Anything able to report filesystem statistics for a path.
pub trait DiskStatSource {
    fn read_fs_stat(&self, path: &Path) -> Result<SpecFsStatRecord, ErrorDiskStat>;
}

/// [`DiskStatSource`] running the `stat` utility through a [`CommandExecutor`].
#[derive(Debug, Clone)]
pub struct StatCommandSource<E> {
    executor: E,
    spec_options: SpecDiskStatOptions,
}

impl<E: CommandExecutor> StatCommandSource<E> {
    pub fn new(executor: E, spec_options: SpecDiskStatOptions) -> Self {
        Self {
            executor,
            spec_options,
        }
    }

    pub fn options(&self) -> &SpecDiskStatOptions {
        &self.spec_options
    }
}

impl<E: CommandExecutor> DiskStatSource for StatCommandSource<E> {
    fn read_fs_stat(&self, path: &Path) -> Result<SpecFsStatRecord, ErrorDiskStat> {
        let l_args = [
            OsStr::new(C_ARG_STAT_FS_FORMAT),
            OsStr::new(C_FMT_STAT_DISK),
            path.as_os_str(),
        ];
        let raw_output = self
            .executor
            .execute(
                self.spec_options.path_cmd_stat.as_os_str(),
                &l_args,
                self.spec_options.timeout,
            )
            .map_err(|source| ErrorDiskStat::Execution {
                path: path.to_path_buf(),
                source,
            })?;
        parse_stat_output(&raw_output)
    }
}

/// Decode one `stat -f` report into a [`SpecFsStatRecord`].
///
/// Line terminators are removed before decoding since the utility ends its
/// report with a newline.
pub fn parse_stat_output(raw_output: &[u8]) -> Result<SpecFsStatRecord, ErrorDiskStat> {
    let txt_output = String::from_utf8(raw_output.to_vec()).map_err(|e| ErrorDiskStat::Parse {
        raw: String::from_utf8_lossy(raw_output).to_string(),
        source: ErrorParseCause::from(e),
    })?;
    let txt_cleaned: String = txt_output
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();

    serde_json::from_str::<SpecFsStatRecord>(&txt_cleaned).map_err(|e| ErrorDiskStat::Parse {
        raw: txt_output,
        source: ErrorParseCause::from(e),
    })
}

/// Query `source` for `path` and convert the report into a [`DiskStat`].
pub fn probe_disk_stat<P, S>(path: P, source: &S) -> Result<DiskStat, ErrorDiskStat>
where
    P: AsRef<Path>,
    S: DiskStatSource + ?Sized,
{
    let path = path.as_ref();
    let record = source.read_fs_stat(path)?;
    if record.free_block > record.total_block {
        warn!(
            path = %path.display(),
            free_block = record.free_block,
            total_block = record.total_block,
            "stat reported more free blocks than total blocks"
        );
    }

    let disk_stat = DiskStat::from(record);
    debug!(
        path = %disk_stat.path,
        fs_type = %disk_stat.fs_type,
        storage_available = disk_stat.storage_available,
        storage_maximum = disk_stat.storage_maximum,
        "probed disk stat"
    );
    Ok(disk_stat)
}

/// Probe `path` with the system `stat` utility.
pub fn get_disk_stat<P>(path: P, spec_options: &SpecDiskStatOptions) -> Result<DiskStat, ErrorDiskStat>
where
    P: AsRef<Path>,
{
    let source = StatCommandSource::new(ProcessExecutor::new(), spec_options.clone());
    probe_disk_stat(path, &source)
}
