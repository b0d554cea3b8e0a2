use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nodekit_io_fs::{
    DiskStat, ErrorDiskStat, ErrorExecute, ErrorFs, SpecDiskStatOptions, copy_directory,
    copy_file, copy_files, create_directory, find_files, get_disk_stat, get_empty_files,
    read_file_content, sync_file,
};
use pyo3::exceptions::{
    PyFileNotFoundError, PyNotADirectoryError, PyOSError, PyTimeoutError, PyValueError,
};
use pyo3::prelude::*;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "nodekit.fs.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "DiskStat", frozen)]
#[derive(Debug, Clone)]
struct PyDiskStat {
    #[pyo3(get)]
    disk_id: String,
    #[pyo3(get)]
    path: String,
    #[pyo3(get)]
    fs_type: String,
    #[pyo3(get)]
    free_blocks: u64,
    #[pyo3(get)]
    total_blocks: u64,
    #[pyo3(get)]
    block_size: u64,
    #[pyo3(get)]
    storage_maximum: u64,
    #[pyo3(get)]
    storage_available: u64,
}

impl From<DiskStat> for PyDiskStat {
    fn from(disk_stat: DiskStat) -> Self {
        Self {
            disk_id: disk_stat.disk_id,
            path: disk_stat.path,
            fs_type: disk_stat.fs_type,
            free_blocks: disk_stat.free_blocks,
            total_blocks: disk_stat.total_blocks,
            block_size: disk_stat.block_size,
            storage_maximum: disk_stat.storage_maximum,
            storage_available: disk_stat.storage_available,
        }
    }
}

#[pymethods]
impl PyDiskStat {
    fn __repr__(&self) -> String {
        format!(
            "DiskStat(disk_id={:?}, path={:?}, fs_type={:?}, storage_maximum={}, storage_available={})",
            self.disk_id, self.path, self.fs_type, self.storage_maximum, self.storage_available
        )
    }
}

fn map_fs_error(exception: ErrorFs) -> PyErr {
    match &exception {
        ErrorFs::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
            PyFileNotFoundError::new_err(exception.to_string())
        }
        ErrorFs::SourceNotDirectory(_) => PyNotADirectoryError::new_err(exception.to_string()),
        ErrorFs::SourceDestinationOverlap { .. } => PyValueError::new_err(exception.to_string()),
        ErrorFs::Io { .. } => PyOSError::new_err(exception.to_string()),
    }
}

fn map_disk_stat_error(exception: ErrorDiskStat) -> PyErr {
    match &exception {
        ErrorDiskStat::Execution {
            source: ErrorExecute::Timeout { .. },
            ..
        } => PyTimeoutError::new_err(exception.to_string()),
        ErrorDiskStat::Execution { .. } => PyOSError::new_err(exception.to_string()),
        ErrorDiskStat::Parse { .. } => PyValueError::new_err(exception.to_string()),
    }
}

fn parse_duration_secs(value: f64, name: &str) -> PyResult<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| {
        PyValueError::new_err(format!("Invalid `{name}`: {value} ({e})"))
    })
}

fn paths_to_strings(l_paths: Vec<PathBuf>) -> Vec<String> {
    l_paths
        .into_iter()
        .map(|path| path.to_string_lossy().to_string())
        .collect()
}

#[pyfunction(name = "get_disk_stat")]
#[pyo3(signature = (path, cmd_stat = "stat", timeout_secs = 60.0))]
fn get_disk_stat_py(
    py: Python<'_>,
    path: String,
    cmd_stat: &str,
    timeout_secs: f64,
) -> PyResult<PyDiskStat> {
    let spec_options = SpecDiskStatOptions {
        path_cmd_stat: PathBuf::from(cmd_stat),
        timeout: parse_duration_secs(timeout_secs, "timeout_secs")?,
    };

    let disk_stat = py.allow_threads(|| get_disk_stat(&path, &spec_options));
    let disk_stat = disk_stat.map_err(map_disk_stat_error)?;
    Ok(PyDiskStat::from(disk_stat))
}

/// `mod_time` is seconds since the Unix epoch; `None` stamps the current time.
#[pyfunction(name = "create_directory")]
#[pyo3(signature = (path, mod_time = None))]
fn create_directory_py(py: Python<'_>, path: String, mod_time: Option<f64>) -> PyResult<String> {
    let mod_time = match mod_time {
        Some(n_secs) => UNIX_EPOCH + parse_duration_secs(n_secs, "mod_time")?,
        None => SystemTime::now(),
    };

    let path_created = py
        .allow_threads(|| create_directory(&path, mod_time))
        .map_err(map_fs_error)?;
    Ok(path_created.to_string_lossy().to_string())
}

#[pyfunction(name = "copy_directory")]
#[pyo3(signature = (source, destination, if_overwrite = false))]
fn copy_directory_py(
    py: Python<'_>,
    source: String,
    destination: String,
    if_overwrite: bool,
) -> PyResult<()> {
    py.allow_threads(|| copy_directory(&source, &destination, if_overwrite))
        .map_err(map_fs_error)
}

#[pyfunction(name = "copy_files")]
#[pyo3(signature = (source, destination, if_overwrite = false))]
fn copy_files_py(
    py: Python<'_>,
    source: String,
    destination: String,
    if_overwrite: bool,
) -> PyResult<()> {
    py.allow_threads(|| copy_files(&source, &destination, if_overwrite))
        .map_err(map_fs_error)
}

#[pyfunction(name = "copy_file")]
#[pyo3(signature = (file_source, file_destination, if_overwrite = false))]
fn copy_file_py(
    py: Python<'_>,
    file_source: String,
    file_destination: String,
    if_overwrite: bool,
) -> PyResult<()> {
    py.allow_threads(|| copy_file(&file_source, &file_destination, if_overwrite))
        .map_err(map_fs_error)
}

#[pyfunction(name = "find_files")]
#[pyo3(signature = (directory, file_name = None))]
fn find_files_py(
    py: Python<'_>,
    directory: String,
    file_name: Option<String>,
) -> PyResult<Vec<String>> {
    let l_found = py
        .allow_threads(|| find_files(&directory, file_name.as_deref()))
        .map_err(map_fs_error)?;
    Ok(paths_to_strings(l_found))
}

#[pyfunction(name = "get_empty_files")]
fn get_empty_files_py(py: Python<'_>, directory: String) -> PyResult<Vec<String>> {
    let l_empty = py
        .allow_threads(|| get_empty_files(&directory))
        .map_err(map_fs_error)?;
    Ok(paths_to_strings(l_empty))
}

#[pyfunction(name = "read_file_content")]
fn read_file_content_py(py: Python<'_>, path: String) -> PyResult<String> {
    py.allow_threads(|| read_file_content(&path))
        .map_err(map_fs_error)
}

#[pyfunction(name = "sync_file")]
fn sync_file_py(py: Python<'_>, path: String) -> PyResult<()> {
    py.allow_threads(|| sync_file(&path)).map_err(map_fs_error)
}

#[pymodule]
fn _nodekit_io_fs_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyDiskStat>()?;
    module.add_function(wrap_pyfunction!(get_disk_stat_py, module)?)?;
    module.add_function(wrap_pyfunction!(create_directory_py, module)?)?;
    module.add_function(wrap_pyfunction!(copy_directory_py, module)?)?;
    module.add_function(wrap_pyfunction!(copy_files_py, module)?)?;
    module.add_function(wrap_pyfunction!(copy_file_py, module)?)?;
    module.add_function(wrap_pyfunction!(find_files_py, module)?)?;
    module.add_function(wrap_pyfunction!(get_empty_files_py, module)?)?;
    module.add_function(wrap_pyfunction!(read_file_content_py, module)?)?;
    module.add_function(wrap_pyfunction!(sync_file_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}

