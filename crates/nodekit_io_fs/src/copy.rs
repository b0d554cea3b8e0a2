//! File and directory copy with overwrite semantics.
//!
//! Destination directories are stamped with the modification time of their
//! source counterpart; copied files keep the source modification time.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::file::create_directory;
use crate::spec::ErrorFs;
use crate::util::{copy_file_with_metadata, is_overlap, read_dir_sorted};

#[derive(Debug, Clone)]
struct SpecCopyTaskFile {
    path_file_src: PathBuf,
    path_file_dst: PathBuf,
}

#[derive(Debug, Default)]
struct SpecCopyContext {
    /// Directories on the current descent path, as `(dev, ino)`.
    set_ancestor_dirs: HashSet<(u64, u64)>,
    l_tasks_file_copy: Vec<SpecCopyTaskFile>,
}

impl SpecCopyContext {
    fn push_task(&mut self, path_file_src: PathBuf, path_file_dst: PathBuf) {
        self.l_tasks_file_copy.push(SpecCopyTaskFile {
            path_file_src,
            path_file_dst,
        });
    }
}

/// Copy one file from `file_source` to `file_destination`.
///
/// When the destination already exists and `if_overwrite` is false the
/// destination is kept and the call succeeds. Missing destination parents are
/// created with the source file's modification time.
pub fn copy_file<P, Q>(
    file_source: P,
    file_destination: Q,
    if_overwrite: bool,
) -> Result<(), ErrorFs>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_file_src = file_source.as_ref();
    let path_file_dst = file_destination.as_ref();

    let meta_src =
        fs::metadata(path_file_src).map_err(|e| ErrorFs::io("stat", path_file_src, e))?;
    let mod_time = modification_time(path_file_src, &meta_src)?;

    if !if_overwrite && fs::metadata(path_file_dst).is_ok() {
        warn!(
            path = %path_file_dst.display(),
            "destination file already exists, not overwriting"
        );
        return Ok(());
    }

    if let Some(path_parent_dst) = path_file_dst.parent()
        && !path_parent_dst.as_os_str().is_empty()
    {
        create_directory(path_parent_dst, mod_time)?;
    }

    debug!(
        src = %path_file_src.display(),
        dst = %path_file_dst.display(),
        "copying file"
    );
    copy_file_with_metadata(path_file_src, path_file_dst, mod_time)
}

/// Copy `source` to `destination`, recursing into directories.
///
/// A file source behaves like [`copy_file`]. A directory source is mirrored:
/// every sub-directory is created with its source modification time, then all
/// files are copied in parallel. The first failing file aborts the call.
///
/// Symlinks are followed. Dangling links and links back into an ancestor
/// directory are skipped with a warning.
pub fn copy_files<P, Q>(source: P, destination: Q, if_overwrite: bool) -> Result<(), ErrorFs>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_src = source.as_ref();
    let path_dst = destination.as_ref();

    let meta_src = fs::metadata(path_src).map_err(|e| ErrorFs::io("stat", path_src, e))?;
    if !meta_src.is_dir() {
        return copy_file(path_src, path_dst, if_overwrite);
    }

    let mut spec_cp_ctx = SpecCopyContext::default();
    plan_directory_copy(path_src, path_dst, &meta_src, &mut spec_cp_ctx)?;
    debug!(
        src = %path_src.display(),
        dst = %path_dst.display(),
        n_files = spec_cp_ctx.l_tasks_file_copy.len(),
        "planned directory copy"
    );
    flush_file_copy_tasks(spec_cp_ctx.l_tasks_file_copy, if_overwrite)
}

/// Copy the contents of directory `dir_source` into `dir_destination`.
///
/// `dir_destination` is created with the source modification time when it
/// does not exist yet.
pub fn copy_directory<P, Q>(
    dir_source: P,
    dir_destination: Q,
    if_overwrite: bool,
) -> Result<(), ErrorFs>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref();
    let path_dir_dst = dir_destination.as_ref();

    let meta_src =
        fs::metadata(path_dir_src).map_err(|e| ErrorFs::io("stat", path_dir_src, e))?;
    if !meta_src.is_dir() {
        return Err(ErrorFs::SourceNotDirectory(path_dir_src.to_path_buf()));
    }
    if is_overlap(path_dir_src, path_dir_dst) {
        return Err(ErrorFs::SourceDestinationOverlap {
            path_src: path_dir_src.to_path_buf(),
            path_dst: path_dir_dst.to_path_buf(),
        });
    }

    create_directory(path_dir_dst, modification_time(path_dir_src, &meta_src)?)?;
    copy_files(path_dir_src, path_dir_dst, if_overwrite)
}

fn modification_time(path: &Path, meta: &fs::Metadata) -> Result<SystemTime, ErrorFs> {
    meta.modified()
        .map_err(|e| ErrorFs::io("read modification time of", path, e))
}

/// Directory identity used to stop symlink loops.
#[cfg(unix)]
fn dir_identifier(meta: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dir_identifier(_meta: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

fn plan_directory_copy(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    meta_dir_src: &fs::Metadata,
    spec_cp_ctx: &mut SpecCopyContext,
) -> Result<(), ErrorFs> {
    let tuple_dir_identifier = dir_identifier(meta_dir_src);
    if let Some(tuple_id) = tuple_dir_identifier
        && !spec_cp_ctx.set_ancestor_dirs.insert(tuple_id)
    {
        warn!(path = %path_dir_src.display(), "symlink loop detected, skipped");
        return Ok(());
    }

    create_directory(path_dir_dst, modification_time(path_dir_src, meta_dir_src)?)?;

    for path_entry_src in read_dir_sorted(path_dir_src)? {
        let Some(name_entry) = path_entry_src.file_name() else {
            continue;
        };
        let path_entry_dst = path_dir_dst.join(name_entry);
        let meta_entry = fs::symlink_metadata(&path_entry_src)
            .map_err(|e| ErrorFs::io("stat", &path_entry_src, e))?;
        let cfg_file_type = meta_entry.file_type();

        if cfg_file_type.is_dir() {
            plan_directory_copy(&path_entry_src, &path_entry_dst, &meta_entry, spec_cp_ctx)?;
        } else if cfg_file_type.is_file() {
            spec_cp_ctx.push_task(path_entry_src, path_entry_dst);
        } else if cfg_file_type.is_symlink() {
            let Ok(meta_target) = fs::metadata(&path_entry_src) else {
                warn!(path = %path_entry_src.display(), "dangling symlink skipped");
                continue;
            };
            if meta_target.is_file() {
                spec_cp_ctx.push_task(path_entry_src, path_entry_dst);
            } else if meta_target.is_dir() && dir_identifier(&meta_target).is_some() {
                plan_directory_copy(&path_entry_src, &path_entry_dst, &meta_target, spec_cp_ctx)?;
            } else {
                warn!(path = %path_entry_src.display(), "symlink target skipped");
            }
        } else {
            warn!(path = %path_entry_src.display(), "special file skipped");
        }
    }

    if let Some(tuple_id) = tuple_dir_identifier {
        spec_cp_ctx.set_ancestor_dirs.remove(&tuple_id);
    }
    Ok(())
}

fn flush_file_copy_tasks(
    l_tasks_file_copy: Vec<SpecCopyTaskFile>,
    if_overwrite: bool,
) -> Result<(), ErrorFs> {
    l_tasks_file_copy.into_par_iter().try_for_each(|spec_task| {
        copy_file(
            &spec_task.path_file_src,
            &spec_task.path_file_dst,
            if_overwrite,
        )
    })
}
