use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::{FileTime, set_file_times};

use crate::spec::ErrorFs;

////////////////////////////////////////////////////////////////////////////////
// #region TreeWalk

/// Visit `path_root` and everything below it, parents before children,
/// siblings in lexical order. Symlinks are reported but never followed.
pub(crate) fn walk_tree<F>(path_root: &Path, visit: &mut F) -> Result<(), ErrorFs>
where
    F: FnMut(&Path, &fs::Metadata),
{
    let meta_root =
        fs::symlink_metadata(path_root).map_err(|e| ErrorFs::io("stat", path_root, e))?;
    visit(path_root, &meta_root);
    if !meta_root.is_dir() {
        return Ok(());
    }

    for path_entry in read_dir_sorted(path_root)? {
        walk_tree(&path_entry, visit)?;
    }
    Ok(())
}

pub(crate) fn read_dir_sorted(path_dir: &Path) -> Result<Vec<PathBuf>, ErrorFs> {
    let iter_entries =
        fs::read_dir(path_dir).map_err(|e| ErrorFs::io("read directory", path_dir, e))?;

    let mut l_paths = Vec::new();
    for entry_res in iter_entries {
        let entry =
            entry_res.map_err(|e| ErrorFs::io("read directory entry under", path_dir, e))?;
        l_paths.push(entry.path());
    }
    l_paths.sort();
    Ok(l_paths)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Metadata

/// Set both access and modification time of `path` to `mod_time`.
pub(crate) fn set_mod_time(path: &Path, mod_time: SystemTime) -> Result<(), ErrorFs> {
    let file_time = FileTime::from_system_time(mod_time);
    set_file_times(path, file_time, file_time)
        .map_err(|e| ErrorFs::io("set modification time of", path, e))
}

pub(crate) fn create_dir_all_with_mode(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(crate::conf::N_MODE_DIR_DEFAULT);
    }
    builder.create(path)
}

/// Copy file contents, then stamp the destination with the source mtime.
///
/// `fs::copy` already carries permission bits over.
pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
    mod_time: SystemTime,
) -> Result<(), ErrorFs> {
    fs::copy(path_file_src, path_file_dst)
        .map_err(|e| ErrorFs::io("copy to", path_file_dst, e))?;
    set_mod_time(path_file_dst, mod_time)?;
    #[cfg(target_os = "linux")]
    {
        copy_xattrs_linux(path_file_src, path_file_dst);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(path = %path_file_src.display(), "skip xattr copy: {e}");
            return;
        }
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_file_dst, &name, &raw_value) {
            tracing::debug!(
                path = %path_file_dst.display(),
                name = %name.to_string_lossy(),
                "failed to copy xattr: {e}"
            );
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// Whether `src` contains `dst` or `dst` contains `src` once resolved.
pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{is_overlap, walk_tree};

    #[test]
    fn walk_tree_visits_parents_first_in_lexical_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(tmp.path().join("b/inner")).expect("mkdir");
        std::fs::write(tmp.path().join("a.txt"), "a").expect("write");
        std::fs::write(tmp.path().join("b/inner/c.txt"), "c").expect("write");

        let mut l_visited: Vec<PathBuf> = Vec::new();
        walk_tree(tmp.path(), &mut |path, _| l_visited.push(path.to_path_buf()))
            .expect("walk");

        assert_eq!(
            l_visited,
            vec![
                tmp.path().to_path_buf(),
                tmp.path().join("a.txt"),
                tmp.path().join("b"),
                tmp.path().join("b/inner"),
                tmp.path().join("b/inner/c.txt"),
            ]
        );
    }

    #[test]
    fn walk_tree_missing_root_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut n_visited = 0;
        let res = walk_tree(&tmp.path().join("gone"), &mut |_, _| n_visited += 1);
        assert!(res.is_err());
        assert_eq!(n_visited, 0);
    }

    #[test]
    fn overlap_detects_nested_paths() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).expect("mkdir");

        assert!(is_overlap(&src, &src.join("nested")));
        assert!(is_overlap(&src.join("nested"), &src));
        assert!(!is_overlap(&src, &tmp.path().join("dst")));
    }
}
