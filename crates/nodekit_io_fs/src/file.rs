//! Directory creation, enumeration and content helpers.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::spec::ErrorFs;
use crate::util::{create_dir_all_with_mode, set_mod_time, walk_tree};

/// Create `path` (and missing parents) and stamp it with `mod_time`.
///
/// An already existing directory is returned as-is; its timestamps are left
/// untouched. Returns the created path.
pub fn create_directory<P>(path: P, mod_time: SystemTime) -> Result<PathBuf, ErrorFs>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if fs::metadata(path).is_ok_and(|meta| meta.is_dir()) {
        return Ok(path.to_path_buf());
    }

    create_dir_all_with_mode(path).map_err(|e| ErrorFs::io("create directory", path, e))?;
    set_mod_time(path, mod_time)?;
    debug!(path = %path.display(), "created directory");
    Ok(path.to_path_buf())
}

/// Walk `directory` and collect visited paths.
///
/// With `file_name = None` every visited path is returned, `directory`
/// itself included. Otherwise only paths whose base name equals `file_name`.
pub fn find_files<P>(directory: P, file_name: Option<&str>) -> Result<Vec<PathBuf>, ErrorFs>
where
    P: AsRef<Path>,
{
    let mut l_found = Vec::new();
    walk_tree(directory.as_ref(), &mut |path, _| {
        let b_is_match = match file_name {
            None => true,
            Some(name) => path.file_name().is_some_and(|v| v == name),
        };
        if b_is_match {
            l_found.push(path.to_path_buf());
        }
    })?;
    Ok(l_found)
}

/// Collect every zero-length non-directory entry under `directory`.
pub fn get_empty_files<P>(directory: P) -> Result<Vec<PathBuf>, ErrorFs>
where
    P: AsRef<Path>,
{
    let mut l_empty = Vec::new();
    walk_tree(directory.as_ref(), &mut |path, meta| {
        if !meta.is_dir() && meta.len() == 0 {
            l_empty.push(path.to_path_buf());
        }
    })?;
    Ok(l_empty)
}

pub fn read_file_content<P>(path: P) -> Result<String, ErrorFs>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| ErrorFs::io("read", path, e))
}

/// Flush `path` contents and metadata to stable storage.
pub fn sync_file<P>(path: P) -> Result<(), ErrorFs>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| ErrorFs::io("open", path, e))?;
    file.sync_all().map_err(|e| ErrorFs::io("sync", path, e))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::ErrorKind;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use filetime::FileTime;

    use super::{create_directory, find_files, get_empty_files, read_file_content, sync_file};

    fn mod_time_of(path: &std::path::Path) -> FileTime {
        let meta = std::fs::metadata(path).expect("metadata");
        FileTime::from_last_modification_time(&meta)
    }

    // 2023-07-01T12:00:00Z
    fn fixed_time() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_688_212_800)
    }

    #[test]
    fn create_directory_sets_mod_time() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_dir = tmp.path().join("a/b/c");

        let path_created = create_directory(&path_dir, fixed_time()).expect("create");
        assert_eq!(path_created, path_dir);
        assert!(path_dir.is_dir());
        assert_eq!(
            mod_time_of(&path_dir),
            FileTime::from_system_time(fixed_time())
        );
    }

    #[test]
    fn create_directory_keeps_existing_mod_time() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_dir = tmp.path().join("existing");

        create_directory(&path_dir, fixed_time()).expect("first create");
        let path_created = create_directory(&path_dir, SystemTime::now()).expect("second create");
        assert_eq!(path_created, path_dir);
        assert_eq!(
            mod_time_of(&path_dir),
            FileTime::from_system_time(fixed_time())
        );
    }

    #[test]
    fn create_directory_over_file_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("plain");
        std::fs::write(&path_file, "x").expect("write");

        assert!(create_directory(&path_file, fixed_time()).is_err());
    }

    #[test]
    fn find_files_returns_root_and_all_entries() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("test-0"), "content").expect("write");
        std::fs::write(tmp.path().join("test-1"), "content").expect("write");

        let l_found = find_files(tmp.path(), None).expect("find");
        assert_eq!(
            l_found,
            vec![
                tmp.path().to_path_buf(),
                tmp.path().join("test-0"),
                tmp.path().join("test-1"),
            ]
        );
    }

    #[test]
    fn find_files_by_name_searches_recursively() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(tmp.path().join("sub")).expect("mkdir");
        std::fs::write(tmp.path().join("test-0"), "content").expect("write");
        std::fs::write(tmp.path().join("test-1"), "content").expect("write");
        std::fs::write(tmp.path().join("sub/test-0"), "content").expect("write");

        let l_found = find_files(tmp.path(), Some("test-0")).expect("find");
        assert_eq!(
            l_found,
            vec![tmp.path().join("sub/test-0"), tmp.path().join("test-0")]
        );
        assert!(find_files(tmp.path(), Some("absent")).expect("find").is_empty());
    }

    #[test]
    fn find_files_missing_directory_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(find_files(tmp.path().join("not-existing"), None).is_err());
    }

    #[test]
    fn get_empty_files_skips_directories_and_content() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_sub = tmp.path().join("sub");
        std::fs::create_dir_all(tmp.path().join("empty-dir")).expect("mkdir");
        std::fs::create_dir_all(&path_sub).expect("mkdir");
        std::fs::write(tmp.path().join("regular-file"), "content").expect("write");
        std::fs::write(tmp.path().join("empty-file-0"), "").expect("write");
        std::fs::write(path_sub.join("empty-file-1"), "").expect("write");

        let set_empty: HashSet<PathBuf> = get_empty_files(tmp.path())
            .expect("get empty files")
            .into_iter()
            .collect();
        let set_expected: HashSet<PathBuf> = [
            tmp.path().join("empty-file-0"),
            path_sub.join("empty-file-1"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set_empty, set_expected);
    }

    #[test]
    fn get_empty_files_missing_directory_fails() {
        assert!(get_empty_files("not-existing-directory").is_err());
    }

    #[test]
    fn read_file_content_roundtrips_text() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("content.txt");
        std::fs::write(&path_file, "test: ReadFileContent").expect("write");

        let content = read_file_content(&path_file).expect("read");
        assert_eq!(content, "test: ReadFileContent");
    }

    #[test]
    fn read_file_content_missing_file_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = read_file_content(tmp.path().join("not-exist")).expect_err("must fail");
        assert_eq!(err.io_kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn sync_file_existing_and_missing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("sync.txt");
        std::fs::write(&path_file, "content").expect("write");

        sync_file(&path_file).expect("sync existing file");
        let err = sync_file(tmp.path().join("not-exist")).expect_err("must fail");
        assert_eq!(err.io_kind(), Some(ErrorKind::NotFound));
    }
}
