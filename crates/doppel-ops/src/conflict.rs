//! Collision-free destination naming and moves that never overwrite.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

/// Highest numbered suffix tried before falling back to a timestamp.
const MAX_NUMBERED: u32 = 1000;

/// Pick a path in `dir` for `file_name` that nothing occupies.
///
/// For "file.txt", tries "file.txt", then "file (1).txt", "file (2).txt",
/// and so on. Existing files are never chosen.
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !occupied(&candidate) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());
    let with_suffix = |suffix: &str| match &extension {
        Some(ext) => format!("{stem} {suffix}.{ext}"),
        None => format!("{stem} {suffix}"),
    };

    for i in 1..MAX_NUMBERED {
        let new_path = dir.join(with_suffix(&format!("({i})")));
        if !occupied(&new_path) {
            return new_path;
        }
    }

    // Fallback: use timestamp
    let token = Utc::now().format("%Y%m%dT%H%M%S%.6f").to_string();
    dir.join(with_suffix(&token))
}

fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Move a single file to `dest`, failing with
/// [`io::ErrorKind::AlreadyExists`] if anything is already there.
///
/// The destination is claimed atomically: by hard link on the same
/// filesystem, otherwise by an exclusive create followed by a copy. If the
/// source cannot be removed afterwards, `dest` is removed again so the file
/// exists in exactly one place.
pub(crate) fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(source, dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            debug!(
                source = %source.display(),
                error = %e,
                "hard link failed, falling back to copy"
            );
            copy_exclusive(source, dest)?;
        }
    }

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    Ok(())
}

fn copy_exclusive(source: &Path, dest: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| reader.metadata())
        .and_then(|metadata| writer.set_permissions(metadata.permissions()))
        .and_then(|()| writer.sync_all());
    if copied.is_err() {
        drop(writer);
        let _ = fs::remove_file(dest);
    }
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_free_name_is_kept() {
        let temp = TempDir::new().unwrap();
        let dest = unique_destination(temp.path(), OsStr::new("test.txt"));
        assert_eq!(dest, temp.path().join("test.txt"));
    }

    #[test]
    fn test_numbered_suffix() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("test.txt"), "").unwrap();
        fs::write(temp.path().join("test (1).txt"), "").unwrap();

        let dest = unique_destination(temp.path(), OsStr::new("test.txt"));
        assert_eq!(dest, temp.path().join("test (2).txt"));
    }

    #[test]
    fn test_move_file_moves_content() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, "content").unwrap();

        move_file(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "content");
    }

    #[test]
    fn test_move_file_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, "mine").unwrap();
        fs::write(&dest, "theirs").unwrap();

        let err = move_file(&source, &dest).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&source).unwrap(), "mine");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "theirs");
    }

    #[test]
    fn test_copy_exclusive_refuses_occupied_dest() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, "mine").unwrap();
        fs::write(&dest, "theirs").unwrap();

        let err = copy_exclusive(&source, &dest).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "theirs");
    }

    #[test]
    fn test_copy_exclusive_copies_into_new_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, "content").unwrap();

        copy_exclusive(&source, &dest).unwrap();

        assert!(source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "content");
    }

    #[test]
    fn test_move_file_refuses_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = move_file(&temp.path().join("nope"), &temp.path().join("dest"));
        assert!(result.is_err());
        assert!(!temp.path().join("dest").exists());
    }

    #[test]
    fn test_no_extension() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("testfile"), "").unwrap();

        let dest = unique_destination(temp.path(), OsStr::new("testfile"));
        assert_eq!(dest, temp.path().join("testfile (1)"));
    }
}
