//! File system primitives: moves, collision-free names and empty folder cleanup

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Copy buffer size (256KB)
const COPY_BUFFER: usize = 256 * 1024;

/// Whether an existing destination may be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    Forbid,
    Allow,
}

/// Move a file, creating the destination directory as needed
///
/// A same-filesystem move is a single rename. Across filesystems the file is
/// copied, synced and size-checked before the source is removed; if the copy
/// does not complete, the partial destination is removed and the source is
/// left untouched.
pub fn move_file(source: &Path, dest: &Path, overwrite: Overwrite) -> Result<()> {
    if overwrite == Overwrite::Forbid && dest.exists() {
        return Err(Error::Move {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            message: "destination already exists".into(),
        });
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
    }

    match fs::rename(source, dest) {
        Ok(()) => {
            debug!(?source, ?dest, "Renamed file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(?source, ?dest, "Cross-device move, copying");
            copy_verify_remove(source, dest)
        }
        Err(e) => Err(move_error(source, dest, e)),
    }
}

fn move_error(source: &Path, dest: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::PermissionDenied {
        Error::Permission {
            path: source.to_path_buf(),
            source: e,
        }
    } else {
        Error::Move {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            message: e.to_string(),
        }
    }
}

/// Copy, verify and only then delete the source
fn copy_verify_remove(source: &Path, dest: &Path) -> Result<()> {
    let expected = fs::metadata(source)
        .map_err(|e| Error::io_at(source, e))?
        .len();

    if let Err(e) = copy_file(source, dest) {
        let _ = fs::remove_file(dest);
        return Err(move_error(source, dest, e));
    }

    let copied = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    if copied != expected {
        let _ = fs::remove_file(dest);
        return Err(Error::Move {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            message: format!("copy incomplete: {} of {} bytes", copied, expected),
        });
    }

    // Preserve modification time
    if let Ok(metadata) = fs::metadata(source)
        && let Ok(mtime) = metadata.modified()
    {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
    }

    fs::remove_file(source).map_err(|e| move_error(source, dest, e))
}

/// Copy file with buffered I/O and flush it to disk
fn copy_file(source: &Path, dest: &Path) -> io::Result<()> {
    let src_file = File::open(source)?;
    let dest_file = File::create(dest)?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER, dest_file);

    let mut buffer = vec![0u8; COPY_BUFFER];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// `name_1.ext`, `name_2.ext`, ... for the given attempt number
pub fn suffixed_path(path: &Path, attempt: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{}_{}{}", stem, attempt, extension))
}

/// First of `path`, `name_1.ext`, `name_2.ext`, ... for which `taken` is false
pub fn first_free_path(path: &Path, mut taken: impl FnMut(&Path) -> bool) -> Result<PathBuf> {
    if !taken(path) {
        return Ok(path.to_path_buf());
    }

    for i in 1..10000 {
        let candidate = suffixed_path(path, i);
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(Error::Validation(format!(
        "could not find a free name for {}",
        path.display()
    )))
}

/// Count regular files below `dir`
pub fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

/// Remove every directory below (and including, if `include_root`) `root`
/// that holds no files, deepest first. Returns the removed directories.
pub fn remove_empty_dirs(root: &Path, include_root: bool) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .filter(|p| include_root || p != root)
        .collect();

    for dir in dirs {
        let is_empty = fs::read_dir(&dir)
            .map_err(|e| Error::io_at(&dir, e))?
            .next()
            .is_none();
        if is_empty {
            match fs::remove_dir(&dir) {
                Ok(()) => {
                    debug!(?dir, "Removed empty directory");
                    removed.push(dir);
                }
                Err(e) => {
                    warn!(?dir, error = %e, "Failed to remove empty directory");
                    return Err(Error::io_at(&dir, e));
                }
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_creates_parent_and_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"pixels").unwrap();
        let dest = dir.path().join("2024 - 0101 - 1200").join("a.jpg");

        move_file(&src, &dest, Overwrite::Forbid).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
    }

    #[test]
    fn test_move_refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dest = dir.path().join("b.jpg");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = move_file(&src, &dest, Overwrite::Forbid).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(src.exists());

        move_file(&src, &dest, Overwrite::Allow).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = move_file(
            &dir.path().join("nope.jpg"),
            &dir.path().join("out").join("nope.jpg"),
            Overwrite::Forbid,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Move { .. }));
    }

    #[test]
    fn test_copy_verify_remove() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("clip.mov");
        let dest = dir.path().join("clip_copy.mov");
        fs::write(&src, vec![7u8; 300 * 1024]).unwrap();

        copy_verify_remove(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::metadata(&dest).unwrap().len(), 300 * 1024);
    }

    #[test]
    fn test_first_free_path() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("x.jpg");
        assert_eq!(first_free_path(&base, |p| p.exists()).unwrap(), base);

        fs::write(&base, b"1").unwrap();
        fs::write(dir.path().join("x_1.jpg"), b"2").unwrap();
        assert_eq!(
            first_free_path(&base, |p| p.exists()).unwrap(),
            dir.path().join("x_2.jpg")
        );

        assert_eq!(
            suffixed_path(Path::new("/a/noext"), 3),
            PathBuf::from("/a/noext_3")
        );
    }

    #[test]
    fn test_remove_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("a").join("b")).unwrap();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::write(root.join("keep").join("f.jpg"), b"f").unwrap();

        let removed = remove_empty_dirs(&root, false).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!root.join("a").exists());
        assert!(root.join("keep").exists());
        assert_eq!(count_files(&root), 1);

        fs::remove_file(root.join("keep").join("f.jpg")).unwrap();
        remove_empty_dirs(&root, true).unwrap();
        assert!(!root.exists());
    }
}
