//! Collision-safe file moves.
//!
//! A file is moved into a destination directory under its own name. If that
//! name is taken, a counter is inserted before the extension
//! (`report(1).pdf`, `report(2).pdf`, ...) until a free name is found, so an
//! existing file is never replaced.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while relocating a single file.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// The source vanished before it could be moved.
    #[error("{} no longer exists", .0.display())]
    SourceNotFound(PathBuf),

    /// The source could not be read or removed.
    #[error("permission denied moving {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The destination directory could not be created or written to.
    #[error("cannot write to {}: {source}", dir.display())]
    DestinationNotWritable { dir: PathBuf, source: io::Error },

    /// The destination filesystem ran out of space.
    #[error("no space left writing {}", .0.display())]
    StorageFull(PathBuf),

    /// The source path has no file name component.
    #[error("{} has no file name", .0.display())]
    InvalidSource(PathBuf),

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

impl RelocateError {
    pub(crate) fn from_io(err: io::Error, from: &Path, to: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound if !from.exists() => Self::SourceNotFound(from.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(from.to_path_buf()),
            io::ErrorKind::StorageFull => Self::StorageFull(to.to_path_buf()),
            _ => Self::Io {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source: err,
            },
        }
    }

    fn from_dir_io(err: io::Error, dir: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::StorageFull => Self::StorageFull(dir.to_path_buf()),
            _ => Self::DestinationNotWritable {
                dir: dir.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Result type for relocation.
pub type RelocateResult<T> = Result<T, RelocateError>;

/// Returns the first free path for `file_name` inside `dir`.
///
/// # Examples
///
/// ```no_run
/// use reshelve::relocator::unique_destination;
/// use std::path::Path;
///
/// // With /out/report.pdf already present:
/// let path = unique_destination(Path::new("/out"), "report.pdf".as_ref());
/// assert_eq!(path, Path::new("/out/report(1).pdf"));
/// ```
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    unique_destination_with(dir, file_name, exists_no_follow)
}

/// Like [`unique_destination`], with the caller deciding which paths are taken.
pub fn unique_destination_with(
    dir: &Path,
    file_name: &OsStr,
    is_taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let candidate = dir.join(file_name);
    if !is_taken(&candidate) {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter: u64 = 1;
    loop {
        let candidate = dir.join(format!("{}({}){}", stem, counter, extension));
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

pub(crate) fn exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Moves `source` into `destination_dir`, returning the path actually used.
///
/// The destination directory is created if needed. The move is a rename when
/// both paths share a filesystem and a copy followed by a delete otherwise.
pub fn relocate(source: &Path, destination_dir: &Path) -> RelocateResult<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| RelocateError::InvalidSource(source.to_path_buf()))?;

    if !exists_no_follow(source) {
        return Err(RelocateError::SourceNotFound(source.to_path_buf()));
    }

    fs::create_dir_all(destination_dir)
        .map_err(|e| RelocateError::from_dir_io(e, destination_dir))?;

    let destination = unique_destination(destination_dir, file_name);
    move_file(source, &destination)?;
    debug!(from = %source.display(), to = %destination.display(), "relocated");
    Ok(destination)
}

/// Moves `current` back to `original`, recreating missing parent directories.
///
/// If `original` is occupied again, the file lands beside it under a
/// disambiguated name. Returns the path the file was restored to.
pub fn restore(current: &Path, original: &Path) -> RelocateResult<PathBuf> {
    let parent = original
        .parent()
        .ok_or_else(|| RelocateError::InvalidSource(original.to_path_buf()))?;
    let file_name = original
        .file_name()
        .ok_or_else(|| RelocateError::InvalidSource(original.to_path_buf()))?;

    if !exists_no_follow(current) {
        return Err(RelocateError::SourceNotFound(current.to_path_buf()));
    }

    fs::create_dir_all(parent).map_err(|e| RelocateError::from_dir_io(e, parent))?;

    let target = unique_destination(parent, file_name);
    move_file(current, &target)?;
    debug!(from = %current.display(), to = %target.display(), "restored");
    Ok(target)
}

/// Copies `source` into `destination_dir` under a collision-free name.
pub fn copy_into(source: &Path, destination_dir: &Path) -> RelocateResult<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| RelocateError::InvalidSource(source.to_path_buf()))?;

    if !source.is_file() {
        return Err(RelocateError::SourceNotFound(source.to_path_buf()));
    }

    fs::create_dir_all(destination_dir)
        .map_err(|e| RelocateError::from_dir_io(e, destination_dir))?;

    let destination = unique_destination(destination_dir, file_name);
    copy_exclusive(source, &destination)?;
    debug!(from = %source.display(), to = %destination.display(), "copied");
    Ok(destination)
}

fn move_file(source: &Path, destination: &Path) -> RelocateResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices && source.is_file() => {
            copy_exclusive(source, destination)?;
            fs::remove_file(source).map_err(|e| {
                // Leave the source in place; drop the half of the move we made.
                let _ = fs::remove_file(destination);
                RelocateError::from_io(e, source, destination)
            })
        }
        Err(e) => Err(RelocateError::from_io(e, source, destination)),
    }
}

/// Copies contents and permissions, refusing to replace an existing file.
fn copy_exclusive(source: &Path, destination: &Path) -> RelocateResult<()> {
    let mut reader = File::open(source).map_err(|e| RelocateError::from_io(e, source, destination))?;
    let mut writer =
        File::create_new(destination).map_err(|e| RelocateError::from_io(e, source, destination))?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    if let Err(e) = copied {
        drop(writer);
        let _ = fs::remove_file(destination);
        return Err(RelocateError::from_io(e, source, destination));
    }

    if let Ok(metadata) = reader.metadata() {
        let _ = fs::set_permissions(destination, metadata.permissions());
    }
    Ok(())
}
