//! Atomic file replacement and size-capped reads for the key file.
//!
//! Writes go to a temp file in the destination directory, are fsynced, then renamed
//! over the destination, and the directory is fsynced. A crash at any point leaves
//! either the old complete file or the new complete file on disk.

use crate::error::{LeaseError, LeaseResult};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

/// Default cap on the size of the key file.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Replaces `path` with `data` using temp file, fsync and rename.
pub fn atomic_write(path: &Path, data: &[u8]) -> LeaseResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| LeaseError::io("create storage directory", e))?;

    // Same directory keeps the rename on one filesystem.
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| LeaseError::io("create temp file", e))?;
    tmp.write_all(data)
        .map_err(|e| LeaseError::io("write temp file", e))?;
    tmp.flush().map_err(|e| LeaseError::io("flush temp file", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| LeaseError::io("fsync temp file", e))?;
    tmp.persist(path)
        .map_err(|e| LeaseError::io("rename temp file", e.error))?;

    fsync_directory(parent)
}

/// Reads `path` fully, refusing files larger than `max_size`.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn bounded_read(path: &Path, max_size: u64) -> LeaseResult<Option<Vec<u8>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LeaseError::io("open storage file", e)),
    };

    let metadata = file
        .metadata()
        .map_err(|e| LeaseError::io("stat storage file", e))?;
    if !metadata.is_file() {
        return Err(LeaseError::StorageCorrupt(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > max_size {
        return Err(LeaseError::StorageCorrupt(format!(
            "{} is {} bytes, exceeding the {} byte limit",
            path.display(),
            metadata.len(),
            max_size
        )));
    }

    // The file may grow after the size check.
    let mut buf = Vec::with_capacity(metadata.len() as usize);
    file.take(max_size.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| LeaseError::io("read storage file", e))?;
    if buf.len() as u64 > max_size {
        return Err(LeaseError::StorageCorrupt(format!(
            "{} grew past the {} byte limit while reading",
            path.display(),
            max_size
        )));
    }
    Ok(Some(buf))
}

#[cfg(unix)]
fn fsync_directory(dir: &Path) -> LeaseResult<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| LeaseError::io("fsync storage directory", e))
}

#[cfg(not(unix))]
fn fsync_directory(_dir: &Path) -> LeaseResult<()> {
    Ok(())
}
