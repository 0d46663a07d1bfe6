//! Crash-safe JSON file writes.
//!
//! The value is written to `<name>.tmp` in the target's directory, flushed
//! and synced, then renamed over the target. A crash before the rename
//! leaves the previous file intact; the stray temp file is overwritten by
//! the next write.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::DbError;

/// Sibling temp path used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("snapshot"), OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if encoding fails, or
/// [`DbError::Io`] if any filesystem step fails.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DbError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let file = File::create(&tmp)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    std::fs::rename(&tmp, path)?;
    Ok(())
}
