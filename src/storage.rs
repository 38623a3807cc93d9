// SPDX-License-Identifier: GPL-3.0-only

//! Output directory management
//!
//! Each recording session gets its own timestamped directory under the
//! output root:
//!
//! ```text
//! <root>/<YYYY-MM-DDTHH-MM-SS>/image_sequence/
//! ```
//!
//! The root is created on demand and checked for writability with a probe
//! file before any sink is opened.

use crate::constants::output::{
    FALLBACK_ROOT, DEFAULT_FOLDER, IMAGE_SEQUENCE_DIR, PROBE_FILE, SESSION_TIMESTAMP_FORMAT,
};
use crate::errors::StorageError;
use chrono::{DateTime, Local};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default output root: `<video dir>/Greenscreen`, or `./output` without one
pub fn default_output_root() -> PathBuf {
    dirs::video_dir()
        .map(|dir| dir.join(DEFAULT_FOLDER))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_ROOT))
}

/// Make sure `root` exists and can be written to
pub fn init_output_dir(root: &Path) -> Result<(), StorageError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(StorageError::NotWritable {
                path: root.to_path_buf(),
                reason: "exists and is not a directory".into(),
            });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %root.display(), "Creating output directory");
            create_dir(root)?;
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(StorageError::PermissionDenied(root.to_path_buf()));
        }
        Err(e) => return Err(StorageError::Other(format!("{}: {}", root.display(), e))),
    }

    probe_writable(root)
}

/// Write and remove a probe file in `dir`
fn probe_writable(dir: &Path) -> Result<(), StorageError> {
    let probe = dir.join(PROBE_FILE);
    let result = fs::File::create(&probe).and_then(|mut file| file.write_all(b"probe"));
    let _ = fs::remove_file(&probe);

    result.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => StorageError::PermissionDenied(dir.to_path_buf()),
        _ => StorageError::NotWritable {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    debug!(path = %dir.display(), "Output directory is writable");
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(path).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => StorageError::PermissionDenied(path.to_path_buf()),
        _ => StorageError::CreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

/// Directory name for a session started at `now`
pub fn session_dir_name(now: &DateTime<Local>) -> String {
    now.format(SESSION_TIMESTAMP_FORMAT).to_string()
}

/// Create a fresh session directory and its still-sequence subdirectory
///
/// Sessions started within the same second get `_1`, `_2`, ... suffixes so a
/// new session never reuses an existing directory.
pub fn create_session_dir(root: &Path, now: &DateTime<Local>) -> Result<PathBuf, StorageError> {
    let base = session_dir_name(now);

    let mut candidate = root.join(&base);
    let mut suffix = 0u32;
    while candidate.exists() {
        suffix += 1;
        candidate = root.join(format!("{}_{}", base, suffix));
    }

    create_dir(&candidate.join(IMAGE_SEQUENCE_DIR))?;
    info!(path = %candidate.display(), "Created session directory");
    Ok(candidate)
}

/// Remove a session directory that no recording ever used
///
/// Only empty directories go; a session with any output is left alone.
pub fn discard_session_dir(dir: &Path) {
    let removed = fs::remove_dir(dir.join(IMAGE_SEQUENCE_DIR)).and_then(|_| fs::remove_dir(dir));
    match removed {
        Ok(()) => debug!(path = %dir.display(), "Removed unused session directory"),
        Err(e) => debug!(path = %dir.display(), error = %e, "Session directory left in place"),
    }
}
