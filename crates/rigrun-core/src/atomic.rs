//! Crash-safe atomic file writes.
//!
//! The write sequence is: create a temp file in the target's directory,
//! write the payload, fsync the file, set permissions, rename over the
//! target, and fsync the directory before and after the rename (non-Windows).
//! A crash at any point leaves either the complete old file or the complete
//! new file on disk, never a partial one.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Write `bytes` to `path` atomically with the given Unix `mode`.
///
/// Any intermediate failure removes the temp file before the error is
/// returned, so no stray `.tmp` files accumulate.
///
/// # Errors
///
/// Returns [`CoreError::AtomicWrite`] naming the stage that failed.
pub fn write(path: &Path, bytes: &[u8], mode: u32) -> CoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rigrun".to_owned()),
        Uuid::new_v4().simple()
    ));

    let wrap = |stage: &'static str, source: std::io::Error| CoreError::AtomicWrite {
        path: path.display().to_string(),
        stage,
        source,
    };

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .map_err(|e| wrap("create", e))?;

        file.write_all(bytes).map_err(|e| wrap("write", e))?;
        file.sync_all().map_err(|e| wrap("sync", e))?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(mode))
                .map_err(|e| wrap("chmod", e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        #[cfg(not(windows))]
        sync_dir(dir).map_err(|e| wrap("dir-sync", e))?;

        std::fs::rename(&tmp_path, path).map_err(|e| wrap("rename", e))?;

        #[cfg(not(windows))]
        sync_dir(dir).map_err(|e| wrap("dir-sync", e))?;

        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(not(windows))]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}
