//! Owner-only file writes for key and account files
//!
//! Both writers create missing parent directories. Files are created with
//! mode 0o600 (read/write for owner only) on Unix systems.

use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `contents` to `path` by truncating it in place.
pub fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;

    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| XcreeptorError::io(format!("failed to open {}", path.display()), e))?;

        file.write_all(contents).map_err(|e| {
            XcreeptorError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)
            .map_err(|e| XcreeptorError::io(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }
}

/// Replace `path` with `contents` atomically (tempfile + fsync + rename).
///
/// Either the old file or the new file exists afterwards, never a partial one.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = ensure_parent_dir(path)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        XcreeptorError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        XcreeptorError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        XcreeptorError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        XcreeptorError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                XcreeptorError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        XcreeptorError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Create the directory containing `path` and return it. A bare file name
/// resolves to the current directory.
fn ensure_parent_dir(path: &Path) -> Result<&Path> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| {
        XcreeptorError::io(format!("failed to create directory {}", dir.display()), e)
    })?;
    Ok(dir)
}
