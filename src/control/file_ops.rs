//! Atomic file operations for service definition files.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::ServiceError;

/// Write file atomically (temp file in the same directory, then rename) with mode 0644.
pub(super) fn write_file_atomic(path: &Path, content: &str) -> Result<(), ServiceError> {
    let dir = path
        .parent()
        .ok_or_else(|| ServiceError::invalid("definitionPath", format!("{} has no parent", path.display())))?;

    fs::create_dir_all(dir)
        .map_err(|e| ServiceError::io(format!("creating {}", dir.display()), e))?;

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| ServiceError::io(format!("creating temp file in {}", dir.display()), e))?;

    temp.write_all(content.as_bytes())
        .map_err(|e| ServiceError::io("writing temp file", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| ServiceError::io("syncing temp file", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(|e| ServiceError::io("setting definition file permissions", e))?;
    }

    temp.persist(path)
        .map_err(|e| ServiceError::io(format!("renaming into {}", path.display()), e.error))?;

    Ok(())
}

/// Remove a definition file; an already-missing file is fine.
pub(super) fn remove_file_if_exists(path: &Path) -> Result<(), ServiceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ServiceError::io(format!("removing {}", path.display()), e)),
    }
}
