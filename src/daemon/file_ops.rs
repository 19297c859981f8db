//! Atomic artifact writes for service backends.
//!
//! Scripts and binary copies are staged next to their destination with final
//! permissions already applied, then renamed into place, so a control utility
//! never observes a half-written or non-executable artifact.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::info;

use crate::error::{IoContext, Result};

/// Write `content` to `path` atomically with the given Unix mode
pub(super) fn write_file_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .io_context(|| format!("Failed to create temp file {}", temp_path.display()))?;

        file.write_all(content)
            .io_context(|| format!("Failed to write temp file {}", temp_path.display()))?;

        file.sync_all()
            .io_context(|| format!("Failed to sync temp file {}", temp_path.display()))?;
    }

    set_mode(&temp_path, mode)?;

    fs::rename(&temp_path, path)
        .io_context(|| format!("Failed to rename temp file to {}", path.display()))?;

    info!("wrote {}", path.display());
    Ok(())
}

/// Copy an executable to `dest` atomically
///
/// Replacing by rename also avoids "text file busy" when the old copy is
/// still running.
pub(super) fn copy_executable(src: &Path, dest: &Path) -> Result<()> {
    let temp_path = dest.with_extension("tmp");

    fs::copy(src, &temp_path).io_context(|| {
        format!(
            "Failed to copy {} to {}",
            src.display(),
            temp_path.display()
        )
    })?;

    set_mode(&temp_path, 0o755)?;

    fs::rename(&temp_path, dest)
        .io_context(|| format!("Failed to rename temp file to {}", dest.display()))?;

    info!("installed {} as {}", src.display(), dest.display());
    Ok(())
}

/// Create `path` (and parents), applying `mode` to the leaf directory
///
/// An existing directory is left as it is, permissions included.
pub(super) fn create_dir_with_mode(path: &Path, mode: u32) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
        .io_context(|| format!("Failed to create directory {}", path.display()))?;
    set_mode(path, mode)
}

/// Remove a file, directory tree or symlink; absent paths are fine
pub(super) fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(crate::error::DaemonError::io(
                format!("Failed to stat {}", path.display()),
                e,
            ));
        }
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        // plain files and symlinks (the link itself, never its target)
        fs::remove_file(path)
    };
    removed.io_context(|| format!("Failed to remove {}", path.display()))?;

    info!("removed {}", path.display());
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .io_context(|| format!("Failed to get metadata for {}", path.display()))?
            .permissions();
        perms.set_mode(mode);
        fs::set_permissions(path, perms)
            .io_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    #[cfg(not(unix))]
    let _ = (path, mode);

    Ok(())
}
