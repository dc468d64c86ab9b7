use std::fs;
use std::path::Path;

/// Write content by way of a temp file and a rename.
///
/// On Unix the rename is atomic. Windows refuses to rename over an existing
/// file, so the old file is moved to `.bak` first and restored if the final
/// rename fails.
pub(crate) fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Owner read/write only
        if let Err(err) = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600)) {
            tracing::debug!(path = %tmp_path.display(), error = %err, "could not restrict permissions");
        }
    }

    #[cfg(windows)]
    {
        let backup_path = path.with_extension("bak");
        if backup_path.exists() {
            let _ = fs::remove_file(&backup_path);
        }
        if path.exists() {
            if let Err(err) = fs::rename(path, &backup_path) {
                let _ = fs::remove_file(&tmp_path);
                return Err(err.into());
            }
        }
        if let Err(err) = fs::rename(&tmp_path, path) {
            if backup_path.exists() {
                let _ = fs::rename(&backup_path, path);
            }
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        let _ = fs::remove_file(&backup_path);
        return Ok(());
    }

    #[cfg(not(windows))]
    {
        if let Err(err) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }
}

/// Move an unreadable file aside as `<name>.<ext>.corrupt` so it is not
/// overwritten by the next save.
pub(crate) fn preserve_corrupt(path: &Path, content: &str) {
    let corrupt_path = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.corrupt", ext.to_string_lossy())),
        None => path.with_extension("corrupt"),
    };
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
    tracing::warn!(
        path = %path.display(),
        backup = %corrupt_path.display(),
        "unreadable file moved aside"
    );
}
