// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use std::path::Path;

pub fn path_to_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))
}

/// Create `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| Error::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success.
/// Returns true if a file was actually removed.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    // No exists() check first: avoids a TOCTOU window
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn temp_sibling(path: &Path) -> Result<std::path::PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;
    let random_suffix: u64 = rand::Rng::random(&mut rand::rng());
    Ok(parent.join(format!(".tmp-{:x}", random_suffix)))
}

fn rename_into_place(temp_path: &Path, path: &Path) -> Result<()> {
    std::fs::rename(temp_path, path).map_err(|e| {
        if temp_path.exists() {
            let _ = std::fs::remove_file(temp_path);
        }
        Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Atomically write data to a file using a temporary file and rename.
/// Readers never observe a half-written file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = temp_sibling(path)?;

    let mut file = std::fs::File::create(&temp_path).map_err(|e| Error::WriteFile {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents).map_err(|e| Error::WriteFile {
        path: temp_path.clone(),
        source: e,
    })?;

    file.sync_all().map_err(|e| Error::WriteFile {
        path: temp_path.clone(),
        source: e,
    })?;

    drop(file);

    rename_into_place(&temp_path, path)
}

/// Atomically write a file holding key material, readable by the owner only.
pub fn atomic_write_secret(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_sibling(path)?;
    write_secret_file(&temp_path, contents)?;
    rename_into_place(&temp_path, path)
}

#[cfg(unix)]
pub fn write_secret_file(path: &Path, contents: &[u8]) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

    file.write_all(contents).map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(not(unix))]
pub fn write_secret_file(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_if_exists_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("stale.cer");
        std::fs::write(&path, b"old").expect("write should succeed");

        assert!(remove_if_exists(&path).expect("first remove should succeed"));
        assert!(!path.exists());
        assert!(!remove_if_exists(&path).expect("second remove should be a no-op"));
    }

    #[test]
    fn test_atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("config.toml");

        atomic_write(&path, b"first").expect("first write should succeed");
        atomic_write(&path, b"second").expect("second write should succeed");

        assert_eq!(std::fs::read(&path).expect("read should succeed"), b"second");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir should succeed")
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "temp files should be renamed away");
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_secret_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("push.key");
        atomic_write_secret(&path, b"key").expect("secret write should succeed");

        let mode = std::fs::metadata(&path)
            .expect("metadata should be readable")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).expect("ensure_dir should succeed");
        assert!(nested.is_dir());
        ensure_dir(&nested).expect("ensure_dir should be idempotent");
    }
}
