//! Filesystem helpers for the sandbox sync engine.
//!
//! Every copy goes through a temp file in the destination directory and a
//! rename, so an interrupted sync never leaves a half-written credential.

use path_clean::PathClean;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::error::SyncError;

/// True if `child` is `parent` or lies below it.
///
/// Both sides are resolved through symlinks first (macOS aliases `/var` to
/// `/private/var`); paths that do not exist are compared in cleaned form.
/// Comparison is per component, so a directory literally named `..foo` is
/// still inside its parent.
pub(crate) fn path_within(child: &Path, parent: &Path) -> bool {
    let parent = resolve_or_clean(parent);
    let child = resolve_or_clean(child);
    child.strip_prefix(&parent).is_ok()
}

fn resolve_or_clean(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.clean())
}

/// Resolve `path` through symlinks and require the target to stay within `boundary`.
///
/// The target can change between this check and the copy that follows.
/// That window is accepted: the synced directories are owned by the local
/// user, and anyone who can rewrite them already controls the session.
pub(crate) fn resolve_and_validate_symlink(
    path: &Path,
    boundary: &Path,
) -> Result<PathBuf, SyncError> {
    let resolved = fs::canonicalize(path).map_err(|source| SyncError::Unresolvable {
        path: path.to_path_buf(),
        source,
    })?;
    if !path_within(&resolved, boundary) {
        return Err(SyncError::OutsideBoundary {
            path: path.to_path_buf(),
            boundary: boundary.to_path_buf(),
            resolved,
        });
    }
    Ok(resolved)
}

fn temp_file_beside(dst: &Path) -> io::Result<tempfile::NamedTempFile> {
    let parent = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tempfile::Builder::new().prefix(".copy-").tempfile_in(parent)
}

/// Copy `src` to `dst` atomically.
///
/// The copy gets `min(source mode, 0o700)`: plugin and hook scripts keep
/// their execute bit, nothing becomes group or world readable beyond what
/// the source allowed.
pub(crate) fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let mut tmp = temp_file_beside(dst)?;
    io::copy(&mut input, tmp.as_file_mut())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = input.metadata()?.permissions().mode() & 0o777;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode.min(0o700)))?;
    }

    tmp.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

/// Write `contents` to `path` atomically with mode 0600.
pub(crate) fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = temp_file_beside(path)?;
    tmp.write_all(contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Truncate and rewrite `path` in place with mode 0600.
///
/// For files bind-mounted individually: a rename would swap the inode and
/// a running container would keep seeing the old one. The parent dir is
/// writable from inside the container, so symlinks are never followed:
/// anything at `path` other than a regular file is removed and the file is
/// created fresh.
pub(crate) fn overwrite_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let existing = match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_file() => Some(meta),
        Ok(meta) => {
            warn!(path = %path.display(), "Replacing non-regular file");
            remove_entry(path, &meta)?;
            None
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let mut options = fs::OpenOptions::new();
    options.write(true);
    // O_EXCL refuses to follow a symlink planted after the check above.
    options.create_new(existing.is_none());
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    if let Some(before) = &existing {
        ensure_same_file(before, &file.metadata()?)?;
    }
    file.set_len(0)?;
    file.write_all(contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Fails if the opened file is not the one that was checked beforehand.
#[cfg(unix)]
fn ensure_same_file(before: &fs::Metadata, opened: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::MetadataExt;
    if before.dev() == opened.dev() && before.ino() == opened.ino() {
        Ok(())
    } else {
        Err(io::Error::other("file was replaced while opening"))
    }
}

#[cfg(not(unix))]
fn ensure_same_file(_before: &fs::Metadata, _opened: &fs::Metadata) -> io::Result<()> {
    Ok(())
}

fn remove_entry(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Make `path` a real directory with mode 0700.
///
/// A symlink or file found there is removed first, so writes below `path`
/// cannot be redirected elsewhere. An existing directory is kept as is.
pub(crate) fn ensure_real_dir(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(meta) => {
            warn!(path = %path.display(), "Replacing non-directory with a directory");
            remove_entry(path, &meta)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    create_private_dir(path)
}

/// `mkdir -p` with mode 0700 for every created component
pub(crate) fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

/// Copy a directory tree, following symlinks that stay inside `src`.
///
/// Broken or escaping entries are skipped with a warning. Recursion uses the
/// resolved path so a symlink cannot move the boundary for the next level.
/// Destination dirs are never followed through symlinks.
pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), SyncError> {
    let root = std::path::absolute(src).map_err(|source| SyncError::Unresolvable {
        path: src.to_path_buf(),
        source,
    })?;
    fs::metadata(&root).map_err(|source| SyncError::Unresolvable {
        path: root.clone(),
        source,
    })?;
    ensure_real_dir(dst).map_err(|source| SyncError::CreateDir {
        path: dst.to_path_buf(),
        source,
    })?;

    let read_err = |source| SyncError::ReadDir {
        path: root.clone(),
        source,
    };
    for entry in fs::read_dir(&root).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let resolved = match resolve_and_validate_symlink(&src_path, &root) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %src_path.display(), error = %e, "Skipping entry in recursive copy");
                continue;
            }
        };
        let meta = match fs::metadata(&resolved) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %src_path.display(), error = %e, "Skipping entry in recursive copy");
                continue;
            }
        };

        if meta.is_dir() {
            copy_dir_recursive(&resolved, &dst_path)?;
        } else {
            copy_file(&resolved, &dst_path).map_err(|source| SyncError::Copy {
                src: resolved,
                dst: dst_path,
                source,
            })?;
        }
    }
    Ok(())
}
