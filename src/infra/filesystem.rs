//! Filesystem helpers
//!
//! Tree copies and directory bookkeeping used by the workspace and the
//! dependency-copy stage.

use std::path::Path;
use walkdir::WalkDir;

use crate::error::FilesystemError;

/// True when the path does not exist or is a directory with no entries
pub fn dir_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Remove a directory tree if present and recreate it empty
pub fn clear_dir(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Recursively copy the contents of `src` into `dest`.
///
/// `dest` is created if missing; existing files are overwritten. Symlinks are
/// followed, matching the behavior of the copy commands this replaces.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), FilesystemError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| FilesystemError::Copy {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            error: e.to_string(),
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| FilesystemError::Copy {
                from: entry.path().to_path_buf(),
                to: dest.to_path_buf(),
                error: e.to_string(),
            })?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| FilesystemError::CreateDir {
                path: target.clone(),
                error: e.to_string(),
            })?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| FilesystemError::CreateDir {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| FilesystemError::Copy {
                from: entry.path().to_path_buf(),
                to: target.clone(),
                error: e.to_string(),
            })?;
        }
    }
    Ok(())
}

/// Copy `src` into `dest_root`, recreating its absolute path underneath.
///
/// `/usr/lib/libfoo.so` lands at `<dest_root>/usr/lib/libfoo.so`; a
/// directory source is copied recursively.
pub fn copy_with_parents(src: &Path, dest_root: &Path) -> Result<(), FilesystemError> {
    let relative = src.strip_prefix("/").unwrap_or(src);
    let target = dest_root.join(relative);

    if src.is_dir() {
        return copy_tree(src, &target);
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FilesystemError::CreateDir {
            path: parent.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    std::fs::copy(src, &target).map_err(|e| FilesystemError::Copy {
        from: src.to_path_buf(),
        to: target,
        error: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_is_empty_for_missing_path() {
        let temp = TempDir::new().unwrap();
        assert!(dir_is_empty(&temp.path().join("does-not-exist")));
    }

    #[test]
    fn test_dir_is_empty_for_populated_dir() {
        let temp = TempDir::new().unwrap();
        assert!(dir_is_empty(temp.path()));

        std::fs::write(temp.path().join("file"), "x").unwrap();
        assert!(!dir_is_empty(temp.path()));
    }

    #[test]
    fn test_clear_dir_empties_and_recreates() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("stage");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/file"), "x").unwrap();

        clear_dir(&dir).unwrap();

        assert!(dir.exists());
        assert!(dir_is_empty(&dir));
    }

    #[test]
    fn test_copy_tree_copies_nested_files() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("dest");
        std::fs::create_dir_all(src.join("usr/bin")).unwrap();
        std::fs::write(src.join("usr/bin/app"), "binary").unwrap();
        std::fs::write(src.join("top.desktop"), "entry").unwrap();

        copy_tree(&src, &dest).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("usr/bin/app")).unwrap(),
            "binary"
        );
        assert_eq!(
            std::fs::read_to_string(dest.join("top.desktop")).unwrap(),
            "entry"
        );
    }

    #[test]
    fn test_copy_with_parents_preserves_absolute_layout() {
        let temp = TempDir::new().unwrap();
        let src_root = TempDir::new().unwrap();
        let lib = src_root.path().join("lib/libextra.so");
        std::fs::create_dir_all(lib.parent().unwrap()).unwrap();
        std::fs::write(&lib, "so").unwrap();

        copy_with_parents(&lib, temp.path()).unwrap();

        let expected = temp
            .path()
            .join(lib.strip_prefix("/").unwrap());
        assert!(expected.exists());
    }
}
