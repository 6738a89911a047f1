// src/utils/files.rs

use std::{fs, io::ErrorKind, path::Path};

use anyhow::{Context, Result};

use crate::system::CleanupSummary;

/// File and folder names directly inside `dir`, sorted. A missing directory
/// lists as empty.
pub fn list_directory(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list '{}'", dir.display())),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list '{}'", dir.display()))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Deletes the top-level files of `dir`, then its top-level folders
/// recursively. Anything that refuses to go counts as skipped.
pub fn clean_directory(dir: &Path) -> Result<CleanupSummary> {
    let mut summary = CleanupSummary::default();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(summary),
        Err(e) => return Err(e).with_context(|| format!("Failed to open '{}'", dir.display())),
    };

    let mut folders = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(kind) if kind.is_dir() => folders.push(path),
            Ok(_) => match fs::remove_file(&path) {
                Ok(()) => summary.deleted_files += 1,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    summary.skipped += 1;
                }
            },
            Err(_) => summary.skipped += 1,
        }
    }

    for folder in folders {
        match fs::remove_dir_all(&folder) {
            Ok(()) => summary.deleted_dirs += 1,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", folder.display(), e);
                summary.skipped += 1;
            }
        }
    }

    tracing::info!(
        "Cleaned {}: {} files, {} folders, {} skipped",
        dir.display(),
        summary.deleted_files,
        summary.deleted_dirs,
        summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_files_then_folders() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tmp"), b"a").unwrap();
        fs::write(dir.path().join("b.log"), b"b").unwrap();
        fs::create_dir_all(dir.path().join("cache").join("nested")).unwrap();
        fs::write(dir.path().join("cache").join("nested").join("c.bin"), b"c").unwrap();

        assert_eq!(
            list_directory(dir.path()).unwrap(),
            vec!["a.tmp", "b.log", "cache"]
        );

        let summary = clean_directory(dir.path()).unwrap();
        assert_eq!(
            summary,
            CleanupSummary {
                deleted_files: 2,
                deleted_dirs: 1,
                skipped: 0,
            }
        );
        assert!(list_directory(dir.path()).unwrap().is_empty());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert!(list_directory(&missing).unwrap().is_empty());
        assert_eq!(clean_directory(&missing).unwrap(), CleanupSummary::default());
    }
}
