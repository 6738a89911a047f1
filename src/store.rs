// src/store.rs

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::{debug, warn};

use crate::errors::{TweakError, TweakResult};

/// Persisted key -> bool map for tweaks whose state cannot be read back from
/// the OS.
///
/// The file is a flat, pretty-printed JSON object. Every `set` rewrites the
/// whole document; an in-process mutex serializes read-modify-write cycles.
#[derive(Debug)]
pub struct ManagedStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ManagedStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored value for `key`, `false` when the key or the file
    /// is absent, and `StoreCorrupt` when the file cannot be parsed.
    pub fn get(&self, key: &str) -> TweakResult<bool> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.get(key).copied().unwrap_or(false))
    }

    /// Upserts one key and rewrites the file.
    ///
    /// A corrupt file is replaced by a fresh map containing only this entry.
    pub fn set(&self, key: &str, value: bool) -> TweakResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(TweakError::StoreCorrupt { source, .. }) => {
                warn!(
                    "Replacing unreadable managed state at {}: {}",
                    self.path.display(),
                    source
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(key.to_string(), value);
        self.save(&entries)?;

        debug!("Managed state {:?} -> {}", key, value);
        Ok(())
    }

    /// All entries currently on disk.
    pub fn entries(&self) -> TweakResult<BTreeMap<String, bool>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    fn load(&self) -> TweakResult<BTreeMap<String, bool>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(TweakError::io(&self.path, e)),
        };

        if contents.trim().is_empty() || contents.trim() == "null" {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|source| TweakError::StoreCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &BTreeMap<String, bool>) -> TweakResult<()> {
        write_json_atomically(&self.path, entries)
    }
}

/// Serializes `value` as pretty JSON into a sibling temp file and renames it
/// over `path`, creating parent directories first.
pub(crate) fn write_json_atomically<T: serde::Serialize>(path: &Path, value: &T) -> TweakResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TweakError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json).map_err(|e| TweakError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| TweakError::io(path, e))?;
    Ok(())
}
