use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::error::{AppError, AppResult};

/// Durable scope persisted as a flat JSON object. Every write rewrites the file
/// through a temp file + rename so a crash never leaves a half-written map.
pub struct FileStore {
    path: PathBuf,
    map: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Load the map from `path`, or start empty if the file does not exist.
    /// A file that fails to parse is treated as empty and overwritten on the next write.
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let map = if path.exists() {
            let bytes = fs::read(&path)
                .map_err(|e| AppError::io("store_read".to_string(), format!("{}: {}", path.display(), e)))?;
            match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(m) => m,
                Err(e) => {
                    warn!(target: "storage", path = %path.display(), error = %e, "durable store unreadable; starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(target: "storage", path = %path.display(), keys = map.len(), "durable store opened");
        Ok(Self { path, map: Mutex::new(map) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn persist(&self, map: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Option<String> { self.map.lock().get(key).cloned() }

    // Memory only changes once the file does, so a failed write leaves both agreeing.
    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        let mut map = self.map.lock();
        let mut next = map.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let mut map = self.map.lock();
        if !map.contains_key(key) {
            return Ok(());
        }
        let mut next = map.clone();
        next.remove(key);
        self.persist(&next)?;
        *map = next;
        Ok(())
    }
}
