use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrefKey {
    LastHub,
    Nickname,
}

/// Plain string key/value store for the few values a client remembers.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: PrefKey) -> Option<String>;
    fn set(&self, key: PrefKey, value: &str) -> ClientResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<PrefKey, String>>,
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: PrefKey) -> Option<String> {
        self.values.lock().ok()?.get(&key).cloned()
    }

    fn set(&self, key: PrefKey, value: &str) -> ClientResult<()> {
        self.values
            .lock()
            .map_err(|e| ClientError::Preferences(e.to_string()))?
            .insert(key, value.to_string());
        Ok(())
    }
}

/// Preferences persisted as a JSON object. A missing or unreadable file
/// starts empty.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<PrefKey, String>>,
}

impl FilePreferences {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        debug!("Loaded preferences from {}", path.display());
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<PrefKey, String>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ClientError::Preferences(e.to_string()))?;
        }
        let json = serde_json::to_vec_pretty(values)
            .map_err(|e| ClientError::Preferences(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| ClientError::Preferences(e.to_string()))
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: PrefKey) -> Option<String> {
        self.values.lock().ok()?.get(&key).cloned()
    }

    fn set(&self, key: PrefKey, value: &str) -> ClientResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| ClientError::Preferences(e.to_string()))?;
        values.insert(key, value.to_string());
        self.persist(&values)
    }
}
