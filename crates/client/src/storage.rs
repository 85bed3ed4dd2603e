//! Cross-platform key/value persistence.
//!
//! Backends:
//! - Web: `localStorage`
//! - Native: JSON files in the platform config directory
//!   (e.g. `~/.config/lanescore/` on Linux)
//! - Tests: an in-memory map
//!
//! No transactional guarantees; values are plain strings the typed layer in
//! [`crate::session_store`] serializes with serde.

use std::collections::HashMap;
use std::sync::Mutex;

/// Raw string storage. Key iteration is needed so cached snapshots can be
/// cleared by prefix.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Option<String>;
    /// Returns `true` if the write succeeded.
    fn set(&self, key: &str, value: &str) -> bool;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// Platform-default backend.
pub fn default_backend() -> Box<dyn StorageBackend> {
    platform_backend()
}

/// In-memory backend for tests and as a last-resort fallback.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl StorageBackend for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.items.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        match self.items.lock() {
            Ok(mut items) => {
                items.insert(key.to_string(), value.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.remove(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.items
            .lock()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// =========================================
// Web (WASM) implementation
// =========================================

#[cfg(target_arch = "wasm32")]
pub struct LocalStorage;

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok()?
    }
}

#[cfg(target_arch = "wasm32")]
impl StorageBackend for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) -> bool {
        Self::storage()
            .map(|s| s.set_item(key, value).is_ok())
            .unwrap_or(false)
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        let Some(storage) = Self::storage() else {
            return Vec::new();
        };
        let len = storage.length().unwrap_or(0);
        (0..len)
            .filter_map(|i| storage.key(i).ok().flatten())
            .collect()
    }
}

#[cfg(target_arch = "wasm32")]
fn platform_backend() -> Box<dyn StorageBackend> {
    Box::new(LocalStorage)
}

// =========================================
// Native implementation
// =========================================

#[cfg(not(target_arch = "wasm32"))]
pub struct FileStore {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileStore {
    pub fn open() -> Option<Self> {
        let dir = dirs::config_dir()?.join("lanescore");
        if !dir.exists() {
            std::fs::create_dir_all(&dir).ok()?;
        }
        Some(Self { dir })
    }

    fn path(&self, key: &str) -> std::path::PathBuf {
        let safe = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{safe}.json"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl StorageBackend for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        std::fs::write(self.path(key), value).is_ok()
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path(key));
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(String::from)
            })
            .collect()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn platform_backend() -> Box<dyn StorageBackend> {
    match FileStore::open() {
        Some(store) => Box::new(store),
        None => Box::new(MemoryStore::default()),
    }
}
