// src/watch/hash.rs

use std::collections::HashMap;

use blake3::Hasher;
use parking_lot::Mutex;
use tracing::debug;

/// Compute the blake3 hash of a unit's text.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

/// Last applied content hash per unit, kept in memory for the lifetime of a
/// project.
///
/// A Created/Modified event whose hash matches the stored one is a no-op:
/// editors that rewrite a file without changing it, or that emit several
/// events for one save, do not cause a reload.
#[derive(Debug, Default)]
pub struct UnitHashes {
    map: Mutex<HashMap<String, String>>,
}

impl UnitHashes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, unit: &str) -> Option<String> {
        self.map.lock().get(unit).cloned()
    }

    /// True when `hash` is what was last applied for `unit`.
    pub fn is_unchanged(&self, unit: &str, hash: &str) -> bool {
        let unchanged = self.map.lock().get(unit).is_some_and(|h| h == hash);
        if unchanged {
            debug!(unit = %unit, "content hash unchanged");
        }
        unchanged
    }

    pub fn record(&self, unit: &str, hash: impl Into<String>) {
        self.map.lock().insert(unit.to_string(), hash.into());
    }

    pub fn forget(&self, unit: &str) {
        self.map.lock().remove(unit);
    }
}
