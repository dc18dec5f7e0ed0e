//! Bounded in-memory byte cache for asset reads

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Small capability an [`super::AssetStore`] uses to cache blob bytes
///
/// Implementations must be safe to share between reader threads.
pub trait AssetByteCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<Vec<u8>>>;
    fn put(&self, key: &str, value: Arc<Vec<u8>>);
    fn remove(&self, key: &str);
}

/// Least-recently-used cache keyed by relative storage path
pub struct LruByteCache {
    max_entries: usize,
    inner: Mutex<LruState>,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, Arc<Vec<u8>>>,
    /// Front is least recently used
    order: VecDeque<String>,
}

impl LruState {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

impl LruByteCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            inner: Mutex::new(LruState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruState> {
        // Poisoning is harmless here: every mutation is self-contained
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LruByteCache {
    fn default() -> Self {
        Self::new(128)
    }
}

impl AssetByteCache for LruByteCache {
    fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let mut state = self.lock();
        let value = state.entries.get(key).cloned()?;
        state.touch(key);
        Some(value)
    }

    fn put(&self, key: &str, value: Arc<Vec<u8>>) {
        let mut state = self.lock();
        if state.entries.insert(key.to_string(), value).is_some() {
            state.touch(key);
        } else {
            state.order.push_back(key.to_string());
        }
        while state.entries.len() > self.max_entries {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn remove(&self, key: &str) {
        let mut state = self.lock();
        if state.entries.remove(key).is_some() {
            state.order.retain(|k| k != key);
        }
    }
}
