//! Memoized key id lists.
//!
//! Owned by a backend instance and invalidated whenever that instance
//! imports or generates a key.

use std::sync::RwLock;

use crate::error::Result;

#[derive(Debug, Default)]
pub struct KeyCache {
    public: RwLock<Option<Vec<String>>>,
    private: RwLock<Option<Vec<String>>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public_keys(&self, load: impl FnOnce() -> Result<Vec<String>>) -> Result<Vec<String>> {
        Self::get_or_load(&self.public, load)
    }

    pub fn private_keys(&self, load: impl FnOnce() -> Result<Vec<String>>) -> Result<Vec<String>> {
        Self::get_or_load(&self.private, load)
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.public.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.private.write() {
            *slot = None;
        }
    }

    fn get_or_load(
        slot: &RwLock<Option<Vec<String>>>,
        load: impl FnOnce() -> Result<Vec<String>>,
    ) -> Result<Vec<String>> {
        if let Ok(guard) = slot.read() {
            if let Some(ids) = guard.as_ref() {
                return Ok(ids.clone());
            }
        }
        let mut ids = load()?;
        ids.sort();
        ids.dedup();
        if let Ok(mut guard) = slot.write() {
            *guard = Some(ids.clone());
        }
        Ok(ids)
    }
}
