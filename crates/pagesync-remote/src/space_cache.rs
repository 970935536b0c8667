//! Space metadata cache
//!
//! Space metadata (currently the home page id) never changes during a
//! run, so each client keeps what it has already fetched. The cache is
//! owned by one client instance; two clients never share entries.

use dashmap::DashMap;

/// Cached metadata of one space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceInfo {
    pub key: String,
    pub home_page_id: String,
}

/// Concurrent per-client cache keyed by space key
#[derive(Debug, Default)]
pub struct SpaceCache {
    spaces: DashMap<String, SpaceInfo>,
}

impl SpaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<SpaceInfo> {
        self.spaces.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, info: SpaceInfo) {
        self.spaces.insert(info.key.clone(), info);
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}
