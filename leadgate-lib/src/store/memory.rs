use ahash::AHashMap;
use async_trait::async_trait;
use std::sync::RwLock;

use super::{StoreError, StoredSubmission, SubmissionStore, COLLECTIONS};

/// In-memory submission store.
///
/// Collections are fixed at construction; addressing any other name is an
/// [`StoreError::UnknownCollection`]. Contents vanish with the process.
pub struct MemoryStore {
    collections: RwLock<AHashMap<String, Vec<StoredSubmission>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut collections = AHashMap::new();
        for name in COLLECTIONS {
            collections.insert(name.to_string(), Vec::new());
        }
        Self { collections: RwLock::new(collections) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn find_recent(
        &self,
        collection: &str,
        email: &str,
        since_ms: u64,
    ) -> Result<Option<StoredSubmission>, StoreError> {
        let map = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let records = map
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        Ok(records
            .iter()
            .filter(|r| r.email == email && r.created_at_ms >= since_ms)
            .max_by_key(|r| r.created_at_ms)
            .cloned())
    }

    async fn insert(
        &self,
        collection: &str,
        submission: StoredSubmission,
    ) -> Result<(), StoreError> {
        let mut map = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let records = map
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        records.push(submission);
        Ok(())
    }

    async fn delete_where(&self, collection: &str, email: &str) -> Result<usize, StoreError> {
        let mut map = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let records = map
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        let before = records.len();
        records.retain(|r| r.email != email);
        Ok(before - records.len())
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredSubmission>, StoreError> {
        let map = self.collections.read().unwrap_or_else(|e| e.into_inner());
        map.get(collection)
            .cloned()
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }
}
