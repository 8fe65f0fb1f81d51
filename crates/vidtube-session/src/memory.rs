use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::store::{Identity, IdentityStore, SessionRecord, StoreError};

/// In-process [`IdentityStore`]. Every operation holds the lock for its
/// whole duration, so `swap_refresh_token` is a real compare-and-swap.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: Identity) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(
            identity.id,
            SessionRecord {
                identity,
                refresh_token: None,
            },
        );
    }

    pub fn remove(&self, id: Uuid) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.remove(&id);
    }

    pub fn refresh_token_of(&self, id: Uuid) -> Option<String> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(&id).and_then(|r| r.refresh_token.clone())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&id).map(|r| r.identity.clone()))
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&id).cloned())
    }

    async fn store_refresh_token(&self, id: Uuid, token: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(&id) {
            Some(record) => {
                record.refresh_token = Some(token.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(&id) {
            Some(record) if record.refresh_token.as_deref() == Some(expected) => {
                record.refresh_token = Some(next.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_refresh_token(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = records.get_mut(&id) {
            record.refresh_token = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            full_name: "Ada Lovelace".into(),
        }
    }

    #[tokio::test]
    async fn swap_only_succeeds_against_current_value() {
        let store = MemoryStore::new();
        let who = identity();
        let id = who.id;
        store.insert(who);

        assert!(store.store_refresh_token(id, "one").await.unwrap());
        assert!(!store.swap_refresh_token(id, "zero", "two").await.unwrap());
        assert!(store.swap_refresh_token(id, "one", "two").await.unwrap());
        assert!(!store.swap_refresh_token(id, "one", "three").await.unwrap());
        assert_eq!(store.refresh_token_of(id).as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn store_reports_missing_identity() {
        let store = MemoryStore::new();
        assert!(!store.store_refresh_token(Uuid::new_v4(), "t").await.unwrap());
    }

    #[tokio::test]
    async fn clear_leaves_no_token() {
        let store = MemoryStore::new();
        let who = identity();
        let id = who.id;
        store.insert(who);
        store.store_refresh_token(id, "t").await.unwrap();
        store.clear_refresh_token(id).await.unwrap();
        assert_eq!(store.refresh_token_of(id), None);
    }
}
