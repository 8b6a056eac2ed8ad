use std::collections::BTreeSet;

use tokio::sync::RwLock;

use crate::store::check_username;
use crate::{IdentityError, IdentityStore, Upsert, UserRecord};

/// An [`IdentityStore`] that lives only as long as the process.
///
/// Useful in tests and for running the gateway without a database
/// directory.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: RwLock<BTreeSet<String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    async fn upsert(&self, username: &str) -> Result<Upsert, IdentityError> {
        check_username(username)?;
        let inserted = self.users.write().await.insert(username.to_string());
        Ok(if inserted {
            Upsert::Inserted
        } else {
            Upsert::Existing
        })
    }

    async fn find(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, IdentityError> {
        let users = self.users.read().await;
        Ok(users.get(username).map(|name| UserRecord {
            username: name.clone(),
        }))
    }

    async fn list(&self) -> Result<Vec<UserRecord>, IdentityError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .map(|name| UserRecord {
                username: name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_new_user_inserts() {
        let store = MemoryIdentityStore::new();
        assert_eq!(store.upsert("alice").await.unwrap(), Upsert::Inserted);
        assert!(store.find("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_record() {
        let store = MemoryIdentityStore::new();
        store.upsert("alice").await.unwrap();

        assert_eq!(store.upsert("alice").await.unwrap(), Upsert::Existing);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_empty_name_rejected() {
        let store = MemoryIdentityStore::new();
        assert!(matches!(
            store.upsert("").await,
            Err(IdentityError::EmptyUsername)
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let store = MemoryIdentityStore::new();
        store.upsert("carol").await.unwrap();
        store.upsert("alice").await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, ["alice", "carol"]);
    }
}
