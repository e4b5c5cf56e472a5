//! Local persistence for subscription state.
//!
//! The store is a durability aid. The manager writes through after every
//! transition and reads once on restore; a failing store never blocks an
//! in-memory update.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::error::PersistenceError;
use super::subscription::SubscriptionState;
use super::validation::{validate_account_id, validate_tenant};
use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;

/// Identifies one account's record inside a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreScope {
    tenant: String,
    account_id: String,
}

impl StoreScope {
    /// Build a scope, validating both parts.
    ///
    /// # Errors
    ///
    /// Returns `EntitlementsError::InvalidInput` if either identifier is
    /// empty, too long, or contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(tenant: impl Into<String>, account_id: impl Into<String>) -> Result<Self> {
        let tenant = tenant.into();
        let account_id = account_id.into();
        validate_tenant(&tenant)?;
        validate_account_id(&account_id)?;
        Ok(Self { tenant, account_id })
    }

    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Key-value key: `{tenant}:{account_id}:subscription`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}:subscription", self.tenant, self.account_id)
    }
}

/// Trait for persisting subscription state.
///
/// Implement this trait to back the manager with your own storage.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Load the stored state, if any.
    async fn load(&self, scope: &StoreScope) -> std::result::Result<Option<SubscriptionState>, PersistenceError>;

    /// Save the state, replacing whatever was stored.
    async fn save(&self, scope: &StoreScope, state: &SubscriptionState) -> std::result::Result<(), PersistenceError>;

    /// Remove the stored state. Removing a missing record is not an error.
    async fn remove(&self, scope: &StoreScope) -> std::result::Result<(), PersistenceError>;
}

#[async_trait]
impl<T: SubscriptionStore + ?Sized> SubscriptionStore for Arc<T> {
    async fn load(&self, scope: &StoreScope) -> std::result::Result<Option<SubscriptionState>, PersistenceError> {
        (**self).load(scope).await
    }

    async fn save(&self, scope: &StoreScope, state: &SubscriptionState) -> std::result::Result<(), PersistenceError> {
        (**self).save(scope, state).await
    }

    async fn remove(&self, scope: &StoreScope) -> std::result::Result<(), PersistenceError> {
        (**self).remove(scope).await
    }
}

/// Open the store selected by configuration.
#[must_use]
pub fn open_store(config: &StorageConfig) -> Arc<dyn SubscriptionStore> {
    match config.backend {
        StorageBackend::Memory => Arc::new(InMemorySubscriptionStore::new()),
        StorageBackend::File => Arc::new(FileSubscriptionStore::new(&config.path)),
    }
}

fn encode(state: &SubscriptionState) -> std::result::Result<String, PersistenceError> {
    serde_json::to_string(state).map_err(|e| PersistenceError::Serialization {
        message: e.to_string(),
    })
}

fn decode(key: &str, raw: &str) -> std::result::Result<SubscriptionState, PersistenceError> {
    serde_json::from_str(raw).map_err(|e| PersistenceError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// In-memory store keyed by [`StoreScope::key`].
///
/// Documents are held as serialized JSON, the same bytes the file store
/// writes, so decoding failures behave identically.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw document under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: impl Into<String>, raw: impl Into<String>) {
        match self.inner.write() {
            Ok(mut map) => map.insert(key.into(), raw.into()),
            Err(poisoned) => poisoned.into_inner().insert(key.into(), raw.into()),
        };
    }

    /// The raw document stored under `key`.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        match self.inner.read() {
            Ok(map) => map.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn load(&self, scope: &StoreScope) -> std::result::Result<Option<SubscriptionState>, PersistenceError> {
        let key = scope.key();
        self.get_raw(&key).map(|raw| decode(&key, &raw)).transpose()
    }

    async fn save(&self, scope: &StoreScope, state: &SubscriptionState) -> std::result::Result<(), PersistenceError> {
        let raw = encode(state)?;
        self.insert_raw(scope.key(), raw);
        Ok(())
    }

    async fn remove(&self, scope: &StoreScope) -> std::result::Result<(), PersistenceError> {
        let key = scope.key();
        match self.inner.write() {
            Ok(mut map) => map.remove(&key),
            Err(poisoned) => poisoned.into_inner().remove(&key),
        };
        Ok(())
    }
}

/// One JSON document per account at `{root}/{tenant}/{account_id}.json`.
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileSubscriptionStore {
    root: PathBuf,
}

impl FileSubscriptionStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the document for `scope` lives.
    #[must_use]
    pub fn path_for(&self, scope: &StoreScope) -> PathBuf {
        self.root
            .join(scope.tenant())
            .join(format!("{}.json", scope.account_id()))
    }
}

fn io_error(scope: &StoreScope, err: &std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        key: scope.key(),
        message: err.to_string(),
    }
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn load(&self, scope: &StoreScope) -> std::result::Result<Option<SubscriptionState>, PersistenceError> {
        let path = self.path_for(scope);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => decode(&scope.key(), &raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(scope, &e)),
        }
    }

    async fn save(&self, scope: &StoreScope, state: &SubscriptionState) -> std::result::Result<(), PersistenceError> {
        let raw = encode(state)?;
        let path = self.path_for(scope);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(scope, &e))?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| io_error(scope, &e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(scope, &e))?;

        tracing::trace!(
            target: "strefex::billing",
            key = %scope.key(),
            path = %path.display(),
            "Subscription state written"
        );
        Ok(())
    }

    async fn remove(&self, scope: &StoreScope) -> std::result::Result<(), PersistenceError> {
        match tokio::fs::remove_file(self.path_for(scope)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(scope, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::overrides::AccountType;
    use crate::billing::plans::PlanId;
    use crate::error::EntitlementsError;

    fn scope() -> StoreScope {
        StoreScope::new("acme", "org_123").unwrap()
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("strefex-store-{}", uuid::Uuid::new_v4().simple()))
    }

    #[test]
    fn test_scope_key() {
        assert_eq!(scope().key(), "acme:org_123:subscription");
    }

    #[test]
    fn test_scope_rejects_path_characters() {
        let err = StoreScope::new("acme", "../etc").unwrap_err();
        assert!(matches!(err, EntitlementsError::InvalidInput { field: "account_id", .. }));
        assert!(StoreScope::new("", "org_1").is_err());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemorySubscriptionStore::new();
        let state = SubscriptionState::new(PlanId::Standard, AccountType::Seller);

        assert_eq!(store.load(&scope()).await.unwrap(), None);

        store.save(&scope(), &state).await.unwrap();
        assert_eq!(store.load(&scope()).await.unwrap(), Some(state));
        assert_eq!(store.len(), 1);

        // Clones share data.
        let clone = store.clone();
        clone.remove(&scope()).await.unwrap();
        assert!(store.is_empty());
        clone.remove(&scope()).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_corrupt_document() {
        let store = InMemorySubscriptionStore::new();
        store.insert_raw(scope().key(), "{not json");

        let err = store.load(&scope()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let root = temp_root();
        let store = FileSubscriptionStore::new(&root);
        let mut state = SubscriptionState::new(PlanId::Premium, AccountType::Buyer);
        state.overrides.insert("analytics".to_string(), false);

        assert_eq!(store.load(&scope()).await.unwrap(), None);
        store.save(&scope(), &state).await.unwrap();
        assert!(store.path_for(&scope()).ends_with("acme/org_123.json"));
        assert_eq!(store.load(&scope()).await.unwrap(), Some(state));

        store.remove(&scope()).await.unwrap();
        assert_eq!(store.load(&scope()).await.unwrap(), None);
        store.remove(&scope()).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_file_store_corrupt_document() {
        let root = temp_root();
        let store = FileSubscriptionStore::new(&root);
        let path = store.path_for(&scope());
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, r#"{"planId":"platinum"}"#).await.unwrap();

        let err = store.load(&scope()).await.unwrap_err();
        match err {
            PersistenceError::Corrupt { key, .. } => assert_eq!(key, "acme:org_123:subscription"),
            other => panic!("unexpected error: {other:?}"),
        }

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_open_store_from_config() {
        let store = open_store(&StorageConfig::default());
        let state = SubscriptionState::new(PlanId::Basic, AccountType::Seller);
        store.save(&scope(), &state).await.unwrap();
        assert_eq!(store.load(&scope()).await.unwrap(), Some(state));
    }
}
