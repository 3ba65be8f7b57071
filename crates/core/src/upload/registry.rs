//! Two-phase registry of batch items.
//!
//! An item is registered under a provisional key before its upload starts and
//! promoted to the server-assigned id once the upload response arrives.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::service::ItemStatus;

/// Locally generated key identifying an item before the service names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisionalKey(Uuid);

impl ProvisionalKey {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProvisionalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmp-{}", self.0)
    }
}

/// Errors from registry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown provisional key: {0}")]
    UnknownKey(ProvisionalKey),

    #[error("item {0} is no longer uploading")]
    NotUploading(ProvisionalKey),

    #[error("server id already registered: {0}")]
    DuplicateServerId(String),
}

/// Where an item is in its upload lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Upload in flight; addressable only by provisional key.
    Uploading,
    /// Server id assigned.
    Registered,
    /// Upload rejected; the item never reached the service.
    UploadFailed,
}

/// A file tracked by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedItem {
    pub key: ProvisionalKey,
    pub server_id: Option<String>,
    pub file_name: String,
    pub size: u64,
    pub upload: UploadState,
    /// Last status reported by the service.
    pub status: ItemStatus,
    pub error_message: Option<String>,
    /// Whether the terminal status line for this item was emitted.
    pub announced: bool,
}

/// Registry of batch items keyed first provisionally, then by server id.
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: Vec<TrackedItem>,
    provisional: HashMap<ProvisionalKey, usize>,
    confirmed: HashMap<String, usize>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new file whose upload is about to start.
    pub fn register(&mut self, file_name: impl Into<String>, size: u64) -> ProvisionalKey {
        let key = ProvisionalKey::generate();
        self.provisional.insert(key, self.items.len());
        self.items.push(TrackedItem {
            key,
            server_id: None,
            file_name: file_name.into(),
            size,
            upload: UploadState::Uploading,
            status: ItemStatus::Pending,
            error_message: None,
            announced: false,
        });
        key
    }

    /// Bind the server-assigned id, retiring the provisional key.
    ///
    /// Either both maps change or neither does.
    pub fn promote(
        &mut self,
        key: ProvisionalKey,
        server_id: impl Into<String>,
    ) -> Result<&TrackedItem, RegistryError> {
        let server_id = server_id.into();
        let idx = *self
            .provisional
            .get(&key)
            .ok_or(RegistryError::UnknownKey(key))?;
        if self.items[idx].upload != UploadState::Uploading {
            return Err(RegistryError::NotUploading(key));
        }
        if self.confirmed.contains_key(&server_id) {
            return Err(RegistryError::DuplicateServerId(server_id));
        }

        self.provisional.remove(&key);
        self.confirmed.insert(server_id.clone(), idx);
        let item = &mut self.items[idx];
        item.server_id = Some(server_id);
        item.upload = UploadState::Registered;
        Ok(item)
    }

    /// Record that an upload was rejected. The item keeps its provisional key.
    pub fn mark_upload_failed(
        &mut self,
        key: ProvisionalKey,
        reason: impl Into<String>,
    ) -> Result<&TrackedItem, RegistryError> {
        let idx = *self
            .provisional
            .get(&key)
            .ok_or(RegistryError::UnknownKey(key))?;
        let item = &mut self.items[idx];
        if item.upload != UploadState::Uploading {
            return Err(RegistryError::NotUploading(key));
        }
        item.upload = UploadState::UploadFailed;
        item.error_message = Some(reason.into());
        Ok(item)
    }

    /// Look up an item that has not been promoted.
    pub fn get_provisional(&self, key: &ProvisionalKey) -> Option<&TrackedItem> {
        self.provisional.get(key).map(|&idx| &self.items[idx])
    }

    /// Look up an item by server id.
    pub fn get(&self, server_id: &str) -> Option<&TrackedItem> {
        self.confirmed.get(server_id).map(|&idx| &self.items[idx])
    }

    pub(crate) fn get_mut(&mut self, server_id: &str) -> Option<&mut TrackedItem> {
        let idx = *self.confirmed.get(server_id)?;
        self.items.get_mut(idx)
    }

    /// All items in registration order.
    pub fn items(&self) -> impl Iterator<Item = &TrackedItem> {
        self.items.iter()
    }

    /// Items with a server id.
    pub fn registered(&self) -> impl Iterator<Item = &TrackedItem> {
        self.items
            .iter()
            .filter(|item| item.upload == UploadState::Registered)
    }

    pub fn registered_count(&self) -> usize {
        self.confirmed.len()
    }

    pub fn failed_upload_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.upload == UploadState::UploadFailed)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_addressable_by_key_only() {
        let mut registry = ItemRegistry::new();
        let key = registry.register("a.csv", 120);

        let item = registry.get_provisional(&key).unwrap();
        assert_eq!(item.file_name, "a.csv");
        assert_eq!(item.size, 120);
        assert_eq!(item.upload, UploadState::Uploading);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(registry.registered_count(), 0);
    }

    #[test]
    fn test_promote_moves_item_to_server_id() {
        let mut registry = ItemRegistry::new();
        let key = registry.register("a.csv", 10);

        let item = registry.promote(key, "srv-1").unwrap();
        assert_eq!(item.server_id.as_deref(), Some("srv-1"));
        assert_eq!(item.upload, UploadState::Registered);

        assert!(registry.get_provisional(&key).is_none());
        assert_eq!(registry.get("srv-1").unwrap().file_name, "a.csv");
        assert_eq!(registry.registered_count(), 1);
    }

    #[test]
    fn test_promote_twice_is_rejected() {
        let mut registry = ItemRegistry::new();
        let key = registry.register("a.csv", 10);
        registry.promote(key, "srv-1").unwrap();

        assert_eq!(
            registry.promote(key, "srv-2").unwrap_err(),
            RegistryError::UnknownKey(key)
        );
        assert!(registry.get("srv-2").is_none());
    }

    #[test]
    fn test_duplicate_server_id_leaves_registry_untouched() {
        let mut registry = ItemRegistry::new();
        let first = registry.register("a.csv", 10);
        let second = registry.register("b.csv", 20);
        registry.promote(first, "srv-1").unwrap();

        let err = registry.promote(second, "srv-1").unwrap_err();
        assert_eq!(err, RegistryError::DuplicateServerId("srv-1".to_string()));

        // Still provisional, still promotable under its own id.
        assert!(registry.get_provisional(&second).is_some());
        assert_eq!(registry.get("srv-1").unwrap().file_name, "a.csv");
        registry.promote(second, "srv-2").unwrap();
        assert_eq!(registry.registered_count(), 2);
    }

    #[test]
    fn test_mark_upload_failed() {
        let mut registry = ItemRegistry::new();
        let key = registry.register("bad.csv", 5);

        let item = registry.mark_upload_failed(key, "HTTP 400: too large").unwrap();
        assert_eq!(item.upload, UploadState::UploadFailed);
        assert_eq!(item.error_message.as_deref(), Some("HTTP 400: too large"));

        assert_eq!(
            registry.promote(key, "srv-9").unwrap_err(),
            RegistryError::NotUploading(key)
        );
        assert_eq!(registry.failed_upload_count(), 1);
    }

    #[test]
    fn test_items_keep_registration_order() {
        let mut registry = ItemRegistry::new();
        let a = registry.register("a.csv", 1);
        let b = registry.register("b.csv", 2);
        let c = registry.register("c.csv", 3);

        // Completion order differs from registration order.
        registry.promote(c, "srv-c").unwrap();
        registry.promote(a, "srv-a").unwrap();
        registry.mark_upload_failed(b, "boom").unwrap();

        let names: Vec<_> = registry.items().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);

        let registered: Vec<_> = registry
            .registered()
            .filter_map(|i| i.server_id.as_deref())
            .collect();
        assert_eq!(registered, vec!["srv-a", "srv-c"]);
    }

    #[test]
    fn test_provisional_key_display() {
        let mut registry = ItemRegistry::new();
        let key = registry.register("a.csv", 1);
        assert!(key.to_string().starts_with("tmp-"));
    }
}
