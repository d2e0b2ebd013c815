//! Identity-keyed registry of managed transfers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use seedline_events::InfoHash;

use crate::transfer::Transfer;

/// Map from info hash to the live [`Transfer`] entity.
#[derive(Debug, Default)]
pub struct TransferRegistry {
    transfers: RwLock<HashMap<InfoHash, Arc<Transfer>>>,
}

impl TransferRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entity.
    #[must_use]
    pub fn get(&self, info_hash: &InfoHash) -> Option<Arc<Transfer>> {
        self.read().get(info_hash).cloned()
    }

    /// Whether an identity is registered.
    #[must_use]
    pub fn has(&self, info_hash: &InfoHash) -> bool {
        self.read().contains_key(info_hash)
    }

    /// Insert an entity. Returns `false` and keeps the existing entity when
    /// the identity is already registered.
    pub fn put(&self, transfer: Arc<Transfer>) -> bool {
        let mut transfers = self.write();
        if transfers.contains_key(&transfer.info_hash()) {
            return false;
        }
        transfers.insert(transfer.info_hash(), transfer);
        true
    }

    /// Remove an entity.
    pub fn delete(&self, info_hash: &InfoHash) -> Option<Arc<Transfer>> {
        self.write().remove(info_hash)
    }

    /// Snapshot of every entity, in no particular order.
    #[must_use]
    pub fn values(&self) -> Vec<Arc<Transfer>> {
        self.read().values().cloned().collect()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<InfoHash, Arc<Transfer>>> {
        self.transfers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<InfoHash, Arc<Transfer>>> {
        self.transfers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedline_test_support::fixtures::info_hash;
    use seedline_torrent_core::{TransferHandle, TransferStatus};

    fn entity(id: u64, byte: u8) -> Arc<Transfer> {
        let handle = TransferHandle::new(id, info_hash(byte));
        Arc::new(Transfer::new(TransferStatus::new(handle, ".")))
    }

    #[test]
    fn put_keeps_the_first_entity() {
        let registry = TransferRegistry::new();
        assert!(registry.put(entity(1, 1)));
        assert!(!registry.put(entity(2, 1)));
        assert_eq!(registry.len(), 1);
        let kept = registry.get(&info_hash(1)).map(|t| t.handle().id);
        assert_eq!(kept, Some(1));
    }

    #[test]
    fn delete_and_values_reflect_membership() {
        let registry = TransferRegistry::new();
        registry.put(entity(1, 1));
        registry.put(entity(2, 2));
        assert_eq!(registry.values().len(), 2);
        assert!(registry.delete(&info_hash(1)).is_some());
        assert!(registry.delete(&info_hash(1)).is_none());
        assert!(!registry.has(&info_hash(1)));
        assert!(registry.has(&info_hash(2)));
        registry.delete(&info_hash(2));
        assert!(registry.is_empty());
    }
}
