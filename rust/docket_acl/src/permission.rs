//! Process-wide permission catalog.
//!
//! A [`Permission`] is registered at startup under a namespace and never
//! removed. Roles and ACL entries reference its persisted counterpart, the
//! [`StoredPermission`], which is created lazily on first lookup.
//!
//! Lookups go through a memo cache. Nothing invalidates it implicitly: after
//! bulk changes to the stored table (or at the start of a test) callers must
//! call [`PermissionRegistry::invalidate_cache`].

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::{AclError, Result};
use crate::types::StoredPermissionId;

/// `namespace.name` identifier of a permission.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PermissionId {
    pub namespace: String,
    pub name: String,
}

impl PermissionId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl FromStr for PermissionId {
    type Err = AclError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(AclError::InvalidIdentifier(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub label: String,
}

/// Persisted identity of a registered permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPermission {
    pub pk: StoredPermissionId,
    pub namespace: String,
    pub name: String,
}

impl StoredPermission {
    pub fn permission_id(&self) -> PermissionId {
        PermissionId::new(self.namespace.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct StoredTable {
    by_id: AHashMap<PermissionId, StoredPermission>,
    next_pk: StoredPermissionId,
}

impl StoredTable {
    fn get_or_create(&mut self, id: &PermissionId) -> StoredPermission {
        if let Some(record) = self.by_id.get(id) {
            return record.clone();
        }
        self.next_pk += 1;
        let record = StoredPermission {
            pk: self.next_pk,
            namespace: id.namespace.clone(),
            name: id.name.clone(),
        };
        debug!(permission = %id, pk = record.pk, "created stored permission");
        self.by_id.insert(id.clone(), record.clone());
        record
    }
}

/// Permission catalog plus the stored-permission table and its memo cache.
///
/// Thread-safe: all methods take `&self`.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    catalog: RwLock<AHashMap<PermissionId, Permission>>,
    stored: RwLock<StoredTable>,
    cache: RwLock<AHashMap<PermissionId, StoredPermission>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a permission. Re-registering an identifier updates its label.
    pub fn register(
        &self,
        namespace: &str,
        name: &str,
        label: impl Into<String>,
    ) -> Permission {
        let permission = Permission {
            id: PermissionId::new(namespace, name),
            label: label.into(),
        };
        self.catalog
            .write()
            .insert(permission.id.clone(), permission.clone());
        permission
    }

    /// Register every `(name, label)` pair under one namespace.
    pub fn register_namespace(&self, namespace: &str, entries: &[(&str, &str)]) -> Vec<Permission> {
        entries
            .iter()
            .map(|(name, label)| self.register(namespace, name, *label))
            .collect()
    }

    pub fn is_registered(&self, id: &PermissionId) -> bool {
        self.catalog.read().contains_key(id)
    }

    pub fn get(&self, id: &PermissionId) -> Result<Permission> {
        self.catalog
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AclError::UnknownPermission(id.to_string()))
    }

    /// All registered permissions ordered by identifier.
    pub fn all(&self) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = self.catalog.read().values().cloned().collect();
        permissions.sort_by(|a, b| a.id.cmp(&b.id));
        permissions
    }

    /// Return the stored record for a registered permission, creating it on
    /// first use.
    pub fn get_stored_permission(&self, id: &PermissionId) -> Result<StoredPermission> {
        if let Some(record) = self.cache.read().get(id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(record.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        if !self.is_registered(id) {
            return Err(AclError::UnknownPermission(id.to_string()));
        }

        let record = self.stored.write().get_or_create(id);
        self.cache.write().insert(id.clone(), record.clone());
        Ok(record)
    }

    /// Stored records for a batch of identifiers; fails on the first unknown one.
    pub fn stored_permissions(&self, ids: &[PermissionId]) -> Result<Vec<StoredPermission>> {
        ids.iter().map(|id| self.get_stored_permission(id)).collect()
    }

    /// Reverse lookup of a stored primary key.
    pub fn resolve_pk(&self, pk: StoredPermissionId) -> Option<StoredPermission> {
        self.stored
            .read()
            .by_id
            .values()
            .find(|record| record.pk == pk)
            .cloned()
    }

    /// Drop every memoized lookup. Calling it twice is the same as once.
    pub fn invalidate_cache(&self) {
        let mut cache = self.cache.write();
        if !cache.is_empty() {
            debug!(entries = cache.len(), "invalidating permission cache");
        }
        cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.read().len(),
        }
    }

    /// Snapshot of the stored table, ordered by primary key.
    pub fn stored_records(&self) -> Vec<StoredPermission> {
        let mut records: Vec<StoredPermission> =
            self.stored.read().by_id.values().cloned().collect();
        records.sort_by_key(|record| record.pk);
        records
    }

    /// Replace the stored table with persisted records.
    ///
    /// The cache is left untouched; callers invalidate it explicitly.
    pub fn load_stored(&self, records: Vec<StoredPermission>) {
        let mut stored = self.stored.write();
        stored.next_pk = records.iter().map(|r| r.pk).max().unwrap_or(0);
        stored.by_id = records
            .into_iter()
            .map(|record| (record.permission_id(), record))
            .collect();
    }
}
