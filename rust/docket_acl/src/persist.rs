//! Durable storage of the ACL tables using redb.
//!
//! Tables (all `u32` id -> bincode record):
//! - `stored_permissions`: StoredPermission by pk
//! - `users`, `groups`, `roles`, `acls`: identity and ACL records by id
//!
//! The in-memory [`AccessStore`] is the working copy; [`AclDatabase::save`]
//! replaces every table inside a single write transaction, so a crash leaves
//! either the previous or the new state on disk.

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{AclError, Result};
use crate::permission::{PermissionRegistry, StoredPermission};
use crate::store::{AccessStore, StoreRecords};

type RecordTable = TableDefinition<'static, u32, &'static [u8]>;

const STORED_PERMISSIONS: RecordTable = TableDefinition::new("stored_permissions");
const USERS: RecordTable = TableDefinition::new("users");
const GROUPS: RecordTable = TableDefinition::new("groups");
const ROLES: RecordTable = TableDefinition::new("roles");
const ACLS: RecordTable = TableDefinition::new("acls");

/// Everything read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub stored_permissions: Vec<StoredPermission>,
    pub records: StoreRecords,
}

impl Snapshot {
    /// Load stored permissions into `registry` and rebuild the access store.
    ///
    /// The registry cache is invalidated since stored records changed.
    pub fn restore(self, registry: &PermissionRegistry) -> AccessStore {
        registry.load_stored(self.stored_permissions);
        registry.invalidate_cache();
        AccessStore::from_records(self.records)
    }
}

#[derive(Clone)]
pub struct AclDatabase {
    db: Arc<Database>,
}

impl AclDatabase {
    /// Open or create the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open a database on a tempfile (for testing).
    pub fn open_temporary() -> Result<Self> {
        let tmpfile = tempfile::NamedTempFile::new()
            .map_err(|e| AclError::Storage(redb::StorageError::Io(e)))?;
        let db = Database::create(tmpfile.path())?;
        // redb holds its own handle; keep the path alive for the process.
        std::mem::forget(tmpfile);
        Ok(Self { db: Arc::new(db) })
    }

    /// Replace the on-disk tables with the current state.
    pub fn save(&self, registry: &PermissionRegistry, store: &AccessStore) -> Result<()> {
        let stored = registry.stored_records();
        let records = store.records();

        let write_txn = self.db.begin_write()?;
        write_table(&write_txn, STORED_PERMISSIONS, &stored, |r| r.pk)?;
        write_table(&write_txn, USERS, &records.users, |r| r.id)?;
        write_table(&write_txn, GROUPS, &records.groups, |r| r.id)?;
        write_table(&write_txn, ROLES, &records.roles, |r| r.id)?;
        write_table(&write_txn, ACLS, &records.acls, |r| r.id)?;
        write_txn.commit()?;

        info!(
            permissions = stored.len(),
            users = records.users.len(),
            groups = records.groups.len(),
            roles = records.roles.len(),
            acls = records.acls.len(),
            "saved acl tables"
        );
        Ok(())
    }

    /// Read every table. A fresh database yields an empty snapshot.
    pub fn load(&self) -> Result<Snapshot> {
        let read_txn = self.db.begin_read()?;
        Ok(Snapshot {
            stored_permissions: read_table(&read_txn, STORED_PERMISSIONS)?,
            records: StoreRecords {
                users: read_table(&read_txn, USERS)?,
                groups: read_table(&read_txn, GROUPS)?,
                roles: read_table(&read_txn, ROLES)?,
                acls: read_table(&read_txn, ACLS)?,
            },
        })
    }
}

fn write_table<T, F>(
    txn: &redb::WriteTransaction,
    def: RecordTable,
    rows: &[T],
    key: F,
) -> Result<()>
where
    T: Serialize,
    F: Fn(&T) -> u32,
{
    txn.delete_table(def)?;
    let mut table = txn.open_table(def)?;
    for row in rows {
        let bytes = bincode::serialize(row)?;
        table.insert(key(row), bytes.as_slice())?;
    }
    Ok(())
}

fn read_table<T: DeserializeOwned>(txn: &redb::ReadTransaction, def: RecordTable) -> Result<Vec<T>> {
    let table = match txn.open_table(def) {
        Ok(table) => table,
        Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        rows.push(bincode::deserialize(value.value())?);
    }
    Ok(rows)
}
