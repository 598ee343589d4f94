//! `docket_acl`: access control for the document store.
//!
//! Modules:
//! - `types`       ids, content kinds, the `Content` trait and domain objects
//! - `permission`  permission registry with stored records and memo cache
//! - `identity`    users, groups, roles
//! - `acl`         ACL entries binding (object, role) to permissions
//! - `store`       in-memory tables with resolution indexes
//! - `resolver`    `check_access` / `filter_by_access`
//! - `bitmap`      per-kind Roaring Bitmaps of granted objects
//! - `persist`     redb-backed durable tables

pub mod acl;
pub mod bitmap;
pub mod error;
pub mod identity;
pub mod permission;
pub mod persist;
pub mod resolver;
pub mod store;
pub mod types;

pub use acl::AccessControlList;
pub use bitmap::GrantedObjects;
pub use error::{AclError, Result};
pub use identity::{Group, Role, User};
pub use permission::{CacheStats, Permission, PermissionId, PermissionRegistry, StoredPermission};
pub use persist::{AclDatabase, Snapshot};
pub use resolver::AccessResolver;
pub use store::{AccessStore, StoreRecords};
pub use types::*;

#[cfg(test)]
mod tests;
