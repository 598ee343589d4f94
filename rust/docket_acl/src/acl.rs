//! Access control list entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{AclId, ObjectRef, RoleId, StoredPermissionId};

/// Grant of stored permissions on one object through one role.
///
/// At most one entry exists per `(object, role)` pair. Permissions on an
/// entry are additive grants; there is no way to express a revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    pub id: AclId,
    pub object: ObjectRef,
    pub role: RoleId,
    pub permissions: BTreeSet<StoredPermissionId>,
}

impl AccessControlList {
    /// True when the entry grants any of `pks`.
    pub fn grants(&self, pks: &[StoredPermissionId]) -> bool {
        pks.iter().any(|pk| self.permissions.contains(pk))
    }
}
