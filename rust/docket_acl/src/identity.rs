//! Principals and roles.
//!
//! A user holds a role's permissions when it belongs to at least one of the
//! role's groups. Both memberships are unordered many-to-many sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{GroupId, RoleId, StoredPermissionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub members: BTreeSet<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub label: String,
    pub permissions: BTreeSet<StoredPermissionId>,
    pub groups: BTreeSet<GroupId>,
}
