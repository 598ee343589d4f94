//! In-memory access store: users, groups, roles and ACL entries.
//!
//! Records live in ordered tables keyed by id; lookups used by the resolver
//! go through derived hash indexes that every mutation keeps in step.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::acl::AccessControlList;
use crate::error::{AclError, Result};
use crate::identity::{Group, Role, User};
use crate::types::*;

/// Plain record export of an [`AccessStore`], without indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecords {
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub roles: Vec<Role>,
    pub acls: Vec<AccessControlList>,
}

#[derive(Debug, Clone, Default)]
struct IdCounters {
    user: UserId,
    group: GroupId,
    role: RoleId,
    acl: AclId,
}

#[derive(Debug, Clone, Default)]
pub struct AccessStore {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    roles: BTreeMap<RoleId, Role>,
    acls: BTreeMap<AclId, AccessControlList>,
    user_groups: AHashMap<UserId, AHashSet<GroupId>>,
    group_roles: AHashMap<GroupId, AHashSet<RoleId>>,
    acl_index: AHashMap<(ObjectRef, RoleId), AclId>,
    role_acls: AHashMap<RoleId, AHashSet<AclId>>,
    object_acls: AHashMap<ObjectRef, AHashSet<AclId>>,
    next_ids: IdCounters,
}

impl AccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build indexes from exported records.
    pub fn from_records(records: StoreRecords) -> Self {
        let mut store = Self::new();

        for user in records.users {
            store.next_ids.user = store.next_ids.user.max(user.id);
            store.users.insert(user.id, user);
        }
        for group in records.groups {
            store.next_ids.group = store.next_ids.group.max(group.id);
            for member in &group.members {
                store.user_groups.entry(*member).or_default().insert(group.id);
            }
            store.groups.insert(group.id, group);
        }
        for role in records.roles {
            store.next_ids.role = store.next_ids.role.max(role.id);
            for group in &role.groups {
                store.group_roles.entry(*group).or_default().insert(role.id);
            }
            store.roles.insert(role.id, role);
        }
        for acl in records.acls {
            store.next_ids.acl = store.next_ids.acl.max(acl.id);
            store.index_acl(&acl);
            store.acls.insert(acl.id, acl);
        }

        store
    }

    pub fn records(&self) -> StoreRecords {
        StoreRecords {
            users: self.users.values().cloned().collect(),
            groups: self.groups.values().cloned().collect(),
            roles: self.roles.values().cloned().collect(),
            acls: self.acls.values().cloned().collect(),
        }
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn create_user(&mut self, username: impl Into<String>) -> UserId {
        self.next_ids.user += 1;
        let id = self.next_ids.user;
        self.users.insert(
            id,
            User {
                id,
                username: username.into(),
            },
        );
        id
    }

    /// Delete a user along with its group memberships.
    pub fn delete_user(&mut self, id: UserId) -> Result<User> {
        let user = self.users.remove(&id).ok_or(AclError::UserNotFound(id))?;
        for group_id in self.user_groups.remove(&id).unwrap_or_default() {
            if let Some(group) = self.groups.get_mut(&group_id) {
                group.members.remove(&id);
            }
        }
        Ok(user)
    }

    pub fn user(&self, id: UserId) -> Result<&User> {
        self.users.get(&id).ok_or(AclError::UserNotFound(id))
    }

    pub fn find_user(&self, username: &str) -> Option<&User> {
        self.users.values().find(|user| user.username == username)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    // ========================================================================
    // Groups
    // ========================================================================

    pub fn create_group(&mut self, name: impl Into<String>) -> GroupId {
        self.next_ids.group += 1;
        let id = self.next_ids.group;
        self.groups.insert(
            id,
            Group {
                id,
                name: name.into(),
                members: BTreeSet::new(),
            },
        );
        id
    }

    /// Delete a group, detaching it from its members and from every role.
    pub fn delete_group(&mut self, id: GroupId) -> Result<Group> {
        let group = self.groups.remove(&id).ok_or(AclError::GroupNotFound(id))?;
        for member in &group.members {
            if let Some(groups) = self.user_groups.get_mut(member) {
                groups.remove(&id);
            }
        }
        for role_id in self.group_roles.remove(&id).unwrap_or_default() {
            if let Some(role) = self.roles.get_mut(&role_id) {
                role.groups.remove(&id);
            }
        }
        Ok(group)
    }

    pub fn group(&self, id: GroupId) -> Result<&Group> {
        self.groups.get(&id).ok_or(AclError::GroupNotFound(id))
    }

    pub fn find_group(&self, name: &str) -> Option<&Group> {
        self.groups.values().find(|group| group.name == name)
    }

    pub fn add_user_to_group(&mut self, group_id: GroupId, user_id: UserId) -> Result<()> {
        self.user(user_id)?;
        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or(AclError::GroupNotFound(group_id))?;
        group.members.insert(user_id);
        self.user_groups.entry(user_id).or_default().insert(group_id);
        Ok(())
    }

    /// Returns whether the user was a member.
    pub fn remove_user_from_group(&mut self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or(AclError::GroupNotFound(group_id))?;
        let removed = group.members.remove(&user_id);
        if let Some(groups) = self.user_groups.get_mut(&user_id) {
            groups.remove(&group_id);
        }
        Ok(removed)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub fn create_role(&mut self, label: impl Into<String>) -> RoleId {
        self.next_ids.role += 1;
        let id = self.next_ids.role;
        self.roles.insert(
            id,
            Role {
                id,
                label: label.into(),
                permissions: BTreeSet::new(),
                groups: BTreeSet::new(),
            },
        );
        id
    }

    /// Delete a role and every ACL entry bound to it.
    pub fn delete_role(&mut self, id: RoleId) -> Result<Role> {
        let role = self.roles.remove(&id).ok_or(AclError::RoleNotFound(id))?;
        for group_id in &role.groups {
            if let Some(roles) = self.group_roles.get_mut(group_id) {
                roles.remove(&id);
            }
        }
        let acl_ids = self.role_acls.remove(&id).unwrap_or_default();
        for acl_id in &acl_ids {
            if let Some(acl) = self.acls.remove(acl_id) {
                self.unindex_acl(&acl);
            }
        }
        debug!(role = id, acls = acl_ids.len(), "deleted role");
        Ok(role)
    }

    pub fn role(&self, id: RoleId) -> Result<&Role> {
        self.roles.get(&id).ok_or(AclError::RoleNotFound(id))
    }

    pub fn find_role(&self, label: &str) -> Option<&Role> {
        self.roles.values().find(|role| role.label == label)
    }

    pub fn grant_role_permission(&mut self, role_id: RoleId, pk: StoredPermissionId) -> Result<()> {
        self.role_mut(role_id)?.permissions.insert(pk);
        Ok(())
    }

    pub fn revoke_role_permission(
        &mut self,
        role_id: RoleId,
        pk: StoredPermissionId,
    ) -> Result<bool> {
        Ok(self.role_mut(role_id)?.permissions.remove(&pk))
    }

    pub fn add_group_to_role(&mut self, role_id: RoleId, group_id: GroupId) -> Result<()> {
        self.group(group_id)?;
        self.role_mut(role_id)?.groups.insert(group_id);
        self.group_roles.entry(group_id).or_default().insert(role_id);
        Ok(())
    }

    pub fn remove_group_from_role(&mut self, role_id: RoleId, group_id: GroupId) -> Result<bool> {
        let removed = self.role_mut(role_id)?.groups.remove(&group_id);
        if let Some(roles) = self.group_roles.get_mut(&group_id) {
            roles.remove(&role_id);
        }
        Ok(removed)
    }

    fn role_mut(&mut self, id: RoleId) -> Result<&mut Role> {
        self.roles.get_mut(&id).ok_or(AclError::RoleNotFound(id))
    }

    /// Roles whose groups include `user`.
    pub fn reachable_roles(&self, user: UserId) -> AHashSet<RoleId> {
        let mut roles = AHashSet::new();
        if let Some(groups) = self.user_groups.get(&user) {
            for group_id in groups {
                if let Some(group_roles) = self.group_roles.get(group_id) {
                    roles.extend(group_roles.iter().copied());
                }
            }
        }
        roles
    }

    // ========================================================================
    // ACL entries
    // ========================================================================

    /// Create the entry for `(object, role)`; the pair must not have one yet.
    pub fn create_acl(&mut self, object: ObjectRef, role: RoleId) -> Result<AclId> {
        self.role(role)?;
        if self.acl_index.contains_key(&(object, role)) {
            return Err(AclError::DuplicateAcl { object, role });
        }

        self.next_ids.acl += 1;
        let acl = AccessControlList {
            id: self.next_ids.acl,
            object,
            role,
            permissions: BTreeSet::new(),
        };
        let id = acl.id;
        self.index_acl(&acl);
        self.acls.insert(id, acl);
        debug!(acl = id, %object, role, "created acl entry");
        Ok(id)
    }

    pub fn get_or_create_acl(&mut self, object: ObjectRef, role: RoleId) -> Result<AclId> {
        match self.acl_index.get(&(object, role)) {
            Some(&id) => Ok(id),
            None => self.create_acl(object, role),
        }
    }

    pub fn acl(&self, id: AclId) -> Result<&AccessControlList> {
        self.acls.get(&id).ok_or(AclError::AclNotFound(id))
    }

    pub fn acl_for(&self, object: &ObjectRef, role: RoleId) -> Option<&AccessControlList> {
        self.acl_index
            .get(&(*object, role))
            .and_then(|id| self.acls.get(id))
    }

    /// Entries targeting `object`, ordered by id.
    pub fn acls_for_object(&self, object: &ObjectRef) -> Vec<&AccessControlList> {
        let mut entries: Vec<&AccessControlList> = self
            .object_acls
            .get(object)
            .into_iter()
            .flatten()
            .filter_map(|id| self.acls.get(id))
            .collect();
        entries.sort_by_key(|acl| acl.id);
        entries
    }

    pub fn acls_for_role(&self, role: RoleId) -> impl Iterator<Item = &AccessControlList> {
        self.role_acls
            .get(&role)
            .into_iter()
            .flatten()
            .filter_map(|id| self.acls.get(id))
    }

    pub fn grant_acl_permission(&mut self, id: AclId, pk: StoredPermissionId) -> Result<()> {
        self.acls
            .get_mut(&id)
            .ok_or(AclError::AclNotFound(id))?
            .permissions
            .insert(pk);
        Ok(())
    }

    pub fn revoke_acl_permission(&mut self, id: AclId, pk: StoredPermissionId) -> Result<bool> {
        Ok(self
            .acls
            .get_mut(&id)
            .ok_or(AclError::AclNotFound(id))?
            .permissions
            .remove(&pk))
    }

    pub fn delete_acl(&mut self, id: AclId) -> Result<AccessControlList> {
        let acl = self.acls.remove(&id).ok_or(AclError::AclNotFound(id))?;
        self.unindex_acl(&acl);
        Ok(acl)
    }

    /// Remove every ACL entry targeting a deleted content object.
    pub fn delete_object(&mut self, object: &ObjectRef) -> usize {
        let ids = self.object_acls.remove(object).unwrap_or_default();
        for id in &ids {
            if let Some(acl) = self.acls.remove(id) {
                self.unindex_acl(&acl);
            }
        }
        if !ids.is_empty() {
            debug!(%object, removed = ids.len(), "cascaded acl deletion");
        }
        ids.len()
    }

    pub fn acl_count(&self) -> usize {
        self.acls.len()
    }

    fn index_acl(&mut self, acl: &AccessControlList) {
        self.acl_index.insert((acl.object, acl.role), acl.id);
        self.role_acls.entry(acl.role).or_default().insert(acl.id);
        self.object_acls.entry(acl.object).or_default().insert(acl.id);
    }

    fn unindex_acl(&mut self, acl: &AccessControlList) {
        self.acl_index.remove(&(acl.object, acl.role));
        if let Some(ids) = self.role_acls.get_mut(&acl.role) {
            ids.remove(&acl.id);
        }
        if let Some(ids) = self.object_acls.get_mut(&acl.object) {
            ids.remove(&acl.id);
            if ids.is_empty() {
                self.object_acls.remove(&acl.object);
            }
        }
    }
}
