//! ACL resolution.
//!
//! A user holds a permission on an object when some role reachable through
//! the user's groups has an ACL entry granting it either on the object itself
//! or on the object's type. The type hop happens once; a type's own type is
//! never consulted. The two sources are independent and either one suffices.

use ahash::AHashSet;
use tracing::debug;

use crate::bitmap::GrantedObjects;
use crate::error::{AclError, Result};
use crate::permission::{PermissionId, PermissionRegistry};
use crate::store::AccessStore;
use crate::types::*;

/// Read-only view over the store and registry answering access questions.
#[derive(Debug, Clone, Copy)]
pub struct AccessResolver<'a> {
    store: &'a AccessStore,
    registry: &'a PermissionRegistry,
}

impl<'a> AccessResolver<'a> {
    pub fn new(store: &'a AccessStore, registry: &'a PermissionRegistry) -> Self {
        Self { store, registry }
    }

    /// Succeed when `user` holds any of `permissions` on `obj`, otherwise
    /// fail with [`AclError::AccessDenied`].
    pub fn check_access<C: Content + ?Sized>(
        &self,
        permissions: &[PermissionId],
        user: UserId,
        obj: &C,
    ) -> Result<()> {
        let object = obj.object_ref();
        let pks: Vec<StoredPermissionId> = self
            .registry
            .stored_permissions(permissions)?
            .into_iter()
            .map(|record| record.pk)
            .collect();

        let roles = self.store.reachable_roles(user);
        if roles.is_empty() || pks.is_empty() {
            return Err(denied(permissions, user, object));
        }

        if self.granted_on(&roles, &object, &pks) {
            debug!(user, %object, "access granted by direct acl");
            return Ok(());
        }

        if let Some(type_ref) = obj.type_ref() {
            if self.granted_on(&roles, &type_ref, &pks) {
                debug!(user, %object, %type_ref, "access granted by type acl");
                return Ok(());
            }
        }

        Err(denied(permissions, user, object))
    }

    /// `check_access` as a boolean; other errors still propagate.
    pub fn has_access<C: Content + ?Sized>(
        &self,
        permissions: &[PermissionId],
        user: UserId,
        obj: &C,
    ) -> Result<bool> {
        match self.check_access(permissions, user, obj) {
            Ok(()) => Ok(true),
            Err(AclError::AccessDenied { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Keep the candidates on which `user` holds `permission`.
    ///
    /// Equivalent to calling [`check_access`](Self::check_access) per
    /// candidate, but computes the reachable roles and the granted objects
    /// once. Input order is preserved.
    pub fn filter_by_access<T, I>(
        &self,
        permission: &PermissionId,
        user: UserId,
        candidates: I,
    ) -> Result<Vec<T>>
    where
        T: Content,
        I: IntoIterator<Item = T>,
    {
        let pk = self.registry.get_stored_permission(permission)?.pk;
        let granted = self.granted_objects(user, pk);
        if granted.is_empty() {
            return Ok(Vec::new());
        }
        Ok(candidates
            .into_iter()
            .filter(|candidate| granted.allows(candidate))
            .collect())
    }

    /// Every object on which a role reachable by `user` grants `pk`.
    pub fn granted_objects(&self, user: UserId, pk: StoredPermissionId) -> GrantedObjects {
        let mut granted = GrantedObjects::default();
        for role in self.store.reachable_roles(user) {
            for acl in self.store.acls_for_role(role) {
                if acl.permissions.contains(&pk) {
                    granted.insert(acl.object);
                }
            }
        }
        granted
    }

    fn granted_on(
        &self,
        roles: &AHashSet<RoleId>,
        object: &ObjectRef,
        pks: &[StoredPermissionId],
    ) -> bool {
        roles.iter().any(|role| {
            self.store
                .acl_for(object, *role)
                .is_some_and(|acl| acl.grants(pks))
        })
    }
}

fn denied(permissions: &[PermissionId], user: UserId, object: ObjectRef) -> AclError {
    AclError::AccessDenied {
        user,
        object,
        permissions: permissions
            .iter()
            .map(PermissionId::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}
