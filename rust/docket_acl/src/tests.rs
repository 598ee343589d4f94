//! Resolver tests over a small document hierarchy.

use proptest::prelude::*;

use crate::{
    AccessResolver, AccessStore, AclError, Content, ContentKind, Document, DocumentType,
    GroupId, ObjectId, ObjectRef, PermissionId, PermissionRegistry, RoleId, StoredPermissionId,
    UserId,
};

// ============================================================================
// Fixture
// ============================================================================

/// Two document types, three documents (two of type 1, one of type 2), one
/// user, one group and one role with no memberships or grants yet.
struct Fixture {
    registry: PermissionRegistry,
    store: AccessStore,
    document_type_1: DocumentType,
    document_type_2: DocumentType,
    document_1: Document,
    document_2: Document,
    document_3: Document,
    user: UserId,
    group: GroupId,
    role: RoleId,
}

fn view() -> PermissionId {
    PermissionId::new("documents", "document_view")
}

fn edit() -> PermissionId {
    PermissionId::new("documents", "document_edit")
}

impl Fixture {
    fn new() -> Self {
        let registry = PermissionRegistry::new();
        registry.register("documents", "document_view", "View documents");
        registry.register("documents", "document_edit", "Edit documents");
        registry.invalidate_cache();

        let document_type_1 = DocumentType {
            id: 1,
            label: "test document type".to_string(),
        };
        let document_type_2 = DocumentType {
            id: 2,
            label: "test document type2".to_string(),
        };
        let document_1 = Document::new(1, &document_type_1, "document 1");
        let document_2 = Document::new(2, &document_type_1, "document 2");
        let document_3 = Document::new(3, &document_type_2, "document 3");

        let mut store = AccessStore::new();
        let user = store.create_user("test user");
        let group = store.create_group("test group");
        let role = store.create_role("test role");

        Self {
            registry,
            store,
            document_type_1,
            document_type_2,
            document_1,
            document_2,
            document_3,
            user,
            group,
            role,
        }
    }

    fn join_role(&mut self) {
        self.store.add_user_to_group(self.group, self.user).unwrap();
        self.store.add_group_to_role(self.role, self.group).unwrap();
    }

    fn pk(&self, permission: &PermissionId) -> StoredPermissionId {
        self.registry.get_stored_permission(permission).unwrap().pk
    }

    fn grant_role(&mut self, permission: &PermissionId) {
        let pk = self.pk(permission);
        self.store.grant_role_permission(self.role, pk).unwrap();
    }

    fn grant_on<C: Content>(&mut self, obj: &C, permission: &PermissionId) {
        let pk = self.pk(permission);
        let acl = self
            .store
            .get_or_create_acl(obj.object_ref(), self.role)
            .unwrap();
        self.store.grant_acl_permission(acl, pk).unwrap();
    }

    fn resolver(&self) -> AccessResolver<'_> {
        AccessResolver::new(&self.store, &self.registry)
    }

    fn documents(&self) -> Vec<&Document> {
        vec![&self.document_1, &self.document_2, &self.document_3]
    }

    fn visible_ids(&self, permission: &PermissionId) -> Vec<ObjectId> {
        self.resolver()
            .filter_by_access(permission, self.user, self.documents())
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect()
    }
}

// ============================================================================
// check_access
// ============================================================================

#[test]
fn check_access_without_permissions() {
    let fx = Fixture::new();
    let err = fx
        .resolver()
        .check_access(&[view()], fx.user, &fx.document_1)
        .unwrap_err();
    assert!(err.is_access_denied());
}

#[test]
fn check_access_with_acl() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc = fx.document_1.clone();
    fx.grant_on(&doc, &view());

    fx.resolver()
        .check_access(&[view()], fx.user, &fx.document_1)
        .unwrap();
}

#[test]
fn check_access_with_inherited_acl() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc_type = fx.document_type_1.clone();
    fx.grant_on(&doc_type, &view());

    fx.resolver()
        .check_access(&[view()], fx.user, &fx.document_1)
        .unwrap();
    // Sibling of another type is not covered.
    assert!(!fx
        .resolver()
        .has_access(&[view()], fx.user, &fx.document_3)
        .unwrap());
}

#[test]
fn check_access_with_inherited_acl_and_local_acl() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc_type = fx.document_type_1.clone();
    let doc = fx.document_3.clone();
    fx.grant_on(&doc_type, &view());
    fx.grant_on(&doc, &view());

    fx.resolver()
        .check_access(&[view()], fx.user, &fx.document_3)
        .unwrap();
}

#[test]
fn check_access_accepts_any_of_the_requested_permissions() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc = fx.document_2.clone();
    fx.grant_on(&doc, &edit());

    let resolver = fx.resolver();
    resolver
        .check_access(&[view(), edit()], fx.user, &fx.document_2)
        .unwrap();
    assert!(!resolver.has_access(&[view()], fx.user, &fx.document_2).unwrap());
}

#[test]
fn check_access_ignores_role_permissions_without_acl() {
    let mut fx = Fixture::new();
    fx.join_role();
    fx.grant_role(&view());

    assert!(!fx
        .resolver()
        .has_access(&[view()], fx.user, &fx.document_1)
        .unwrap());
}

#[test]
fn check_access_requires_group_membership() {
    let mut fx = Fixture::new();
    fx.store.add_group_to_role(fx.role, fx.group).unwrap();
    let doc = fx.document_1.clone();
    fx.grant_on(&doc, &view());

    assert!(!fx
        .resolver()
        .has_access(&[view()], fx.user, &fx.document_1)
        .unwrap());
}

#[test]
fn check_access_with_empty_permission_list_is_denied() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc = fx.document_1.clone();
    fx.grant_on(&doc, &view());

    let err = fx
        .resolver()
        .check_access(&[], fx.user, &fx.document_1)
        .unwrap_err();
    assert!(err.is_access_denied());
}

#[test]
fn check_access_with_unregistered_permission_fails() {
    let fx = Fixture::new();
    let err = fx
        .resolver()
        .check_access(
            &[PermissionId::new("documents", "document_shred")],
            fx.user,
            &fx.document_1,
        )
        .unwrap_err();
    assert!(matches!(err, AclError::UnknownPermission(_)));
}

#[test]
fn custom_content_inherits_from_its_declared_type() {
    // Any Content may name its own type; only that object is consulted.
    let mut fx = Fixture::new();
    fx.join_role();
    let folder = ObjectRef::new(ContentKind::Folder, 1);
    fx.grant_on(&folder, &view());

    struct NestedType(ObjectRef);
    impl Content for NestedType {
        fn object_ref(&self) -> ObjectRef {
            ObjectRef::new(ContentKind::Document, 99)
        }
        fn type_ref(&self) -> Option<ObjectRef> {
            Some(self.0)
        }
    }

    let resolver = fx.resolver();
    assert!(resolver
        .has_access(&[view()], fx.user, &NestedType(folder))
        .unwrap());
    assert!(!resolver
        .has_access(&[view()], fx.user, &fx.document_1)
        .unwrap());
}

#[test]
fn deleting_the_object_revokes_access() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc = fx.document_1.clone();
    fx.grant_on(&doc, &view());

    fx.store.delete_object(&fx.document_1.object_ref());
    assert!(!fx
        .resolver()
        .has_access(&[view()], fx.user, &fx.document_1)
        .unwrap());
}

#[test]
fn removing_the_group_from_the_role_revokes_access() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc = fx.document_1.clone();
    fx.grant_on(&doc, &view());
    assert!(fx.store.reachable_roles(fx.user).contains(&fx.role));

    assert!(fx.store.remove_group_from_role(fx.role, fx.group).unwrap());
    assert!(!fx.store.remove_group_from_role(fx.role, fx.group).unwrap());

    assert!(fx.store.reachable_roles(fx.user).is_empty());
    let err = fx
        .resolver()
        .check_access(&[view()], fx.user, &fx.document_1)
        .unwrap_err();
    assert!(err.is_access_denied());
}

#[test]
fn removing_the_user_from_the_group_revokes_access() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc_type = fx.document_type_1.clone();
    fx.grant_on(&doc_type, &view());
    assert_eq!(fx.visible_ids(&view()), vec![1, 2]);

    assert!(fx.store.remove_user_from_group(fx.group, fx.user).unwrap());
    assert!(!fx.store.remove_user_from_group(fx.group, fx.user).unwrap());

    assert!(fx.store.reachable_roles(fx.user).is_empty());
    assert!(!fx.store.group(fx.group).unwrap().members.contains(&fx.user));
    assert!(fx
        .resolver()
        .check_access(&[view()], fx.user, &fx.document_2)
        .unwrap_err()
        .is_access_denied());
    assert!(fx.visible_ids(&view()).is_empty());
}

#[test]
fn revoking_a_role_permission() {
    let mut fx = Fixture::new();
    fx.grant_role(&view());
    fx.grant_role(&edit());
    let view_pk = fx.pk(&view());

    assert!(fx.store.revoke_role_permission(fx.role, view_pk).unwrap());
    assert!(!fx.store.revoke_role_permission(fx.role, view_pk).unwrap());

    let role = fx.store.role(fx.role).unwrap();
    assert!(!role.permissions.contains(&view_pk));
    assert!(role.permissions.contains(&fx.pk(&edit())));
    assert!(matches!(
        fx.store.revoke_role_permission(999, view_pk),
        Err(AclError::RoleNotFound(999))
    ));
}

// ============================================================================
// filter_by_access
// ============================================================================

#[test]
fn filtering_without_permissions() {
    let fx = Fixture::new();
    assert!(fx.visible_ids(&view()).is_empty());
}

#[test]
fn filtering_with_permissions() {
    let mut fx = Fixture::new();
    fx.join_role();
    fx.grant_role(&view());
    let doc = fx.document_1.clone();
    fx.grant_on(&doc, &view());

    assert_eq!(fx.visible_ids(&view()), vec![1]);
}

#[test]
fn filtering_with_inherited_permissions() {
    let mut fx = Fixture::new();
    fx.join_role();
    fx.grant_role(&view());
    let doc_type = fx.document_type_1.clone();
    fx.grant_on(&doc_type, &view());

    let visible = fx.visible_ids(&view());
    assert!(visible.contains(&1));
    assert!(visible.contains(&2));
    assert!(!visible.contains(&3));
}

#[test]
fn filtering_with_inherited_permissions_and_local_acl() {
    let mut fx = Fixture::new();
    fx.join_role();
    fx.grant_role(&view());
    let doc_type = fx.document_type_1.clone();
    let doc = fx.document_3.clone();
    fx.grant_on(&doc_type, &view());
    fx.grant_on(&doc, &view());

    let mut visible = fx.visible_ids(&view());
    visible.sort_unstable();
    assert_eq!(visible, vec![1, 2, 3]);
}

#[test]
fn filtering_is_per_permission() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc_type = fx.document_type_2.clone();
    fx.grant_on(&doc_type, &edit());

    assert!(fx.visible_ids(&view()).is_empty());
    assert_eq!(fx.visible_ids(&edit()), vec![3]);
}

#[test]
fn filtering_empty_input() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc_type = fx.document_type_1.clone();
    fx.grant_on(&doc_type, &view());

    let empty: Vec<Document> = Vec::new();
    assert!(fx
        .resolver()
        .filter_by_access(&view(), fx.user, empty)
        .unwrap()
        .is_empty());
}

#[test]
fn filtering_with_unregistered_permission_fails() {
    let fx = Fixture::new();
    let result = fx.resolver().filter_by_access(
        &PermissionId::new("documents", "document_shred"),
        fx.user,
        fx.documents(),
    );
    assert!(matches!(result, Err(AclError::UnknownPermission(_))));
}

#[test]
fn filtering_preserves_input_order() {
    let mut fx = Fixture::new();
    fx.join_role();
    let doc_type = fx.document_type_1.clone();
    fx.grant_on(&doc_type, &view());

    let reversed = vec![&fx.document_2, &fx.document_3, &fx.document_1];
    let ids: Vec<ObjectId> = fx
        .resolver()
        .filter_by_access(&view(), fx.user, reversed)
        .unwrap()
        .into_iter()
        .map(|doc| doc.id)
        .collect();
    assert_eq!(ids, vec![2, 1]);
}

// ============================================================================
// Property tests
// ============================================================================

#[derive(Debug, Clone)]
struct Scenario {
    /// (group, user) memberships.
    memberships: Vec<(u8, u8)>,
    /// (role, group) bindings.
    bindings: Vec<(u8, u8)>,
    /// (role, target, permission) grants. Targets 0..4 are document types,
    /// 4..16 are documents.
    grants: Vec<(u8, u8, bool)>,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (
        prop::collection::vec((0..3u8, 0..3u8), 0..6),
        prop::collection::vec((0..3u8, 0..3u8), 0..6),
        prop::collection::vec((0..3u8, 0..16u8, any::<bool>()), 0..12),
    )
        .prop_map(|(memberships, bindings, grants)| Scenario {
            memberships,
            bindings,
            grants,
        })
}

struct World {
    registry: PermissionRegistry,
    store: AccessStore,
    users: Vec<UserId>,
    documents: Vec<Document>,
}

fn build(scenario: &Scenario) -> World {
    let registry = PermissionRegistry::new();
    registry.register("documents", "document_view", "View documents");
    registry.register("documents", "document_edit", "Edit documents");
    let view_pk = registry.get_stored_permission(&view()).unwrap().pk;
    let edit_pk = registry.get_stored_permission(&edit()).unwrap().pk;

    let mut store = AccessStore::new();
    let users: Vec<UserId> = (0..3).map(|i| store.create_user(format!("u{i}"))).collect();
    let groups: Vec<GroupId> = (0..3).map(|i| store.create_group(format!("g{i}"))).collect();
    let roles: Vec<RoleId> = (0..3).map(|i| store.create_role(format!("r{i}"))).collect();

    for &(g, u) in &scenario.memberships {
        store
            .add_user_to_group(groups[g as usize], users[u as usize])
            .unwrap();
    }
    for &(r, g) in &scenario.bindings {
        store
            .add_group_to_role(roles[r as usize], groups[g as usize])
            .unwrap();
    }
    for &(r, target, is_view) in &scenario.grants {
        let object = if target < 4 {
            ObjectRef::new(ContentKind::DocumentType, target as ObjectId)
        } else {
            ObjectRef::new(ContentKind::Document, target as ObjectId)
        };
        let acl = store.get_or_create_acl(object, roles[r as usize]).unwrap();
        let pk = if is_view { view_pk } else { edit_pk };
        store.grant_acl_permission(acl, pk).unwrap();
    }

    let documents = (4..16)
        .map(|id| Document {
            id,
            document_type: id % 4,
            label: format!("doc {id}"),
        })
        .collect();

    World {
        registry,
        store,
        users,
        documents,
    }
}

proptest! {
    #[test]
    fn prop_filter_matches_per_object_check(scenario in scenario()) {
        let world = build(&scenario);
        let resolver = AccessResolver::new(&world.store, &world.registry);

        for &user in &world.users {
            for permission in [view(), edit()] {
                let filtered: Vec<ObjectId> = resolver
                    .filter_by_access(&permission, user, world.documents.iter())
                    .unwrap()
                    .into_iter()
                    .map(|doc| doc.id)
                    .collect();
                let checked: Vec<ObjectId> = world
                    .documents
                    .iter()
                    .filter(|doc| {
                        resolver
                            .has_access(std::slice::from_ref(&permission), user, *doc)
                            .unwrap()
                    })
                    .map(|doc| doc.id)
                    .collect();
                prop_assert_eq!(filtered, checked);
            }
        }
    }

    #[test]
    fn prop_users_without_roles_see_nothing(scenario in scenario()) {
        let mut world = build(&scenario);
        let outsider = world.store.create_user("outsider");
        let resolver = AccessResolver::new(&world.store, &world.registry);

        prop_assert!(resolver
            .filter_by_access(&view(), outsider, world.documents.iter())
            .unwrap()
            .is_empty());
        for doc in &world.documents {
            prop_assert!(!resolver.has_access(&[view(), edit()], outsider, doc).unwrap());
        }
    }
}
