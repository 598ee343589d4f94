//! Permissions every docket installation registers at startup.

use docket_acl::{PermissionId, PermissionRegistry};

pub const DOCUMENTS: &str = "documents";
pub const DOCUMENT_TYPES: &str = "document_types";
pub const ACLS: &str = "acls";

const CATALOG: &[(&str, &[(&str, &str)])] = &[
    (
        DOCUMENTS,
        &[
            ("document_view", "View documents"),
            ("document_create", "Create documents"),
            ("document_edit", "Edit documents"),
            ("document_delete", "Delete documents"),
            ("document_properties_edit", "Edit document properties"),
        ],
    ),
    (
        DOCUMENT_TYPES,
        &[
            ("document_type_view", "View document types"),
            ("document_type_edit", "Edit document types"),
            ("document_type_delete", "Delete document types"),
        ],
    ),
    (
        ACLS,
        &[("acl_view", "View ACLs"), ("acl_edit", "Edit ACLs")],
    ),
];

/// Register the default catalog. Registering again is a no-op.
pub fn register_defaults(registry: &PermissionRegistry) -> usize {
    CATALOG
        .iter()
        .map(|(namespace, entries)| registry.register_namespace(namespace, entries).len())
        .sum()
}

macro_rules! permission_fns {
    ($($fn_name:ident => ($namespace:expr, $name:literal)),* $(,)?) => {
        $(
            pub fn $fn_name() -> PermissionId {
                PermissionId::new($namespace, $name)
            }
        )*
    };
}

permission_fns! {
    document_view => (DOCUMENTS, "document_view"),
    document_create => (DOCUMENTS, "document_create"),
    document_edit => (DOCUMENTS, "document_edit"),
    document_delete => (DOCUMENTS, "document_delete"),
    document_properties_edit => (DOCUMENTS, "document_properties_edit"),
    document_type_view => (DOCUMENT_TYPES, "document_type_view"),
    document_type_edit => (DOCUMENT_TYPES, "document_type_edit"),
    document_type_delete => (DOCUMENT_TYPES, "document_type_delete"),
    acl_view => (ACLS, "acl_view"),
    acl_edit => (ACLS, "acl_edit"),
}
