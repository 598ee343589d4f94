//! Application context and the startup sequence that builds it.
//!
//! Bootstrap runs three steps in a fixed order:
//!
//! 1. resolve the scratch directory used by conversions
//! 2. register the default permission catalog
//! 3. open `acl.redb` and restore stored permissions and the access store
//!
//! Step 3 needs step 2: restored stored records are only usable for
//! permissions that are registered.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempfile::TempDir;
use tracing::{info, warn};

use docket_acl::{
    AccessResolver, AccessStore, AclDatabase, Content, PermissionId, PermissionRegistry, UserId,
};
use docket_converter::{Converter, LibreOffice, SniffingClassifier};

use crate::config::AppConfig;
use crate::error::{CommonError, Result};
use crate::permissions;

pub struct AppContext {
    config: AppConfig,
    registry: PermissionRegistry,
    store: RwLock<AccessStore>,
    database: AclDatabase,
    temporary_directory: PathBuf,
    // Owned fallback scratch directory; removed when the context drops.
    _scratch: Option<TempDir>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("temporary_directory", &self.temporary_directory)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub fn bootstrap(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let (temporary_directory, scratch) =
            resolve_temporary_directory(config.temporary_directory.as_deref())?;
        info!(path = %temporary_directory.display(), "temporary directory ready");

        let registry = PermissionRegistry::new();
        let registered = permissions::register_defaults(&registry);
        info!(registered, "default permissions registered");

        fs::create_dir_all(&config.data_dir)?;
        let database = AclDatabase::open(config.acl_database_path())?;
        let store = database.load()?.restore(&registry);
        info!(
            path = %config.acl_database_path().display(),
            acls = store.acl_count(),
            "acl store restored"
        );

        Ok(Self {
            config,
            registry,
            store: RwLock::new(store),
            database,
            temporary_directory,
            _scratch: scratch,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    pub fn store(&self) -> RwLockReadGuard<'_, AccessStore> {
        self.store.read()
    }

    pub fn store_mut(&self) -> RwLockWriteGuard<'_, AccessStore> {
        self.store.write()
    }

    pub fn temporary_directory(&self) -> &Path {
        &self.temporary_directory
    }

    pub fn check_access<C: Content + ?Sized>(
        &self,
        permissions: &[PermissionId],
        user: UserId,
        obj: &C,
    ) -> docket_acl::Result<()> {
        let store = self.store.read();
        AccessResolver::new(&store, &self.registry).check_access(permissions, user, obj)
    }

    pub fn filter_by_access<T, I>(
        &self,
        permission: &PermissionId,
        user: UserId,
        candidates: I,
    ) -> docket_acl::Result<Vec<T>>
    where
        T: Content,
        I: IntoIterator<Item = T>,
    {
        let store = self.store.read();
        AccessResolver::new(&store, &self.registry).filter_by_access(permission, user, candidates)
    }

    /// Persist stored permissions and the access store.
    pub fn save(&self) -> Result<()> {
        let store = self.store.read();
        self.database.save(&self.registry, &store)?;
        Ok(())
    }

    /// Converter for `data` wired to the configured office binary and scratch
    /// directory.
    pub fn converter(&self, data: Vec<u8>, mime_type: Option<&str>) -> Converter {
        Converter::new(data, mime_type, &SniffingClassifier).with_office_backend(LibreOffice::new(
            &self.config.libreoffice_path,
            &self.temporary_directory,
        ))
    }
}

/// Use `configured` when it is a writable directory, otherwise create a
/// private one.
fn resolve_temporary_directory(configured: Option<&Path>) -> Result<(PathBuf, Option<TempDir>)> {
    if let Some(path) = configured {
        match check_writable(path) {
            Ok(()) => return Ok((path.to_path_buf(), None)),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "configured temporary directory unusable, creating one"
            ),
        }
    }
    let scratch = tempfile::Builder::new().prefix("docket-").tempdir()?;
    Ok((scratch.path().to_path_buf(), Some(scratch)))
}

fn check_writable(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(CommonError::Config(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    tempfile::tempfile_in(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::AppContext;
    use crate::config::AppConfig;
    use crate::error::CommonError;
    use crate::permissions::{document_edit, document_view};
    use docket_acl::{AclError, ContentKind, Document, DocumentType, ObjectRef, PermissionId, UserId};
    use docket_converter::ConverterError;
    use proptest::prelude::*;
    use std::path::Path;

    fn context(dir: &Path) -> AppContext {
        AppContext::bootstrap(AppConfig::with_data_dir(dir.join("data"))).unwrap()
    }

    /// alice -> staff -> readers, readers granted `perm` on document type 1.
    fn grant_on_type(ctx: &AppContext, perm: &PermissionId) -> UserId {
        let pk = ctx.registry().get_stored_permission(perm).unwrap().pk;
        let mut store = ctx.store_mut();
        let alice = store.create_user("alice");
        let staff = store.create_group("staff");
        let readers = store.create_role("readers");
        store.add_user_to_group(staff, alice).unwrap();
        store.add_group_to_role(readers, staff).unwrap();
        let acl = store
            .create_acl(ObjectRef::new(ContentKind::DocumentType, 1), readers)
            .unwrap();
        store.grant_acl_permission(acl, pk).unwrap();
        alice
    }

    #[test]
    fn bootstrap_registers_defaults_and_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        assert!(ctx.registry().is_registered(&document_view()));
        assert!(dir.path().join("data").join("acl.redb").exists());
        assert!(ctx.temporary_directory().is_dir());
        assert_eq!(ctx.store().acl_count(), 0);
    }

    #[test]
    fn bootstrap_rejects_invalid_config() {
        let err = AppContext::bootstrap(AppConfig::with_data_dir("")).unwrap_err();
        assert!(matches!(err, CommonError::Config(_)));
    }

    #[test]
    fn configured_temporary_directory_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_data_dir(dir.path());
        config.temporary_directory = Some(scratch.path().to_path_buf());

        let ctx = AppContext::bootstrap(config).unwrap();
        assert_eq!(ctx.temporary_directory(), scratch.path());
    }

    #[test]
    fn missing_temporary_directory_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_data_dir(dir.path());
        config.temporary_directory = Some(dir.path().join("does-not-exist"));

        let ctx = AppContext::bootstrap(config).unwrap();
        let fallback = ctx.temporary_directory().to_path_buf();
        assert!(fallback.is_dir());
        assert_ne!(fallback, dir.path().join("does-not-exist"));

        drop(ctx);
        assert!(!fallback.exists());
    }

    #[test]
    fn access_checks_go_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let alice = grant_on_type(&ctx, &document_view());

        let invoices = DocumentType {
            id: 1,
            label: "Invoice".into(),
        };
        let letters = DocumentType {
            id: 2,
            label: "Letter".into(),
        };
        let invoice = Document::new(10, &invoices, "invoice.pdf");
        let letter = Document::new(11, &letters, "letter.pdf");

        ctx.check_access(&[document_view()], alice, &invoice).unwrap();
        let err = ctx.check_access(&[document_edit()], alice, &invoice).unwrap_err();
        assert!(err.is_access_denied());

        let visible = ctx
            .filter_by_access(&document_view(), alice, vec![invoice.clone(), letter])
            .unwrap();
        assert_eq!(visible, vec![invoice]);
    }

    #[test]
    fn saved_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let alice = {
            let ctx = context(dir.path());
            let alice = grant_on_type(&ctx, &document_view());
            ctx.save().unwrap();
            alice
        };

        let ctx = context(dir.path());
        assert_eq!(ctx.store().find_user("alice").map(|u| u.id), Some(alice));
        ctx.check_access(
            &[document_view()],
            alice,
            &ObjectRef::new(ContentKind::DocumentType, 1),
        )
        .unwrap();
    }

    #[test]
    fn unsaved_changes_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ctx = context(dir.path());
            grant_on_type(&ctx, &document_view());
        }
        let ctx = context(dir.path());
        assert!(ctx.store().find_user("alice").is_none());
    }

    #[test]
    fn unknown_permission_is_not_a_denial() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let err = ctx
            .check_access(
                &[PermissionId::new("documents", "document_shred")],
                1,
                &ObjectRef::new(ContentKind::Document, 1),
            )
            .unwrap_err();
        assert!(matches!(err, AclError::UnknownPermission(_)));
    }

    #[test]
    fn converter_uses_configured_office_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_data_dir(dir.path());
        config.libreoffice_path = dir.path().join("no-office-here");
        let ctx = AppContext::bootstrap(config).unwrap();

        let mut converter = ctx.converter(b"plain text body".to_vec(), None);
        assert_eq!(converter.mime_type(), "text/plain");
        match converter.seek(0).unwrap_err() {
            ConverterError::ConverterNotFound(path) => assert!(path.ends_with("no-office-here")),
            other => panic!("unexpected error: {other}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_restart_preserves_decisions(
            grants in prop::collection::vec((1u32..4, any::<bool>()), 0..6),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let objects: Vec<ObjectRef> =
                (1..4).map(|id| ObjectRef::new(ContentKind::Folder, id)).collect();

            let (user, before) = {
                let ctx = context(dir.path());
                let view = ctx.registry().get_stored_permission(&document_view()).unwrap().pk;
                let edit = ctx.registry().get_stored_permission(&document_edit()).unwrap().pk;
                let user = {
                    let mut store = ctx.store_mut();
                    let user = store.create_user("u");
                    let group = store.create_group("g");
                    let role = store.create_role("r");
                    store.add_user_to_group(group, user).unwrap();
                    store.add_group_to_role(role, group).unwrap();
                    for (id, use_view) in &grants {
                        let acl = store
                            .get_or_create_acl(ObjectRef::new(ContentKind::Folder, *id), role)
                            .unwrap();
                        store
                            .grant_acl_permission(acl, if *use_view { view } else { edit })
                            .unwrap();
                    }
                    user
                };
                ctx.save().unwrap();
                let before = ctx.filter_by_access(&document_view(), user, objects.clone()).unwrap();
                (user, before)
            };

            let ctx = context(dir.path());
            let after = ctx.filter_by_access(&document_view(), user, objects).unwrap();
            prop_assert_eq!(before, after);
        }
    }
}
