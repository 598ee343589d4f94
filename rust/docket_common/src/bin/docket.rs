//! docket - manage access control and convert document pages.
//!
//! # Usage
//!
//! ```bash
//! docket --data-dir ./docket_data user add alice
//! docket group add staff && docket group add-member staff alice
//! docket role add readers && docket role add-group readers staff
//! docket acl grant --role readers --object document_type:1 documents.document_view
//! docket check --user alice --object document:3 --type document_type:1 documents.document_view
//! docket convert report.odt --page 0 --transform resize=800 --output page0.png
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr (`RUST_LOG`).

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docket_acl::{
    AccessStore, Content, GroupId, ObjectRef, PermissionId, RoleId, StoredPermissionId, UserId,
};
use docket_common::{AppConfig, AppContext, CommonError};
use docket_converter::{ImageFormat, Transformation};

#[derive(Parser)]
#[command(name = "docket")]
#[command(about = "Document access control and page conversion")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered permissions
    Permissions,
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage groups
    #[command(subcommand)]
    Group(GroupCommand),
    /// Manage roles
    #[command(subcommand)]
    Role(RoleCommand),
    /// Grant or revoke permissions on objects
    #[command(subcommand)]
    Acl(AclCommand),
    /// Check whether a user holds any of the permissions on an object
    Check {
        #[arg(long)]
        user: String,

        /// Target object, e.g. document:3
        #[arg(long)]
        object: ObjectRef,

        /// Type the object inherits access from, e.g. document_type:1
        #[arg(long = "type")]
        type_ref: Option<ObjectRef>,

        /// Permissions as namespace.name
        #[arg(required = true)]
        permissions: Vec<PermissionId>,
    },
    /// Render one page of a document to an image
    Convert {
        input: PathBuf,

        #[arg(long, short = 'o')]
        output: PathBuf,

        /// 0-based page number
        #[arg(long, default_value = "0")]
        page: usize,

        /// Output format by extension (png, jpeg, gif, ...)
        #[arg(long, default_value = "png")]
        format: String,

        /// MIME type of the input; sniffed when omitted
        #[arg(long)]
        mime_type: Option<String>,

        /// Transformations applied in order, e.g. resize=800x600, rotate=90, zoom=150
        #[arg(long = "transform")]
        transformations: Vec<Transformation>,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Add { username: String },
}

#[derive(Subcommand)]
enum GroupCommand {
    Add { name: String },
    AddMember { group: String, username: String },
}

#[derive(Subcommand)]
enum RoleCommand {
    Add { label: String },
    AddGroup { role: String, group: String },
    Grant { role: String, permission: PermissionId },
}

#[derive(Subcommand)]
enum AclCommand {
    Grant {
        #[arg(long)]
        role: String,
        #[arg(long)]
        object: ObjectRef,
        #[arg(required = true)]
        permissions: Vec<PermissionId>,
    },
    Revoke {
        #[arg(long)]
        role: String,
        #[arg(long)]
        object: ObjectRef,
        #[arg(required = true)]
        permissions: Vec<PermissionId>,
    },
}

/// Object named on the command line together with its optional type.
struct Target {
    object: ObjectRef,
    type_ref: Option<ObjectRef>,
}

impl Content for Target {
    fn object_ref(&self) -> ObjectRef {
        self.object
    }

    fn type_ref(&self) -> Option<ObjectRef> {
        self.type_ref
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let output = run(Cli::parse())?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Execute one command against the configured data directory, saving the
/// ACL state when the command changed it.
fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let ctx = AppContext::bootstrap(cli.config)?;

    let (output, mutated) = match cli.command {
        Commands::Permissions => {
            let permissions: Vec<_> = ctx
                .registry()
                .all()
                .into_iter()
                .map(|p| json!({ "id": p.id.to_string(), "label": p.label }))
                .collect();
            (json!(permissions), false)
        }
        Commands::User(command) => (user(&ctx, command)?, true),
        Commands::Group(command) => (group(&ctx, command)?, true),
        Commands::Role(command) => (role(&ctx, command)?, true),
        Commands::Acl(command) => (acl(&ctx, command)?, true),
        Commands::Check {
            user,
            object,
            type_ref,
            permissions,
        } => {
            let user_id = user_id(&ctx.store(), &user)?;
            let target = Target { object, type_ref };
            let allowed = match ctx.check_access(&permissions, user_id, &target) {
                Ok(()) => true,
                Err(e) if e.is_access_denied() => false,
                Err(e) => return Err(e.into()),
            };
            (json!({ "user": user, "object": object.to_string(), "allowed": allowed }), false)
        }
        Commands::Convert {
            input,
            output,
            page,
            format,
            mime_type,
            transformations,
        } => {
            let format = ImageFormat::from_extension(&format)
                .with_context(|| format!("unsupported output format {format:?}"))?;
            let data = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;

            let mut converter = ctx.converter(data, mime_type.as_deref());
            converter.seek(page)?;
            converter.transform_many(&transformations)?;
            let encoded = converter.get_page(format)?;
            std::fs::write(&output, &encoded)
                .with_context(|| format!("writing {}", output.display()))?;

            info!(output = %output.display(), bytes = encoded.len(), "page written");
            (
                json!({
                    "page": page,
                    "mime_type": converter.mime_type(),
                    "output": output.display().to_string(),
                    "bytes": encoded.len(),
                }),
                false,
            )
        }
    };

    if mutated {
        ctx.save()?;
    }
    Ok(output)
}

fn user(ctx: &AppContext, command: UserCommand) -> anyhow::Result<serde_json::Value> {
    let mut store = ctx.store_mut();
    match command {
        UserCommand::Add { username } => {
            if store.find_user(&username).is_some() {
                bail!("user {username:?} already exists");
            }
            let id = store.create_user(&username);
            Ok(json!({ "id": id, "username": username }))
        }
    }
}

fn group(ctx: &AppContext, command: GroupCommand) -> anyhow::Result<serde_json::Value> {
    let mut store = ctx.store_mut();
    match command {
        GroupCommand::Add { name } => {
            if store.find_group(&name).is_some() {
                bail!("group {name:?} already exists");
            }
            let id = store.create_group(&name);
            Ok(json!({ "id": id, "name": name }))
        }
        GroupCommand::AddMember { group, username } => {
            let group_id = group_id(&store, &group)?;
            let user_id = user_id(&store, &username)?;
            store.add_user_to_group(group_id, user_id)?;
            Ok(json!({ "group": group, "user": username }))
        }
    }
}

fn role(ctx: &AppContext, command: RoleCommand) -> anyhow::Result<serde_json::Value> {
    match command {
        RoleCommand::Add { label } => {
            let mut store = ctx.store_mut();
            if store.find_role(&label).is_some() {
                bail!("role {label:?} already exists");
            }
            let id = store.create_role(&label);
            Ok(json!({ "id": id, "label": label }))
        }
        RoleCommand::AddGroup { role, group } => {
            let mut store = ctx.store_mut();
            let role_id = role_id(&store, &role)?;
            let group_id = group_id(&store, &group)?;
            store.add_group_to_role(role_id, group_id)?;
            Ok(json!({ "role": role, "group": group }))
        }
        RoleCommand::Grant { role, permission } => {
            let pk = ctx.registry().get_stored_permission(&permission)?.pk;
            let mut store = ctx.store_mut();
            let role_id = role_id(&store, &role)?;
            store.grant_role_permission(role_id, pk)?;
            Ok(json!({ "role": role, "permission": permission.to_string() }))
        }
    }
}

fn acl(ctx: &AppContext, command: AclCommand) -> anyhow::Result<serde_json::Value> {
    match command {
        AclCommand::Grant {
            role,
            object,
            permissions,
        } => {
            let pks = stored_pks(ctx, &permissions)?;
            let mut store = ctx.store_mut();
            let role_id = role_id(&store, &role)?;
            let acl = store.get_or_create_acl(object, role_id)?;
            for pk in pks {
                store.grant_acl_permission(acl, pk)?;
            }
            Ok(json!({ "acl": acl, "role": role, "object": object.to_string() }))
        }
        AclCommand::Revoke {
            role,
            object,
            permissions,
        } => {
            let pks = stored_pks(ctx, &permissions)?;
            let mut store = ctx.store_mut();
            let role_id = role_id(&store, &role)?;
            let acl = store
                .acl_for(&object, role_id)
                .map(|acl| acl.id)
                .ok_or_else(|| CommonError::NotFound {
                    kind: "acl entry",
                    name: format!("{role} on {object}"),
                })?;
            let mut revoked = 0;
            for pk in pks {
                if store.revoke_acl_permission(acl, pk)? {
                    revoked += 1;
                }
            }
            Ok(json!({ "acl": acl, "revoked": revoked }))
        }
    }
}

fn stored_pks(ctx: &AppContext, permissions: &[PermissionId]) -> anyhow::Result<Vec<StoredPermissionId>> {
    Ok(ctx
        .registry()
        .stored_permissions(permissions)?
        .into_iter()
        .map(|record| record.pk)
        .collect())
}

fn user_id(store: &AccessStore, username: &str) -> Result<UserId, CommonError> {
    store
        .find_user(username)
        .map(|u| u.id)
        .ok_or_else(|| not_found("user", username))
}

fn group_id(store: &AccessStore, name: &str) -> Result<GroupId, CommonError> {
    store
        .find_group(name)
        .map(|g| g.id)
        .ok_or_else(|| not_found("group", name))
}

fn role_id(store: &AccessStore, label: &str) -> Result<RoleId, CommonError> {
    store
        .find_role(label)
        .map(|r| r.id)
        .ok_or_else(|| not_found("role", label))
}

fn not_found(kind: &'static str, name: &str) -> CommonError {
    CommonError::NotFound {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Parse and run `args` against `data_dir`, as separate invocations of
    /// the binary would.
    fn docket(data_dir: &TempDir, args: &[&str]) -> anyhow::Result<serde_json::Value> {
        let dir = data_dir.path().to_str().unwrap();
        let argv = ["docket", "--data-dir", dir].into_iter().chain(args.iter().copied());
        run(Cli::try_parse_from(argv)?)
    }

    fn setup(data_dir: &TempDir) {
        for args in [
            &["user", "add", "alice"][..],
            &["user", "add", "bob"][..],
            &["group", "add", "staff"][..],
            &["group", "add-member", "staff", "alice"][..],
            &["role", "add", "readers"][..],
            &["role", "add-group", "readers", "staff"][..],
        ] {
            docket(data_dir, args).unwrap();
        }
    }

    fn allowed(data_dir: &TempDir, user: &str, object: &str, type_ref: Option<&str>) -> bool {
        let mut args = vec!["check", "--user", user, "--object", object];
        if let Some(type_ref) = type_ref {
            args.extend(["--type", type_ref]);
        }
        args.push("documents.document_view");
        docket(data_dir, &args).unwrap()["allowed"].as_bool().unwrap()
    }

    #[test]
    fn acl_grant_persists_across_invocations() {
        let data_dir = TempDir::new().unwrap();
        setup(&data_dir);
        assert!(!allowed(&data_dir, "alice", "document:3", Some("document_type:1")));

        let granted = docket(
            &data_dir,
            &[
                "acl",
                "grant",
                "--role",
                "readers",
                "--object",
                "document_type:1",
                "documents.document_view",
            ],
        )
        .unwrap();
        assert_eq!(granted["object"], "document_type:1");

        assert!(allowed(&data_dir, "alice", "document:3", Some("document_type:1")));
        assert!(!allowed(&data_dir, "alice", "document:3", Some("document_type:2")));
        assert!(!allowed(&data_dir, "alice", "document:3", None));
        assert!(!allowed(&data_dir, "bob", "document:3", Some("document_type:1")));
    }

    #[test]
    fn acl_revoke_denies_again() {
        let data_dir = TempDir::new().unwrap();
        setup(&data_dir);
        let grant = [
            "acl",
            "grant",
            "--role",
            "readers",
            "--object",
            "document:7",
            "documents.document_view",
            "documents.document_edit",
        ];
        docket(&data_dir, &grant).unwrap();
        assert!(allowed(&data_dir, "alice", "document:7", None));

        let mut revoke = grant;
        revoke[1] = "revoke";
        let revoked = docket(&data_dir, &revoke).unwrap();
        assert_eq!(revoked["revoked"], 2);
        assert!(!allowed(&data_dir, "alice", "document:7", None));
    }

    #[test]
    fn unknown_names_fail() {
        let data_dir = TempDir::new().unwrap();
        setup(&data_dir);
        assert!(docket(&data_dir, &["user", "add", "alice"]).is_err());
        assert!(docket(&data_dir, &["group", "add-member", "staff", "carol"]).is_err());
        assert!(docket(
            &data_dir,
            &["check", "--user", "carol", "--object", "document:1", "documents.document_view"],
        )
        .is_err());
        assert!(docket(
            &data_dir,
            &["acl", "grant", "--role", "readers", "--object", "document:1", "documents.nope"],
        )
        .is_err());
    }

    #[test]
    fn permissions_lists_the_default_catalog() {
        let data_dir = TempDir::new().unwrap();
        let listed = docket(&data_dir, &["permissions"]).unwrap();
        let ids: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&"documents.document_view"));
        assert!(ids.contains(&"document_types.document_type_edit"));
    }
}
