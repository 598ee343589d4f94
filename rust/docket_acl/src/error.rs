//! Error types for the ACL engine.
//!
//! `AccessDenied` is the terminal failure of an access check; every other
//! variant is a lookup, configuration or storage problem.

use thiserror::Error;

use crate::types::{AclId, GroupId, ObjectRef, RoleId, UserId};

#[derive(Error, Debug)]
pub enum AclError {
    /// The permission identifier was never registered.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    #[error("access denied: user {user} holds none of [{permissions}] on {object}")]
    AccessDenied {
        user: UserId,
        object: ObjectRef,
        permissions: String,
    },

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("role not found: {0}")]
    RoleNotFound(RoleId),

    #[error("acl entry not found: {0}")]
    AclNotFound(AclId),

    #[error("acl entry already exists for role {role} on {object}")]
    DuplicateAcl { object: ObjectRef, role: RoleId },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, AclError>;

impl AclError {
    /// HTTP-equivalent status for surfacing the error to a caller.
    ///
    /// - 403: access check failed
    /// - 404: a referenced record does not exist
    /// - 409: uniqueness violation
    /// - 400: malformed identifier
    /// - 500: configuration or storage failure
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AccessDenied { .. } => 403,
            Self::UserNotFound(_)
            | Self::GroupNotFound(_)
            | Self::RoleNotFound(_)
            | Self::AclNotFound(_) => 404,
            Self::DuplicateAcl { .. } => 409,
            Self::InvalidIdentifier(_) => 400,
            Self::UnknownPermission(_)
            | Self::Database(_)
            | Self::Table(_)
            | Self::Transaction(_)
            | Self::Commit(_)
            | Self::Storage(_)
            | Self::Serialization(_) => 500,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Check if the error indicates a missing record.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }
}
