//! Domain types shared across docket_acl modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AclError;

pub type UserId = u32;
pub type GroupId = u32;
pub type RoleId = u32;
pub type AclId = u32;
pub type StoredPermissionId = u32;
pub type ObjectId = u32;

/// Every kind of object an ACL entry may target.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContentKind {
    Document = 0,
    DocumentType = 1,
    Folder = 2,
    Tag = 3,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        Self::Document,
        Self::DocumentType,
        Self::Folder,
        Self::Tag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::DocumentType => "document_type",
            Self::Folder => "folder",
            Self::Tag => "tag",
        }
    }

    pub fn from_str_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Dense index, used to address per-kind bitmaps.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable (kind, id) key of an ACL target.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ContentKind,
    pub id: ObjectId,
}

impl ObjectRef {
    pub fn new(kind: ContentKind, id: ObjectId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for ObjectRef {
    type Err = AclError;

    /// Parse `kind:id`, e.g. `document:42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| AclError::InvalidIdentifier(s.to_string()))?;
        let kind = ContentKind::from_str_name(kind)
            .ok_or_else(|| AclError::InvalidIdentifier(s.to_string()))?;
        let id = id
            .parse::<ObjectId>()
            .map_err(|_| AclError::InvalidIdentifier(s.to_string()))?;
        Ok(Self { kind, id })
    }
}

/// Anything an ACL entry can be attached to.
///
/// `type_ref` names the object whose ACL entries are inherited by this one.
/// Inheritance is a single hop: the type's own type is never consulted.
pub trait Content {
    fn object_ref(&self) -> ObjectRef;

    fn type_ref(&self) -> Option<ObjectRef> {
        None
    }
}

impl Content for ObjectRef {
    fn object_ref(&self) -> ObjectRef {
        *self
    }
}

impl<T: Content + ?Sized> Content for &T {
    fn object_ref(&self) -> ObjectRef {
        (**self).object_ref()
    }

    fn type_ref(&self) -> Option<ObjectRef> {
        (**self).type_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub id: ObjectId,
    pub label: String,
}

impl Content for DocumentType {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ContentKind::DocumentType, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: ObjectId,
    pub document_type: ObjectId,
    pub label: String,
}

impl Document {
    pub fn new(id: ObjectId, document_type: &DocumentType, label: impl Into<String>) -> Self {
        Self {
            id,
            document_type: document_type.id,
            label: label.into(),
        }
    }
}

impl Content for Document {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ContentKind::Document, self.id)
    }

    fn type_ref(&self) -> Option<ObjectRef> {
        Some(ObjectRef::new(ContentKind::DocumentType, self.document_type))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: ObjectId,
    pub label: String,
}

impl Content for Folder {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ContentKind::Folder, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: ObjectId,
    pub label: String,
}

impl Content for Tag {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ContentKind::Tag, self.id)
    }
}
