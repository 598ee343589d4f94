//! Roaring Bitmap sets of granted objects, one bitmap per content kind.

use roaring::RoaringBitmap;

use crate::types::{Content, ContentKind, ObjectRef};

/// Objects on which a permission was granted, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantedObjects {
    bitmaps: [RoaringBitmap; ContentKind::ALL.len()],
}

impl GrantedObjects {
    pub fn insert(&mut self, object: ObjectRef) {
        self.bitmaps[object.kind.index()].insert(object.id);
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.bitmaps[object.kind.index()].contains(object.id)
    }

    /// Granted on the object itself or on its type.
    pub fn allows<C: Content + ?Sized>(&self, content: &C) -> bool {
        self.contains(&content.object_ref())
            || content
                .type_ref()
                .is_some_and(|type_ref| self.contains(&type_ref))
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.iter().all(RoaringBitmap::is_empty)
    }

    pub fn len(&self) -> u64 {
        self.bitmaps.iter().map(RoaringBitmap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, DocumentType, ObjectId};

    fn granted(objects: &[ObjectRef]) -> GrantedObjects {
        let mut set = GrantedObjects::default();
        for object in objects {
            set.insert(*object);
        }
        set
    }

    #[test]
    fn kinds_do_not_alias() {
        let set = granted(&[ObjectRef::new(ContentKind::DocumentType, 1)]);
        assert!(set.contains(&ObjectRef::new(ContentKind::DocumentType, 1)));
        assert!(!set.contains(&ObjectRef::new(ContentKind::Document, 1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn allows_via_type() {
        let invoices = DocumentType {
            id: 2,
            label: "invoices".into(),
        };
        let doc = Document::new(10, &invoices, "a");
        let set = granted(&[invoices_ref(2)]);
        assert!(set.allows(&doc));
        assert!(!set.allows(&ObjectRef::new(ContentKind::Document, 10)));
    }

    fn invoices_ref(id: ObjectId) -> ObjectRef {
        ObjectRef::new(ContentKind::DocumentType, id)
    }

    #[test]
    fn empty_inputs() {
        let set = GrantedObjects::default();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(!set.allows(&ObjectRef::new(ContentKind::Folder, 1)));
    }
}
