//! Dto shape declarations
//!
//! A shape lists the id fields a dto exposes and the related fields it wants
//! filled in. Shapes are declared once, by implementing [`DtoShape`] or by
//! passing a closure to the profile, and scanned into relation descriptors
//! when they are registered.
//!
//! ```rust
//! use elif_related::{DtoShape, EntityDto, Relation, ShapeBuilder};
//!
//! #[derive(Clone)]
//! struct ProductDto {
//!     id: u64,
//! }
//!
//! impl EntityDto for ProductDto {
//!     type Key = u64;
//!
//!     fn key(&self) -> u64 {
//!         self.id
//!     }
//! }
//!
//! struct OrderDto {
//!     product_id: u64,
//!     product: Option<ProductDto>,
//! }
//!
//! impl DtoShape for OrderDto {
//!     fn describe(shape: &mut ShapeBuilder<Self>) {
//!         shape
//!             .id("product_id", |order: &OrderDto| Some(order.product_id))
//!             .relation(Relation::single(
//!                 "product",
//!                 |order: &mut OrderDto, product: Option<ProductDto>| order.product = product,
//!             ));
//!     }
//! }
//! ```

mod relation;

pub use relation::Relation;
pub(crate) use relation::{Prepared, RelationApply, RelationBatch};

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::{RelationKey, ShapeId};

/// A dto type that declares its id fields and relations
pub trait DtoShape: Send + Sync + Sized + 'static {
    fn describe(shape: &mut ShapeBuilder<Self>);
}

/// Whether an id field holds one id or a sequence of ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdKind {
    Single,
    Sequence,
}

/// Ids read from one id field across a whole batch, one entry per dto
pub(crate) enum RawIds<K> {
    Single(Vec<Option<K>>),
    Sequence(Vec<Option<Vec<Option<K>>>>),
}

type ExtractFn<S> = Arc<dyn Fn(&[S]) -> Box<dyn Any + Send> + Send + Sync>;

/// An id field declared on a shape
pub(crate) struct IdField<S> {
    name: String,
    kind: IdKind,
    key_type: TypeId,
    key_type_name: &'static str,
    /// Produces a boxed `RawIds<K>`
    extract: ExtractFn<S>,
}

impl<S: 'static> IdField<S> {
    fn single<K, F>(name: &str, accessor: F) -> Self
    where
        K: RelationKey,
        F: Fn(&S) -> Option<K> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kind: IdKind::Single,
            key_type: TypeId::of::<K>(),
            key_type_name: std::any::type_name::<K>(),
            extract: Arc::new(move |sources: &[S]| -> Box<dyn Any + Send> {
                let ids: Vec<Option<K>> = sources.iter().map(&accessor).collect();
                Box::new(RawIds::Single(ids))
            }),
        }
    }

    fn sequence<K, F>(name: &str, accessor: F) -> Self
    where
        K: RelationKey,
        F: Fn(&S) -> Option<Vec<Option<K>>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kind: IdKind::Sequence,
            key_type: TypeId::of::<K>(),
            key_type_name: std::any::type_name::<K>(),
            extract: Arc::new(move |sources: &[S]| -> Box<dyn Any + Send> {
                let ids: Vec<Option<Vec<Option<K>>>> = sources.iter().map(&accessor).collect();
                Box::new(RawIds::Sequence(ids))
            }),
        }
    }
}

impl<S> IdField<S> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kind(&self) -> IdKind {
        self.kind
    }

    pub(crate) fn key_type(&self) -> (TypeId, &'static str) {
        (self.key_type, self.key_type_name)
    }

    /// Read this field from every source, in order
    pub(crate) fn extract(&self, sources: &[S]) -> Box<dyn Any + Send> {
        (self.extract)(sources)
    }
}

impl<S> fmt::Debug for IdField<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("key_type", &self.key_type_name)
            .finish()
    }
}

/// Collects the declaration of one dto shape
pub struct ShapeBuilder<S> {
    id_fields: Vec<IdField<S>>,
    relations: Vec<Relation<S>>,
}

impl<S: Send + 'static> ShapeBuilder<S> {
    pub fn new() -> Self {
        Self {
            id_fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Declare a field holding a single id
    pub fn id<K, F>(&mut self, name: &str, accessor: F) -> &mut Self
    where
        K: RelationKey,
        F: Fn(&S) -> Option<K> + Send + Sync + 'static,
    {
        self.id_fields.push(IdField::single(name, accessor));
        self
    }

    /// Declare a field holding a sequence of ids
    pub fn ids<K, F>(&mut self, name: &str, accessor: F) -> &mut Self
    where
        K: RelationKey,
        F: Fn(&S) -> Option<&[K]> + Send + Sync + 'static,
    {
        self.id_fields.push(IdField::sequence::<K, _>(name, move |source: &S| {
            accessor(source).map(|ids| ids.iter().cloned().map(Some).collect())
        }));
        self
    }

    /// Declare a field holding a sequence of ids where individual ids may be missing
    pub fn nullable_ids<K, F>(&mut self, name: &str, accessor: F) -> &mut Self
    where
        K: RelationKey,
        F: Fn(&S) -> Option<&[Option<K>]> + Send + Sync + 'static,
    {
        self.id_fields.push(IdField::sequence::<K, _>(name, move |source: &S| {
            accessor(source).map(|ids| ids.to_vec())
        }));
        self
    }

    /// Declare a related field
    pub fn relation(&mut self, relation: Relation<S>) -> &mut Self {
        self.relations.push(relation);
        self
    }

    pub(crate) fn finish(self) -> ShapeTable<S> {
        ShapeTable {
            shape: ShapeId::of::<S>(),
            id_fields: self.id_fields.into_iter().map(Arc::new).collect(),
            relations: self.relations,
        }
    }
}

impl<S: Send + 'static> Default for ShapeBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// The declared structure of one dto shape
pub(crate) struct ShapeTable<S> {
    shape: ShapeId,
    id_fields: Vec<Arc<IdField<S>>>,
    relations: Vec<Relation<S>>,
}

impl<S> ShapeTable<S> {
    pub(crate) fn shape(&self) -> ShapeId {
        self.shape
    }

    pub(crate) fn id_fields(&self) -> &[Arc<IdField<S>>] {
        &self.id_fields
    }

    pub(crate) fn id_field(&self, name: &str) -> Option<&Arc<IdField<S>>> {
        self.id_fields.iter().find(|field| field.name == name)
    }

    pub(crate) fn relations(&self) -> &[Relation<S>] {
        &self.relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ProductDto {
        comment_ids: Option<Vec<u32>>,
        tag_ids: Option<Vec<Option<u32>>>,
        brand_id: Option<u32>,
    }

    fn table() -> ShapeTable<ProductDto> {
        let mut shape = ShapeBuilder::<ProductDto>::new();
        shape
            .id("brand_id", |p: &ProductDto| p.brand_id)
            .ids("comment_ids", |p: &ProductDto| p.comment_ids.as_deref())
            .nullable_ids("tag_ids", |p: &ProductDto| p.tag_ids.as_deref());
        shape.finish()
    }

    #[test]
    fn test_id_fields_are_declared_in_order() {
        let table = table();
        let names: Vec<&str> = table.id_fields().iter().map(|f| f.name()).collect();

        assert_eq!(names, vec!["brand_id", "comment_ids", "tag_ids"]);
        assert_eq!(table.id_field("brand_id").map(|f| f.kind()), Some(IdKind::Single));
        assert_eq!(table.id_field("tag_ids").map(|f| f.kind()), Some(IdKind::Sequence));
        assert_eq!(table.id_field("brand_id").map(|f| f.key_type().0), Some(TypeId::of::<u32>()));
        assert!(table.id_field("missing").is_none());
    }

    #[test]
    fn test_extract_reads_every_source() {
        let table = table();
        let products = vec![
            ProductDto {
                comment_ids: Some(vec![1, 2]),
                tag_ids: Some(vec![Some(5), None]),
                brand_id: None,
            },
            ProductDto {
                comment_ids: None,
                tag_ids: None,
                brand_id: Some(9),
            },
        ];

        let brand = table.id_field("brand_id").map(|f| f.extract(&products));
        match brand.and_then(|raw| raw.downcast::<RawIds<u32>>().ok()).map(|raw| *raw) {
            Some(RawIds::Single(ids)) => assert_eq!(ids, vec![None, Some(9)]),
            _ => panic!("expected single ids"),
        }

        let comments = table.id_field("comment_ids").map(|f| f.extract(&products));
        match comments.and_then(|raw| raw.downcast::<RawIds<u32>>().ok()).map(|raw| *raw) {
            Some(RawIds::Sequence(ids)) => {
                assert_eq!(ids, vec![Some(vec![Some(1), Some(2)]), None])
            }
            _ => panic!("expected id sequences"),
        }

        let tags = table.id_field("tag_ids").map(|f| f.extract(&products));
        match tags.and_then(|raw| raw.downcast::<RawIds<u32>>().ok()).map(|raw| *raw) {
            Some(RawIds::Sequence(ids)) => assert_eq!(ids, vec![Some(vec![Some(5), None]), None]),
            _ => panic!("expected id sequences"),
        }
    }
}
