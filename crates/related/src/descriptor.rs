//! Relation descriptors - the scanned, immutable form of a declared relation

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::ShapeId;
use crate::shape::RelationApply;

/// How many related dtos a relation field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// One related dto, looked up by a single id
    Single,
    /// A fixed-size slice with one slot per requested id
    FixedArray,
    /// A caller-defined collection built through a collection factory
    DynamicCollection,
}

impl Cardinality {
    /// Returns true if the relation is filled from a sequence of ids
    pub fn is_list(self) -> bool {
        matches!(self, Self::FixedArray | Self::DynamicCollection)
    }
}

/// One relation field of a target shape, with its id field resolved
pub struct RelationDescriptor<S> {
    pub(crate) related_field: String,
    pub(crate) id_field: Option<String>,
    pub(crate) id_field_override: Option<String>,
    pub(crate) cardinality: Cardinality,
    pub(crate) element: ShapeId,
    pub(crate) collection_type: Option<&'static str>,
    pub(crate) apply: Arc<dyn RelationApply<S>>,
}

impl<S> RelationDescriptor<S> {
    /// Name of the field that receives the related dto(s)
    pub fn related_field(&self) -> &str {
        &self.related_field
    }

    /// Id field on the target shape, if one was found
    ///
    /// Always present for list cardinalities.
    pub fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    /// Id field name given explicitly in the declaration
    pub fn id_field_override(&self) -> Option<&str> {
        self.id_field_override.as_deref()
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// The related dto type, which selects the loader rule
    pub fn element(&self) -> ShapeId {
        self.element
    }

    /// Container type built for a `DynamicCollection` relation
    pub fn collection_type(&self) -> Option<&'static str> {
        self.collection_type
    }
}

impl<S> fmt::Debug for RelationDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("related_field", &self.related_field)
            .field("id_field", &self.id_field)
            .field("cardinality", &self.cardinality)
            .field("element", &self.element)
            .field("collection_type", &self.collection_type)
            .finish()
    }
}
