//! Entity identity: the key types and shape ids the loader works with

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::naming::short_type_name;

/// Identifier types that can be used to look up related dtos
pub trait RelationKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<K> RelationKey for K where K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// A dto that can be loaded as the related side of a relation
///
/// The key returned here is what loader rules use by default to match a
/// loaded dto back to the id that requested it.
pub trait EntityDto: Clone + Send + Sync + 'static {
    /// Identifier type of the dto
    type Key: RelationKey;

    /// The dto's own identifier
    fn key(&self) -> Self::Key;
}

/// Identity of a dto type
///
/// Used both for target shapes and for the element type of a relation, where
/// it selects the loader rule.
#[derive(Clone, Copy)]
pub struct ShapeId {
    type_id: TypeId,
    name: &'static str,
}

impl ShapeId {
    /// Shape id of `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name, including the module path
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path or generic arguments
    pub fn name(&self) -> &'static str {
        short_type_name(self.name)
    }
}

impl PartialEq for ShapeId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ShapeId {}

impl Hash for ShapeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShapeId({})", self.name)
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
