//! Relation declarations and the typed code that resolves them

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::RawIds;
use crate::collection::CollectionFactory;
use crate::descriptor::Cardinality;
use crate::entity::{EntityDto, ShapeId};
use crate::error::{RelatedError, RelatedResult};
use crate::loader::batch::{distinct_ids, load_key_map};
use crate::registry::RuleRegistry;

type AssignOne<S, E> = Arc<dyn Fn(&mut S, Option<E>) + Send + Sync>;
type AssignMany<S, E> = Arc<dyn Fn(&mut S, Option<Vec<Option<E>>>) + Send + Sync>;

/// A related field declared on a shape
///
/// The constructor picks the cardinality; the related dto type is taken from
/// the assign function.
pub struct Relation<S> {
    field: String,
    id_field: Option<String>,
    cardinality: Cardinality,
    element: ShapeId,
    collection_type: Option<&'static str>,
    apply: Arc<dyn RelationApply<S>>,
}

impl<S: Send + 'static> Relation<S> {
    /// A field holding one related dto
    pub fn single<E, F>(field: &str, assign: F) -> Self
    where
        E: EntityDto,
        F: Fn(&mut S, Option<E>) + Send + Sync + 'static,
    {
        Self::with_assign::<E>(field, Cardinality::Single, None, Assign::One(Arc::new(assign)))
    }

    /// A field holding a fixed-size slice of related dtos, one slot per id
    pub fn array<E, F>(field: &str, assign: F) -> Self
    where
        E: EntityDto,
        F: Fn(&mut S, Option<Box<[Option<E>]>>) + Send + Sync + 'static,
    {
        let assign: AssignMany<S, E> = Arc::new(move |target: &mut S, items: Option<Vec<Option<E>>>| {
            assign(target, items.map(Vec::into_boxed_slice))
        });
        Self::with_assign::<E>(field, Cardinality::FixedArray, None, Assign::Many(assign))
    }

    /// A field holding a collection built by `factory`
    pub fn collection<E, C, F>(field: &str, factory: C, assign: F) -> Self
    where
        E: EntityDto,
        C: CollectionFactory<E>,
        F: Fn(&mut S, Option<C::Collection>) + Send + Sync + 'static,
    {
        let collection_type = factory.collection_type();
        let assign: AssignMany<S, E> = Arc::new(move |target: &mut S, items: Option<Vec<Option<E>>>| {
            let collection = items.map(|items| {
                let mut collection = factory.create(items.len());
                for item in items {
                    factory.append(&mut collection, item);
                }
                collection
            });
            assign(target, collection)
        });
        Self::with_assign::<E>(
            field,
            Cardinality::DynamicCollection,
            Some(collection_type),
            Assign::Many(assign),
        )
    }

    fn with_assign<E: EntityDto>(
        field: &str,
        cardinality: Cardinality,
        collection_type: Option<&'static str>,
        assign: Assign<S, E>,
    ) -> Self {
        Self {
            field: field.to_string(),
            id_field: None,
            cardinality,
            element: ShapeId::of::<E>(),
            collection_type,
            apply: Arc::new(TypedRelation {
                field: field.to_string(),
                assign,
                _entity: PhantomData,
            }),
        }
    }

    /// Read ids from `name` instead of the conventional id field
    pub fn id_field(mut self, name: &str) -> Self {
        self.id_field = Some(name.to_string());
        self
    }
}

impl<S> Relation<S> {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn element(&self) -> ShapeId {
        self.element
    }

    pub(crate) fn id_field_override(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    pub(crate) fn collection_type(&self) -> Option<&'static str> {
        self.collection_type
    }

    pub(crate) fn apply(&self) -> &Arc<dyn RelationApply<S>> {
        &self.apply
    }
}

/// Everything a relation needs from the loader for one batch
pub(crate) struct RelationBatch<'a> {
    pub(crate) shape: ShapeId,
    pub(crate) id_field: &'a str,
    pub(crate) rules: &'a RuleRegistry,
    pub(crate) fetch_timeout: Option<Duration>,
}

impl RelationBatch<'_> {
    fn mismatch(&self, reason: impl Into<String>) -> RelatedError {
        RelatedError::IdFieldMismatch {
            shape: self.shape.name(),
            field: self.id_field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A relation whose dtos have been fetched and are ready to be written back
pub(crate) struct Prepared<S> {
    pub(crate) requested: usize,
    pub(crate) loaded: usize,
    distribute: Box<dyn FnOnce(&mut [S]) + Send>,
}

impl<S> Prepared<S> {
    /// Whether the loader rule was called for this relation
    pub(crate) fn fetched(&self) -> bool {
        self.requested > 0
    }

    pub(crate) fn distribute(self, targets: &mut [S]) {
        (self.distribute)(targets)
    }
}

/// Type-erased resolution of one relation over its element type
#[async_trait]
pub(crate) trait RelationApply<S>: Send + Sync {
    /// Key type the relation's dtos are identified by
    fn key_type(&self) -> (TypeId, &'static str);

    /// Collect the ids in `raw_ids`, call the loader rule once and return the
    /// pending write-back. `None` means no rule is registered.
    async fn prepare(
        &self,
        batch: RelationBatch<'_>,
        raw_ids: Box<dyn Any + Send>,
    ) -> RelatedResult<Option<Prepared<S>>>;
}

enum Assign<S, E> {
    One(AssignOne<S, E>),
    Many(AssignMany<S, E>),
}

struct TypedRelation<S, E: EntityDto> {
    field: String,
    assign: Assign<S, E>,
    _entity: PhantomData<fn() -> E>,
}

#[async_trait]
impl<S, E> RelationApply<S> for TypedRelation<S, E>
where
    S: Send + 'static,
    E: EntityDto,
{
    fn key_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<E::Key>(), std::any::type_name::<E::Key>())
    }

    async fn prepare(
        &self,
        batch: RelationBatch<'_>,
        raw_ids: Box<dyn Any + Send>,
    ) -> RelatedResult<Option<Prepared<S>>> {
        let raw_ids = raw_ids.downcast::<RawIds<E::Key>>().map_err(|_| {
            batch.mismatch(format!(
                "ids are not of type {}",
                std::any::type_name::<E::Key>()
            ))
        })?;

        let entity = ShapeId::of::<E>();
        let Some(rule) = batch.rules.rule::<E>() else {
            debug!("No loader rule for {}, skipping {}.{}", entity, batch.shape, self.field);
            return Ok(None);
        };

        match (&self.assign, *raw_ids) {
            (Assign::One(assign), RawIds::Single(ids)) => {
                let to_load = distinct_ids(ids.iter().flatten());
                let requested = to_load.len();
                let loaded = load_key_map(rule.as_ref(), entity, to_load, batch.fetch_timeout).await?;
                let loaded_count = loaded.len();
                let assign = Arc::clone(assign);

                Ok(Some(Prepared {
                    requested,
                    loaded: loaded_count,
                    distribute: Box::new(move |targets: &mut [S]| {
                        for (target, id) in targets.iter_mut().zip(ids) {
                            let related = id.and_then(|id| loaded.get(&id).cloned());
                            assign(target, related);
                        }
                    }),
                }))
            }
            (Assign::Many(assign), RawIds::Sequence(ids)) => {
                let to_load = distinct_ids(ids.iter().flatten().flatten().flatten());
                let requested = to_load.len();
                let loaded = load_key_map(rule.as_ref(), entity, to_load, batch.fetch_timeout).await?;
                let loaded_count = loaded.len();
                let assign = Arc::clone(assign);

                Ok(Some(Prepared {
                    requested,
                    loaded: loaded_count,
                    distribute: Box::new(move |targets: &mut [S]| {
                        for (target, id_list) in targets.iter_mut().zip(ids) {
                            let related = id_list.map(|id_list| {
                                id_list
                                    .iter()
                                    .map(|id| id.as_ref().and_then(|id| loaded.get(id).cloned()))
                                    .collect()
                            });
                            assign(target, related);
                        }
                    }),
                }))
            }
            (Assign::One(_), RawIds::Sequence(_)) => {
                Err(batch.mismatch("holds a sequence of ids but the relation expects one"))
            }
            (Assign::Many(_), RawIds::Single(_)) => {
                Err(batch.mismatch("holds a single id but the relation expects a sequence"))
            }
        }
    }
}
