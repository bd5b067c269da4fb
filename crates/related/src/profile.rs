//! Loader profile - registered shapes, their relation descriptors and the rules

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::descriptor::RelationDescriptor;
use crate::entity::{EntityDto, ShapeId};
use crate::error::{BoxError, RelatedResult};
use crate::naming::IdNamingConvention;
use crate::registry::RuleRegistry;
use crate::rule::{FnLoaderRule, LoaderRule};
use crate::scanner::ShapeScanner;
use crate::shape::{DtoShape, ShapeBuilder, ShapeTable};

/// A shape as the profile keeps it: the declaration and its scanned descriptors
pub(crate) struct RegisteredShape<T> {
    table: ShapeTable<T>,
    descriptors: Arc<[RelationDescriptor<T>]>,
}

impl<T> RegisteredShape<T> {
    pub(crate) fn shape(&self) -> ShapeId {
        self.table.shape()
    }

    pub(crate) fn table(&self) -> &ShapeTable<T> {
        &self.table
    }

    pub(crate) fn descriptors(&self) -> &[RelationDescriptor<T>] {
        &self.descriptors
    }
}

/// Everything the loader needs to know about dto shapes and how to load them
///
/// Shapes and rules are registered while the application starts up and are
/// only read afterwards. The profile is cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct RelatedDtoLoaderProfile {
    rules: RuleRegistry,
    /// Holds an `Arc<RegisteredShape<T>>` per target type
    shapes: Arc<DashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    naming: IdNamingConvention,
}

impl RelatedDtoLoaderProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a profile that derives id field names with `naming`
    ///
    /// The convention is fixed for the life of the profile and its clones.
    pub fn with_naming_convention(naming: IdNamingConvention) -> Self {
        Self {
            naming,
            ..Self::default()
        }
    }

    pub fn naming_convention(&self) -> IdNamingConvention {
        self.naming
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Register the loader rule for `E`
    pub fn add_rule<E, R>(&self, rule: R)
    where
        E: EntityDto,
        R: LoaderRule<E> + 'static,
    {
        self.rules.register::<E, R>(rule);
    }

    /// Register a rule for `E` that loads through an async function
    pub fn create_rule<E, F, Fut>(&self, load_fn: F)
    where
        E: EntityDto,
        F: Fn(Vec<E::Key>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<E>, BoxError>> + Send + 'static,
    {
        self.rules.register::<E, _>(FnLoaderRule::new(load_fn));
    }

    pub fn rule<E: EntityDto>(&self) -> Option<Arc<dyn LoaderRule<E>>> {
        self.rules.rule::<E>()
    }

    /// Register `T` from its [`DtoShape`] declaration
    pub fn register_shape<T: DtoShape>(&self) -> RelatedResult<Arc<[RelationDescriptor<T>]>> {
        self.register_shape_with::<T, _>(T::describe)
    }

    /// Register `T` from a declaration closure
    ///
    /// Registering the same type again returns the descriptors scanned the
    /// first time; the closure is not called.
    pub fn register_shape_with<T, F>(&self, describe: F) -> RelatedResult<Arc<[RelationDescriptor<T>]>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut ShapeBuilder<T>),
    {
        if let Some(registered) = self.shape::<T>() {
            return Ok(Arc::clone(&registered.descriptors));
        }

        let mut builder = ShapeBuilder::new();
        describe(&mut builder);
        let table = builder.finish();
        let descriptors: Arc<[RelationDescriptor<T>]> = ShapeScanner::new(self.naming).scan(&table)?.into();

        debug!(
            "Registered shape {} with {} id fields and {} relations",
            table.shape(),
            table.id_fields().len(),
            descriptors.len()
        );

        let registered = Arc::new(RegisteredShape { table, descriptors });
        let erased: Arc<dyn Any + Send + Sync> = registered.clone();
        let stored = Arc::clone(self.shapes.entry(TypeId::of::<T>()).or_insert(erased).value());

        let descriptors = match stored.downcast::<RegisteredShape<T>>() {
            Ok(stored) => Arc::clone(&stored.descriptors),
            Err(_) => Arc::clone(&registered.descriptors),
        };
        Ok(descriptors)
    }

    /// Relation descriptors of `T`, or `None` if `T` was never registered
    pub fn related_properties<T: 'static>(&self) -> Option<Arc<[RelationDescriptor<T>]>> {
        self.shape::<T>().map(|registered| Arc::clone(&registered.descriptors))
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.shapes.contains_key(&TypeId::of::<T>())
    }

    pub(crate) fn shape<T: 'static>(&self) -> Option<Arc<RegisteredShape<T>>> {
        let entry = self.shapes.get(&TypeId::of::<T>())?;
        let stored = Arc::clone(entry.value());
        drop(entry);
        stored.downcast::<RegisteredShape<T>>().ok()
    }
}

impl fmt::Debug for RelatedDtoLoaderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelatedDtoLoaderProfile")
            .field("rules", &self.rules)
            .field("shapes", &self.shapes.len())
            .field("naming", &self.naming)
            .finish()
    }
}
