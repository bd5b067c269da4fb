//! Rule Registry - maps related dto types to their loader rules

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::entity::{EntityDto, ShapeId};
use crate::error::{BoxError, RelatedError, RelatedResult};
use crate::loader::batch::distinct_ids;
use crate::rule::{FnLoaderRule, LoaderRule};

struct RegisteredRule {
    entity: ShapeId,
    /// Holds an `Arc<dyn LoaderRule<E>>` for the entity type
    rule: Arc<dyn Any + Send + Sync>,
}

/// Thread-safe registry of loader rules, keyed by related dto type
///
/// Rules are meant to be registered while the application starts up. A
/// relation whose dto type has no rule is skipped by the loader, which lets
/// rules be wired in one type at a time.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Arc<DashMap<TypeId, RegisteredRule>>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rule for `E`, replacing any earlier one
    pub fn register<E, R>(&self, rule: R)
    where
        E: EntityDto,
        R: LoaderRule<E> + 'static,
    {
        let entity = ShapeId::of::<E>();
        let rule: Arc<dyn LoaderRule<E>> = Arc::new(rule);
        let registered = RegisteredRule {
            entity,
            rule: Arc::new(rule),
        };

        if self.rules.insert(entity.type_id(), registered).is_some() {
            warn!("Replacing loader rule for {}", entity);
        } else {
            debug!("Registered loader rule for {}", entity);
        }
    }

    /// Register a rule for `E` backed by an async function
    pub fn register_fn<E, F, Fut>(&self, load_fn: F)
    where
        E: EntityDto,
        F: Fn(Vec<E::Key>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<E>, BoxError>> + Send + 'static,
    {
        self.register::<E, _>(FnLoaderRule::new(load_fn));
    }

    /// Get the rule registered for `E`
    pub fn rule<E: EntityDto>(&self) -> Option<Arc<dyn LoaderRule<E>>> {
        let entry = self.rules.get(&TypeId::of::<E>())?;
        let rule = entry.rule.downcast_ref::<Arc<dyn LoaderRule<E>>>().cloned();
        rule
    }

    /// Check whether a rule exists for the given dto type
    pub fn contains(&self, entity: ShapeId) -> bool {
        self.rules.contains_key(&entity.type_id())
    }

    /// Load dtos of type `E` directly through its rule
    ///
    /// Returns `Ok(None)` when no rule is registered for `E`. Duplicate ids
    /// are dropped and an empty id list never reaches the rule.
    pub async fn load<E: EntityDto>(&self, ids: Vec<E::Key>) -> RelatedResult<Option<Vec<E>>> {
        let Some(rule) = self.rule::<E>() else {
            return Ok(None);
        };

        let ids = distinct_ids(ids.iter());
        if ids.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let entities = rule.load(ids).await.map_err(|source| RelatedError::Fetch {
            entity: ShapeId::of::<E>().name(),
            source,
        })?;

        Ok(Some(entities))
    }

    /// Dto types that currently have a rule
    pub fn entities(&self) -> Vec<ShapeId> {
        self.rules.iter().map(|entry| entry.value().entity).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("entities", &self.entities())
            .finish()
    }
}
