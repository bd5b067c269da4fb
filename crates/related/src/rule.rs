//! Loader rules - the batch fetch capability behind each related dto type

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::EntityDto;
use crate::error::BoxError;

/// Loads dtos of one type by a set of ids
///
/// A rule is registered once per related dto type and shared by every load.
/// Implementations should return at most one dto per id and keep
/// [`key_of`](LoaderRule::key_of) a pure function of the dto; the loader
/// does not check either.
#[async_trait]
pub trait LoaderRule<E: EntityDto>: Send + Sync {
    /// Load the dtos identified by `ids`. Ids are distinct and non-empty.
    async fn load(&self, ids: Vec<E::Key>) -> Result<Vec<E>, BoxError>;

    /// Key used to match a loaded dto back to the id that requested it
    fn key_of(&self, entity: &E) -> E::Key {
        entity.key()
    }
}

type KeyFn<E> = Arc<dyn Fn(&E) -> <E as EntityDto>::Key + Send + Sync>;

/// Loader rule backed by an async function
pub struct FnLoaderRule<E: EntityDto, F> {
    load_fn: F,
    key_fn: Option<KeyFn<E>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, F, Fut> FnLoaderRule<E, F>
where
    E: EntityDto,
    F: Fn(Vec<E::Key>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<E>, BoxError>> + Send + 'static,
{
    /// Create a rule that loads through `load_fn`
    pub fn new(load_fn: F) -> Self {
        Self {
            load_fn,
            key_fn: None,
            _entity: PhantomData,
        }
    }

    /// Match loaded dtos by `key_fn` instead of [`EntityDto::key`]
    pub fn keyed_by<K>(mut self, key_fn: K) -> Self
    where
        K: Fn(&E) -> E::Key + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }
}

#[async_trait]
impl<E, F, Fut> LoaderRule<E> for FnLoaderRule<E, F>
where
    E: EntityDto,
    F: Fn(Vec<E::Key>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<E>, BoxError>> + Send + 'static,
{
    async fn load(&self, ids: Vec<E::Key>) -> Result<Vec<E>, BoxError> {
        (self.load_fn)(ids).await
    }

    fn key_of(&self, entity: &E) -> E::Key {
        match &self.key_fn {
            Some(key_fn) => key_fn(entity),
            None => entity.key(),
        }
    }
}
