//! Collection factories for dynamically typed relation collections
//!
//! A collection relation does not fix its container type. The factory says
//! how to create the container and how to append one resolved slot to it;
//! slots arrive in the order of the requested ids.

use std::marker::PhantomData;

/// Builds the container assigned to a collection relation
pub trait CollectionFactory<E>: Send + Sync + 'static {
    /// Container type assigned to the target
    type Collection: Send + 'static;

    /// Create an empty container expected to receive `len` slots
    fn create(&self, len: usize) -> Self::Collection;

    /// Append one slot. `None` marks an id with no loaded dto.
    fn append(&self, collection: &mut Self::Collection, item: Option<E>);

    /// Type name of the container, for diagnostics
    fn collection_type(&self) -> &'static str {
        std::any::type_name::<Self::Collection>()
    }
}

/// Factory for any container that is `Default + Extend<Option<E>>`
pub struct ExtendCollection<C> {
    _collection: PhantomData<fn() -> C>,
}

impl<C> ExtendCollection<C> {
    pub fn new() -> Self {
        Self {
            _collection: PhantomData,
        }
    }
}

impl<C> Default for ExtendCollection<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, C> CollectionFactory<E> for ExtendCollection<C>
where
    C: Default + Extend<Option<E>> + Send + 'static,
{
    type Collection = C;

    fn create(&self, _len: usize) -> C {
        C::default()
    }

    fn append(&self, collection: &mut C, item: Option<E>) {
        collection.extend(std::iter::once(item));
    }
}

/// Factory built from a constructor and an append function
///
/// Useful for containers that do not hold `Option<E>` directly, for example
/// a `Vec<E>` that drops unmatched ids.
pub struct FnCollection<C, N, A> {
    create_fn: N,
    append_fn: A,
    _collection: PhantomData<fn() -> C>,
}

impl<C, N, A> FnCollection<C, N, A> {
    pub fn new(create_fn: N, append_fn: A) -> Self {
        Self {
            create_fn,
            append_fn,
            _collection: PhantomData,
        }
    }
}

impl<E, C, N, A> CollectionFactory<E> for FnCollection<C, N, A>
where
    C: Send + 'static,
    N: Fn(usize) -> C + Send + Sync + 'static,
    A: Fn(&mut C, Option<E>) + Send + Sync + 'static,
{
    type Collection = C;

    fn create(&self, len: usize) -> C {
        (self.create_fn)(len)
    }

    fn append(&self, collection: &mut C, item: Option<E>) {
        (self.append_fn)(collection, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn build<E, F: CollectionFactory<E>>(factory: &F, items: Vec<Option<E>>) -> F::Collection {
        let mut collection = factory.create(items.len());
        for item in items {
            factory.append(&mut collection, item);
        }
        collection
    }

    #[test]
    fn test_extend_collection_keeps_slots() {
        let factory = ExtendCollection::<VecDeque<Option<&str>>>::new();
        let deque = build(&factory, vec![Some("a"), None, Some("a")]);

        assert_eq!(deque, VecDeque::from(vec![Some("a"), None, Some("a")]));
    }

    #[test]
    fn test_fn_collection_can_drop_unmatched() {
        let factory: FnCollection<Vec<u8>, _, _> =
            FnCollection::new(Vec::with_capacity, |items: &mut Vec<u8>, item: Option<u8>| {
                items.extend(item)
            });
        let items = build(&factory, vec![Some(1), None, Some(3)]);

        assert_eq!(items, vec![1, 3]);
        assert!(CollectionFactory::<u8>::collection_type(&factory).contains("Vec<u8>"));
    }
}
