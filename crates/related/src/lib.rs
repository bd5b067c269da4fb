//! # elif-related
//!
//! Batch loading of related DTOs for the elif.rs framework.
//!
//! ## Features
//!
//! - **No N+1 lookups**: one loader rule call per relation per batch, with duplicate ids collapsed
//! - **Explicit shapes**: id fields and relations are declared once and scanned at registration
//! - **Three cardinalities**: single dtos, fixed-size arrays and caller-defined collections
//! - **Key providers**: ids can come from the targets or from a parallel batch of other objects
//! - **Async-first**: loader rules are async and can be fetched concurrently
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use elif_related::{BoxError, DtoShape, EntityDto, Relation, RelatedDtoLoader,
//!     RelatedDtoLoaderProfile, ShapeBuilder};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct ProductDto {
//!     id: u64,
//!     name: String,
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
//!     product_id: Option<u64>,
//!     product: Option<ProductDto>,
//! }
//!
//! impl DtoShape for OrderDto {
//!     fn describe(shape: &mut ShapeBuilder<Self>) {
//!         shape
//!             .id("product_id", |order: &OrderDto| order.product_id)
//!             .relation(Relation::single(
//!                 "product",
//!                 |order: &mut OrderDto, product: Option<ProductDto>| order.product = product,
//!             ));
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let profile = RelatedDtoLoaderProfile::new();
//! profile.register_shape::<OrderDto>().unwrap();
//! profile.create_rule(|ids: Vec<u64>| async move {
//!     let products: Vec<ProductDto> = ids
//!         .into_iter()
//!         .map(|id| ProductDto { id, name: format!("Product {}", id) })
//!         .collect();
//!     Ok::<_, BoxError>(products)
//! });
//!
//! let loader = RelatedDtoLoader::new(Arc::new(profile));
//! let mut orders = vec![
//!     OrderDto { product_id: Some(1), product: None },
//!     OrderDto { product_id: Some(1), product: None },
//! ];
//! loader.load_list(&mut orders).await.unwrap();
//!
//! assert_eq!(orders[1].product.as_ref().map(|p| p.name.as_str()), Some("Product 1"));
//! # });
//! ```

pub mod collection;
pub mod config;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod loader;
pub mod naming;
pub mod profile;
pub mod registry;
pub mod rule;
pub mod scanner;
pub mod shape;

pub use collection::{CollectionFactory, ExtendCollection, FnCollection};
pub use config::{LoaderConfig, LoaderConfigBuilder};
pub use descriptor::{Cardinality, RelationDescriptor};
pub use entity::{EntityDto, RelationKey, ShapeId};
pub use error::{BoxError, RelatedError, RelatedResult};
pub use loader::{LoadReport, RelatedDtoLoader};
pub use naming::IdNamingConvention;
pub use profile::RelatedDtoLoaderProfile;
pub use registry::RuleRegistry;
pub use rule::{FnLoaderRule, LoaderRule};
pub use scanner::ShapeScanner;
pub use shape::{DtoShape, IdKind, Relation, ShapeBuilder};
