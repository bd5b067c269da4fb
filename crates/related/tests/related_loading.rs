//! Integration tests for related dto loading
//!
//! Uses a small product catalogue: products with comments, and orders that
//! reference one required and one optional product.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use elif_related::{
    BoxError, Cardinality, DtoShape, EntityDto, LoaderConfigBuilder, Relation, RelatedDtoLoader,
    RelatedDtoLoaderProfile, RelatedError, ShapeBuilder,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ProductCommentDto {
    id: Uuid,
    content: String,
}

impl EntityDto for ProductCommentDto {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ProductDto {
    id: Uuid,
    name: String,
    comment_ids: Option<Vec<Uuid>>,
    comments: Option<Box<[Option<ProductCommentDto>]>>,
}

impl EntityDto for ProductDto {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}

impl DtoShape for ProductDto {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape
            .ids("comment_ids", |p: &ProductDto| p.comment_ids.as_deref())
            .relation(
                Relation::array(
                    "comments",
                    |p: &mut ProductDto, c: Option<Box<[Option<ProductCommentDto>]>>| p.comments = c,
                )
                .id_field("comment_ids"),
            );
    }
}

#[derive(Debug, Clone, Serialize)]
struct OrderDto {
    id: Uuid,
    product_id: Option<Uuid>,
    optional_product_id: Option<Uuid>,
    product: Option<ProductDto>,
    optional_product: Option<ProductDto>,
}

impl DtoShape for OrderDto {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape
            .id("product_id", |o: &OrderDto| o.product_id)
            .id("optional_product_id", |o: &OrderDto| o.optional_product_id)
            .relation(Relation::single("product", |o: &mut OrderDto, p: Option<ProductDto>| {
                o.product = p
            }))
            .relation(Relation::single(
                "optional_product",
                |o: &mut OrderDto, p: Option<ProductDto>| o.optional_product = p,
            ));
    }
}

/// Order row as stored, without any related dto fields
struct OrderRecord {
    product_id: Option<Uuid>,
}

impl DtoShape for OrderRecord {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.id("product_id", |o: &OrderRecord| o.product_id);
    }
}

struct TestData {
    comments: Vec<ProductCommentDto>,
    products: Vec<ProductDto>,
    orders: Vec<OrderDto>,
}

impl TestData {
    fn new() -> Self {
        let comment1 = ProductCommentDto {
            id: Uuid::new_v4(),
            content: "Comment 1".to_string(),
        };
        let comment2 = ProductCommentDto {
            id: Uuid::new_v4(),
            content: "Comment 2".to_string(),
        };

        let product1 = ProductDto {
            id: Uuid::new_v4(),
            name: "Product 1".to_string(),
            comment_ids: None,
            comments: None,
        };
        let product2 = ProductDto {
            id: Uuid::new_v4(),
            name: "Product 2".to_string(),
            comment_ids: Some(vec![comment1.id, comment2.id]),
            comments: None,
        };

        let order1 = OrderDto {
            id: Uuid::new_v4(),
            product_id: Some(product2.id),
            optional_product_id: Some(product2.id),
            product: None,
            optional_product: None,
        };
        let order2 = OrderDto {
            id: Uuid::new_v4(),
            product_id: Some(product1.id),
            optional_product_id: None,
            product: None,
            optional_product: None,
        };

        Self {
            comments: vec![comment1, comment2],
            products: vec![product1, product2],
            orders: vec![order1, order2],
        }
    }

    fn first_product(&self) -> &ProductDto {
        &self.products[0]
    }

    fn second_product(&self) -> &ProductDto {
        &self.products[1]
    }
}

/// Profile with in-memory rules that record every id batch they receive
struct Fixture {
    profile: RelatedDtoLoaderProfile,
    product_loads: Arc<Mutex<Vec<Vec<Uuid>>>>,
}

impl Fixture {
    fn new(data: &TestData) -> Self {
        let profile = RelatedDtoLoaderProfile::new();
        profile.register_shape::<OrderDto>().unwrap();
        profile.register_shape::<ProductDto>().unwrap();

        let products: HashMap<Uuid, ProductDto> =
            data.products.iter().map(|p| (p.id, p.clone())).collect();
        let product_loads = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&product_loads);
        profile.create_rule(move |ids: Vec<Uuid>| {
            recorded.lock().unwrap().push(ids.clone());
            let found: Vec<ProductDto> = ids.iter().filter_map(|id| products.get(id).cloned()).collect();
            async move { Ok::<_, BoxError>(found) }
        });

        let comments: HashMap<Uuid, ProductCommentDto> =
            data.comments.iter().map(|c| (c.id, c.clone())).collect();
        profile.create_rule(move |ids: Vec<Uuid>| {
            let found: Vec<ProductCommentDto> = ids.iter().filter_map(|id| comments.get(id).cloned()).collect();
            async move { Ok::<_, BoxError>(found) }
        });

        Self {
            profile,
            product_loads,
        }
    }

    fn loader(&self) -> RelatedDtoLoader {
        RelatedDtoLoader::new(Arc::new(self.profile.clone()))
    }
}

#[test]
fn test_registered_descriptors() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);

    let orders = fixture.profile.related_properties::<OrderDto>().unwrap();
    let names: Vec<(&str, Option<&str>)> = orders
        .iter()
        .map(|d| (d.related_field(), d.id_field()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("product", Some("product_id")),
            ("optional_product", Some("optional_product_id")),
        ]
    );

    let products = fixture.profile.related_properties::<ProductDto>().unwrap();
    assert_eq!(products[0].cardinality(), Cardinality::FixedArray);
    assert_eq!(products[0].id_field(), Some("comment_ids"));
    assert_eq!(products[0].element().name(), "ProductCommentDto");
}

#[tokio::test]
async fn test_load_orders_with_products() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    let mut orders = data.orders.clone();

    fixture.loader().load_list(&mut orders).await.unwrap();

    assert_eq!(orders[0].product.as_ref(), Some(data.second_product()));
    assert_eq!(orders[0].optional_product.as_ref(), Some(data.second_product()));
    assert_eq!(orders[1].product.as_ref(), Some(data.first_product()));
    assert!(orders[1].optional_product.is_none());

    // one call per relation, each with distinct ids only
    let loads = fixture.product_loads.lock().unwrap().clone();
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[0].len(), 2);
    assert_eq!(loads[1], vec![data.second_product().id]);
}

#[tokio::test]
async fn test_load_single_order() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    let mut order = data.orders[1].clone();

    fixture.loader().load(&mut order).await.unwrap();

    assert_eq!(order.product.map(|p| p.name), Some("Product 1".to_string()));
    assert!(order.optional_product.is_none());
}

#[tokio::test]
async fn test_load_product_comments() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    let mut products = data.products.clone();

    fixture.loader().load_list(&mut products).await.unwrap();

    assert!(products[0].comments.is_none());
    let comments = products[1].comments.as_deref().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].as_ref(), Some(&data.comments[0]));
    assert_eq!(comments[1].as_ref(), Some(&data.comments[1]));
}

#[tokio::test]
async fn test_unknown_comment_keeps_its_slot() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    let mut product = data.second_product().clone();
    let missing = Uuid::new_v4();
    product.comment_ids = Some(vec![missing, data.comments[1].id, missing]);

    fixture.loader().load(&mut product).await.unwrap();

    let comments = product.comments.as_deref().unwrap();
    assert_eq!(comments.len(), 3);
    assert!(comments[0].is_none());
    assert_eq!(comments[1].as_ref(), Some(&data.comments[1]));
    assert!(comments[2].is_none());
}

#[tokio::test]
async fn test_nested_loading_in_two_passes() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    let loader = fixture.loader();
    let mut orders = data.orders.clone();

    loader.load_list(&mut orders).await.unwrap();

    let mut products: Vec<ProductDto> = orders.iter().filter_map(|o| o.product.clone()).collect();
    loader.load_list(&mut products).await.unwrap();

    assert_eq!(products[0].comments.as_deref().map(|c| c.len()), Some(2));
    assert!(products[1].comments.is_none());
}

#[tokio::test]
async fn test_orders_keyed_by_records() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    fixture.profile.register_shape::<OrderRecord>().unwrap();

    let records = vec![
        OrderRecord {
            product_id: Some(data.first_product().id),
        },
        OrderRecord { product_id: None },
    ];
    let mut orders: Vec<OrderDto> = data
        .orders
        .iter()
        .cloned()
        .map(|mut o| {
            o.product_id = None;
            o.optional_product_id = None;
            o
        })
        .collect();

    let report = fixture
        .loader()
        .load_list_with_report(&mut orders, &records)
        .await
        .unwrap();

    assert_eq!(orders[0].product.as_ref(), Some(data.first_product()));
    assert!(orders[1].product.is_none());
    // OrderRecord has no optional_product_id
    assert_eq!(report.relations_resolved, 1);
    assert_eq!(report.relations_skipped, 1);
}

#[tokio::test]
async fn test_products_cannot_be_keyed_by_orders() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    let mut products = data.products.clone();

    let err = fixture
        .loader()
        .load_list_with(&mut products, &data.orders)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RelatedError::MissingIdField {
            shape: "ProductDto",
            ..
        }
    ));
}

#[tokio::test]
async fn test_concurrent_loader_serializes_loaded_orders() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);
    let config = LoaderConfigBuilder::production()
        .build()
        .expect("Failed to build config");
    let loader = RelatedDtoLoader::with_config(Arc::new(fixture.profile.clone()), config).unwrap();
    let mut orders = data.orders.clone();

    loader.load_list(&mut orders).await.unwrap();

    let json = serde_json::to_value(&orders).unwrap();
    assert_eq!(json[0]["product"]["name"], "Product 2");
    assert_eq!(json[1]["product"]["name"], "Product 1");
    assert!(json[1]["optional_product"].is_null());
}

#[tokio::test]
async fn test_direct_rule_invocation() {
    let data = TestData::new();
    let fixture = Fixture::new(&data);

    let comments = fixture
        .profile
        .rules()
        .load::<ProductCommentDto>(vec![data.comments[0].id])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(comments, vec![data.comments[0].clone()]);
}
