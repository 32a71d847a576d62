//! Catalog listing drain and product detail against the fake backend.

use pondmarket_bot::strapi::{CatalogClient, StrapiError};
use pondmarket_core::ProductId;
use pondmarket_integration_tests::{FAKE_JPEG, SeedProduct, TestBackend, seed_products};

#[tokio::test]
async fn test_drain_fetches_each_page_exactly_once() {
    let backend = TestBackend::start(seed_products(25)).await;
    let catalog = CatalogClient::new(backend.gateway());

    let products = catalog.drain_catalog(10).await.expect("drain catalog");

    assert_eq!(products.len(), 25);
    assert_eq!(backend.listing_fetches(), 3);

    let ids: Vec<i64> = products.iter().map(|p| p.id.as_i64()).collect();
    assert_eq!(ids, (1..=25).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_drain_with_exact_page_multiple_issues_no_extra_fetch() {
    let backend = TestBackend::start(seed_products(20)).await;
    let catalog = CatalogClient::new(backend.gateway());

    let products = catalog.drain_catalog(10).await.expect("drain catalog");

    assert_eq!(products.len(), 20);
    assert_eq!(backend.listing_fetches(), 2);
}

#[tokio::test]
async fn test_drain_order_is_stable_across_runs() {
    let backend = TestBackend::start(seed_products(12)).await;
    let catalog = CatalogClient::new(backend.gateway());

    let first = catalog.drain_catalog(5).await.expect("first drain");
    let second = catalog.drain_catalog(5).await.expect("second drain");

    let first_ids: Vec<i64> = first.iter().map(|p| p.id.as_i64()).collect();
    let second_ids: Vec<i64> = second.iter().map(|p| p.id.as_i64()).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(backend.listing_fetches(), 6);
}

#[tokio::test]
async fn test_failing_page_aborts_the_drain() {
    let backend = TestBackend::start(seed_products(25)).await;
    backend.fail_page(2);
    let catalog = CatalogClient::new(backend.gateway());

    let err = catalog.drain_catalog(10).await.expect_err("drain must fail");
    assert!(matches!(err, StrapiError::RemoteUnavailable(_)));
}

#[tokio::test]
async fn test_transient_page_failure_recovers_on_retry() {
    let backend = TestBackend::start(seed_products(25)).await;
    backend.fail_page_once(2);
    let catalog = CatalogClient::new(backend.gateway());

    let products = catalog.drain_catalog(10).await.expect("drain catalog");

    assert_eq!(products.len(), 25);
    // Three pages plus the one retried fetch of page 2.
    assert_eq!(backend.listing_fetches(), 4);
}

#[tokio::test]
async fn test_empty_catalog_drains_to_nothing() {
    let backend = TestBackend::start(Vec::new()).await;
    let catalog = CatalogClient::new(backend.gateway());

    let products = catalog.drain_catalog(10).await.expect("drain catalog");
    assert!(products.is_empty());
}

#[tokio::test]
async fn test_detail_resolves_image_and_downloads_bytes() {
    let backend =
        TestBackend::start(vec![SeedProduct::new(1, "Carp", "9.00").with_image()]).await;
    let catalog = CatalogClient::new(backend.gateway());

    let product = catalog
        .get_product_detail(ProductId::new(1))
        .await
        .expect("product detail");
    assert_eq!(product.title, "Carp");
    assert_eq!(product.image_url.as_deref(), Some("/uploads/medium_1.jpg"));

    let url = product.image_url.expect("image url");
    let bytes = catalog.fetch_image(&url).await.expect("image bytes");
    assert_eq!(bytes, FAKE_JPEG);
}

#[tokio::test]
async fn test_detail_without_picture_has_no_image() {
    let backend = TestBackend::start(vec![SeedProduct::new(1, "Carp", "9.00")]).await;
    let catalog = CatalogClient::new(backend.gateway());

    let product = catalog
        .get_product_detail(ProductId::new(1))
        .await
        .expect("product detail");
    assert_eq!(product.image_url, None);
}

#[tokio::test]
async fn test_required_image_missing_is_incomplete_data() {
    let backend = TestBackend::start(vec![SeedProduct::new(1, "Carp", "9.00")]).await;
    let catalog = CatalogClient::new(backend.gateway());

    let err = catalog
        .get_product_detail_requiring_image(ProductId::new(1))
        .await
        .expect_err("detail must fail without an image");
    assert!(matches!(
        err,
        StrapiError::ProductDataIncomplete {
            entity: "product",
            field: "picture"
        }
    ));
}

#[tokio::test]
async fn test_detail_is_cached_between_calls() {
    let backend = TestBackend::start(seed_products(3)).await;
    let catalog = CatalogClient::new(backend.gateway());

    let first = catalog
        .get_product_detail(ProductId::new(2))
        .await
        .expect("first detail");
    let second = catalog
        .get_product_detail(ProductId::new(2))
        .await
        .expect("second detail");

    assert_eq!(first, second);
    assert_eq!(backend.detail_fetches(), 1);
}

#[tokio::test]
async fn test_missing_product_is_not_found() {
    let backend = TestBackend::start(seed_products(3)).await;
    let catalog = CatalogClient::new(backend.gateway());

    let err = catalog
        .get_product_detail(ProductId::new(99))
        .await
        .expect_err("detail must fail");
    assert!(matches!(err, StrapiError::NotFound(_)));
}

#[tokio::test]
async fn test_wrong_bearer_token_is_rejected() {
    let backend = TestBackend::start(seed_products(3)).await;
    let catalog = CatalogClient::new(backend.gateway_with_token("wrong-token"));

    let err = catalog.drain_catalog(10).await.expect_err("must be rejected");
    assert!(matches!(err, StrapiError::RemoteUnavailable(_)));
}
