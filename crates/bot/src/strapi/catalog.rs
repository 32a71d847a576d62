//! Catalog client: product listings, exhaustive pagination, product detail.
//!
//! Product detail responses are cached with `moka` (60-second TTL); listing
//! drains are never cached so pagination always observes the live backend.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use pondmarket_core::ProductId;
use tracing::{debug, instrument};

use super::StrapiError;
use super::conversions::{page_from_listing, product_from_detail};
use super::gateway::ApiGateway;
use super::types::Product;

/// Detail cache TTL. Short on purpose: prices and descriptions are edited in
/// the backend admin and should not lag by more than a minute.
const DETAIL_CACHE_TTL: Duration = Duration::from_secs(60);

const DETAIL_CACHE_CAPACITY: u64 = 1000;

/// Client for the product catalog.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    gateway: ApiGateway,
    detail_cache: Cache<ProductId, Product>,
}

impl CatalogClient {
    /// Create a catalog client over an existing gateway.
    #[must_use]
    pub fn new(gateway: ApiGateway) -> Self {
        let detail_cache = Cache::builder()
            .max_capacity(DETAIL_CACHE_CAPACITY)
            .time_to_live(DETAIL_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(CatalogClientInner {
                gateway,
                detail_cache,
            }),
        }
    }

    /// Fetch a single listing page.
    ///
    /// Returns the page's products (in backend order) and the total page
    /// count reported by the backend for this page size.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` on network/5xx failure and
    /// `ProductDataIncomplete` if a required field is missing.
    #[instrument(skip(self))]
    pub async fn get_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Product>, u32), StrapiError> {
        let params = [
            ("pagination[page]", page.to_string()),
            ("pagination[pageSize]", page_size.to_string()),
            ("fields[0]", "title".to_string()),
            ("fields[1]", "description".to_string()),
            ("fields[2]", "price".to_string()),
        ];

        let payload = self.inner.gateway.get("/api/products", &params).await?;
        let (products, pagination) = page_from_listing(&payload)?;
        Ok((products, pagination.page_count))
    }

    /// Retrieve the complete catalog by draining every listing page.
    ///
    /// Issues page 1, reads the total page count from the response, then
    /// issues pages 2..N sequentially, concatenating in page order. Any
    /// single page failure aborts the whole drain; a partial,
    /// silently-incomplete list is never returned.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` if any page fetch fails.
    #[instrument(skip(self))]
    pub async fn drain_catalog(&self, page_size: u32) -> Result<Vec<Product>, StrapiError> {
        let (mut products, page_count) = self.get_page(1, page_size).await?;

        for page in 2..=page_count {
            let (page_products, _) = self.get_page(page, page_size).await?;
            products.extend(page_products);
        }

        debug!(count = products.len(), pages = page_count, "catalog drained");
        Ok(products)
    }

    /// Fetch a single product with its image metadata.
    ///
    /// The image URL is resolved from the populated size variants (the
    /// "medium" variant is preferred); if no suitable variant exists the
    /// product is returned with `image_url` unset.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist and
    /// `ProductDataIncomplete` if a required field is missing.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product_detail(&self, id: ProductId) -> Result<Product, StrapiError> {
        if let Some(product) = self.inner.detail_cache.get(&id).await {
            debug!("cache hit for product detail");
            return Ok(product);
        }

        let params = [
            ("fields[0]", "title".to_string()),
            ("fields[1]", "description".to_string()),
            ("fields[2]", "price".to_string()),
            ("populate[picture]", "*".to_string()),
        ];

        let payload = self
            .inner
            .gateway
            .get(&format!("/api/products/{id}"), &params)
            .await?;
        let product = product_from_detail(&payload)?;

        self.inner.detail_cache.insert(id, product.clone()).await;
        Ok(product)
    }

    /// Like [`Self::get_product_detail`], but for callers that cannot render
    /// without an image.
    ///
    /// # Errors
    ///
    /// Returns `ProductDataIncomplete` if no suitable image variant exists.
    pub async fn get_product_detail_requiring_image(
        &self,
        id: ProductId,
    ) -> Result<Product, StrapiError> {
        let product = self.get_product_detail(id).await?;
        if product.image_url.is_none() {
            return Err(StrapiError::ProductDataIncomplete {
                entity: "product",
                field: "picture",
            });
        }
        Ok(product)
    }

    /// Download image bytes for a resolved image URL.
    ///
    /// Strapi returns upload URLs relative to the backend base URL, so the
    /// download goes through the same authenticated gateway.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` or `NotFound` like any other read.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, StrapiError> {
        self.inner.gateway.get_bytes(url).await
    }
}
