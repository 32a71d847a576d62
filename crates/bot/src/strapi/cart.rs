//! Cart service: get-or-create, item addition, denormalized contents.
//!
//! At most one cart exists per owner. Lookup-then-create is not atomic
//! against the backend, so the service holds a per-owner async lock across
//! the whole sequence; two near-simultaneous first-time adds by the same
//! user (e.g. from two devices) resolve to a single cart. Different owners
//! never contend.

use std::num::NonZeroU32;
use std::sync::Arc;

use pondmarket_core::{CartId, OwnerId, ProductId};
use serde_json::json;
use tracing::{debug, instrument};

use crate::sync::KeyedLocks;

use super::StrapiError;
use super::catalog::CatalogClient;
use super::conversions::{cart_from_create, carts_from_listing};
use super::gateway::ApiGateway;
use super::types::{Cart, CartLine};

/// Client for per-owner carts.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    gateway: ApiGateway,
    catalog: CatalogClient,
    owner_locks: KeyedLocks<OwnerId>,
}

impl CartService {
    /// Create a cart service over an existing gateway.
    ///
    /// The catalog client is used to join cart items with product detail in
    /// [`Self::get_cart_contents`].
    #[must_use]
    pub fn new(gateway: ApiGateway, catalog: CatalogClient) -> Self {
        Self {
            inner: Arc::new(CartServiceInner {
                gateway,
                catalog,
                owner_locks: KeyedLocks::default(),
            }),
        }
    }

    /// Look up the owner's cart, creating one if none exists.
    ///
    /// Idempotent under races: concurrent calls for the same owner serialize
    /// on a per-owner lock, so exactly one cart is ever created.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` if the lookup or creation call fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn get_or_create_cart(&self, owner: OwnerId) -> Result<Cart, StrapiError> {
        let lock = self.inner.owner_locks.acquire(owner).await;
        let _guard = lock.lock().await;

        if let Some(cart) = self.find_cart(owner).await? {
            return Ok(cart);
        }

        let body = json!({
            "data": { "owner_id": owner.to_string() }
        });
        let payload = self.inner.gateway.post("/api/carts", &body).await?;
        let cart = cart_from_create(&payload)?;
        debug!(cart_id = %cart.id, "created cart");
        Ok(cart)
    }

    /// Add a product to a cart.
    ///
    /// If the product is already in the cart its quantity is incremented by
    /// `quantity`; otherwise a new line is inserted. There is no upper bound
    /// on quantity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the cart does not exist and `RemoteUnavailable`
    /// if any backend call fails.
    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: NonZeroU32,
    ) -> Result<(), StrapiError> {
        let cart = self
            .find_cart_by_id(cart_id)
            .await?
            .ok_or_else(|| StrapiError::NotFound(format!("cart {cart_id}")))?;

        let new_quantity = cart.quantity_of(product_id) + quantity.get();

        // The backend upserts cart lines on (cart, product), so writing the
        // accumulated quantity keeps a single line per product.
        let body = json!({
            "data": {
                "cart": cart_id.as_i64(),
                "product": product_id.as_i64(),
                "quantity": new_quantity,
            }
        });
        self.inner.gateway.post("/api/cart-products", &body).await?;
        debug!(quantity = new_quantity, "cart line written");
        Ok(())
    }

    /// Return the owner's cart lines joined with product detail, in stored
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `CartNotFound` if the owner has no cart. An existing but
    /// empty cart yields an empty list, not an error.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn get_cart_contents(&self, owner: OwnerId) -> Result<Vec<CartLine>, StrapiError> {
        let cart = self
            .find_cart(owner)
            .await?
            .ok_or(StrapiError::CartNotFound(owner))?;

        let mut lines = Vec::with_capacity(cart.items.len());
        for item in cart.items {
            let product = self.inner.catalog.get_product_detail(item.product_id).await?;
            lines.push(CartLine {
                product,
                quantity: item.quantity,
            });
        }
        Ok(lines)
    }

    /// Look up the owner's cart without creating one.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` if the lookup fails.
    pub async fn find_cart(&self, owner: OwnerId) -> Result<Option<Cart>, StrapiError> {
        let params = [
            ("filters[owner_id][$eq]", owner.to_string()),
            (
                "populate[cart_products][populate][0]",
                "product".to_string(),
            ),
        ];

        let payload = self.inner.gateway.get("/api/carts", &params).await?;
        let mut carts = carts_from_listing(&payload)?;
        Ok(if carts.is_empty() {
            None
        } else {
            Some(carts.swap_remove(0))
        })
    }

    async fn find_cart_by_id(&self, cart_id: CartId) -> Result<Option<Cart>, StrapiError> {
        let params = [
            ("filters[id][$eq]", cart_id.to_string()),
            (
                "populate[cart_products][populate][0]",
                "product".to_string(),
            ),
        ];

        let payload = self.inner.gateway.get("/api/carts", &params).await?;
        let mut carts = carts_from_listing(&payload)?;
        Ok(if carts.is_empty() {
            None
        } else {
            Some(carts.swap_remove(0))
        })
    }
}
