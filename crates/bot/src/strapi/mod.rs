//! Strapi commerce backend clients.
//!
//! # Architecture
//!
//! - [`gateway::ApiGateway`] owns the HTTP transport: base URL, bearer token,
//!   bounded per-call timeout, retry with backoff for idempotent reads. It
//!   returns raw JSON payloads and performs no business interpretation.
//! - [`conversions`] decodes the raw Strapi v4 envelope (`data` /
//!   `attributes` / `meta.pagination`) into typed entities, failing fast on
//!   missing required fields rather than propagating raw lookups.
//! - [`CatalogClient`] retrieves product listings (full pagination drain) and
//!   single-product detail with image resolution; detail responses are cached
//!   via `moka` with a short TTL.
//! - [`CartService`] provides get-or-create cart semantics, item addition
//!   with increment-on-duplicate, and denormalized cart contents.
//!
//! # Example
//!
//! ```rust,ignore
//! use pondmarket_bot::strapi::{ApiGateway, CartService, CatalogClient};
//!
//! let gateway = ApiGateway::new(&config.strapi)?;
//! let catalog = CatalogClient::new(gateway.clone());
//! let cart = CartService::new(gateway, catalog.clone());
//!
//! let products = catalog.drain_catalog(10).await?;
//! let owner_cart = cart.get_or_create_cart(owner).await?;
//! ```

mod cart;
mod catalog;
mod conversions;
mod gateway;
pub mod types;

pub use cart::CartService;
pub use catalog::CatalogClient;
pub use gateway::ApiGateway;
pub use types::{Cart, CartItem, CartLine, Pagination, Product};

use pondmarket_core::OwnerId;
use thiserror::Error;

/// Errors that can occur when interacting with the commerce backend.
#[derive(Debug, Error)]
pub enum StrapiError {
    /// Network failure, timeout, or non-2xx status from the backend.
    ///
    /// Surfaced to the user as a transient "service unavailable" message;
    /// the conversation state is left unchanged so the action can be retried.
    #[error("commerce backend unavailable: {0}")]
    RemoteUnavailable(String),

    /// Required field missing or malformed in a backend response.
    #[error("incomplete {entity} data from backend: missing or invalid {field}")]
    ProductDataIncomplete {
        entity: &'static str,
        field: &'static str,
    },

    /// The requested entity does not exist (backend 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Cart contents requested for an owner who has no cart.
    ///
    /// Distinct from an existing-but-empty cart, which yields an empty list.
    #[error("no cart exists for owner {0}")]
    CartNotFound(OwnerId),
}

impl From<reqwest::Error> for StrapiError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}
