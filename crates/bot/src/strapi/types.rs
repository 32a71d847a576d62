//! Domain types for the commerce backend.
//!
//! These types provide a clean, ergonomic API separate from the raw Strapi
//! JSON envelope; all decoding happens in the `conversions` module.

use pondmarket_core::{CartId, OwnerId, Price, ProductId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Product Types
// =============================================================================

/// A product from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Backend-assigned, immutable identifier.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Long description shown on the detail view.
    pub description: String,
    /// Unit price (non-negative).
    pub price: Price,
    /// Resolved image URL, if a suitable size variant exists.
    ///
    /// May be relative to the backend base URL (Strapi serves uploads from
    /// `/uploads/...`).
    pub image_url: Option<String>,
}

// =============================================================================
// Cart Types
// =============================================================================

/// A single line in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    /// Always at least 1; adding an already-present product increments this
    /// rather than duplicating the line.
    pub quantity: u32,
}

/// A per-owner cart.
///
/// Keyed by owner, independent of any conversation; at most one exists per
/// owner at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner_id: OwnerId,
    /// Lines in backend order.
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Current quantity of a product in this cart, or 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity)
    }
}

/// A cart line joined with its product detail.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

// =============================================================================
// Pagination
// =============================================================================

/// Pagination metadata from a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page (1-based).
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Total number of pages for this page size.
    pub page_count: u32,
    /// Total number of items in the collection.
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_of_present_and_absent() {
        let cart = Cart {
            id: CartId::new(1),
            owner_id: OwnerId::new(100),
            items: vec![
                CartItem {
                    product_id: ProductId::new(7),
                    quantity: 3,
                },
                CartItem {
                    product_id: ProductId::new(9),
                    quantity: 1,
                },
            ],
        };

        assert_eq!(cart.quantity_of(ProductId::new(7)), 3);
        assert_eq!(cart.quantity_of(ProductId::new(9)), 1);
        assert_eq!(cart.quantity_of(ProductId::new(42)), 0);
    }
}
