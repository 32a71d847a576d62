//! Decoding of the raw Strapi v4 JSON envelope into typed entities.
//!
//! Strapi wraps every entity in `{"data": {"id": .., "attributes": {..}}}`
//! and listing responses carry `meta.pagination`. Fields that the domain
//! model requires are checked here and a missing one fails fast with
//! `ProductDataIncomplete` instead of propagating raw lookups.

use pondmarket_core::{CartId, OwnerId, Price, ProductId};
use rust_decimal::Decimal;
use serde_json::Value;

use super::StrapiError;
use super::types::{Cart, CartItem, Pagination, Product};

/// Image size variant preferred when resolving a single URL.
const PREFERRED_IMAGE_VARIANT: &str = "medium";

// =============================================================================
// Field Helpers
// =============================================================================

fn expect_field<'a>(
    value: &'a Value,
    entity: &'static str,
    field: &'static str,
) -> Result<&'a Value, StrapiError> {
    match value.get(field) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(StrapiError::ProductDataIncomplete { entity, field }),
    }
}

fn expect_str<'a>(
    value: &'a Value,
    entity: &'static str,
    field: &'static str,
) -> Result<&'a str, StrapiError> {
    expect_field(value, entity, field)?
        .as_str()
        .ok_or(StrapiError::ProductDataIncomplete { entity, field })
}

fn expect_i64(value: &Value, entity: &'static str, field: &'static str) -> Result<i64, StrapiError> {
    expect_field(value, entity, field)?
        .as_i64()
        .ok_or(StrapiError::ProductDataIncomplete { entity, field })
}

fn expect_u32(value: &Value, entity: &'static str, field: &'static str) -> Result<u32, StrapiError> {
    expect_field(value, entity, field)?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(StrapiError::ProductDataIncomplete { entity, field })
}

fn expect_array<'a>(
    value: &'a Value,
    entity: &'static str,
    field: &'static str,
) -> Result<&'a Vec<Value>, StrapiError> {
    expect_field(value, entity, field)?
        .as_array()
        .ok_or(StrapiError::ProductDataIncomplete { entity, field })
}

/// Parse a price that the backend may send as a JSON number or string.
///
/// Parsing goes through the decimal string representation so `4.5` stays
/// exactly `4.5`.
fn expect_price(
    value: &Value,
    entity: &'static str,
    field: &'static str,
) -> Result<Price, StrapiError> {
    let raw = expect_field(value, entity, field)?;
    let amount = match raw {
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        Value::String(s) => s.parse::<Decimal>().ok(),
        _ => None,
    }
    .ok_or(StrapiError::ProductDataIncomplete { entity, field })?;

    Price::new(amount).map_err(|_| StrapiError::ProductDataIncomplete { entity, field })
}

// =============================================================================
// Product Conversions
// =============================================================================

/// Decode one entry of a product listing (`data[i]`).
pub fn product_from_listing_entry(entry: &Value) -> Result<Product, StrapiError> {
    let attributes = expect_field(entry, "product", "attributes")?;

    Ok(Product {
        id: ProductId::new(expect_i64(entry, "product", "id")?),
        title: expect_str(attributes, "product", "title")?.to_string(),
        description: expect_str(attributes, "product", "description")?.to_string(),
        price: expect_price(attributes, "product", "price")?,
        // Listings are fetched without image population.
        image_url: None,
    })
}

/// Decode a product detail response (`GET /api/products/{id}` with picture
/// population).
///
/// Image resolution policy: prefer the "medium" size variant; if no suitable
/// variant exists the product is returned with `image_url` unset rather than
/// failing the whole call.
pub fn product_from_detail(payload: &Value) -> Result<Product, StrapiError> {
    let entry = expect_field(payload, "product", "data")?;
    let attributes = expect_field(entry, "product", "attributes")?;

    Ok(Product {
        id: ProductId::new(expect_i64(entry, "product", "id")?),
        title: expect_str(attributes, "product", "title")?.to_string(),
        description: expect_str(attributes, "product", "description")?.to_string(),
        price: expect_price(attributes, "product", "price")?,
        image_url: resolve_image_url(attributes),
    })
}

/// Pick a single image URL from the populated picture variants.
///
/// Strapi returns `picture.data` as either a single object or an array of
/// media entries, each with named size variants under `formats`.
fn resolve_image_url(attributes: &Value) -> Option<String> {
    let data = attributes.get("picture")?.get("data")?;
    let media = match data {
        Value::Array(entries) => entries.first()?,
        Value::Object(_) => data,
        _ => return None,
    };

    media
        .get("attributes")?
        .get("formats")?
        .get(PREFERRED_IMAGE_VARIANT)?
        .get("url")?
        .as_str()
        .map(String::from)
}

/// Decode a full listing response into products plus pagination metadata.
pub fn page_from_listing(payload: &Value) -> Result<(Vec<Product>, Pagination), StrapiError> {
    let entries = expect_array(payload, "product listing", "data")?;
    let products = entries
        .iter()
        .map(product_from_listing_entry)
        .collect::<Result<Vec<_>, _>>()?;

    let meta = expect_field(payload, "product listing", "meta")?;
    let pagination = expect_field(meta, "pagination", "pagination")?;

    Ok((
        products,
        Pagination {
            page: expect_u32(pagination, "pagination", "page")?,
            page_size: expect_u32(pagination, "pagination", "pageSize")?,
            page_count: expect_u32(pagination, "pagination", "pageCount")?,
            total: expect_u32(pagination, "pagination", "total")?,
        },
    ))
}

// =============================================================================
// Cart Conversions
// =============================================================================

/// Parse the owner id, which the backend stores as a string attribute.
fn expect_owner(value: &Value, field: &'static str) -> Result<OwnerId, StrapiError> {
    let raw = expect_field(value, "cart", field)?;
    let id = match raw {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
    .ok_or(StrapiError::ProductDataIncomplete {
        entity: "cart",
        field,
    })?;
    Ok(OwnerId::new(id))
}

/// Decode one cart entry (`data[i]` of a cart listing).
///
/// `cart_products` is optional: a create response or an unpopulated query
/// yields a cart with no items.
pub fn cart_from_entry(entry: &Value) -> Result<Cart, StrapiError> {
    let attributes = expect_field(entry, "cart", "attributes")?;

    let items = match attributes.get("cart_products").and_then(|cp| cp.get("data")) {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(cart_item_from_entry)
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    Ok(Cart {
        id: CartId::new(expect_i64(entry, "cart", "id")?),
        owner_id: expect_owner(attributes, "owner_id")?,
        items,
    })
}

fn cart_item_from_entry(entry: &Value) -> Result<CartItem, StrapiError> {
    let attributes = expect_field(entry, "cart item", "attributes")?;
    let product = expect_field(attributes, "cart item", "product")?;
    let product_entry = expect_field(product, "cart item", "data")?;

    let quantity = expect_u32(attributes, "cart item", "quantity")?;
    if quantity == 0 {
        return Err(StrapiError::ProductDataIncomplete {
            entity: "cart item",
            field: "quantity",
        });
    }

    Ok(CartItem {
        product_id: ProductId::new(expect_i64(product_entry, "cart item", "id")?),
        quantity,
    })
}

/// Decode a cart listing response into all matching carts.
pub fn carts_from_listing(payload: &Value) -> Result<Vec<Cart>, StrapiError> {
    let entries = expect_array(payload, "cart listing", "data")?;
    entries.iter().map(cart_from_entry).collect()
}

/// Decode a cart creation response.
pub fn cart_from_create(payload: &Value) -> Result<Cart, StrapiError> {
    cart_from_entry(expect_field(payload, "cart", "data")?)
}
