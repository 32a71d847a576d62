//! Integration test harness for Pondmarket.
//!
//! Runs an in-process fake of the Strapi commerce backend (an `axum` router
//! bound to an ephemeral port), so the real gateway, catalog, cart, and
//! engine code paths are exercised over actual HTTP without a Strapi
//! instance.
//!
//! The fake implements the subset of the Strapi v4 API the bot consumes:
//!
//! - `GET /api/products` - paginated listing with `meta.pagination`
//! - `GET /api/products/{id}` - detail with populated picture variants
//! - `GET /api/carts` - filtered listing with populated cart lines
//! - `POST /api/carts` - cart creation
//! - `POST /api/cart-products` - cart line upsert on (cart, product)
//! - `GET /uploads/{file}` - image bytes
//!
//! Every route requires the bearer token [`API_TOKEN`]. The harness keeps
//! counters for listing, detail, and cart-creation requests, and can be told
//! to fail a specific listing page (persistently or once) or cart creation,
//! which the pagination and retry-policy tests use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use pondmarket_bot::config::StrapiConfig;
use pondmarket_bot::engine::Engine;
use pondmarket_bot::engine::events::{EventKind, InboundEvent};
use pondmarket_bot::session::{MemorySessionStore, SessionStore};
use pondmarket_bot::strapi::{ApiGateway, CartService, CatalogClient};
use pondmarket_core::{ConversationId, MessageId, OwnerId};

/// Bearer token the fake backend accepts.
pub const API_TOKEN: &str = "integration-test-token";

/// Bytes served for every upload, so image downloads can be asserted.
pub const FAKE_JPEG: &[u8] = b"\xff\xd8\xffpondmarket-test-image";

// =============================================================================
// Seed Data
// =============================================================================

/// One product preloaded into the fake backend.
#[derive(Debug, Clone)]
pub struct SeedProduct {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Kept as the string the backend would serialize.
    pub price: String,
    pub has_image: bool,
}

impl SeedProduct {
    #[must_use]
    pub fn new(id: i64, title: &str, price: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: format!("{title}, fresh from the pond."),
            price: price.to_string(),
            has_image: false,
        }
    }

    #[must_use]
    pub fn with_image(mut self) -> Self {
        self.has_image = true;
        self
    }
}

/// Products 1..=count titled "Fish {i}" priced "{i}.50".
#[must_use]
pub fn seed_products(count: i64) -> Vec<SeedProduct> {
    (1..=count)
        .map(|i| SeedProduct::new(i, &format!("Fish {i}"), &format!("{i}.50")))
        .collect()
}

// =============================================================================
// Backend State
// =============================================================================

#[derive(Debug)]
struct CartRecord {
    id: i64,
    owner: String,
}

#[derive(Debug)]
struct LineRecord {
    cart: i64,
    product: i64,
    quantity: u64,
}

#[derive(Debug)]
struct BackendState {
    products: Vec<SeedProduct>,
    carts: Vec<CartRecord>,
    lines: Vec<LineRecord>,
    next_cart_id: i64,
    listing_fetches: usize,
    detail_fetches: usize,
    cart_posts: usize,
    failing_page: Option<usize>,
    failing_page_once: Option<usize>,
    failing_cart_creation: bool,
}

type Shared = Arc<Mutex<BackendState>>;

// =============================================================================
// Harness
// =============================================================================

/// A running fake backend plus handles to inspect and steer it.
pub struct TestBackend {
    pub base_url: Url,
    state: Shared,
}

impl TestBackend {
    /// Start the fake backend on an ephemeral local port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound; test-only code.
    pub async fn start(products: Vec<SeedProduct>) -> Self {
        let state = Arc::new(Mutex::new(BackendState {
            products,
            carts: Vec::new(),
            lines: Vec::new(),
            next_cart_id: 1,
            listing_fetches: 0,
            detail_fetches: 0,
            cart_posts: 0,
            failing_page: None,
            failing_page_once: None,
            failing_cart_creation: false,
        }));

        let router = Router::new()
            .route("/api/products", get(list_products))
            .route("/api/products/{id}", get(get_product))
            .route("/api/carts", get(list_carts).post(create_cart))
            .route("/api/cart-products", post(upsert_line))
            .route("/uploads/{file}", get(serve_upload))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test backend");
        });

        let base_url = format!("http://{addr}/").parse().expect("base url");
        Self { base_url, state }
    }

    /// A gateway configured for this backend with the accepted token.
    #[must_use]
    pub fn gateway(&self) -> ApiGateway {
        self.gateway_with_token(API_TOKEN)
    }

    /// A gateway with an arbitrary token, for auth failure tests.
    #[must_use]
    pub fn gateway_with_token(&self, token: &str) -> ApiGateway {
        let config = StrapiConfig {
            base_url: self.base_url.clone(),
            api_token: SecretString::from(token.to_string()),
            http_timeout: Duration::from_secs(5),
        };
        ApiGateway::new(&config).expect("test gateway")
    }

    /// Make the given listing page answer 500 from now on.
    pub fn fail_page(&self, page: usize) {
        self.lock().failing_page = Some(page);
    }

    /// Make the given listing page answer 500 exactly once, then recover.
    pub fn fail_page_once(&self, page: usize) {
        self.lock().failing_page_once = Some(page);
    }

    /// Make `POST /api/carts` answer 500 from now on.
    pub fn fail_cart_creation(&self) {
        self.lock().failing_cart_creation = true;
    }

    /// How many times `GET /api/products` was served (retries included).
    #[must_use]
    pub fn listing_fetches(&self) -> usize {
        self.lock().listing_fetches
    }

    /// How many times `GET /api/products/{id}` was served.
    #[must_use]
    pub fn detail_fetches(&self) -> usize {
        self.lock().detail_fetches
    }

    /// How many times `POST /api/carts` was served (failures included).
    #[must_use]
    pub fn cart_posts(&self) -> usize {
        self.lock().cart_posts
    }

    /// Number of carts that exist in the backend.
    #[must_use]
    pub fn cart_count(&self) -> usize {
        self.lock().carts.len()
    }

    /// Quantity stored for (owner's cart, product), if such a line exists.
    #[must_use]
    pub fn line_quantity(&self, owner: i64, product: i64) -> Option<u64> {
        let state = self.lock();
        let cart = state
            .carts
            .iter()
            .find(|c| c.owner == owner.to_string())?
            .id;
        state
            .lines
            .iter()
            .find(|l| l.cart == cart && l.product == product)
            .map(|l| l.quantity)
    }

    /// Number of lines in the owner's cart.
    #[must_use]
    pub fn line_count(&self, owner: i64) -> usize {
        let state = self.lock();
        let Some(cart) = state.carts.iter().find(|c| c.owner == owner.to_string()) else {
            return 0;
        };
        state.lines.iter().filter(|l| l.cart == cart.id).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().expect("backend state lock")
    }
}

/// A full bot wired against a fresh fake backend and an in-memory session
/// store.
pub struct BotHarness {
    pub backend: TestBackend,
    pub engine: Engine,
    pub sessions: Arc<MemorySessionStore>,
    pub catalog: CatalogClient,
    pub cart: CartService,
}

/// Assemble the production component graph over a fake backend.
pub async fn bot_harness(products: Vec<SeedProduct>, page_size: u32) -> BotHarness {
    let backend = TestBackend::start(products).await;
    let gateway = backend.gateway();
    let catalog = CatalogClient::new(gateway.clone());
    let cart = CartService::new(gateway, catalog.clone());
    let sessions = Arc::new(MemorySessionStore::new());
    let engine = Engine::new(
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
        catalog.clone(),
        cart.clone(),
        page_size,
    );

    BotHarness {
        backend,
        engine,
        sessions,
        catalog,
        cart,
    }
}

/// A typed text message event.
#[must_use]
pub fn message_event(conversation: i64, owner: i64, text: &str) -> InboundEvent {
    InboundEvent {
        conversation_id: ConversationId::new(conversation),
        owner: OwnerId::new(owner),
        kind: EventKind::Message(text.to_string()),
    }
}

/// A button tap event with raw callback data.
#[must_use]
pub fn callback_event(conversation: i64, owner: i64, data: &str, message_id: i64) -> InboundEvent {
    InboundEvent {
        conversation_id: ConversationId::new(conversation),
        owner: OwnerId::new(owner),
        kind: EventKind::Callback {
            data: data.to_string(),
            message_id: MessageId::new(message_id),
        },
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {API_TOKEN}"))
}

fn param_usize(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn listing_entry(product: &SeedProduct) -> Value {
    json!({
        "id": product.id,
        "attributes": {
            "title": product.title,
            "description": product.description,
            "price": product.price,
        }
    })
}

async fn list_products(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let page = param_usize(&params, "pagination[page]", 1).max(1);
    let page_size = param_usize(&params, "pagination[pageSize]", 25).max(1);

    let mut state = state.lock().expect("state lock");
    state.listing_fetches += 1;
    if state.failing_page == Some(page) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if state.failing_page_once == Some(page) {
        state.failing_page_once = None;
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let total = state.products.len();
    let page_count = total.div_ceil(page_size);
    let entries: Vec<Value> = state
        .products
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .map(listing_entry)
        .collect();

    Json(json!({
        "data": entries,
        "meta": {
            "pagination": {
                "page": page,
                "pageSize": page_size,
                "pageCount": page_count,
                "total": total,
            }
        }
    }))
    .into_response()
}

async fn get_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut state = state.lock().expect("state lock");
    state.detail_fetches += 1;

    let Some(product) = state.products.iter().find(|p| p.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let picture = if product.has_image {
        json!({
            "data": [{
                "id": 1,
                "attributes": {
                    "url": format!("/uploads/{id}.jpg"),
                    "formats": {
                        "thumbnail": { "url": format!("/uploads/thumbnail_{id}.jpg") },
                        "medium": { "url": format!("/uploads/medium_{id}.jpg") },
                    }
                }
            }]
        })
    } else {
        json!({ "data": null })
    };

    Json(json!({
        "data": {
            "id": product.id,
            "attributes": {
                "title": product.title,
                "description": product.description,
                "price": product.price,
                "picture": picture,
            }
        }
    }))
    .into_response()
}

fn cart_entry(state: &BackendState, cart: &CartRecord) -> Value {
    let items: Vec<Value> = state
        .lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.cart == cart.id)
        .map(|(i, l)| {
            json!({
                "id": i + 1,
                "attributes": {
                    "quantity": l.quantity,
                    "product": { "data": { "id": l.product } },
                }
            })
        })
        .collect();

    json!({
        "id": cart.id,
        "attributes": {
            "owner_id": cart.owner,
            "cart_products": { "data": items },
        }
    })
}

async fn list_carts(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let owner_filter = params.get("filters[owner_id][$eq]");
    let id_filter = params
        .get("filters[id][$eq]")
        .and_then(|v| v.parse::<i64>().ok());

    let state = state.lock().expect("state lock");
    let entries: Vec<Value> = state
        .carts
        .iter()
        .filter(|c| owner_filter.is_none_or(|owner| &c.owner == owner))
        .filter(|c| id_filter.is_none_or(|id| c.id == id))
        .map(|c| cart_entry(&state, c))
        .collect();

    Json(json!({ "data": entries })).into_response()
}

async fn create_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(owner) = body.pointer("/data/owner_id").and_then(Value::as_str) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut state = state.lock().expect("state lock");
    state.cart_posts += 1;
    if state.failing_cart_creation {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let id = state.next_cart_id;
    state.next_cart_id += 1;
    state.carts.push(CartRecord {
        id,
        owner: owner.to_string(),
    });

    Json(json!({
        "data": { "id": id, "attributes": { "owner_id": owner } }
    }))
    .into_response()
}

async fn upsert_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let cart = body.pointer("/data/cart").and_then(Value::as_i64);
    let product = body.pointer("/data/product").and_then(Value::as_i64);
    let quantity = body.pointer("/data/quantity").and_then(Value::as_u64);
    let (Some(cart), Some(product), Some(quantity)) = (cart, product, quantity) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut state = state.lock().expect("state lock");
    if !state.carts.iter().any(|c| c.id == cart) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    // Upsert on (cart, product), mirroring the backend's unique constraint.
    if let Some(line) = state
        .lines
        .iter_mut()
        .find(|l| l.cart == cart && l.product == product)
    {
        line.quantity = quantity;
    } else {
        state.lines.push(LineRecord {
            cart,
            product,
            quantity,
        });
    }

    let line_id = state.lines.len();
    Json(json!({
        "data": { "id": line_id, "attributes": { "quantity": quantity } }
    }))
    .into_response()
}

async fn serve_upload(headers: HeaderMap, Path(_file): Path<String>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    FAKE_JPEG.to_vec().into_response()
}
