//! Pondmarket Bot - Telegram storefront over a Strapi commerce backend.
//!
//! Wires the components together and runs the dispatch loop:
//!
//! - file-backed session store (one JSON record per conversation)
//! - authenticated gateway to the Strapi backend
//! - catalog and cart clients on top of the gateway
//! - conversation engine with per-conversation serialization
//! - Telegram long-polling transport

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pondmarket_bot::config::BotConfig;
use pondmarket_bot::dispatcher;
use pondmarket_bot::engine::Engine;
use pondmarket_bot::error::BotError;
use pondmarket_bot::session::FileSessionStore;
use pondmarket_bot::strapi::{ApiGateway, CartService, CatalogClient};
use pondmarket_bot::transport::{ChatTransport, TelegramTransport};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // Defaults to info level for our crates if RUST_LOG is not set.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pondmarket_bot=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env()?;

    let sessions = Arc::new(FileSessionStore::open(&config.sessions_dir).await?);
    tracing::info!(dir = %config.sessions_dir.display(), "session store ready");

    let gateway = ApiGateway::new(&config.strapi)?;
    let catalog = CatalogClient::new(gateway.clone());
    let cart = CartService::new(gateway, catalog.clone());
    let engine = Engine::new(sessions, catalog, cart, config.page_size);

    let transport: Arc<dyn ChatTransport> =
        Arc::new(TelegramTransport::new(&config.telegram_token)?);
    tracing::info!("pondmarket bot starting");

    dispatcher::run(engine, transport).await;
    Ok(())
}
