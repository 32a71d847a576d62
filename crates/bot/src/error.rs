//! Top-level error type for the bot binary.

use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionStoreError;
use crate::strapi::StrapiError;
use crate::transport::TransportError;

/// Aggregated startup/runtime error.
///
/// Per-event failures never reach this type; they are handled inside the
/// dispatcher and surfaced to the affected conversation only.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("session store error: {0}")]
    Session(#[from] SessionStoreError),

    #[error("commerce backend error: {0}")]
    Strapi(#[from] StrapiError),

    #[error("chat transport error: {0}")]
    Transport(#[from] TransportError),
}
