//! Chat transport abstraction.
//!
//! The engine never talks to a chat platform directly: it consumes
//! [`InboundEvent`]s and produces [`OutboundAction`]s, and a transport
//! implementation maps both onto a concrete messaging API. The bundled
//! implementation ([`TelegramTransport`]) long-polls the Telegram Bot API
//! over plain HTTP.

mod telegram;

pub use telegram::TelegramTransport;

use async_trait::async_trait;
use pondmarket_core::ConversationId;
use thiserror::Error;

use crate::engine::events::{InboundEvent, OutboundAction};

/// Errors from the chat transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request to the chat platform failed.
    #[error("transport HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat platform rejected a method call.
    #[error("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },

    /// Transport configuration is unusable (e.g. malformed token).
    #[error("invalid transport configuration: {0}")]
    Config(String),
}

/// A two-way connection to a chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Wait for and return the next batch of inbound events.
    ///
    /// May return an empty batch (poll timeout with no activity).
    async fn poll_events(&self) -> Result<Vec<InboundEvent>, TransportError>;

    /// Perform outbound actions in order for one conversation.
    async fn deliver(
        &self,
        conversation: ConversationId,
        actions: Vec<OutboundAction>,
    ) -> Result<(), TransportError>;
}
