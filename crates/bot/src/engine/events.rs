//! Inbound events and outbound actions exchanged with the chat transport.
//!
//! These types are transport-agnostic: the Telegram implementation maps its
//! update and method shapes onto them, and tests construct them directly.

use pondmarket_core::{ConversationId, MessageId, OwnerId, ProductId};

// =============================================================================
// Inbound
// =============================================================================

/// What kind of event arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A plain text message.
    Message(String),
    /// A tap on an inline keyboard button.
    Callback {
        /// Raw callback payload attached to the button.
        data: String,
        /// The message the tapped keyboard belongs to.
        message_id: MessageId,
    },
}

/// One inbound event from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub conversation_id: ConversationId,
    /// The user behind the event; carts are keyed by this, not by the
    /// conversation.
    pub owner: OwnerId,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Whether this event is the explicit restart command.
    #[must_use]
    pub fn is_restart(&self) -> bool {
        matches!(&self.kind, EventKind::Message(text) if text.trim() == "/start")
    }

    /// Parse the callback payload, if this event is a button tap.
    ///
    /// Returns `None` for messages and for callback data this bot never
    /// produced (e.g. a tap on a keyboard from an older deployment).
    #[must_use]
    pub fn callback(&self) -> Option<(CallbackPayload, MessageId)> {
        match &self.kind {
            EventKind::Callback { data, message_id } => {
                CallbackPayload::parse(data).map(|payload| (payload, *message_id))
            }
            EventKind::Message(_) => None,
        }
    }
}

/// Decoded callback button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPayload {
    /// Open the detail view for a product.
    Product(ProductId),
    /// Add a product to the cart.
    Add(ProductId),
    /// Go back to the catalog menu.
    Back,
    /// Show the cart.
    Cart,
}

impl CallbackPayload {
    /// Parse the wire form produced by [`Self::data`].
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "back" => Some(Self::Back),
            "cart" => Some(Self::Cart),
            _ => {
                if let Some(id) = data.strip_prefix("product:") {
                    id.parse::<i64>().ok().map(|n| Self::Product(ProductId::new(n)))
                } else if let Some(id) = data.strip_prefix("add:") {
                    id.parse::<i64>().ok().map(|n| Self::Add(ProductId::new(n)))
                } else {
                    None
                }
            }
        }
    }

    /// Wire form attached to keyboard buttons.
    #[must_use]
    pub fn data(&self) -> String {
        match self {
            Self::Product(id) => format!("product:{id}"),
            Self::Add(id) => format!("add:{id}"),
            Self::Back => "back".to_string(),
            Self::Cart => "cart".to_string(),
        }
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// One inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    /// A button carrying a typed callback payload.
    #[must_use]
    pub fn callback(label: impl Into<String>, payload: &CallbackPayload) -> Self {
        Self {
            label: label.into(),
            data: payload.data(),
        }
    }
}

/// An inline keyboard: rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Append a row of buttons.
    #[must_use]
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }
}

/// One outbound action for the chat transport to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// Send a text message, optionally with an inline keyboard.
    ReplyText {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Send a photo with a caption, optionally with an inline keyboard.
    ReplyPhoto {
        image: Vec<u8>,
        caption: String,
        keyboard: Option<Keyboard>,
    },
    /// Replace the text of an existing message.
    EditMessage { message_id: MessageId, text: String },
    /// Delete an existing message (used when replacing a menu).
    DeleteMessage { message_id: MessageId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_payload_wire_roundtrip() {
        for payload in [
            CallbackPayload::Product(ProductId::new(7)),
            CallbackPayload::Add(ProductId::new(12)),
            CallbackPayload::Back,
            CallbackPayload::Cart,
        ] {
            assert_eq!(CallbackPayload::parse(&payload.data()), Some(payload));
        }
    }

    #[test]
    fn test_foreign_callback_data_is_rejected() {
        assert_eq!(CallbackPayload::parse("product:abc"), None);
        assert_eq!(CallbackPayload::parse("checkout"), None);
        assert_eq!(CallbackPayload::parse(""), None);
    }

    #[test]
    fn test_restart_detection() {
        let event = InboundEvent {
            conversation_id: ConversationId::new(1),
            owner: OwnerId::new(1),
            kind: EventKind::Message("  /start ".to_string()),
        };
        assert!(event.is_restart());

        let event = InboundEvent {
            conversation_id: ConversationId::new(1),
            owner: OwnerId::new(1),
            kind: EventKind::Message("hello".to_string()),
        };
        assert!(!event.is_restart());
    }

    #[test]
    fn test_callback_accessor_ignores_messages() {
        let event = InboundEvent {
            conversation_id: ConversationId::new(1),
            owner: OwnerId::new(1),
            kind: EventKind::Message("back".to_string()),
        };
        assert_eq!(event.callback(), None);
    }
}
