//! Conversation engine: the state machine at the heart of the bot.
//!
//! For each inbound event the engine loads the conversation's session,
//! dispatches on the current state with an exhaustive `match`, runs the
//! handler (which may call the catalog and cart clients), and persists the
//! next state only after the handler completes without error. A handler
//! error leaves the previously persisted state untouched, so the user can
//! retry the same action.
//!
//! # Concurrency
//!
//! Events for different conversations run concurrently; events for the same
//! conversation serialize on a per-conversation lock so that
//! read-state / handle / write-state is effectively atomic per conversation.
//! Remote calls happen inside the per-conversation critical section but
//! never under any cross-conversation lock.

pub mod events;

use std::num::NonZeroU32;
use std::sync::Arc;

use pondmarket_core::{ChatState, MessageId, OwnerId, ProductId};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::session::{Session, SessionStore, SessionStoreError};
use crate::strapi::{CartLine, CartService, CatalogClient, Product, StrapiError};
use crate::sync::KeyedLocks;

use events::{Button, CallbackPayload, EventKind, InboundEvent, Keyboard, OutboundAction};

const MENU_PROMPT: &str = "Please choose a product:";
const EMPTY_CATALOG: &str = "The catalog is empty right now. Check back later!";
const USE_BUTTONS_PROMPT: &str =
    "Please use the buttons below, or send /start to see the menu again.";
const RESTART_PROMPT: &str = "Something went wrong on our side. Send /start to begin again.";
const EMPTY_CART: &str = "Your cart is empty.";

const BACK_LABEL: &str = "Back";
const ADD_LABEL: &str = "Add to cart";
const CART_LABEL: &str = "My cart";
const MENU_LABEL: &str = "Back to the menu";

/// Errors surfaced by event handling.
///
/// These reach the dispatcher, which logs them and replies with a transient
/// "service unavailable" message; the session state is left unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Strapi(#[from] StrapiError),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
}

/// The conversation engine.
///
/// Cheaply cloneable via `Arc`; one instance is shared by all event workers.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    sessions: Arc<dyn SessionStore>,
    catalog: CatalogClient,
    cart: CartService,
    page_size: u32,
    conversation_locks: KeyedLocks<pondmarket_core::ConversationId>,
}

impl Engine {
    /// Build an engine over its collaborators.
    ///
    /// `page_size` controls the catalog listing drain.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        catalog: CatalogClient,
        cart: CartService,
        page_size: u32,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                sessions,
                catalog,
                cart,
                page_size,
                conversation_locks: KeyedLocks::default(),
            }),
        }
    }

    /// Handle one inbound event for its conversation.
    ///
    /// Loads (or creates) the session, dispatches to the handler for the
    /// current state, persists the resulting state, and returns the outbound
    /// actions for the transport to perform.
    ///
    /// Invalid events for the current state are not errors: they are ignored
    /// or answered with a re-prompt, and the state is unchanged. A corrupt
    /// stored state is logged, the session is reset to the initial state,
    /// and the user is re-prompted from the start.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote call or session write fails; in that
    /// case nothing was persisted and the previous state still stands.
    #[instrument(skip(self, event), fields(conversation = %event.conversation_id))]
    pub async fn handle_event(
        &self,
        event: &InboundEvent,
    ) -> Result<Vec<OutboundAction>, EngineError> {
        let lock = self
            .inner
            .conversation_locks
            .acquire(event.conversation_id)
            .await;
        let _guard = lock.lock().await;

        let mut session = match self.inner.sessions.get(event.conversation_id).await {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(event.conversation_id),
            Err(SessionStoreError::Corrupt {
                conversation,
                reason,
            }) => {
                error!(%conversation, %reason, "corrupt session state, resetting");
                let fresh = Session::new(conversation);
                self.inner.sessions.set(&fresh).await?;
                return Ok(vec![OutboundAction::ReplyText {
                    text: RESTART_PROMPT.to_string(),
                    keyboard: None,
                }]);
            }
            Err(err) => return Err(err.into()),
        };

        let (actions, next_state) = self.dispatch(event, &mut session).await?;

        if next_state != session.state {
            info!(from = %session.state, to = %next_state, "state transition");
        }
        session.state = next_state;
        self.inner.sessions.set(&session).await?;

        Ok(actions)
    }

    /// Exhaustive transition table.
    ///
    /// Each arm returns the outbound actions plus the next state; returning
    /// the current state means the event was invalid here and was ignored or
    /// answered with a re-prompt.
    async fn dispatch(
        &self,
        event: &InboundEvent,
        session: &mut Session,
    ) -> Result<(Vec<OutboundAction>, ChatState), EngineError> {
        // The restart command short-circuits every state.
        if event.is_restart() {
            return self.show_menu(None).await;
        }

        match session.state {
            ChatState::Initial => match &event.kind {
                EventKind::Message(_) => self.show_menu(None).await,
                // A button tap before the first menu was ever shown (stale
                // keyboard from an old chat) is not valid here.
                EventKind::Callback { .. } => Ok((Vec::new(), ChatState::Initial)),
            },

            ChatState::Browsing => match event.callback() {
                Some((CallbackPayload::Product(id), message_id)) => {
                    self.show_product_detail(session, id, message_id).await
                }
                Some((CallbackPayload::Cart, message_id)) => {
                    self.show_cart(event.owner, Some(message_id)).await
                }
                Some((CallbackPayload::Back | CallbackPayload::Add(_), _)) | None => {
                    Ok(self.reprompt(event, ChatState::Browsing))
                }
            },

            ChatState::ProductDetail => match event.callback() {
                Some((CallbackPayload::Back, message_id)) => {
                    self.show_menu(Some(message_id)).await
                }
                Some((CallbackPayload::Add(id), message_id)) => {
                    self.add_to_cart(event.owner, id, message_id).await
                }
                Some((CallbackPayload::Cart, message_id)) => {
                    self.show_cart(event.owner, Some(message_id)).await
                }
                Some((CallbackPayload::Product(_), _)) | None => {
                    Ok(self.reprompt(event, ChatState::ProductDetail))
                }
            },

            // The cart view is a one-shot display: any event returns to the
            // menu.
            ChatState::CartView => {
                let deletable = event.callback().map(|(_, message_id)| message_id);
                self.show_menu(deletable).await
            }
        }
    }

    /// Re-prompt on a typed message, stay silent on an unknown button tap.
    fn reprompt(
        &self,
        event: &InboundEvent,
        state: ChatState,
    ) -> (Vec<OutboundAction>, ChatState) {
        let actions = match &event.kind {
            EventKind::Message(_) => vec![OutboundAction::ReplyText {
                text: USE_BUTTONS_PROMPT.to_string(),
                keyboard: None,
            }],
            EventKind::Callback { .. } => Vec::new(),
        };
        (actions, state)
    }

    // =========================================================================
    // State Handlers
    // =========================================================================

    /// Show the catalog menu; next state is Browsing.
    ///
    /// `replaces` is the message the user tapped, if any; it is deleted so
    /// stale keyboards do not accumulate in the chat.
    async fn show_menu(
        &self,
        replaces: Option<MessageId>,
    ) -> Result<(Vec<OutboundAction>, ChatState), EngineError> {
        let products = self.inner.catalog.drain_catalog(self.inner.page_size).await?;

        let mut actions = Vec::new();
        if let Some(message_id) = replaces {
            actions.push(OutboundAction::DeleteMessage { message_id });
        }

        if products.is_empty() {
            actions.push(OutboundAction::ReplyText {
                text: EMPTY_CATALOG.to_string(),
                keyboard: None,
            });
            return Ok((actions, ChatState::Browsing));
        }

        let mut keyboard = Keyboard::default();
        for product in &products {
            keyboard = keyboard.row(vec![Button::callback(
                product.title.clone(),
                &CallbackPayload::Product(product.id),
            )]);
        }
        keyboard = keyboard.row(vec![Button::callback(CART_LABEL, &CallbackPayload::Cart)]);

        actions.push(OutboundAction::ReplyText {
            text: MENU_PROMPT.to_string(),
            keyboard: Some(keyboard),
        });
        Ok((actions, ChatState::Browsing))
    }

    /// Show one product's detail; next state is ProductDetail.
    async fn show_product_detail(
        &self,
        session: &mut Session,
        id: ProductId,
        replaces: MessageId,
    ) -> Result<(Vec<OutboundAction>, ChatState), EngineError> {
        let product = self.inner.catalog.get_product_detail(id).await?;

        let keyboard = Keyboard::default()
            .row(vec![Button::callback(BACK_LABEL, &CallbackPayload::Back)])
            .row(vec![Button::callback(
                ADD_LABEL,
                &CallbackPayload::Add(product.id),
            )])
            .row(vec![Button::callback(CART_LABEL, &CallbackPayload::Cart)]);

        let caption = format_product_caption(&product);

        let reply = match &product.image_url {
            Some(url) => OutboundAction::ReplyPhoto {
                image: self.inner.catalog.fetch_image(url).await?,
                caption,
                keyboard: Some(keyboard),
            },
            None => OutboundAction::ReplyText {
                text: caption,
                keyboard: Some(keyboard),
            },
        };

        session.context.last_product = Some(id);

        Ok((
            vec![
                OutboundAction::DeleteMessage {
                    message_id: replaces,
                },
                reply,
            ],
            ChatState::ProductDetail,
        ))
    }

    /// Add one unit of a product to the user's cart, confirm, and return to
    /// the menu.
    async fn add_to_cart(
        &self,
        owner: OwnerId,
        id: ProductId,
        replaces: MessageId,
    ) -> Result<(Vec<OutboundAction>, ChatState), EngineError> {
        let cart = self.inner.cart.get_or_create_cart(owner).await?;
        self.inner
            .cart
            .add_item(cart.id, id, NonZeroU32::MIN)
            .await?;

        // Cached by the detail view the user is coming from.
        let product = self.inner.catalog.get_product_detail(id).await?;

        let (menu_actions, next_state) = self.show_menu(Some(replaces)).await?;

        let mut actions = vec![OutboundAction::ReplyText {
            text: format!("Added {} to your cart.", product.title),
            keyboard: None,
        }];
        actions.extend(menu_actions);
        Ok((actions, next_state))
    }

    /// Show the cart summary; next state is CartView.
    async fn show_cart(
        &self,
        owner: OwnerId,
        replaces: Option<MessageId>,
    ) -> Result<(Vec<OutboundAction>, ChatState), EngineError> {
        let lines = match self.inner.cart.get_cart_contents(owner).await {
            Ok(lines) => lines,
            // No cart yet reads as an empty cart to the user.
            Err(StrapiError::CartNotFound(_)) => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let text = if lines.is_empty() {
            EMPTY_CART.to_string()
        } else {
            format_cart_summary(&lines)
        };

        let keyboard = Keyboard::default().row(vec![Button::callback(
            MENU_LABEL,
            &CallbackPayload::Back,
        )]);

        let mut actions = Vec::new();
        if let Some(message_id) = replaces {
            actions.push(OutboundAction::DeleteMessage { message_id });
        }
        actions.push(OutboundAction::ReplyText {
            text,
            keyboard: Some(keyboard),
        });
        Ok((actions, ChatState::CartView))
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn format_product_caption(product: &Product) -> String {
    format!(
        "{} ({} per kg)\n\n{}",
        product.title, product.price, product.description
    )
}

fn format_cart_summary(lines: &[CartLine]) -> String {
    let mut text = String::from("In your cart:\n");
    let mut total = Decimal::ZERO;
    for line in lines {
        total += line.product.price.amount() * Decimal::from(line.quantity);
        text.push_str(&format!(
            "{}: {} x {}\n",
            line.product.title, line.product.price, line.quantity
        ));
    }
    text.push_str(&format!("Total: {total:.2}"));
    text
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pondmarket_core::Price;

    fn product(id: i64, title: &str, price: Decimal) -> Product {
        Product {
            id: ProductId::new(id),
            title: title.to_string(),
            description: "A fine catch.".to_string(),
            price: Price::new(price).unwrap(),
            image_url: None,
        }
    }

    #[test]
    fn test_product_caption_format() {
        let caption = format_product_caption(&product(1, "Trout", Decimal::new(1250, 2)));
        assert_eq!(caption, "Trout (12.50 per kg)\n\nA fine catch.");
    }

    #[test]
    fn test_cart_summary_totals_lines() {
        let lines = vec![
            CartLine {
                product: product(1, "Trout", Decimal::new(1250, 2)),
                quantity: 2,
            },
            CartLine {
                product: product(2, "Perch", Decimal::new(800, 2)),
                quantity: 1,
            },
        ];

        let summary = format_cart_summary(&lines);
        assert!(summary.contains("Trout: 12.50 x 2"));
        assert!(summary.contains("Perch: 8.00 x 1"));
        assert!(summary.ends_with("Total: 33.00"));
    }
}
