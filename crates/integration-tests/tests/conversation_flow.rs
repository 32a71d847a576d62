//! End-to-end conversation flows: engine + session store + fake backend.
//!
//! Each test drives the engine with inbound events the way the dispatcher
//! would and asserts both the outbound actions and the state persisted in
//! the session store.

use pondmarket_bot::engine::events::{Keyboard, OutboundAction};
use pondmarket_bot::session::SessionStore;
use pondmarket_core::{ChatState, ConversationId, ProductId};
use pondmarket_integration_tests::{
    BotHarness, FAKE_JPEG, SeedProduct, bot_harness, callback_event, message_event, seed_products,
};

const CONV: i64 = 555;
const OWNER: i64 = 777;

async fn stored_state(harness: &BotHarness, conversation: i64) -> ChatState {
    harness
        .sessions
        .get(ConversationId::new(conversation))
        .await
        .expect("session read")
        .expect("session persisted")
        .state
}

fn reply_text(action: &OutboundAction) -> (&str, Option<&Keyboard>) {
    match action {
        OutboundAction::ReplyText { text, keyboard } => (text, keyboard.as_ref()),
        other => panic!("expected a text reply, got {other:?}"),
    }
}

fn nth(actions: &[OutboundAction], index: usize) -> &OutboundAction {
    actions.get(index).expect("expected action missing")
}

#[tokio::test]
async fn test_first_message_shows_menu_and_enters_browsing() {
    let harness = bot_harness(seed_products(3), 10).await;

    let actions = harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "hello"))
        .await
        .expect("handle first message");

    assert_eq!(actions.len(), 1);
    let (text, keyboard) = reply_text(nth(&actions, 0));
    assert_eq!(text, "Please choose a product:");

    // One row per product plus the cart row.
    let keyboard = keyboard.expect("menu keyboard");
    assert_eq!(keyboard.rows.len(), 4);
    let cart_row = keyboard.rows.last().expect("cart row");
    let cart_button = cart_row.first().expect("cart button");
    assert_eq!(cart_button.label, "My cart");
    assert_eq!(cart_button.data, "cart");

    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
}

#[tokio::test]
async fn test_empty_catalog_prompts_without_keyboard() {
    let harness = bot_harness(Vec::new(), 10).await;

    let actions = harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("handle start");

    let (text, keyboard) = reply_text(nth(&actions, 0));
    assert!(text.contains("catalog is empty"));
    assert!(keyboard.is_none());
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
}

#[tokio::test]
async fn test_product_selection_enters_detail_and_records_context() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "product:2", 100))
        .await
        .expect("select product");

    assert!(matches!(
        nth(&actions, 0),
        OutboundAction::DeleteMessage { .. }
    ));
    let (text, keyboard) = reply_text(nth(&actions, 1));
    assert!(text.starts_with("Fish 2 (2.50 per kg)"));
    let keyboard = keyboard.expect("detail keyboard");
    let labels: Vec<&str> = keyboard
        .rows
        .iter()
        .flatten()
        .map(|b| b.label.as_str())
        .collect();
    assert_eq!(labels, ["Back", "Add to cart", "My cart"]);

    assert_eq!(stored_state(&harness, CONV).await, ChatState::ProductDetail);
    let session = harness
        .sessions
        .get(ConversationId::new(CONV))
        .await
        .expect("session read")
        .expect("session persisted");
    assert_eq!(session.context.last_product, Some(ProductId::new(2)));
}

#[tokio::test]
async fn test_product_with_image_replies_with_photo() {
    let harness = bot_harness(
        vec![SeedProduct::new(1, "Carp", "9.00").with_image()],
        10,
    )
    .await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "product:1", 100))
        .await
        .expect("select product");

    match nth(&actions, 1) {
        OutboundAction::ReplyPhoto { image, caption, .. } => {
            assert_eq!(image, FAKE_JPEG);
            assert!(caption.starts_with("Carp (9.00 per kg)"));
        }
        other => panic!("expected a photo reply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_back_returns_to_the_menu() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");
    harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "product:1", 100))
        .await
        .expect("select product");

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "back", 101))
        .await
        .expect("go back");

    assert!(matches!(
        nth(&actions, 0),
        OutboundAction::DeleteMessage { .. }
    ));
    let (text, _) = reply_text(nth(&actions, 1));
    assert_eq!(text, "Please choose a product:");
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
}

#[tokio::test]
async fn test_restart_command_works_from_any_state() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");
    harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "product:1", 100))
        .await
        .expect("select product");
    assert_eq!(stored_state(&harness, CONV).await, ChatState::ProductDetail);

    let actions = harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("restart");

    let (text, _) = reply_text(nth(&actions, 0));
    assert_eq!(text, "Please choose a product:");
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
}

#[tokio::test]
async fn test_add_to_cart_confirms_and_returns_to_menu() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");
    harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "product:1", 100))
        .await
        .expect("select product");

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "add:1", 101))
        .await
        .expect("add to cart");

    let (text, _) = reply_text(nth(&actions, 0));
    assert_eq!(text, "Added Fish 1 to your cart.");
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
    assert_eq!(harness.backend.cart_count(), 1);
    assert_eq!(harness.backend.line_quantity(OWNER, 1), Some(1));
}

#[tokio::test]
async fn test_repeated_add_increments_the_line() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");

    for tapped_message in [100, 102] {
        harness
            .engine
            .handle_event(&callback_event(CONV, OWNER, "product:1", tapped_message))
            .await
            .expect("select product");
        harness
            .engine
            .handle_event(&callback_event(CONV, OWNER, "add:1", tapped_message + 1))
            .await
            .expect("add to cart");
    }

    assert_eq!(harness.backend.line_quantity(OWNER, 1), Some(2));
    assert_eq!(harness.backend.cart_count(), 1);
}

#[tokio::test]
async fn test_cart_view_shows_summary_then_returns_to_menu() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");
    harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "product:1", 100))
        .await
        .expect("select product");
    harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "add:1", 101))
        .await
        .expect("add to cart");

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "cart", 102))
        .await
        .expect("show cart");

    let (text, keyboard) = reply_text(nth(&actions, 1));
    assert!(text.contains("Fish 1: 1.50 x 1"));
    assert!(text.ends_with("Total: 1.50"));
    let menu_button = keyboard
        .expect("cart keyboard")
        .rows
        .first()
        .and_then(|row| row.first())
        .cloned()
        .expect("menu button");
    assert_eq!(menu_button.label, "Back to the menu");
    assert_eq!(stored_state(&harness, CONV).await, ChatState::CartView);

    // Any event in the cart view returns to the menu.
    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "back", 103))
        .await
        .expect("leave cart view");
    let (text, _) = reply_text(nth(&actions, 1));
    assert_eq!(text, "Please choose a product:");
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
}

#[tokio::test]
async fn test_cart_button_without_a_cart_reads_empty() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "cart", 100))
        .await
        .expect("show cart");

    let (text, _) = reply_text(nth(&actions, 1));
    assert_eq!(text, "Your cart is empty.");
    assert_eq!(stored_state(&harness, CONV).await, ChatState::CartView);
}

#[tokio::test]
async fn test_stray_callback_before_first_menu_is_ignored() {
    let harness = bot_harness(seed_products(3), 10).await;

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "back", 100))
        .await
        .expect("handle stray callback");

    assert!(actions.is_empty());
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Initial);
}

#[tokio::test]
async fn test_typed_text_while_browsing_reprompts() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");

    let actions = harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "two kilos please"))
        .await
        .expect("handle typed text");

    assert_eq!(actions.len(), 1);
    let (text, _) = reply_text(nth(&actions, 0));
    assert!(text.contains("use the buttons"));
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
}

#[tokio::test]
async fn test_unknown_callback_data_is_silently_ignored() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "/start"))
        .await
        .expect("show menu");

    let actions = harness
        .engine
        .handle_event(&callback_event(CONV, OWNER, "checkout", 100))
        .await
        .expect("handle foreign callback");

    assert!(actions.is_empty());
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Browsing);
}

#[tokio::test]
async fn test_corrupt_session_resets_to_initial() {
    let harness = bot_harness(seed_products(3), 10).await;
    harness
        .sessions
        .insert_raw_state(ConversationId::new(CONV), "HANDLE_MENU")
        .await;

    let actions = harness
        .engine
        .handle_event(&message_event(CONV, OWNER, "hello"))
        .await
        .expect("handle event on corrupt session");

    assert_eq!(actions.len(), 1);
    let (text, _) = reply_text(nth(&actions, 0));
    assert!(text.contains("/start"));
    assert_eq!(stored_state(&harness, CONV).await, ChatState::Initial);
}
