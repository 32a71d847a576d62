//! Telegram Bot API transport.
//!
//! Talks to the Bot API directly over `reqwest` (long polling via
//! `getUpdates`); no SDK crate. Only text messages and inline-keyboard
//! callback queries are consumed, matching what the engine produces.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pondmarket_core::{ConversationId, MessageId, OwnerId};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::engine::events::{EventKind, InboundEvent, Keyboard, OutboundAction};

use super::{ChatTransport, TransportError};

/// Long-poll wait passed to `getUpdates`.
const POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// HTTP timeout: must comfortably exceed the long-poll wait.
const HTTP_TIMEOUT: Duration = Duration::from_secs(35);

/// Transport speaking the Telegram Bot API.
pub struct TelegramTransport {
    client: reqwest::Client,
    /// `https://api.telegram.org/bot{token}/` - contains the secret token.
    base_url: Url,
    /// Next `getUpdates` offset (last seen update id + 1).
    offset: AtomicI64,
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("base_url", &"https://api.telegram.org/bot[REDACTED]/")
            .field("offset", &self.offset.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TelegramTransport {
    /// Create a transport for the given bot token.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Config` if the token produces an unusable
    /// URL, `TransportError::Http` if the client cannot be built.
    pub fn new(token: &SecretString) -> Result<Self, TransportError> {
        let base_url = format!("https://api.telegram.org/bot{}/", token.expose_secret())
            .parse::<Url>()
            .map_err(|e| TransportError::Config(format!("bad bot token: {e}")))?;

        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url,
            offset: AtomicI64::new(0),
        })
    }

    /// Call one Bot API method and return its `result` payload.
    async fn call(&self, method: &'static str, body: &Value) -> Result<Value, TransportError> {
        let url = self
            .base_url
            .join(method)
            .map_err(|e| TransportError::Config(format!("bad method path {method:?}: {e}")))?;

        let response = self.client.post(url).json(body).send().await?;
        let payload = response.json::<Value>().await?;
        into_result(method, payload)
    }

    async fn send_photo(
        &self,
        conversation: ConversationId,
        image: Vec<u8>,
        caption: String,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        let url = self
            .base_url
            .join("sendPhoto")
            .map_err(|e| TransportError::Config(format!("bad method path: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", conversation.to_string())
            .text("caption", caption)
            .part(
                "photo",
                reqwest::multipart::Part::bytes(image).file_name("photo.jpg"),
            );
        if let Some(keyboard) = keyboard {
            form = form.text("reply_markup", keyboard_markup(&keyboard).to_string());
        }

        let response = self.client.post(url).multipart(form).send().await?;
        let payload = response.json::<Value>().await?;
        into_result("sendPhoto", payload).map(|_| ())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    #[instrument(skip(self))]
    async fn poll_events(&self) -> Result<Vec<InboundEvent>, TransportError> {
        let body = json!({
            "timeout": POLL_TIMEOUT.as_secs(),
            "offset": self.offset.load(Ordering::Relaxed),
            "allowed_updates": ["message", "callback_query"],
        });
        let result = self.call("getUpdates", &body).await?;

        let updates = result.as_array().cloned().unwrap_or_default();
        let mut events = Vec::new();

        for update in &updates {
            if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                self.offset.fetch_max(update_id + 1, Ordering::Relaxed);
            }

            // Button taps must be acknowledged or the client shows a
            // perpetual spinner.
            if let Some(callback_id) = update
                .pointer("/callback_query/id")
                .and_then(Value::as_str)
            {
                let ack = json!({ "callback_query_id": callback_id });
                if let Err(err) = self.call("answerCallbackQuery", &ack).await {
                    warn!(%err, "failed to acknowledge callback query");
                }
            }

            match parse_update(update) {
                Some(event) => events.push(event),
                None => debug!("skipping unsupported update"),
            }
        }

        Ok(events)
    }

    #[instrument(skip(self, actions), fields(conversation = %conversation, count = actions.len()))]
    async fn deliver(
        &self,
        conversation: ConversationId,
        actions: Vec<OutboundAction>,
    ) -> Result<(), TransportError> {
        for action in actions {
            match action {
                OutboundAction::ReplyText { text, keyboard } => {
                    let mut body = json!({
                        "chat_id": conversation.as_i64(),
                        "text": text,
                    });
                    if let (Some(keyboard), Value::Object(map)) = (&keyboard, &mut body) {
                        map.insert("reply_markup".to_string(), keyboard_markup(keyboard));
                    }
                    self.call("sendMessage", &body).await?;
                }
                OutboundAction::ReplyPhoto {
                    image,
                    caption,
                    keyboard,
                } => {
                    self.send_photo(conversation, image, caption, keyboard)
                        .await?;
                }
                OutboundAction::EditMessage { message_id, text } => {
                    let body = json!({
                        "chat_id": conversation.as_i64(),
                        "message_id": message_id.as_i64(),
                        "text": text,
                    });
                    self.call("editMessageText", &body).await?;
                }
                OutboundAction::DeleteMessage { message_id } => {
                    let body = json!({
                        "chat_id": conversation.as_i64(),
                        "message_id": message_id.as_i64(),
                    });
                    // Deleting an already-gone message is not worth failing
                    // the whole delivery.
                    if let Err(err) = self.call("deleteMessage", &body).await {
                        warn!(%err, "failed to delete message");
                    }
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Wire Mapping
// =============================================================================

/// Unwrap the Bot API envelope: `{"ok": true, "result": ...}`.
fn into_result(method: &'static str, payload: Value) -> Result<Value, TransportError> {
    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(payload.get("result").cloned().unwrap_or(Value::Null));
    }

    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("no description")
        .to_string();
    Err(TransportError::Api {
        method,
        description,
    })
}

/// Map one update to an inbound event.
///
/// Returns `None` for update types the bot does not consume (stickers,
/// edits, joins, ...).
fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(message) = update.get("message") {
        let text = message.get("text")?.as_str()?.to_string();
        let conversation_id = ConversationId::new(message.pointer("/chat/id")?.as_i64()?);
        let owner = OwnerId::new(message.pointer("/from/id")?.as_i64()?);
        return Some(InboundEvent {
            conversation_id,
            owner,
            kind: EventKind::Message(text),
        });
    }

    if let Some(callback) = update.get("callback_query") {
        let data = callback.get("data")?.as_str()?.to_string();
        let owner = OwnerId::new(callback.pointer("/from/id")?.as_i64()?);
        let conversation_id =
            ConversationId::new(callback.pointer("/message/chat/id")?.as_i64()?);
        let message_id = MessageId::new(callback.pointer("/message/message_id")?.as_i64()?);
        return Some(InboundEvent {
            conversation_id,
            owner,
            kind: EventKind::Callback { data, message_id },
        });
    }

    None
}

/// Render a keyboard as Telegram `InlineKeyboardMarkup`.
fn keyboard_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Value> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    json!({
                        "text": button.label,
                        "callback_data": button.data,
                    })
                })
                .collect()
        })
        .collect();

    json!({ "inline_keyboard": rows })
}
