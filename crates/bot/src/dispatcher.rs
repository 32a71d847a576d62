//! Event dispatch loop.
//!
//! Bridges the chat transport and the engine: polls for inbound events and
//! spawns one worker task per event, so slow remote calls in one
//! conversation never block another. Per-conversation ordering is enforced
//! inside the engine, not here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::engine::events::{InboundEvent, OutboundAction};
use crate::transport::ChatTransport;

/// Pause before re-polling after a transport failure.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

const SERVICE_UNAVAILABLE: &str =
    "The shop is temporarily unavailable. Please try again in a moment.";

/// Run the dispatch loop forever.
///
/// Transport poll failures are logged and retried after a short delay;
/// nothing in here is process-fatal.
pub async fn run(engine: Engine, transport: Arc<dyn ChatTransport>) {
    info!("dispatcher started");

    loop {
        let events = match transport.poll_events().await {
            Ok(events) => events,
            Err(err) => {
                warn!(%err, "event poll failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for event in events {
            let engine = engine.clone();
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                handle_one(&engine, transport.as_ref(), event).await;
            });
        }
    }
}

async fn handle_one(engine: &Engine, transport: &dyn ChatTransport, event: InboundEvent) {
    let conversation = event.conversation_id;

    let actions = match engine.handle_event(&event).await {
        Ok(actions) => actions,
        Err(err) => {
            // The session state was not advanced, so the user can simply
            // retry the same action.
            error!(%err, %conversation, "event handling failed");
            vec![OutboundAction::ReplyText {
                text: SERVICE_UNAVAILABLE.to_string(),
                keyboard: None,
            }]
        }
    };

    if actions.is_empty() {
        return;
    }

    if let Err(err) = transport.deliver(conversation, actions).await {
        warn!(%err, %conversation, "failed to deliver outbound actions");
    }
}
