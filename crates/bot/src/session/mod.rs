//! Durable per-conversation session state.
//!
//! A session maps a conversation id to the current [`ChatState`] plus a
//! small context payload (the last-selected product). Persistence sits
//! behind the [`SessionStore`] trait: single-key atomic read/write, no
//! cross-key transactions.
//!
//! Sessions are created on the first inbound event for a conversation and
//! never deleted here; retention is an external concern.

mod file;
mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

use std::str::FromStr;

use async_trait::async_trait;
use pondmarket_core::{ChatState, ConversationId, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from session persistence.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Underlying storage failure.
    #[error("session storage failure: {0}")]
    Io(#[from] std::io::Error),

    /// Stored state is not a member of the known enumeration.
    ///
    /// Never silently accepted: the engine logs this, resets the session to
    /// the initial state, and re-prompts the user.
    #[error("corrupt session record for conversation {conversation}: {reason}")]
    Corrupt {
        conversation: ConversationId,
        reason: String,
    },
}

/// Small structured payload carried alongside the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionContext {
    /// Product currently shown in the detail view, if any.
    pub last_product: Option<ProductId>,
}

/// One conversation's persisted interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub conversation_id: ConversationId,
    pub state: ChatState,
    pub context: SessionContext,
}

impl Session {
    /// A fresh session in the initial state.
    #[must_use]
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            state: ChatState::default(),
            context: SessionContext::default(),
        }
    }
}

/// On-disk / in-store representation: the state as its stable string name
/// plus the serialized context.
///
/// The state is kept as a plain string so an unknown value surfaces as an
/// explicit [`SessionStoreError::Corrupt`] instead of a generic decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) context: SessionContext,
}

impl StoredSession {
    pub(crate) fn from_session(session: &Session) -> Self {
        Self {
            state: session.state.as_str().to_string(),
            context: session.context,
        }
    }

    pub(crate) fn into_session(
        self,
        conversation_id: ConversationId,
    ) -> Result<Session, SessionStoreError> {
        let state = ChatState::from_str(&self.state).map_err(|err| {
            SessionStoreError::Corrupt {
                conversation: conversation_id,
                reason: err.to_string(),
            }
        })?;

        Ok(Session {
            conversation_id,
            state,
            context: self.context,
        })
    }
}

/// Durable mapping from conversation id to session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session for a conversation, if one has been persisted.
    async fn get(&self, id: ConversationId) -> Result<Option<Session>, SessionStoreError>;

    /// Persist the session, replacing any previous value atomically.
    async fn set(&self, session: &Session) -> Result<(), SessionStoreError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_session_roundtrip() {
        let conversation = ConversationId::new(42);
        let mut session = Session::new(conversation);
        session.state = ChatState::ProductDetail;
        session.context.last_product = Some(ProductId::new(7));

        let stored = StoredSession::from_session(&session);
        assert_eq!(stored.state, "PRODUCT_DETAIL");

        let back = stored.into_session(conversation).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_unknown_state_surfaces_as_corrupt() {
        let stored = StoredSession {
            state: "HANDLE_MENU".to_string(),
            context: SessionContext::default(),
        };

        let err = stored.into_session(ConversationId::new(1)).unwrap_err();
        assert!(matches!(
            err,
            SessionStoreError::Corrupt { conversation, .. }
                if conversation == ConversationId::new(1)
        ));
    }
}
