//! In-memory session store.
//!
//! Used in tests and for ephemeral runs where durability across restarts is
//! not needed. Stores the same string-keyed record as the file store so
//! corruption handling can be exercised without touching disk.

use std::collections::HashMap;

use async_trait::async_trait;
use pondmarket_core::ConversationId;
use tokio::sync::RwLock;

use super::{Session, SessionContext, SessionStore, SessionStoreError, StoredSession};

/// Session store backed by a `HashMap`.
#[derive(Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<ConversationId, StoredSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw state string, bypassing validation.
    ///
    /// Test hook: lets corruption-recovery paths be exercised by planting a
    /// record that no current code would write.
    pub async fn insert_raw_state(&self, id: ConversationId, state: &str) {
        self.records.write().await.insert(
            id,
            StoredSession {
                state: state.to_string(),
                context: SessionContext::default(),
            },
        );
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: ConversationId) -> Result<Option<Session>, SessionStoreError> {
        let records = self.records.read().await;
        records
            .get(&id)
            .cloned()
            .map(|stored| stored.into_session(id))
            .transpose()
    }

    async fn set(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.records
            .write()
            .await
            .insert(session.conversation_id, StoredSession::from_session(session));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pondmarket_core::ChatState;

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get(ConversationId::new(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemorySessionStore::new();
        let mut session = Session::new(ConversationId::new(1));
        session.state = ChatState::Browsing;

        store.set(&session).await.unwrap();
        assert_eq!(
            store.get(ConversationId::new(1)).await.unwrap(),
            Some(session)
        );
    }

    #[tokio::test]
    async fn test_raw_state_corruption_surfaces() {
        let store = MemorySessionStore::new();
        store
            .insert_raw_state(ConversationId::new(9), "NOT_A_STATE")
            .await;

        let err = store.get(ConversationId::new(9)).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::Corrupt { .. }));
    }
}
