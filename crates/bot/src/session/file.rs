//! File-backed session store.
//!
//! One JSON file per conversation under a base directory. Writes go to a
//! temporary file first and are renamed into place, so a crash mid-write
//! never leaves a torn record; the rename also gives the single-key atomic
//! replace the store contract requires.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use pondmarket_core::ConversationId;
use tokio::fs;
use tracing::debug;

use super::{Session, SessionStore, SessionStoreError, StoredSession};

/// Session store writing one `{conversation_id}.json` per conversation.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "session store opened");
        Ok(Self { dir })
    }

    fn path_for(&self, id: ConversationId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: ConversationId) -> Result<Option<Session>, SessionStoreError> {
        let path = self.path_for(id);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let stored: StoredSession =
            serde_json::from_str(&raw).map_err(|err| SessionStoreError::Corrupt {
                conversation: id,
                reason: format!("unreadable record: {err}"),
            })?;

        stored.into_session(id).map(Some)
    }

    async fn set(&self, session: &Session) -> Result<(), SessionStoreError> {
        let stored = StoredSession::from_session(session);
        let body = serde_json::to_vec_pretty(&stored)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let path = self.path_for(session.conversation_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
