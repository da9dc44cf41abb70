//! Session store backed by a single JSON file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{NewSession, SessionBook, StoredSession};
use crate::common::UserId;
use crate::kernel::BaseSessionStore;

pub const SESSIONS_FILE: &str = "sessions.json";

/// Keeps every session in memory and rewrites `sessions.json` on each save.
///
/// The file is replaced atomically (write to a sibling temp file, then
/// rename), so a crash mid-write leaves the previous contents intact.
pub struct JsonFileSessionStore {
    path: PathBuf,
    book: Mutex<SessionBook>,
}

impl JsonFileSessionStore {
    /// Open (or create) the store inside `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create session directory {}", dir.display()))?;

        let path = dir.join(SESSIONS_FILE);
        let book = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => SessionBook::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => SessionBook::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        info!(path = %path.display(), sessions = book.len(), "Session store opened");
        Ok(Self {
            path,
            book: Mutex::new(book),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, book: &SessionBook) -> Result<()> {
        let json = serde_json::to_vec_pretty(book).context("Failed to serialize sessions")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl BaseSessionStore for JsonFileSessionStore {
    async fn save(&self, session: NewSession) -> Result<StoredSession> {
        let mut book = self.book.lock().await;

        // Only commit to memory once the file has the new contents.
        let mut next = book.clone();
        let stored = next.upsert(session, Utc::now());
        self.write(&next).await?;
        *book = next;

        debug!(session_id = %stored.id, owner_id = %stored.owner_id, "Session written");
        Ok(stored)
    }

    async fn list(&self, owner: Option<UserId>) -> Result<Vec<StoredSession>> {
        Ok(self.book.lock().await.list(owner))
    }

    async fn get(&self, id: &str) -> Result<Option<StoredSession>> {
        Ok(self.book.lock().await.get(id).cloned())
    }
}
