//! Persistence of the last authenticated session.
//!
//! A login writes the session here so a later run can restore it
//! silently.  [`FileSessionStore`] keeps it as a JSON file;
//! [`MemorySessionStore`] keeps it for the life of the process.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tracing::debug;

use super::Session;
use crate::errors::{ClientError, ClientResult};

/// Async session persistence contract.
pub trait SessionStore: Send + Sync + 'static {
    /// Return the saved session, or `None` if nobody is logged in.
    fn load(&self) -> Pin<Box<dyn Future<Output = ClientResult<Option<Session>>> + Send + '_>>;

    /// Replace the saved session.
    fn save(&self, session: &Session)
        -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>>;

    /// Forget the saved session.  Idempotent.
    fn clear(&self) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>>;
}

/// Session kept in a JSON file.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> ClientError {
    ClientError::Internal(anyhow::anyhow!("session store {context}: {err}"))
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = ClientResult<Option<Session>>> + Send + '_>> {
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(io_error("read", e)),
            };
            // A corrupt file is treated like no session at all.
            match serde_json::from_str(&contents) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    debug!("Ignoring unreadable session file {}: {}", self.path.display(), e);
                    Ok(None)
                }
            }
        })
    }

    fn save(
        &self,
        session: &Session,
    ) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>> {
        let session = session.clone();
        Box::pin(async move {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| io_error("create dir", e))?;
                }
            }
            let json = serde_json::to_vec_pretty(&session).map_err(|e| io_error("encode", e))?;
            // Readers only ever see a complete file.
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, json)
                .await
                .map_err(|e| io_error("write", e))?;
            tokio::fs::rename(&tmp, &self.path)
                .await
                .map_err(|e| io_error("rename", e))?;
            debug!("Session saved to {}", self.path.display());
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>> {
        Box::pin(async move {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error("remove", e)),
            }
        })
    }
}

/// Session kept in memory.
#[derive(Default)]
pub struct MemorySessionStore {
    session: tokio::sync::RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = ClientResult<Option<Session>>> + Send + '_>> {
        Box::pin(async move { Ok(self.session.read().await.clone()) })
    }

    fn save(
        &self,
        session: &Session,
    ) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>> {
        let session = session.clone();
        Box::pin(async move {
            *self.session.write().await = Some(session);
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>> {
        Box::pin(async move {
            *self.session.write().await = None;
            Ok(())
        })
    }
}
