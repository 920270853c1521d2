//! In-memory identity pool.
//!
//! Hands out a stable identity id per id token and a fresh, numbered
//! credential per exchange.  Tokens can be marked as rejected to exercise
//! failure paths.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{CredentialExchange, Logins, StorageCredential};
use crate::errors::{ClientError, ClientResult};
use crate::identity::unix_now;

/// In-process stand-in for a Cognito identity pool.
pub struct MemoryExchange {
    identities: Mutex<HashMap<String, String>>,
    rejected: Mutex<HashSet<String>>,
    last_logins: Mutex<Option<Logins>>,
    get_id_calls: AtomicUsize,
    exchanges: AtomicUsize,
    lifetime_seconds: AtomicI64,
}

impl Default for MemoryExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self {
            identities: Mutex::new(HashMap::new()),
            rejected: Mutex::new(HashSet::new()),
            last_logins: Mutex::new(None),
            get_id_calls: AtomicUsize::new(0),
            exchanges: AtomicUsize::new(0),
            lifetime_seconds: AtomicI64::new(3600),
        }
    }

    /// Refuse any login map containing `token`.
    pub fn reject_token(&self, token: &str) {
        self.rejected
            .lock()
            .expect("rejected set poisoned")
            .insert(token.to_string());
    }

    /// Lifetime of credentials issued from now on.
    pub fn set_lifetime(&self, seconds: i64) {
        self.lifetime_seconds.store(seconds, Ordering::SeqCst);
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn get_id_count(&self) -> usize {
        self.get_id_calls.load(Ordering::SeqCst)
    }

    pub fn last_logins(&self) -> Option<Logins> {
        self.last_logins.lock().expect("logins poisoned").clone()
    }

    fn check(&self, logins: &Logins) -> ClientResult<()> {
        *self.last_logins.lock().expect("logins poisoned") = Some(logins.clone());
        let rejected = self.rejected.lock().expect("rejected set poisoned");
        if logins.is_empty() || logins.values().any(|token| rejected.contains(token)) {
            return Err(ClientError::provider(
                "NotAuthorizedException",
                "Invalid login token.",
            ));
        }
        Ok(())
    }
}

impl CredentialExchange for MemoryExchange {
    fn get_id(
        &self,
        logins: &Logins,
    ) -> Pin<Box<dyn Future<Output = ClientResult<String>> + Send + '_>> {
        let logins = logins.clone();
        Box::pin(async move {
            self.check(&logins)?;
            self.get_id_calls.fetch_add(1, Ordering::SeqCst);
            let key = logins.values().cloned().collect::<Vec<_>>().join("|");
            let mut identities = self.identities.lock().expect("identities poisoned");
            let id = identities
                .entry(key)
                .or_insert_with(|| format!("local:{}", uuid::Uuid::new_v4()))
                .clone();
            Ok(id)
        })
    }

    fn get_credentials(
        &self,
        identity_id: &str,
        logins: &Logins,
    ) -> Pin<Box<dyn Future<Output = ClientResult<StorageCredential>> + Send + '_>> {
        let identity_id = identity_id.to_string();
        let logins = logins.clone();
        Box::pin(async move {
            self.check(&logins)?;
            let serial = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(StorageCredential {
                access_key_id: format!("ASIALOCAL{serial:08}"),
                secret_access_key: format!("local-secret-{serial}"),
                session_token: Some(format!("local-session-{serial}")),
                expiration: Some(unix_now() + self.lifetime_seconds.load(Ordering::SeqCst)),
                identity_id,
            })
        })
    }
}
