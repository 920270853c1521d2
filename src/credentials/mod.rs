//! Credential bridge: identity session → temporary storage credentials.
//!
//! [`CredentialProvider`] is the single, explicitly shared holder of the
//! storage credential.  [`CredentialProvider::refresh`] records the
//! identity-pool login map for a new session; the actual exchange
//! (`GetId` + `GetCredentialsForIdentity`) happens lazily on the first
//! storage call that needs it, and is repeated when the credential nears
//! expiry.

pub mod cognito;
pub mod memory;

use metrics::counter;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::errors::{ClientError, ClientResult};
use crate::identity::Session;
use crate::metrics::{outcome, CREDENTIAL_EXCHANGES_TOTAL};

/// Credentials this close to expiry are exchanged again.
const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Identity-pool login map: provider name → id token.
pub type Logins = BTreeMap<String, String>;

/// Temporary credentials for direct object storage access.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Unix seconds; `None` never expires.
    pub expiration: Option<i64>,
    /// Identity-pool identity the credential belongs to.
    pub identity_id: String,
}

impl StorageCredential {
    /// Whether the credential expires within `margin` seconds of `now`.
    pub fn expires_within(&self, now: i64, margin: i64) -> bool {
        self.expiration.is_some_and(|exp| now + margin >= exp)
    }
}

impl fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .field("expiration", &self.expiration)
            .field("identity_id", &self.identity_id)
            .finish()
    }
}

/// Async identity-pool contract.
pub trait CredentialExchange: Send + Sync + 'static {
    /// Resolve (or create) the identity id for `logins`.
    fn get_id(&self, logins: &Logins)
        -> Pin<Box<dyn Future<Output = ClientResult<String>> + Send + '_>>;

    /// Obtain temporary credentials for `identity_id`.
    fn get_credentials(
        &self,
        identity_id: &str,
        logins: &Logins,
    ) -> Pin<Box<dyn Future<Output = ClientResult<StorageCredential>> + Send + '_>>;
}

#[derive(Default)]
struct BridgeState {
    /// Bumped on every refresh so stale exchanges do not overwrite newer ones.
    generation: u64,
    logins: Option<Logins>,
    identity_id: Option<String>,
    credential: Option<StorageCredential>,
}

struct Inner {
    exchange: Arc<dyn CredentialExchange>,
    login_provider: String,
    state: RwLock<BridgeState>,
}

/// Process-wide storage credential, shared by cloning.
#[derive(Clone)]
pub struct CredentialProvider {
    inner: Arc<Inner>,
}

impl CredentialProvider {
    /// `login_provider` is the key of the login map, e.g.
    /// `cognito-idp.eu-central-1.amazonaws.com/eu-central-1_AbCdEf123`.
    pub fn new(exchange: Arc<dyn CredentialExchange>, login_provider: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                exchange,
                login_provider: login_provider.into(),
                state: RwLock::new(BridgeState::default()),
            }),
        }
    }

    /// Point all later storage calls at `session`.
    ///
    /// Drops the cached credential and identity id; nothing is fetched
    /// until the next [`credential`](Self::credential) call.
    pub fn refresh(&self, session: &Session) {
        let mut logins = Logins::new();
        logins.insert(self.inner.login_provider.clone(), session.id_token.clone());

        let mut state = self.inner.state.write().expect("credential state poisoned");
        state.generation += 1;
        state.logins = Some(logins);
        state.identity_id = None;
        state.credential = None;
        info!(
            "Storage credentials reset for login provider {}",
            self.inner.login_provider
        );
    }

    /// The current credential, exchanging the login map first if needed.
    ///
    /// Fails with [`ClientError::NoCredential`] before the first
    /// [`refresh`](Self::refresh), and with the exchange's error when the
    /// identity pool rejects the session.
    pub async fn credential(&self) -> ClientResult<StorageCredential> {
        let (generation, logins, identity_id) = {
            let state = self.inner.state.read().expect("credential state poisoned");
            let logins = state.logins.clone().ok_or(ClientError::NoCredential)?;
            if let Some(credential) = &state.credential {
                if !credential.expires_within(crate::identity::unix_now(), REFRESH_MARGIN_SECONDS)
                {
                    return Ok(credential.clone());
                }
            }
            (state.generation, logins, state.identity_id.clone())
        };

        let result = self.exchange(&logins, identity_id).await;
        counter!(CREDENTIAL_EXCHANGES_TOTAL, "outcome" => outcome(&result)).increment(1);
        let credential = result?;

        let mut state = self.inner.state.write().expect("credential state poisoned");
        if state.generation == generation {
            state.identity_id = Some(credential.identity_id.clone());
            state.credential = Some(credential.clone());
        } else {
            debug!("Discarding credential exchanged for a superseded session");
        }
        Ok(credential)
    }

    async fn exchange(
        &self,
        logins: &Logins,
        identity_id: Option<String>,
    ) -> ClientResult<StorageCredential> {
        let identity_id = match identity_id {
            Some(id) => id,
            None => self.inner.exchange.get_id(logins).await?,
        };
        debug!("Exchanging login for storage credentials: identity={}", identity_id);
        self.inner
            .exchange
            .get_credentials(&identity_id, logins)
            .await
    }

    /// Identity id of the current session; uploads are keyed by it.
    pub async fn identity_id(&self) -> ClientResult<String> {
        Ok(self.credential().await?.identity_id)
    }

    /// The cached credential, without any exchange.  Used where a network
    /// round trip is not allowed (presigning).  An expired credential is
    /// not returned.
    pub fn cached(&self) -> Option<StorageCredential> {
        self.inner
            .state
            .read()
            .expect("credential state poisoned")
            .credential
            .clone()
            .filter(|credential| !credential.expires_within(crate::identity::unix_now(), 0))
    }

    /// Whether a session has been handed to [`refresh`](Self::refresh).
    pub fn is_configured(&self) -> bool {
        self.inner
            .state
            .read()
            .expect("credential state poisoned")
            .logins
            .is_some()
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::memory::MemoryExchange;
    use super::*;

    const PROVIDER: &str = "cognito-idp.eu-central-1.amazonaws.com/eu-central-1_pool";

    fn session(id_token: &str) -> Session {
        Session {
            id_token: id_token.to_string(),
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: i64::MAX,
        }
    }

    #[tokio::test]
    async fn test_credential_before_refresh_is_error() {
        let provider = CredentialProvider::new(Arc::new(MemoryExchange::new()), PROVIDER);
        assert!(!provider.is_configured());
        assert!(matches!(
            provider.credential().await,
            Err(ClientError::NoCredential)
        ));
        assert!(provider.cached().is_none());
    }

    #[tokio::test]
    async fn test_refresh_is_lazy_and_cached() {
        let exchange = Arc::new(MemoryExchange::new());
        let provider = CredentialProvider::new(exchange.clone(), PROVIDER);

        provider.refresh(&session("token-a"));
        assert!(provider.is_configured());
        assert_eq!(exchange.exchange_count(), 0);

        let first = provider.credential().await.unwrap();
        let second = provider.credential().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(exchange.exchange_count(), 1);
        assert_eq!(provider.cached(), Some(first));
    }

    #[tokio::test]
    async fn test_login_map_keyed_by_provider() {
        let exchange = Arc::new(MemoryExchange::new());
        let provider = CredentialProvider::new(exchange.clone(), PROVIDER);
        provider.refresh(&session("token-a"));
        provider.credential().await.unwrap();

        let logins = exchange.last_logins().unwrap();
        assert_eq!(logins.len(), 1);
        assert_eq!(logins.get(PROVIDER).map(String::as_str), Some("token-a"));
    }

    #[tokio::test]
    async fn test_refresh_replaces_credential() {
        let exchange = Arc::new(MemoryExchange::new());
        let provider = CredentialProvider::new(exchange.clone(), PROVIDER);

        provider.refresh(&session("token-a"));
        let first = provider.credential().await.unwrap();

        provider.refresh(&session("token-b"));
        assert!(provider.cached().is_none());
        let second = provider.credential().await.unwrap();
        assert_ne!(first.access_key_id, second.access_key_id);
        assert_eq!(exchange.exchange_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_session_fails_on_first_use() {
        let exchange = Arc::new(MemoryExchange::new());
        exchange.reject_token("bad-token");
        let provider = CredentialProvider::new(exchange, PROVIDER);

        provider.refresh(&session("bad-token"));
        let err = provider.credential().await.unwrap_err();
        assert_eq!(err.code(), "NotAuthorizedException");
        assert!(provider.cached().is_none());
    }

    #[tokio::test]
    async fn test_expiring_credential_is_exchanged_again() {
        let exchange = Arc::new(MemoryExchange::new());
        exchange.set_lifetime(REFRESH_MARGIN_SECONDS - 1);
        let provider = CredentialProvider::new(exchange.clone(), PROVIDER);

        provider.refresh(&session("token-a"));
        provider.credential().await.unwrap();
        provider.credential().await.unwrap();
        assert_eq!(exchange.exchange_count(), 2);
        assert_eq!(exchange.get_id_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_credential_is_not_cached() {
        let exchange = Arc::new(MemoryExchange::new());
        exchange.set_lifetime(-5);
        let provider = CredentialProvider::new(exchange, PROVIDER);

        provider.refresh(&session("token-a"));
        provider.credential().await.unwrap();
        assert!(provider.cached().is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = StorageCredential {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "super-secret".to_string(),
            session_token: Some("token".to_string()),
            expiration: None,
            identity_id: "id".to_string(),
        };
        let debug = format!("{credential:?}");
        assert!(debug.contains("ASIAEXAMPLE"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("\"token\""));
    }

    #[test]
    fn test_expires_within() {
        let mut credential = StorageCredential {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
            expiration: None,
            identity_id: String::new(),
        };
        assert!(!credential.expires_within(1_000, 60));
        credential.expiration = Some(1_050);
        assert!(credential.expires_within(1_000, 60));
        assert!(!credential.expires_within(900, 60));
    }
}
