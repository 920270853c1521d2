//! Identity client: the session lifecycle on top of an identity provider.
//!
//! Login persists the session; every later operation that needs tokens
//! goes through [`IdentityClient::load_saved_session`], which refreshes
//! an expired session with its refresh token before handing it out.

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info};

use super::session_store::SessionStore;
use super::{unix_now, IdentityProvider, Session, SignUpOutcome, UserAttribute, UserProfile};
use crate::errors::{ClientError, ClientResult};
use crate::metrics::{outcome, IDENTITY_OPERATIONS_TOTAL};

/// Sign-up, confirmation, login and session access for one user pool.
#[derive(Clone)]
pub struct IdentityClient {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
}

impl IdentityClient {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn SessionStore>) -> Self {
        Self { provider, store }
    }

    /// Create an account; it stays unconfirmed until [`confirm`](Self::confirm).
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        attributes: &[UserAttribute],
    ) -> ClientResult<SignUpOutcome> {
        let result = self.provider.sign_up(email, password, attributes).await;
        record("register", &result);
        let outcome = result?;
        info!(
            "Registered {} (sub={}, confirmed={})",
            email, outcome.user_sub, outcome.user_confirmed
        );
        Ok(outcome)
    }

    /// Confirm an account with its delivered code.
    pub async fn confirm(&self, email: &str, code: &str) -> ClientResult<()> {
        let result = self.provider.confirm_sign_up(email, code).await;
        record("confirm", &result);
        result?;
        info!("Confirmed {}", email);
        Ok(())
    }

    /// Log in with a password and persist the resulting session.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let result = self.provider.authenticate(email, password).await;
        record("login", &result);
        let session = Session::from_tokens(result?, unix_now());
        self.store.save(&session).await?;
        info!("Logged in {}", email);
        Ok(session)
    }

    /// Restore the persisted session, refreshing it if it has expired.
    ///
    /// Fails with [`ClientError::NoSession`] when nothing is persisted or
    /// an expired session has no refresh token.
    pub async fn load_saved_session(&self) -> ClientResult<Session> {
        let session = self.store.load().await?.ok_or(ClientError::NoSession)?;
        let now = unix_now();
        if session.is_valid_at(now) {
            return Ok(session);
        }

        let refresh_token = session.refresh_token.clone().ok_or(ClientError::NoSession)?;
        debug!("Saved session expired at {}, refreshing", session.expires_at);
        let result = self.provider.refresh(&refresh_token).await;
        record("refresh", &result);

        let mut renewed = Session::from_tokens(result?, now);
        if renewed.refresh_token.is_none() {
            renewed.refresh_token = Some(refresh_token);
        }
        self.store.save(&renewed).await?;
        Ok(renewed)
    }

    /// The id token of the current session, for the submission API.
    pub async fn get_access_token(&self) -> ClientResult<String> {
        Ok(self.load_saved_session().await?.id_token)
    }

    /// Attributes of the logged-in user.
    pub async fn get_current_user_profile(&self) -> ClientResult<UserProfile> {
        let session = self.load_saved_session().await?;
        self.profile_of(&session).await
    }

    /// Attributes of the user owning `session`, which must be current.
    pub async fn profile_of(&self, session: &Session) -> ClientResult<UserProfile> {
        let result = self.provider.get_user_attributes(&session.access_token).await;
        record("profile", &result);
        Ok(UserProfile::from_attributes(result?))
    }

    /// Forget the persisted session.
    pub async fn logout(&self) -> ClientResult<()> {
        self.store.clear().await
    }
}

fn record<T>(operation: &'static str, result: &ClientResult<T>) {
    counter!(
        IDENTITY_OPERATIONS_TOTAL,
        "operation" => operation,
        "outcome" => outcome(result)
    )
    .increment(1);
}

// -- Tests -------------------------------------------------------------------
