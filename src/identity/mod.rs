//! Identity provider access.
//!
//! The [`IdentityProvider`] trait is the contract with the user pool:
//! sign-up, confirmation, password login, refresh, and attribute lookup.
//! [`client::IdentityClient`] layers session persistence on top of it.

pub mod client;
pub mod cognito;
pub mod memory;
pub mod session_store;
pub mod token;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::errors::{ClientError, ClientResult};

pub use client::IdentityClient;

/// Sessions this close to expiry are treated as expired.
pub const EXPIRY_MARGIN_SECONDS: i64 = 60;

/// A single `{Name, Value}` user attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttribute {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Outcome of a sign-up: the account exists but usually awaits a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    /// Provider-assigned subject id.
    pub user_sub: String,
    /// True when the pool auto-confirmed the account.
    pub user_confirmed: bool,
    /// Where the confirmation code went (masked e-mail, phone, ...).
    pub code_destination: Option<String>,
}

/// Raw tokens returned by a password or refresh login.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub id_token: String,
    pub access_token: String,
    /// Absent on refresh responses; the old one stays valid.
    pub refresh_token: Option<String>,
    /// Lifetime of the access and id tokens in seconds.
    pub expires_in: i64,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// JWT identifying the user; sent to the submission API and exchanged
    /// for storage credentials.
    pub id_token: String,
    /// JWT authorizing user-pool calls such as attribute lookup.
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds after which the tokens are no longer accepted.
    pub expires_at: i64,
}

impl Session {
    /// Build a session from freshly issued tokens.
    ///
    /// The expiry comes from the id token's `exp` claim when it can be
    /// read, otherwise from `expires_in`.
    pub fn from_tokens(tokens: AuthTokens, now: i64) -> Self {
        let expires_at = token::decode_id_claims(&tokens.id_token)
            .map(|claims| claims.exp)
            .unwrap_or(now + tokens.expires_in);
        Self {
            id_token: tokens.id_token,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at,
        }
    }

    /// Whether the tokens are still usable at `now`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        now + EXPIRY_MARGIN_SECONDS < self.expires_at
    }
}

/// User attributes keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile(BTreeMap<String, String>);

impl UserProfile {
    pub fn from_attributes(attributes: impl IntoIterator<Item = UserAttribute>) -> Self {
        Self(
            attributes
                .into_iter()
                .map(|attr| (attr.name, attr.value))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.get("email")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Async user pool contract.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Create an account for `email`.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &[UserAttribute],
    ) -> Pin<Box<dyn Future<Output = ClientResult<SignUpOutcome>> + Send + '_>>;

    /// Confirm an account with the code delivered after sign-up.
    fn confirm_sign_up(
        &self,
        email: &str,
        code: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>>;

    /// Exchange a password for tokens.
    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<AuthTokens>> + Send + '_>>;

    /// Exchange a refresh token for new id and access tokens.
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<AuthTokens>> + Send + '_>>;

    /// Fetch the attributes of the user owning `access_token`.
    fn get_user_attributes(
        &self,
        access_token: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<UserAttribute>>> + Send + '_>>;
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) fn missing_field(operation: &str, field: &str) -> ClientError {
    ClientError::provider(
        "InvalidResponse",
        format!("{operation} response is missing {field}"),
    )
}
