//! In-memory identity provider.
//!
//! Behaves like a user pool with e-mail sign-up and code confirmation:
//! accounts must be confirmed before they can log in, tokens are real
//! HS256 JWTs carrying `sub`, `email`, `iss` and `exp`, and refresh
//! tokens can be revoked.  Used by the offline mode and by tests.

use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::info;

use super::token::IdClaims;
use super::{unix_now, AuthTokens, IdentityProvider, SignUpOutcome, UserAttribute};
use crate::errors::{ClientError, ClientResult};

/// Lifetime of issued id/access tokens.
const TOKEN_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    sub: String,
    password: String,
    confirmation_code: String,
    confirmed: bool,
    attributes: Vec<UserAttribute>,
}

#[derive(Default)]
struct PoolState {
    /// email -> account
    accounts: HashMap<String, Account>,
    /// access token -> email
    access_tokens: HashMap<String, String>,
    /// refresh token -> email
    refresh_tokens: HashMap<String, String>,
    refresh_calls: u64,
}

/// In-process user pool.
pub struct MemoryIdentityProvider {
    issuer: String,
    signing_key: Vec<u8>,
    state: tokio::sync::RwLock<PoolState>,
}

impl MemoryIdentityProvider {
    /// Create an empty pool whose tokens carry `issuer` as `iss`.
    pub fn new(issuer: impl Into<String>) -> Self {
        let signing_key: [u8; 32] = rand::random();
        Self {
            issuer: issuer.into(),
            signing_key: signing_key.to_vec(),
            state: tokio::sync::RwLock::new(PoolState::default()),
        }
    }

    /// The confirmation code that would have been e-mailed to `email`.
    pub async fn pending_code(&self, email: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .accounts
            .get(email)
            .filter(|account| !account.confirmed)
            .map(|account| account.confirmation_code.clone())
    }

    /// Number of `REFRESH_TOKEN_AUTH` calls served, successful or not.
    pub async fn refresh_calls(&self) -> u64 {
        self.state.read().await.refresh_calls
    }

    /// Invalidate every refresh token issued so far.
    pub async fn revoke_refresh_tokens(&self) {
        self.state.write().await.refresh_tokens.clear();
    }

    fn sign(&self, claims: &IdClaims) -> ClientResult<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| ClientError::Internal(e.into()))
    }

    /// Issue a fresh token pair for `email`, optionally with a refresh token.
    fn issue(
        &self,
        state: &mut PoolState,
        email: &str,
        with_refresh: bool,
    ) -> ClientResult<AuthTokens> {
        let account = state
            .accounts
            .get(email)
            .ok_or_else(|| ClientError::provider("UserNotFoundException", "User does not exist."))?;
        let exp = unix_now() + TOKEN_TTL_SECONDS;

        let id_token = self.sign(&IdClaims {
            sub: account.sub.clone(),
            email: Some(email.to_string()),
            iss: Some(self.issuer.clone()),
            exp,
            token_use: Some("id".to_string()),
        })?;
        let access_token = self.sign(&IdClaims {
            sub: account.sub.clone(),
            email: None,
            iss: Some(self.issuer.clone()),
            exp,
            token_use: Some("access".to_string()),
        })?;

        state
            .access_tokens
            .insert(access_token.clone(), email.to_string());
        let refresh_token = if with_refresh {
            let token = uuid::Uuid::new_v4().to_string();
            state.refresh_tokens.insert(token.clone(), email.to_string());
            Some(token)
        } else {
            None
        };

        Ok(AuthTokens {
            id_token,
            access_token,
            refresh_token,
            expires_in: TOKEN_TTL_SECONDS,
        })
    }
}

fn not_authorized() -> ClientError {
    ClientError::provider("NotAuthorizedException", "Incorrect username or password.")
}

impl IdentityProvider for MemoryIdentityProvider {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &[UserAttribute],
    ) -> Pin<Box<dyn Future<Output = ClientResult<SignUpOutcome>> + Send + '_>> {
        let email = email.to_string();
        let password = password.to_string();
        let attributes = attributes.to_vec();
        Box::pin(async move {
            if password.len() < 6 {
                return Err(ClientError::provider(
                    "InvalidPasswordException",
                    "Password did not conform with policy: Password not long enough",
                ));
            }

            let mut state = self.state.write().await;
            if state.accounts.contains_key(&email) {
                return Err(ClientError::provider(
                    "UsernameExistsException",
                    "An account with the given email already exists.",
                ));
            }

            let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
            let sub = uuid::Uuid::new_v4().to_string();
            let mut all_attributes = vec![
                UserAttribute::new("sub", sub.clone()),
                UserAttribute::new("email", email.clone()),
            ];
            all_attributes.extend(attributes);

            info!("Confirmation code for {}: {}", email, code);
            state.accounts.insert(
                email.clone(),
                Account {
                    sub: sub.clone(),
                    password,
                    confirmation_code: code,
                    confirmed: false,
                    attributes: all_attributes,
                },
            );

            Ok(SignUpOutcome {
                user_sub: sub,
                user_confirmed: false,
                code_destination: Some(email),
            })
        })
    }

    fn confirm_sign_up(
        &self,
        email: &str,
        code: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>> {
        let email = email.to_string();
        let code = code.to_string();
        Box::pin(async move {
            let mut state = self.state.write().await;
            let account = state.accounts.get_mut(&email).ok_or_else(|| {
                ClientError::provider("UserNotFoundException", "Username/client id combination not found.")
            })?;
            if account.confirmed {
                return Err(ClientError::provider(
                    "NotAuthorizedException",
                    "User cannot be confirmed. Current status is CONFIRMED",
                ));
            }
            if account.confirmation_code != code {
                return Err(ClientError::provider(
                    "CodeMismatchException",
                    "Invalid verification code provided, please try again.",
                ));
            }
            account.confirmed = true;
            Ok(())
        })
    }

    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<AuthTokens>> + Send + '_>> {
        let email = email.to_string();
        let password = password.to_string();
        Box::pin(async move {
            let mut state = self.state.write().await;
            let account = state.accounts.get(&email).ok_or_else(not_authorized)?;
            if account.password != password {
                return Err(not_authorized());
            }
            if !account.confirmed {
                return Err(ClientError::provider(
                    "UserNotConfirmedException",
                    "User is not confirmed.",
                ));
            }
            self.issue(&mut state, &email, true)
        })
    }

    fn refresh(
        &self,
        refresh_token: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<AuthTokens>> + Send + '_>> {
        let refresh_token = refresh_token.to_string();
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.refresh_calls += 1;
            let email = state
                .refresh_tokens
                .get(&refresh_token)
                .cloned()
                .ok_or_else(|| {
                    ClientError::provider("NotAuthorizedException", "Invalid Refresh Token")
                })?;
            self.issue(&mut state, &email, false)
        })
    }

    fn get_user_attributes(
        &self,
        access_token: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<UserAttribute>>> + Send + '_>> {
        let access_token = access_token.to_string();
        Box::pin(async move {
            let state = self.state.read().await;
            let invalid =
                || ClientError::provider("NotAuthorizedException", "Invalid Access Token");
            let email = state.access_tokens.get(&access_token).ok_or_else(invalid)?;
            let account = state.accounts.get(email).ok_or_else(invalid)?;
            Ok(account.attributes.clone())
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::token::decode_id_claims;

    const ISSUER: &str = "https://cognito-idp.local/pool";

    async fn registered(pool: &MemoryIdentityProvider) -> String {
        pool.sign_up(
            "ala@example.com",
            "1234qwer",
            &[UserAttribute::new("website", "example.com")],
        )
        .await
        .unwrap();
        pool.pending_code("ala@example.com").await.unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_then_confirm_then_login() {
        let pool = MemoryIdentityProvider::new(ISSUER);
        let code = registered(&pool).await;
        assert_eq!(code.len(), 6);
        pool.confirm_sign_up("ala@example.com", &code).await.unwrap();
        assert!(pool.pending_code("ala@example.com").await.is_none());

        let tokens = pool.authenticate("ala@example.com", "1234qwer").await.unwrap();
        let claims = decode_id_claims(&tokens.id_token).unwrap();
        assert_eq!(claims.email.as_deref(), Some("ala@example.com"));
        assert_eq!(claims.iss.as_deref(), Some(ISSUER));
        assert!(tokens.refresh_token.is_some());
    }

    #[tokio::test]
    async fn test_login_before_confirmation_fails() {
        let pool = MemoryIdentityProvider::new(ISSUER);
        registered(&pool).await;
        let err = pool
            .authenticate("ala@example.com", "1234qwer")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UserNotConfirmedException");
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_rejected() {
        let pool = MemoryIdentityProvider::new(ISSUER);
        registered(&pool).await;
        let err = pool
            .sign_up("ala@example.com", "1234qwer", &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UsernameExistsException");
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let pool = MemoryIdentityProvider::new(ISSUER);
        let err = pool.sign_up("x@example.com", "123", &[]).await.unwrap_err();
        assert_eq!(err.code(), "InvalidPasswordException");
    }

    #[tokio::test]
    async fn test_wrong_code_rejected() {
        let pool = MemoryIdentityProvider::new(ISSUER);
        let code = registered(&pool).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };
        let err = pool
            .confirm_sign_up("ala@example.com", wrong)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CodeMismatchException");
    }

    #[tokio::test]
    async fn test_attributes_include_email_and_custom() {
        let pool = MemoryIdentityProvider::new(ISSUER);
        let code = registered(&pool).await;
        pool.confirm_sign_up("ala@example.com", &code).await.unwrap();
        let tokens = pool.authenticate("ala@example.com", "1234qwer").await.unwrap();
        let attrs = pool.get_user_attributes(&tokens.access_token).await.unwrap();
        assert!(attrs.contains(&UserAttribute::new("email", "ala@example.com")));
        assert!(attrs.contains(&UserAttribute::new("website", "example.com")));
        assert!(pool.get_user_attributes("bogus").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_and_revoke() {
        let pool = MemoryIdentityProvider::new(ISSUER);
        let code = registered(&pool).await;
        pool.confirm_sign_up("ala@example.com", &code).await.unwrap();
        let tokens = pool.authenticate("ala@example.com", "1234qwer").await.unwrap();
        let refresh = tokens.refresh_token.unwrap();

        let renewed = pool.refresh(&refresh).await.unwrap();
        assert!(renewed.refresh_token.is_none());

        pool.revoke_refresh_tokens().await;
        assert!(pool.refresh(&refresh).await.is_err());
        assert_eq!(pool.refresh_calls().await, 2);
    }
}
