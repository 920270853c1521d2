//! Cognito user pool identity provider.
//!
//! Talks to the `AWSCognitoIdentityProviderService` JSON API with
//! `reqwest`.  All calls used here are public (unsigned) user-pool
//! operations keyed by the app client id.
//!
//! Password login uses the `USER_PASSWORD_AUTH` flow, which must be
//! enabled on the app client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use super::{missing_field, AuthTokens, IdentityProvider, SignUpOutcome, UserAttribute};
use crate::aws_json;
use crate::errors::{ClientError, ClientResult};

const SERVICE: &str = "AWSCognitoIdentityProviderService";

// -- Cognito JSON API request/response types -----------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    user_attributes: &'a [UserAttribute],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    #[serde(default)]
    user_confirmed: bool,
    user_sub: Option<String>,
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryDetails {
    destination: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmSignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
    force_alias_creation: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserRequest<'a> {
    access_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    #[serde(default)]
    user_attributes: Vec<UserAttribute>,
}

/// Identity provider backed by a Cognito user pool.
pub struct CognitoIdentityProvider {
    /// HTTP client for Cognito JSON API calls.
    http: reqwest::Client,
    /// User pool endpoint, e.g. `https://cognito-idp.eu-central-1.amazonaws.com/`.
    endpoint: String,
    /// App client id of the user pool.
    client_id: String,
}

impl CognitoIdentityProvider {
    pub fn new(http: reqwest::Client, endpoint: String, client_id: String) -> Self {
        info!("Cognito identity provider initialized: endpoint={}", endpoint);
        Self {
            http,
            endpoint,
            client_id,
        }
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: BTreeMap<&str, &str>,
    ) -> ClientResult<AuthTokens> {
        let request = InitiateAuthRequest {
            auth_flow: flow,
            client_id: &self.client_id,
            auth_parameters: parameters,
        };
        let resp: InitiateAuthResponse =
            aws_json::call(&self.http, &self.endpoint, SERVICE, "InitiateAuth", &request).await?;

        if let Some(challenge) = resp.challenge_name {
            return Err(ClientError::provider(
                "ChallengeRequired",
                format!("sign-in requires the {challenge} challenge"),
            ));
        }

        let result = resp
            .authentication_result
            .ok_or_else(|| missing_field("InitiateAuth", "AuthenticationResult"))?;
        Ok(AuthTokens {
            id_token: result
                .id_token
                .ok_or_else(|| missing_field("InitiateAuth", "IdToken"))?,
            access_token: result
                .access_token
                .ok_or_else(|| missing_field("InitiateAuth", "AccessToken"))?,
            refresh_token: result.refresh_token,
            expires_in: result.expires_in,
        })
    }
}

impl IdentityProvider for CognitoIdentityProvider {
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
            debug!("Cognito SignUp: username={}", email);
            let request = SignUpRequest {
                client_id: &self.client_id,
                username: &email,
                password: &password,
                user_attributes: &attributes,
            };
            let resp: SignUpResponse =
                aws_json::call(&self.http, &self.endpoint, SERVICE, "SignUp", &request).await?;
            Ok(SignUpOutcome {
                user_sub: resp
                    .user_sub
                    .ok_or_else(|| missing_field("SignUp", "UserSub"))?,
                user_confirmed: resp.user_confirmed,
                code_destination: resp.code_delivery_details.and_then(|d| d.destination),
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
            debug!("Cognito ConfirmSignUp: username={}", email);
            let request = ConfirmSignUpRequest {
                client_id: &self.client_id,
                username: &email,
                confirmation_code: &code,
                force_alias_creation: true,
            };
            let _: serde::de::IgnoredAny =
                aws_json::call(&self.http, &self.endpoint, SERVICE, "ConfirmSignUp", &request)
                    .await?;
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
            debug!("Cognito InitiateAuth USER_PASSWORD_AUTH: username={}", email);
            let parameters = BTreeMap::from([
                ("USERNAME", email.as_str()),
                ("PASSWORD", password.as_str()),
            ]);
            self.initiate_auth("USER_PASSWORD_AUTH", parameters).await
        })
    }

    fn refresh(
        &self,
        refresh_token: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<AuthTokens>> + Send + '_>> {
        let refresh_token = refresh_token.to_string();
        Box::pin(async move {
            debug!("Cognito InitiateAuth REFRESH_TOKEN_AUTH");
            let parameters = BTreeMap::from([("REFRESH_TOKEN", refresh_token.as_str())]);
            self.initiate_auth("REFRESH_TOKEN_AUTH", parameters).await
        })
    }

    fn get_user_attributes(
        &self,
        access_token: &str,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<UserAttribute>>> + Send + '_>> {
        let access_token = access_token.to_string();
        Box::pin(async move {
            debug!("Cognito GetUser");
            let request = GetUserRequest {
                access_token: &access_token,
            };
            let resp: GetUserResponse =
                aws_json::call(&self.http, &self.endpoint, SERVICE, "GetUser", &request).await?;
            Ok(resp.user_attributes)
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use serde_json::{json, Value};

    /// Fake user pool that accepts one user, `ala@example.com` / `secret`.
    async fn fake_pool(headers: HeaderMap, body: String) -> (StatusCode, String) {
        let target = headers
            .get("x-amz-target")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .trim_start_matches("AWSCognitoIdentityProviderService.")
            .to_string();
        let req: Value = serde_json::from_str(&body).unwrap();
        let ok = |v: Value| (StatusCode::OK, v.to_string());
        let fail = |code: &str, msg: &str| {
            (
                StatusCode::BAD_REQUEST,
                json!({"__type": code, "message": msg}).to_string(),
            )
        };

        match target.as_str() {
            "SignUp" => {
                assert_eq!(req["ClientId"], "client-1");
                assert_eq!(req["UserAttributes"][0]["Name"], "website");
                ok(json!({
                    "UserConfirmed": false,
                    "UserSub": "sub-1",
                    "CodeDeliveryDetails": {"Destination": "a***@e***.com", "DeliveryMedium": "EMAIL"}
                }))
            }
            "ConfirmSignUp" => {
                assert_eq!(req["ForceAliasCreation"], true);
                if req["ConfirmationCode"] == "669459" {
                    ok(json!({}))
                } else {
                    fail("CodeMismatchException", "Invalid verification code provided")
                }
            }
            "InitiateAuth" => {
                let params = &req["AuthParameters"];
                match req["AuthFlow"].as_str().unwrap() {
                    "USER_PASSWORD_AUTH" if params["PASSWORD"] == "secret" => ok(json!({
                        "AuthenticationResult": {
                            "IdToken": "id-token",
                            "AccessToken": "access-token",
                            "RefreshToken": "refresh-token",
                            "ExpiresIn": 3600,
                            "TokenType": "Bearer"
                        }
                    })),
                    "USER_PASSWORD_AUTH" if params["PASSWORD"] == "challenge" => ok(json!({
                        "ChallengeName": "NEW_PASSWORD_REQUIRED",
                        "Session": "opaque"
                    })),
                    "REFRESH_TOKEN_AUTH" if params["REFRESH_TOKEN"] == "refresh-token" => {
                        ok(json!({
                            "AuthenticationResult": {
                                "IdToken": "id-token-2",
                                "AccessToken": "access-token-2",
                                "ExpiresIn": 3600
                            }
                        }))
                    }
                    _ => fail("NotAuthorizedException", "Incorrect username or password."),
                }
            }
            "GetUser" => {
                if req["AccessToken"] == "access-token" {
                    ok(json!({
                        "Username": "sub-1",
                        "UserAttributes": [
                            {"Name": "email", "Value": "ala@example.com"},
                            {"Name": "website", "Value": "example.com"}
                        ]
                    }))
                } else {
                    fail("NotAuthorizedException", "Invalid Access Token")
                }
            }
            other => fail("UnknownOperationException", other),
        }
    }

    async fn provider() -> CognitoIdentityProvider {
        let endpoint = spawn_server(Router::new().route("/", post(fake_pool))).await;
        CognitoIdentityProvider::new(reqwest::Client::new(), endpoint, "client-1".to_string())
    }

    #[tokio::test]
    async fn test_sign_up_reports_pending_confirmation() {
        let provider = provider().await;
        let outcome = provider
            .sign_up(
                "ala@example.com",
                "secret",
                &[UserAttribute::new("website", "example.com")],
            )
            .await
            .unwrap();
        assert_eq!(outcome.user_sub, "sub-1");
        assert!(!outcome.user_confirmed);
        assert_eq!(outcome.code_destination.as_deref(), Some("a***@e***.com"));
    }

    #[tokio::test]
    async fn test_confirm_sign_up_wrong_code() {
        let provider = provider().await;
        provider
            .confirm_sign_up("ala@example.com", "669459")
            .await
            .unwrap();
        let err = provider
            .confirm_sign_up("ala@example.com", "000000")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CodeMismatchException");
    }

    #[tokio::test]
    async fn test_authenticate_returns_tokens() {
        let provider = provider().await;
        let tokens = provider
            .authenticate("ala@example.com", "secret")
            .await
            .unwrap();
        assert_eq!(tokens.id_token, "id-token");
        assert_eq!(tokens.access_token, "access-token");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-token"));
        assert_eq!(tokens.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let provider = provider().await;
        let err = provider
            .authenticate("ala@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NotAuthorizedException");
    }

    #[tokio::test]
    async fn test_authenticate_challenge_is_error() {
        let provider = provider().await;
        let err = provider
            .authenticate("ala@example.com", "challenge")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ChallengeRequired");
        assert!(err.to_string().contains("NEW_PASSWORD_REQUIRED"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_no_refresh_token() {
        let provider = provider().await;
        let tokens = provider.refresh("refresh-token").await.unwrap();
        assert_eq!(tokens.id_token, "id-token-2");
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_get_user_attributes() {
        let provider = provider().await;
        let attrs = provider.get_user_attributes("access-token").await.unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0], UserAttribute::new("email", "ala@example.com"));
    }
}
