//! Cognito identity pool credential exchange.
//!
//! Calls `AWSCognitoIdentityService.GetId` and
//! `AWSCognitoIdentityService.GetCredentialsForIdentity` over the JSON
//! API.  Both are unsigned calls authorized by the login map.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use super::{CredentialExchange, Logins, StorageCredential};
use crate::aws_json;
use crate::errors::ClientResult;
use crate::identity::missing_field;

const SERVICE: &str = "AWSCognitoIdentityService";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
    identity_pool_id: &'a str,
    logins: &'a Logins,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
    logins: &'a Logins,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    identity_id: Option<String>,
    credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Credentials {
    access_key_id: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    /// Epoch seconds, possibly fractional.
    expiration: Option<f64>,
}

/// Credential exchange backed by a Cognito identity pool.
pub struct CognitoIdentityExchange {
    http: reqwest::Client,
    endpoint: String,
    identity_pool_id: String,
}

impl CognitoIdentityExchange {
    pub fn new(http: reqwest::Client, endpoint: String, identity_pool_id: String) -> Self {
        info!(
            "Cognito identity exchange initialized: endpoint={} pool={}",
            endpoint, identity_pool_id
        );
        Self {
            http,
            endpoint,
            identity_pool_id,
        }
    }
}

impl CredentialExchange for CognitoIdentityExchange {
    fn get_id(
        &self,
        logins: &Logins,
    ) -> Pin<Box<dyn Future<Output = ClientResult<String>> + Send + '_>> {
        let logins = logins.clone();
        Box::pin(async move {
            debug!("Cognito GetId: pool={}", self.identity_pool_id);
            let request = GetIdRequest {
                identity_pool_id: &self.identity_pool_id,
                logins: &logins,
            };
            let resp: GetIdResponse =
                aws_json::call(&self.http, &self.endpoint, SERVICE, "GetId", &request).await?;
            resp.identity_id
                .ok_or_else(|| missing_field("GetId", "IdentityId"))
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
            debug!("Cognito GetCredentialsForIdentity: identity={}", identity_id);
            let request = GetCredentialsRequest {
                identity_id: &identity_id,
                logins: &logins,
            };
            let resp: GetCredentialsResponse = aws_json::call(
                &self.http,
                &self.endpoint,
                SERVICE,
                "GetCredentialsForIdentity",
                &request,
            )
            .await?;

            let op = "GetCredentialsForIdentity";
            let creds = resp
                .credentials
                .ok_or_else(|| missing_field(op, "Credentials"))?;
            Ok(StorageCredential {
                access_key_id: creds
                    .access_key_id
                    .ok_or_else(|| missing_field(op, "AccessKeyId"))?,
                secret_access_key: creds
                    .secret_key
                    .ok_or_else(|| missing_field(op, "SecretKey"))?,
                session_token: creds.session_token,
                expiration: creds.expiration.map(|secs| secs as i64),
                identity_id: resp.identity_id.unwrap_or(identity_id),
            })
        })
    }
}

// -- Tests -------------------------------------------------------------------
