//! Id-token claim extraction.
//!
//! The user pool signs its tokens and the services that consume them
//! verify the signature; locally we only need to read a few claims
//! (`sub`, `email`, `iss`, `exp`), so signature checks are disabled.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, ClientResult};

/// Claims read from an id token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
}

/// Decode the claims of `token` without verifying its signature or expiry.
pub fn decode_id_claims(token: &str) -> ClientResult<IdClaims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<IdClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ClientError::provider("InvalidToken", format!("cannot read id token: {e}")))
}
