//! Presigned S3 URLs and S3 key encoding.
//!
//! Query-string signing is done by `aws-sigv4`.  This module supplies the
//! S3 signing settings (single percent-encoding, no path normalization,
//! `UNSIGNED-PAYLOAD`) and turns the signing instructions back into a URL.

use aws_sdk_s3::config::Credentials;
use aws_sigv4::http_request::{
    sign, PercentEncodingMode, SignableBody, SignableRequest, SignatureLocation, SigningSettings,
    UriPathNormalizationMode,
};
use aws_sigv4::sign::v4;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::credentials::StorageCredential;
use crate::errors::{ClientError, ClientResult};

/// Maximum presigned URL expiration (7 days).
pub const MAX_PRESIGNED_EXPIRES: u64 = 604800;

const SERVICE: &str = "s3";

/// Object keys: everything but RFC 3986 unreserved characters and `/`.
const S3_KEY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Query parameter values: `/` is encoded too.
const S3_QUERY_ENCODE_SET: AsciiSet = S3_KEY_ENCODE_SET.add(b'/');

/// Percent-encode an object key for use as a URL path.
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, &S3_KEY_ENCODE_SET).to_string()
}

fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, &S3_QUERY_ENCODE_SET).to_string()
}

/// SDK credentials for `credential`.
pub(crate) fn sdk_credentials(credential: &StorageCredential) -> Credentials {
    Credentials::new(
        &credential.access_key_id,
        &credential.secret_access_key,
        credential.session_token.clone(),
        credential
            .expiration
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)),
        "cognito-identity",
    )
}

fn signing_error(err: impl std::error::Error + Send + Sync + 'static) -> ClientError {
    ClientError::Internal(anyhow::Error::new(err).context("presigning failed"))
}

/// Build a presigned URL for `method` on `url`, valid for `expires_seconds`
/// from `now`.
///
/// Only `host` is signed and the payload is `UNSIGNED-PAYLOAD`, the same as
/// the AWS SDK presigners emit for `GetObject`.
pub fn presign_url(
    method: &str,
    url: &Url,
    credential: &StorageCredential,
    region: &str,
    now: SystemTime,
    expires_seconds: u64,
) -> ClientResult<String> {
    if expires_seconds == 0 || expires_seconds > MAX_PRESIGNED_EXPIRES {
        return Err(ClientError::InvalidArgument {
            message: format!("X-Amz-Expires must be between 1 and {MAX_PRESIGNED_EXPIRES}"),
        });
    }

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(Duration::from_secs(expires_seconds));
    settings.percent_encoding_mode = PercentEncodingMode::Single;
    settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;

    let identity = sdk_credentials(credential).into();
    let params = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(SERVICE)
        .time(now)
        .settings(settings)
        .build()
        .map_err(signing_error)?
        .into();

    let request = SignableRequest::new(
        method,
        url.as_str(),
        std::iter::empty(),
        SignableBody::UnsignedPayload,
    )
    .map_err(signing_error)?;
    let (instructions, _signature) = sign(request, &params).map_err(signing_error)?.into_parts();

    let query = instructions
        .params()
        .iter()
        .map(|(name, value)| format!("{name}={}", encode_query_value(value)))
        .collect::<Vec<_>>()
        .join("&");

    let mut presigned = url.clone();
    presigned.set_query(Some(&query));
    Ok(presigned.to_string())
}

// ── Tests ───────────────────────────────────────────────────────────
