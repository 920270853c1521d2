//! Minimal client for the AWS JSON 1.1 protocol used by both Cognito APIs.
//!
//! Every call is a `POST /` with an `X-Amz-Target: {Service}.{Operation}`
//! header and a JSON body.  Errors come back as a non-2xx status with a
//! body like `{"__type": "NotAuthorizedException", "message": "..."}`.

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ClientError, ClientResult};

const AMZ_JSON: &str = "application/x-amz-json-1.1";

#[derive(Debug, Default, Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Strip the optional `namespace#` prefix from an `__type` value.
fn error_code(raw: &str) -> &str {
    raw.rsplit('#').next().unwrap_or(raw)
}

/// Invoke `{service}.{operation}` at `endpoint`.
///
/// Transport failures and error responses both become
/// [`ClientError::Provider`], carrying the service's own error code when
/// there is one.
pub(crate) async fn call<Req, Resp>(
    http: &reqwest::Client,
    endpoint: &str,
    service: &str,
    operation: &str,
    body: &Req,
) -> ClientResult<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let target = format!("{service}.{operation}");
    debug!("AWS JSON call: target={} endpoint={}", target, endpoint);

    let payload = serde_json::to_vec(body).map_err(|e| ClientError::Internal(e.into()))?;

    let resp = http
        .post(endpoint)
        .header("X-Amz-Target", &target)
        .header(CONTENT_TYPE, AMZ_JSON)
        .body(payload)
        .send()
        .await
        .map_err(|e| ClientError::provider("NetworkError", e.to_string()))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| ClientError::provider("NetworkError", e.to_string()))?;

    if !status.is_success() {
        let err: AwsErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let code = err
            .error_type
            .as_deref()
            .map(error_code)
            .unwrap_or("UnknownError")
            .to_string();
        let message = err
            .message
            .unwrap_or_else(|| format!("{operation} failed with HTTP {status}"));
        debug!("AWS JSON error: target={} code={} status={}", target, code, status);
        return Err(ClientError::provider(code, message));
    }

    serde_json::from_str(&text).map_err(|e| {
        ClientError::provider("InvalidResponse", format!("{operation} response: {e}"))
    })
}
