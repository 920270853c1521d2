//! Order submission API client.
//!
//! One call: `POST {base_url}/orders` with the raw id token in
//! `Authorization` and a JSON body `{"email": ..., "photos": [...]}`.

use metrics::counter;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{ClientError, ClientResult};
use crate::metrics::{outcome, SUBMISSIONS_TOTAL};

/// Body of an order submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub email: String,
    /// Object keys, in the order they were added.
    pub photos: Vec<String>,
}

/// What the API answered.  Non-2xx statuses are returned, not raised.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when the body is empty.
    pub body: serde_json::Value,
}

impl SubmissionResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for the order API.
#[derive(Clone)]
pub struct SubmissionClient {
    http: reqwest::Client,
    base_url: String,
}

impl SubmissionClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.base_url)
    }

    /// Post `order`, authorized by `token`.
    pub async fn submit(&self, token: &str, order: &OrderRequest) -> ClientResult<SubmissionResponse> {
        let result = self.post(token, order).await;
        counter!(SUBMISSIONS_TOTAL, "outcome" => outcome(&result)).increment(1);
        result
    }

    async fn post(&self, token: &str, order: &OrderRequest) -> ClientResult<SubmissionResponse> {
        let url = self.orders_url();
        debug!("POST {} ({} photos)", url, order.photos.len());

        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, token)
            .json(order)
            .send()
            .await
            .map_err(ClientError::network)?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(ClientError::network)?;
        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                ClientError::network(format!("invalid JSON from {url} (status {status}): {e}"))
            })?
        };

        info!("Order submitted: status={}", status);
        Ok(SubmissionResponse { status, body })
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
    use serde_json::json;

    async fn fake_orders(headers: HeaderMap, body: String) -> (StatusCode, String) {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if token != "id-token" {
            return (
                StatusCode::UNAUTHORIZED,
                json!({"message": "Unauthorized"}).to_string(),
            );
        }
        assert_eq!(headers["content-type"], "application/json");
        let order: OrderRequest = serde_json::from_str(&body).unwrap();
        match order.email.as_str() {
            "empty@example.com" => (StatusCode::NO_CONTENT, String::new()),
            "html@example.com" => (StatusCode::BAD_GATEWAY, "<html>oops</html>".to_string()),
            _ => (
                StatusCode::CREATED,
                json!({"orderId": "o-1", "photos": order.photos}).to_string(),
            ),
        }
    }

    async fn client() -> SubmissionClient {
        let base = spawn_server(Router::new().route("/dev/orders", post(fake_orders))).await;
        SubmissionClient::new(&format!("{base}dev/"), 5).unwrap()
    }

    fn order(email: &str) -> OrderRequest {
        OrderRequest {
            email: email.to_string(),
            photos: vec!["uploads/u1/images/x/b.png".to_string(), "uploads/u1/images/y/a.png".to_string()],
        }
    }

    #[tokio::test]
    async fn test_submit_posts_order() {
        let client = client().await;
        let resp = client.submit("id-token", &order("ala@example.com")).await.unwrap();
        assert_eq!(resp.status, 201);
        assert!(resp.is_success());
        assert_eq!(resp.body["orderId"], "o-1");
        assert_eq!(resp.body["photos"][0], "uploads/u1/images/x/b.png");
    }

    #[tokio::test]
    async fn test_rejected_token_is_returned_not_raised() {
        let client = client().await;
        let resp = client.submit("wrong", &order("ala@example.com")).await.unwrap();
        assert_eq!(resp.status, 401);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let client = client().await;
        let resp = client.submit("id-token", &order("empty@example.com")).await.unwrap();
        assert_eq!(resp.status, 204);
        assert_eq!(resp.body, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_non_json_body_is_network_error() {
        let client = client().await;
        let err = client
            .submit("id-token", &order("html@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NetworkError");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_network_error() {
        let client = SubmissionClient::new("http://127.0.0.1:9", 5).unwrap();
        let err = client.submit("id-token", &order("ala@example.com")).await.unwrap_err();
        assert!(matches!(err, ClientError::Network { .. }));
    }
}
