//! Client-side metrics.
//!
//! Counters are emitted through the `metrics` facade.  Without an
//! installed recorder they are no-ops; an embedding application can
//! install any exporter it likes and call [`describe_metrics`].

use metrics::describe_counter;

use crate::errors::ClientResult;

// -- Metric name constants ----------------------------------------------------

/// Identity provider calls (counter). Labels: operation, outcome.
pub const IDENTITY_OPERATIONS_TOTAL: &str = "flipbook_identity_operations_total";

/// Storage credential exchanges (counter). Labels: outcome.
pub const CREDENTIAL_EXCHANGES_TOTAL: &str = "flipbook_credential_exchanges_total";

/// Object uploads (counter). Labels: outcome.
pub const UPLOADS_TOTAL: &str = "flipbook_uploads_total";

/// Bytes sent in successful uploads (counter).
pub const UPLOAD_BYTES_TOTAL: &str = "flipbook_upload_bytes_total";

/// Order submissions (counter). Labels: outcome.
pub const SUBMISSIONS_TOTAL: &str = "flipbook_submissions_total";

/// Register metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(IDENTITY_OPERATIONS_TOTAL, "Identity provider calls");
    describe_counter!(CREDENTIAL_EXCHANGES_TOTAL, "Storage credential exchanges");
    describe_counter!(UPLOADS_TOTAL, "Object uploads");
    describe_counter!(UPLOAD_BYTES_TOTAL, "Bytes sent in successful uploads");
    describe_counter!(SUBMISSIONS_TOTAL, "Order submissions");
}

/// `outcome` label value for a result.
pub fn outcome<T>(result: &ClientResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(_) => "error",
    }
}
