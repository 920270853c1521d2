//! flipbook library -- Cognito-authenticated photo uploads to S3.
//!
//! The crate provides the pieces of a small upload-and-order flow: a user
//! pool identity client with a persisted session, a bridge that exchanges
//! the session for temporary storage credentials, an S3 storage client
//! with upload progress and presigned previews, the current order, the
//! order submission API client, and a console binder tying them together.

mod aws_json;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod identity;
pub mod metrics;
pub mod order;
pub mod sigv4;
pub mod storage;
pub mod submission;
pub mod ui;

#[cfg(test)]
mod test_support;
