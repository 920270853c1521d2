//! Object storage.
//!
//! The [`store::ObjectStore`] trait abstracts over where bytes physically
//! live: an S3 bucket reached with identity-pool credentials, or an
//! in-process map.  [`client::StorageClient`] adds key layout, percentage
//! progress and presigned URLs on top.

pub mod client;
pub mod memory;
pub mod s3;
pub mod store;

pub use client::{StorageClient, UploadFile};
