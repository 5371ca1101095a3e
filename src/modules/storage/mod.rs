//! Physical store for file bytes
//!
//! A `BlobStore` trait with a local-filesystem backend and a
//! MinIO/S3-compatible backend.

mod blob_store;
mod local_blob_store;
mod minio_client;

pub use blob_store::{is_valid_blob_id, BlobDeleteOutcome, BlobStore};
pub use local_blob_store::LocalBlobStore;
pub use minio_client::MinIOClient;
