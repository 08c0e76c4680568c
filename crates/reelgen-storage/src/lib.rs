//! Cloudflare R2 storage client.
//!
//! This crate provides:
//! - File and byte uploads to R2
//! - Presigned GET URLs with a bounded lifetime
//! - Object deletion and existence checks
//! - The `ObjectStore` trait the pipeline is written against

pub mod client;
pub mod error;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{content_type_for, keys, ObjectStore, SignedUrl};
