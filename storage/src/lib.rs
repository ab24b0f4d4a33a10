//! Storage providers for benchmark results
//!
//! This crate provides implementations of the `ObjectStore` trait for:
//!
//! - Local filesystem (a directory per bucket)
//! - AWS S3 (feature `aws`)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod local;
#[cfg(feature = "aws")]
mod s3;

pub use local::LocalStore;
#[cfg(feature = "aws")]
pub use s3::S3Store;
