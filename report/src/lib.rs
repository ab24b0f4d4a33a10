//! Metrics sinks and run report output
//!
//! This crate provides implementations of the `MetricsSink` trait for:
//!
//! - Structured log lines
//! - JSON lines files
//! - AWS CloudWatch (feature `aws`)
//!
//! and writes the end-of-run summary.

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(feature = "aws")]
mod cloudwatch;
mod sinks;
mod summary;

#[cfg(feature = "aws")]
pub use cloudwatch::CloudWatchSink;
pub use sinks::{JsonLinesSink, LogSink};
pub use summary::{render_summary, write_report_json};
