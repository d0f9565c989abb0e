//! fetchkit
//!
//! A small HTTP toolkit with two independent parts:
//!
//! - [`client`] - an immutable, chainable request builder ([`RequestSpec`])
//!   with optional JSON decoding of the response.
//! - [`download`] - [`download_file`], which fetches a URL into a temporary
//!   file and renames it onto the destination so readers never see a partial
//!   write.
//!
//! Both dispatch through the [`Transport`] seam; `reqwest::Client` is the
//! default and tests inject their own. Calls take a
//! `tokio_util::sync::CancellationToken` for cancellation; no timeouts are
//! imposed unless configured through [`TransportConfig`].
//!
//! The crate logs through `tracing` and never installs a subscriber.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod download;
pub mod transport;
pub mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use client::{ClientError, JsonBody, JsonResponse, RequestSpec};
pub use download::{DownloadError, DownloadOutcome, HttpOption, download_file, download_file_via};
pub use transport::{Transport, TransportConfig, build_client, default_transport};
pub use user_agent::DEFAULT_DOWNLOAD_USER_AGENT;
