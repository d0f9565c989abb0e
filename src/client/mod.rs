//! Immutable, chainable HTTP request builder.
//!
//! A [`RequestSpec`] is threaded through builder calls such as
//! [`base`](RequestSpec::base), [`header`](RequestSpec::header) and
//! [`get`](RequestSpec::get), each returning an independent copy, and is
//! finished with [`execute`](RequestSpec::execute) or
//! [`execute_json`](RequestSpec::execute_json).
//!
//! # Example
//!
//! ```no_run
//! use fetchkit::{JsonBody, RequestSpec};
//! use serde::Deserialize;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Deserialize)]
//! struct Status {
//!     status: String,
//! }
//!
//! # async fn example() -> Result<(), fetchkit::ClientError> {
//! let response = RequestSpec::new()
//!     .base("https://api.example.com")
//!     .basic_auth("user", "secret")
//!     .get("/health")
//!     .execute_json::<Status, Status>(&CancellationToken::new(), None)
//!     .await?;
//!
//! match response.body {
//!     JsonBody::Success(ok) => println!("{}: {}", response.status, ok.status),
//!     JsonBody::Failure(err) => println!("{} failed: {}", response.status, err.status),
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod json;
mod spec;

pub use error::ClientError;
pub use json::{JsonBody, JsonResponse};
pub use spec::RequestSpec;
