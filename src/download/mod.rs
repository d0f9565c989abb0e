//! Atomic file downloads.
//!
//! [`download_file`] performs one GET, streams the body to a temporary file
//! and renames it onto the destination, so the destination path never holds a
//! partially written file.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Parent directories created on demand (owner-only on Unix)
//! - Request tweaks through [`HttpOption`]s, applied in order
//! - Structured error types naming the failing stage
//! - Cancellation through a `CancellationToken`
//!
//! # Example
//!
//! ```no_run
//! use fetchkit::download::{download_file, user_agent};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = download_file(
//!     &CancellationToken::new(),
//!     "https://example.com/paper.pdf",
//!     "./downloads/paper.pdf",
//!     [user_agent("my-tool/1.0")],
//! )
//! .await?;
//! println!("Downloaded {} bytes to {}", outcome.bytes_written, outcome.path.display());
//! # Ok(())
//! # }
//! ```

mod error;
mod file;
mod options;

pub use error::DownloadError;
pub use file::{DownloadOutcome, download_file, download_file_via};
pub use options::{HttpOption, header, user_agent};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
