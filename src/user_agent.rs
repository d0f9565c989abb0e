//! Default User-Agent for download traffic.
//!
//! Single source for the UA format so it stays in sync with the crate version.

/// User-Agent sent by [`download_file`](crate::download::download_file)
/// unless an [`HttpOption`](crate::download::HttpOption) overrides it.
pub const DEFAULT_DOWNLOAD_USER_AGENT: &str =
    concat!("download-file-client/", env!("CARGO_PKG_VERSION"));
