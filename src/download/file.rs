//! Atomic download of one URL to one local path.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Method, Request, Response, StatusCode};
use tempfile::NamedTempFile;
use tokio::fs::{DirBuilder, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};
use url::Url;

use super::error::DownloadError;
use super::options::HttpOption;
use crate::transport::{Transport, default_transport};
use crate::user_agent::DEFAULT_DOWNLOAD_USER_AGENT;

const TEMP_FILE_PREFIX: &str = "downloaded_";
const TEMP_FILE_SUFFIX: &str = ".tmp";

/// What a successful download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The destination path, now holding the complete body.
    pub path: PathBuf,
    /// Number of body bytes written.
    pub bytes_written: u64,
    /// Response status, 200 or 206.
    pub status: StatusCode,
}

/// Downloads `url` to `destination` through the default transport.
///
/// See [`download_file_via`] for the full contract.
///
/// # Errors
///
/// Returns the same errors as [`download_file_via`].
///
/// # Panics
///
/// Panics if the default HTTP client cannot be built, see
/// [`default_transport`].
pub async fn download_file(
    cancel: &CancellationToken,
    url: &str,
    destination: impl AsRef<Path>,
    options: impl IntoIterator<Item = HttpOption>,
) -> Result<DownloadOutcome, DownloadError> {
    let transport = default_transport();
    download_file_via(transport.as_ref(), cancel, url, destination, options).await
}

/// Downloads `url` to `destination` through `transport`.
///
/// The body is streamed into a temporary file in the system temp directory,
/// the destination's parent directories are created (owner-only on Unix), and
/// the temporary file is renamed onto `destination`. Readers of `destination`
/// see either its previous contents or the complete new body, never a partial
/// write. The temporary file is removed on every failure path.
///
/// A default User-Agent is set first, then `options` are applied in order.
///
/// The rename requires the temp directory and `destination` to live on the
/// same filesystem.
///
/// # Errors
///
/// - [`DownloadError::RequestConstruction`] for a malformed URL or a failing option.
/// - [`DownloadError::Transport`] for network failures.
/// - [`DownloadError::Cancelled`] when `cancel` fires before relocation.
/// - [`DownloadError::UnexpectedStatus`] unless the status is 200 or 206.
/// - [`DownloadError::TempFile`], [`DownloadError::Copy`],
///   [`DownloadError::DirectoryCreation`], [`DownloadError::Relocation`] for
///   the respective local stage.
pub async fn download_file_via(
    transport: &dyn Transport,
    cancel: &CancellationToken,
    url: &str,
    destination: impl AsRef<Path>,
    options: impl IntoIterator<Item = HttpOption>,
) -> Result<DownloadOutcome, DownloadError> {
    download(
        transport,
        cancel,
        url,
        destination.as_ref(),
        options.into_iter().collect(),
    )
    .await
}

#[instrument(skip_all, fields(url = %url, destination = %destination.display()))]
async fn download(
    transport: &dyn Transport,
    cancel: &CancellationToken,
    url: &str,
    destination: &Path,
    options: Vec<HttpOption>,
) -> Result<DownloadOutcome, DownloadError> {
    trace!("downloading file");

    let parsed_url = Url::parse(url).map_err(|e| DownloadError::request_construction(url, e))?;
    let mut request = Request::new(Method::GET, parsed_url);
    request.headers_mut().insert(
        USER_AGENT,
        HeaderValue::from_static(DEFAULT_DOWNLOAD_USER_AGENT),
    );
    for option in options {
        option.apply(&mut request)?;
    }

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DownloadError::Cancelled { url: url.to_string() }),
        result = transport.send(request) => result.map_err(|e| DownloadError::transport(url, e))?,
    };

    let status = response.status();
    if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
        return Err(DownloadError::UnexpectedStatus {
            url: url.to_string(),
            status,
        });
    }

    let staging = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .suffix(TEMP_FILE_SUFFIX)
        .tempfile()
        .map_err(|source| DownloadError::TempFile { source })?;
    trace!(path = %staging.path().display(), "temporary file created");

    let bytes_written = stream_to_file(&staging, response, cancel, url).await?;

    if let Some(dir) = destination.parent().filter(|d| !d.as_os_str().is_empty()) {
        trace!(path = %dir.display(), "ensuring directory structure");
        create_owner_only_dirs(dir).await?;
    }

    // Last cancellation point: once the rename starts the download is visible.
    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled {
            url: url.to_string(),
        });
    }

    let from = staging.path().to_path_buf();
    trace!(source = %from.display(), destination = %destination.display(), "moving the downloaded data");
    staging
        .persist(destination)
        .map_err(|e| DownloadError::Relocation {
            from,
            to: destination.to_path_buf(),
            source: e.error,
        })?;

    debug!(path = %destination.display(), bytes = bytes_written, status = status.as_u16(), "download complete");

    Ok(DownloadOutcome {
        path: destination.to_path_buf(),
        bytes_written,
        status,
    })
}

/// Streams the response body into the staging file, returning bytes written.
///
/// The data is flushed and synced so the later rename publishes complete
/// contents.
async fn stream_to_file(
    staging: &NamedTempFile,
    response: Response,
    cancel: &CancellationToken,
    url: &str,
) -> Result<u64, DownloadError> {
    let path = staging.path();
    let handle = staging
        .as_file()
        .try_clone()
        .map_err(|e| DownloadError::copy(path, e))?;
    let mut writer = BufWriter::new(File::from_std(handle));
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(DownloadError::Cancelled { url: url.to_string() });
            }
            next = stream.next() => next,
        };
        let Some(chunk_result) = next else {
            break;
        };
        let chunk = chunk_result.map_err(|e| DownloadError::copy(path, std::io::Error::other(e)))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::copy(path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::copy(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::copy(path, e))?;

    Ok(bytes_written)
}

async fn create_owner_only_dirs(dir: &Path) -> Result<(), DownloadError> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder
        .create(dir)
        .await
        .map_err(|source| DownloadError::DirectoryCreation {
            path: dir.to_path_buf(),
            source,
        })
}
