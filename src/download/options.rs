//! Per-request tweaks applied to the outgoing download request.

use std::fmt;

use reqwest::Request;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};

use super::error::DownloadError;

type ApplyFn = Box<dyn FnOnce(&mut Request) -> Result<(), DownloadError> + Send>;

/// A change applied to the download request before it is sent.
///
/// Options run in the order given, after the default User-Agent is set, so a
/// later option overrides an earlier one.
pub struct HttpOption(ApplyFn);

impl HttpOption {
    /// Wraps an arbitrary request transformation.
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Request) -> Result<(), DownloadError> + Send + 'static,
    {
        Self(Box::new(apply))
    }

    pub(crate) fn apply(self, request: &mut Request) -> Result<(), DownloadError> {
        (self.0)(request)
    }
}

impl fmt::Debug for HttpOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HttpOption(..)")
    }
}

/// Overrides the `User-Agent` header.
#[must_use]
pub fn user_agent(value: impl Into<String>) -> HttpOption {
    let value = value.into();
    HttpOption::new(move |request| {
        let header_value = HeaderValue::from_str(&value)
            .map_err(|e| DownloadError::request_construction(request.url().as_str(), e))?;
        request.headers_mut().insert(USER_AGENT, header_value);
        Ok(())
    })
}

/// Sets a header, replacing any value already present for the same name.
#[must_use]
pub fn header(name: impl Into<String>, value: impl Into<String>) -> HttpOption {
    let (name, value): (String, String) = (name.into(), value.into());
    HttpOption::new(move |request| {
        let url = request.url().to_string();
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DownloadError::request_construction(url.as_str(), e))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|e| DownloadError::request_construction(url.as_str(), e))?;
        request.headers_mut().insert(header_name, header_value);
        Ok(())
    })
}
