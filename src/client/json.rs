//! JSON execution on top of [`RequestSpec::execute`].

use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::error::ClientError;
use super::spec::RequestSpec;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Decoded body of a JSON exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonBody<T, E> {
    /// The status was 2xx; the body matched the success model.
    Success(T),
    /// The status was outside 2xx; the body matched the error model.
    Failure(E),
}

/// Status and decoded body returned by [`RequestSpec::execute_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse<T, E> {
    /// Response status.
    pub status: StatusCode,
    /// Decoded body.
    pub body: JsonBody<T, E>,
}

impl<T, E> JsonResponse<T, E> {
    /// Returns the success model, if the status was 2xx.
    pub fn success(self) -> Option<T> {
        match self.body {
            JsonBody::Success(value) => Some(value),
            JsonBody::Failure(_) => None,
        }
    }

    /// Returns the error model, if the status was outside 2xx.
    pub fn failure(self) -> Option<E> {
        match self.body {
            JsonBody::Success(_) => None,
            JsonBody::Failure(value) => Some(value),
        }
    }

    /// Converts the body into a `Result`, dropping the status.
    ///
    /// # Errors
    ///
    /// Returns the error model when the status was outside 2xx.
    pub fn into_result(self) -> Result<T, E> {
        match self.body {
            JsonBody::Success(value) => Ok(value),
            JsonBody::Failure(value) => Err(value),
        }
    }
}

impl RequestSpec {
    /// Sends the request and decodes a JSON body.
    ///
    /// A 2xx status decodes into `T`, anything else into `E`. The response
    /// body is read to the end before decoding and released on every path.
    ///
    /// # Errors
    ///
    /// Everything [`execute`](Self::execute) returns, plus the following,
    /// all of which carry the response status:
    /// - [`ClientError::MalformedContentType`] when `Content-Type` is missing
    ///   or unparseable.
    /// - [`ClientError::UnsupportedMediaType`] when the media type is not
    ///   `application/json`. Parameters such as `charset` and letter case are
    ///   ignored for the comparison.
    /// - [`ClientError::Body`] when reading the body fails.
    /// - [`ClientError::Decode`] when the body does not match the model.
    pub async fn execute_json<T, E>(
        &self,
        cancel: &CancellationToken,
        body: Option<Body>,
    ) -> Result<JsonResponse<T, E>, ClientError>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let response = self.execute(cancel, body).await?;
        let status = response.status();

        trace!(status = status.as_u16(), headers = ?response.headers(), "response received");

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();
        let Some(media_type) = parse_media_type(&content_type) else {
            return Err(ClientError::MalformedContentType {
                status,
                value: content_type,
            });
        };
        if media_type != JSON_MEDIA_TYPE {
            return Err(ClientError::UnsupportedMediaType { status, media_type });
        }

        let url = response.url().to_string();
        let bytes = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ClientError::Cancelled { url }),
            read = response.bytes() => read.map_err(|source| ClientError::Body { status, source })?,
        };

        let body = if status.is_success() {
            JsonBody::Success(decode(status, &bytes)?)
        } else {
            JsonBody::Failure(decode(status, &bytes)?)
        };
        Ok(JsonResponse { status, body })
    }
}

/// Decodes the first JSON value in `bytes`; anything after it is ignored.
fn decode<M: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<M, ClientError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    M::deserialize(&mut deserializer).map_err(|source| ClientError::Decode { status, source })
}

/// Extracts the lowercased `type/subtype` from a `Content-Type` value.
///
/// Returns `None` when the value has no media type.
fn parse_media_type(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    let is_token = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c))
    };
    if !is_token(kind) || !is_token(subtype) {
        return None;
    }
    Some(essence.to_ascii_lowercase())
}
