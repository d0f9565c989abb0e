//! The immutable request builder.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Body, Method, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::trace;
use url::Url;
use url::form_urlencoded;

use super::error::ClientError;
use crate::transport::{Transport, default_transport};

/// Accumulated configuration for one eventual HTTP call.
///
/// Every builder method takes `&self` and returns a fresh `RequestSpec`: the
/// receiver is cloned, the clone is changed, and the clone is returned. Header
/// and query maps are owned, so a derived spec never shares mutable state with
/// its parent and chains built from a common ancestor can run concurrently.
/// Only the [`Transport`] is shared.
///
/// ```no_run
/// use fetchkit::RequestSpec;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), fetchkit::ClientError> {
/// let api = RequestSpec::new()
///     .base("https://api.example.com")
///     .user_agent("example/1.0");
///
/// let response = api
///     .get(format_args!("/users/{}", 42))
///     .query_param("expand", "teams")
///     .execute(&CancellationToken::new(), None)
///     .await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Option<Method>,
    base_uri: String,
    path: String,
    query_params: BTreeMap<String, Vec<String>>,
    headers: HeaderMap,
    invalid_headers: BTreeMap<String, String>,
    transport: Arc<dyn Transport>,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSpec {
    /// Creates an empty spec bound to the default transport.
    ///
    /// # Panics
    ///
    /// Panics if the default HTTP client cannot be built, see
    /// [`default_transport`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_shared_transport(default_transport())
    }

    fn with_shared_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            method: None,
            base_uri: String::new(),
            path: String::new(),
            query_params: BTreeMap::new(),
            headers: HeaderMap::new(),
            invalid_headers: BTreeMap::new(),
            transport,
        }
    }

    fn derive(&self, change: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        change(&mut next);
        next
    }

    /// Returns an otherwise identical spec that dispatches through `transport`.
    #[must_use]
    pub fn with_transport(&self, transport: Arc<dyn Transport>) -> Self {
        self.derive(|next| next.transport = transport)
    }

    /// Sets the scheme, host and optional path prefix.
    ///
    /// Must be called before [`execute`](Self::execute). Positional
    /// substitution goes through `format_args!`:
    /// `spec.base(format_args!("https://{}", host))`.
    #[must_use]
    pub fn base(&self, uri: impl Display) -> Self {
        let uri = uri.to_string();
        self.derive(|next| next.base_uri = uri)
    }

    /// Sets a header, replacing any earlier values for the same name.
    ///
    /// Names are case-insensitive. An invalid name or value is reported by
    /// [`execute`](Self::execute) as a misconfiguration, unless a later valid
    /// call for the same name replaces it.
    #[must_use]
    pub fn header(&self, name: &str, value: impl AsRef<str>) -> Self {
        let key = name.to_ascii_lowercase();
        let value = value.as_ref();
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("invalid header name {name:?}: {e}"))
            .and_then(|header_name| {
                HeaderValue::from_str(value)
                    .map(|header_value| (header_name, header_value))
                    .map_err(|e| format!("invalid value for header {name:?}: {e}"))
            });

        self.derive(|next| match parsed {
            Ok((header_name, header_value)) => {
                next.invalid_headers.remove(&key);
                next.headers.insert(header_name, header_value);
            }
            Err(reason) => {
                next.headers.remove(key.as_str());
                next.invalid_headers.insert(key, reason);
            }
        })
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn user_agent(&self, value: impl AsRef<str>) -> Self {
        self.header(USER_AGENT.as_str(), value)
    }

    /// Sets `Authorization: <scheme> <credential>`.
    #[must_use]
    pub fn auth(&self, scheme: &str, credential: &str) -> Self {
        self.header(AUTHORIZATION.as_str(), format!("{scheme} {credential}"))
    }

    /// Sets HTTP basic authentication for `username` and `password`.
    #[must_use]
    pub fn basic_auth(&self, username: &str, password: &str) -> Self {
        let credential = STANDARD.encode(format!("{username}:{password}"));
        self.auth("Basic", &credential)
    }

    /// Sets the method and the path appended to the base URI.
    #[must_use]
    pub fn request(&self, method: Method, path: impl Display) -> Self {
        let path = path.to_string();
        self.derive(|next| {
            next.method = Some(method);
            next.path = path;
        })
    }

    /// Shorthand for [`request`](Self::request) with `GET`.
    #[must_use]
    pub fn get(&self, path: impl Display) -> Self {
        self.request(Method::GET, path)
    }

    /// Shorthand for [`request`](Self::request) with `POST`.
    #[must_use]
    pub fn post(&self, path: impl Display) -> Self {
        self.request(Method::POST, path)
    }

    /// Shorthand for [`request`](Self::request) with `PUT`.
    #[must_use]
    pub fn put(&self, path: impl Display) -> Self {
        self.request(Method::PUT, path)
    }

    /// Shorthand for [`request`](Self::request) with `DELETE`.
    #[must_use]
    pub fn delete(&self, path: impl Display) -> Self {
        self.request(Method::DELETE, path)
    }

    /// Shorthand for [`request`](Self::request) with `HEAD`.
    #[must_use]
    pub fn head(&self, path: impl Display) -> Self {
        self.request(Method::HEAD, path)
    }

    /// Shorthand for [`request`](Self::request) with `OPTIONS`.
    #[must_use]
    pub fn options(&self, path: impl Display) -> Self {
        self.request(Method::OPTIONS, path)
    }

    /// Appends a query parameter value. Repeated keys keep every value.
    #[must_use]
    pub fn query_param(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key: String = key.into();
        let value: String = value.into();
        self.derive(|next| next.query_params.entry(key).or_default().push(value))
    }

    /// The method set by [`request`](Self::request) or a verb shorthand.
    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// The base URI, empty until [`base`](Self::base) is called.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// The path appended to the base URI.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Accumulated headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Accumulated query parameters, keyed in sorted order.
    #[must_use]
    pub fn query_params(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query_params
    }

    /// The URI a request would be sent to: base, path and encoded query.
    ///
    /// Keys are encoded in sorted order, values of one key in insertion order.
    /// Encoding is `application/x-www-form-urlencoded`: space becomes `+`, and
    /// only alphanumerics and `*-._` stay literal, so `~` is escaped as `%7E`.
    #[must_use]
    pub fn uri(&self) -> String {
        let mut uri = format!("{}{}", self.base_uri, self.path);
        if !self.query_params.is_empty() {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (key, values) in &self.query_params {
                for value in values {
                    query.append_pair(key, value);
                }
            }
            uri.push('?');
            uri.push_str(&query.finish());
        }
        uri
    }

    /// Sends the request and returns the response with its body unread.
    ///
    /// The method defaults to `GET` when none was set. Headers are copied into
    /// the request, so the spec stays reusable.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Misconfiguration`] when [`base`](Self::base) was never
    ///   called or a header was invalid; nothing is sent.
    /// - [`ClientError::InvalidUrl`] when the assembled URI does not parse.
    /// - [`ClientError::Transport`] for connection-level failures.
    /// - [`ClientError::Cancelled`] when `cancel` fires first.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        body: Option<Body>,
    ) -> Result<Response, ClientError> {
        if self.base_uri.is_empty() {
            return Err(ClientError::misconfiguration(
                "base() should be called before execute()",
            ));
        }
        if let Some(reason) = self.invalid_headers.values().next() {
            return Err(ClientError::misconfiguration(reason.clone()));
        }

        let uri = self.uri();
        let method = self.method.clone().unwrap_or(Method::GET);

        trace!(uri = %uri, method = %method, headers = ?self.headers, "sending request");

        let url = Url::parse(&uri).map_err(|source| ClientError::InvalidUrl {
            url: uri.clone(),
            source,
        })?;
        let mut request = Request::new(method, url);
        *request.headers_mut() = self.headers.clone();
        *request.body_mut() = body;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled { url: uri }),
            result = self.transport.send(request) => {
                result.map_err(|source| ClientError::Transport { url: uri.clone(), source })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    #[derive(Debug, Default)]
    struct CountingTransport {
        calls: AtomicUsize,
        inner: reqwest::Client,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, request: Request) -> Result<Response, reqwest::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.execute(request).await
        }
    }

    fn header_values<'a>(spec: &'a RequestSpec, name: &str) -> Vec<&'a str> {
        spec.headers()
            .get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_new_spec_is_empty() {
        let spec = RequestSpec::new();
        assert_eq!(spec.method(), None);
        assert_eq!(spec.base_uri(), "");
        assert_eq!(spec.path(), "");
        assert!(spec.headers().is_empty());
        assert!(spec.query_params().is_empty());
    }

    #[test]
    fn test_base_formats_positional_arguments() {
        let spec = RequestSpec::new().base(format_args!("https://{}", "example.com"));
        assert_eq!(spec.base_uri(), "https://example.com");
        assert_eq!(spec.method(), None);
        assert_eq!(spec.path(), "");
    }

    #[test]
    fn test_request_methods_set_method_and_path() {
        let spec = RequestSpec::new();

        let custom = spec.request(
            Method::from_bytes(b"BLAH").unwrap(),
            format_args!("/someuri/{}", "blah"),
        );
        assert_eq!(custom.method().map(Method::as_str), Some("BLAH"));
        assert_eq!(custom.path(), "/someuri/blah");
        assert_eq!(custom.base_uri(), "");

        let shorthands = [
            (spec.get("/someuri/blah"), Method::GET),
            (spec.post("/someuri/blah"), Method::POST),
            (spec.put("/someuri/blah"), Method::PUT),
            (spec.delete("/someuri/blah"), Method::DELETE),
            (spec.head("/someuri/blah"), Method::HEAD),
            (spec.options("/someuri/blah"), Method::OPTIONS),
        ];
        for (derived, expected) in shorthands {
            assert_eq!(derived.method(), Some(&expected));
            assert_eq!(derived.path(), "/someuri/blah");
        }
        assert_eq!(spec.method(), None, "parent spec must stay untouched");
    }

    #[test]
    fn test_header_methods() {
        let spec = RequestSpec::new();

        let custom = spec.header("blahname", "blahvalue");
        assert_eq!(header_values(&custom, "Blahname"), vec!["blahvalue"]);

        let auth = spec.auth("test", "creds");
        assert_eq!(header_values(&auth, "authorization"), vec!["test creds"]);

        let basic = spec.basic_auth("test user", "test password");
        assert_eq!(
            header_values(&basic, "Authorization"),
            vec!["Basic dGVzdCB1c2VyOnRlc3QgcGFzc3dvcmQ="]
        );

        let ua = spec.user_agent("Some user agent/1.0");
        assert_eq!(header_values(&ua, "user-agent"), vec!["Some user agent/1.0"]);

        assert!(spec.headers().is_empty(), "parent spec must stay untouched");
    }

    #[test]
    fn test_header_replaces_but_query_param_appends() {
        let spec = RequestSpec::new()
            .header("X", "a")
            .header("x", "b")
            .query_param("k", "a")
            .query_param("k", "b");

        assert_eq!(header_values(&spec, "X"), vec!["b"]);
        assert_eq!(spec.query_params().get("k").unwrap(), &vec!["a", "b"]);
    }

    #[test]
    fn test_query_params_encoding() {
        let spec = RequestSpec::new()
            .base("https://example.com")
            .get("/search")
            .query_param("some_key", "some value")
            .query_param("a", "1")
            .query_param("some_key", "second&value");

        assert_eq!(
            spec.uri(),
            "https://example.com/search?a=1&some_key=some+value&some_key=second%26value"
        );
    }

    #[test]
    fn test_uri_without_query_has_no_question_mark() {
        let spec = RequestSpec::new().base("https://example.com").get("/plain");
        assert_eq!(spec.uri(), "https://example.com/plain");
    }

    #[test]
    fn test_derived_spec_does_not_alias_parent() {
        let parent = RequestSpec::new()
            .base("https://example.com")
            .header("X-Parent", "1")
            .query_param("shared", "parent");

        let child = parent
            .header("X-Parent", "overridden")
            .header("X-Child", "2")
            .query_param("shared", "child");
        let grandchild = child.query_param("shared", "grandchild");

        assert_eq!(header_values(&parent, "X-Parent"), vec!["1"]);
        assert!(parent.headers().get("X-Child").is_none());
        assert_eq!(parent.query_params().get("shared").unwrap(), &vec!["parent"]);
        assert_eq!(
            child.query_params().get("shared").unwrap(),
            &vec!["parent", "child"]
        );
        assert_eq!(
            grandchild.query_params().get("shared").unwrap(),
            &vec!["parent", "child", "grandchild"]
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let original = RequestSpec::new().header("X-Test", "a").query_param("k", "v");
        let mut copy = original.clone();
        copy.headers.insert("x-test", HeaderValue::from_static("changed"));
        copy.query_params.get_mut("k").unwrap().push("w".to_string());

        assert_eq!(header_values(&original, "X-Test"), vec!["a"]);
        assert_eq!(original.query_params().get("k").unwrap(), &vec!["v"]);
    }

    #[test]
    fn test_misconfig_detection_performs_no_network_call() {
        let transport = Arc::new(CountingTransport::default());
        let spec = RequestSpec::new()
            .with_transport(transport.clone())
            .get("/never-sent");

        let result = tokio_test::block_on(spec.execute(&CancellationToken::new(), None));

        let error = result.unwrap_err();
        assert!(error.is_misconfiguration(), "unexpected error: {error}");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_header_surfaces_as_misconfiguration() {
        let transport = Arc::new(CountingTransport::default());
        let spec = RequestSpec::new()
            .with_transport(transport.clone())
            .base("http://127.0.0.1:9")
            .header("bad header", "value");

        assert!(spec.headers().is_empty());
        let error = tokio_test::block_on(spec.execute(&CancellationToken::new(), None)).unwrap_err();
        assert!(error.is_misconfiguration());
        assert!(error.to_string().contains("bad header"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_valid_header_replaces_earlier_invalid_one() {
        let transport = Arc::new(CountingTransport::default());
        let spec = RequestSpec::new()
            .with_transport(transport.clone())
            .base("http://127.0.0.1:9")
            .header("X-Token", "bad\nvalue")
            .header("x-token", "good");

        assert_eq!(header_values(&spec, "X-Token"), vec!["good"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let error = tokio_test::block_on(spec.execute(&cancel, None)).unwrap_err();
        assert!(
            matches!(error, ClientError::Cancelled { .. }),
            "replaced header must not be reported: {error}"
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_header_replaces_earlier_valid_one() {
        let spec = RequestSpec::new()
            .base("http://127.0.0.1:9")
            .header("X-Token", "good")
            .header("X-Token", "bad\nvalue");

        assert!(spec.headers().get("x-token").is_none());
        let error = tokio_test::block_on(spec.execute(&CancellationToken::new(), None)).unwrap_err();
        assert!(error.is_misconfiguration());
        assert!(error.to_string().contains("X-Token"));
    }

    #[test]
    fn test_new_specs_share_default_transport() {
        let first = RequestSpec::new();
        let second = RequestSpec::new();
        assert!(Arc::ptr_eq(&first.transport, &second.transport));
    }

    #[test]
    fn test_uri_form_encodes_reserved_characters() {
        let spec = RequestSpec::new()
            .base("https://example.com")
            .query_param("k", "a~b*c");
        assert_eq!(spec.uri(), "https://example.com?k=a%7Eb*c");
    }

    #[test]
    fn test_invalid_url_is_reported_before_sending() {
        let transport = Arc::new(CountingTransport::default());
        let spec = RequestSpec::new()
            .with_transport(transport.clone())
            .base("not a url")
            .get("/x");

        let error = tokio_test::block_on(spec.execute(&CancellationToken::new(), None)).unwrap_err();
        assert!(matches!(error, ClientError::InvalidUrl { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_prevents_send() {
        let transport = Arc::new(CountingTransport::default());
        let spec = RequestSpec::new()
            .with_transport(transport.clone())
            .base("http://127.0.0.1:9")
            .get("/cancelled");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let error = spec.execute(&cancel, None).await.unwrap_err();

        assert!(matches!(error, ClientError::Cancelled { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
