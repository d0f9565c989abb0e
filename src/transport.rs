//! The request-dispatch seam shared by the builder and the downloader.
//!
//! [`Transport`] is the only collaborator either component talks to on the
//! network side. `reqwest::Client` implements it directly; tests inject
//! wrappers around it to observe traffic.

use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Proxy, Request, Response};
use tracing::warn;

/// Executes a fully formed request and returns the response.
///
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    /// Dispatches `request`, returning the response head with an unread body.
    async fn send(&self, request: Request) -> Result<Response, reqwest::Error>;
}

#[async_trait]
impl Transport for Client {
    async fn send(&self, request: Request) -> Result<Response, reqwest::Error> {
        self.execute(request).await
    }
}

/// Settings for [`build_client`].
///
/// The defaults impose no timeouts; callers bound execution time through the
/// cancellation token they pass to each call.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Limit for establishing a connection.
    pub connect_timeout: Option<Duration>,
    /// Limit for the whole exchange, body included.
    pub timeout: Option<Duration>,
    /// Advertise and transparently decode gzip bodies.
    pub gzip: bool,
    /// User-Agent applied when a request does not carry its own.
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            timeout: None,
            gzip: true,
            user_agent: None,
        }
    }
}

#[allow(clippy::expect_used)]
static DEFAULT_TRANSPORT: LazyLock<Arc<dyn Transport>> = LazyLock::new(|| {
    let client = build_client(&TransportConfig::default())
        .expect("failed to build HTTP client with default configuration");
    Arc::new(client)
});

/// Returns the transport used when the caller does not inject one.
///
/// The client is built on first use and shared process-wide, so its
/// connection pool is reused across calls.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built from the default configuration.
/// This should never happen in practice.
#[must_use]
pub fn default_transport() -> Arc<dyn Transport> {
    Arc::clone(&DEFAULT_TRANSPORT)
}

/// Builds a `reqwest::Client` from `config`.
///
/// Some sandboxed environments panic while the builder reads system proxy
/// settings. In that case the build is retried once with system lookup
/// disabled and proxies taken from the environment instead.
///
/// # Errors
///
/// Returns the builder error when the configuration is rejected, or when the
/// fallback build panics as well.
pub fn build_client(config: &TransportConfig) -> Result<Client, reqwest::Error> {
    match try_build_client(config, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            warn!(
                "HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback"
            );
            match try_build_client(config, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Build(error)) => Err(error),
                // Without a reqwest error to report, fall back to a plain
                // client that skips proxy discovery entirely.
                Err(BuildClientFailure::Panic) => base_builder(config).no_proxy().build(),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(error),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    config: &TransportConfig,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(|| {
        let mut builder = base_builder(config);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(config: &TransportConfig) -> ClientBuilder {
    let mut builder = Client::builder().gzip(config.gzip);
    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    builder
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
