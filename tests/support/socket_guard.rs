use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a mock server, or returns `None` where localhost sockets are unavailable.
///
/// Panics instead of skipping when `FETCHKIT_REQUIRE_SOCKET_TESTS=1`.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return Some(MockServer::start().await);
    }
    let required = std::env::var("FETCHKIT_REQUIRE_SOCKET_TESTS").is_ok_and(|v| v == "1");
    assert!(!required, "[socket-bound-test] cannot bind a localhost socket");
    eprintln!("[socket-bound-test] cannot bind a localhost socket; skipping");
    None
}
