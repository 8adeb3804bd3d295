//! WebSocket upgrade handling and peer metadata

use axum::{
    extract::ws::{WebSocket, WebSocketUpgrade as AxumWebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use futures::future::BoxFuture;
use std::fmt;

/// Forwarding headers checked for the client address, in order of preference
const CLIENT_IP_HEADERS: [&str; 7] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip", // Cloudflare
    "x-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// What is known about the peer at upgrade time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerInfo {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl PeerInfo {
    /// Extract peer metadata from request headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        let client_ip = CLIENT_IP_HEADERS.iter().find_map(|name| {
            // For X-Forwarded-For, take the first IP
            let value = header(name)?;
            let ip = value.split(',').next().unwrap_or(&value).trim();
            (!ip.is_empty()).then(|| ip.to_string())
        });

        Self {
            client_ip,
            user_agent: header("user-agent"),
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ip: {}, agent: {}",
            self.client_ip.as_deref().unwrap_or("unknown"),
            self.user_agent.as_deref().unwrap_or("unknown")
        )
    }
}

/// Pending WebSocket upgrade with the request headers it arrived with
pub struct WebSocketUpgrade {
    upgrade: AxumWebSocketUpgrade,
    headers: HeaderMap,
}

impl WebSocketUpgrade {
    pub fn new(upgrade: AxumWebSocketUpgrade, headers: HeaderMap) -> Self {
        Self { upgrade, headers }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn peer(&self) -> PeerInfo {
        PeerInfo::from_headers(&self.headers)
    }

    /// Complete the WebSocket upgrade
    pub fn on_upgrade<F>(self, callback: F) -> Response
    where
        F: FnOnce(WebSocket) -> BoxFuture<'static, ()> + Send + 'static,
    {
        self.upgrade.on_upgrade(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "192.168.1.1, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.9.9.9".parse().unwrap());
        headers.insert("user-agent", "test-agent".parse().unwrap());

        let peer = PeerInfo::from_headers(&headers);
        assert_eq!(peer.client_ip.as_deref(), Some("192.168.1.1"));
        assert_eq!(peer.user_agent.as_deref(), Some("test-agent"));
        assert_eq!(peer.to_string(), "ip: 192.168.1.1, agent: test-agent");
    }

    #[test]
    fn test_empty_forwarded_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " ".parse().unwrap());
        headers.insert("cf-connecting-ip", "203.0.113.7".parse().unwrap());

        let peer = PeerInfo::from_headers(&headers);
        assert_eq!(peer.client_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(peer.user_agent, None);
    }

    #[test]
    fn test_no_headers() {
        let peer = PeerInfo::from_headers(&HeaderMap::new());
        assert_eq!(peer, PeerInfo::default());
        assert_eq!(peer.to_string(), "ip: unknown, agent: unknown");
    }
}
