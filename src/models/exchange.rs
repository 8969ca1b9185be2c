use std::fmt;
use std::io;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use url::Url;

use super::Endpoint;
use crate::error::Result;

/// Per-request metadata the controller reads and writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Proxy target the host should dial (`scheme://endpoint`)
    pub proxy: Option<String>,
    /// Sticky session endpoint; also accepted as a caller-suggested endpoint
    pub proxy_session: Option<Endpoint>,
    /// Download slot key grouping requests that share a delay
    pub slot: Option<String>,
    /// Opt this request out of proxying
    pub dont_proxy: bool,
}

/// Outgoing request as seen by the rotation hooks
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub meta: RequestMeta,
}

impl ProxyRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            meta: RequestMeta::default(),
        }
    }

    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Builder-style header insert; silently skips values that are not valid header text
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.meta.slot = Some(slot.into());
        self
    }
}

/// Response handed back by the host
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body decoded for logging
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failure reported by the host instead of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// Upstream refused the connection
    ConnectionRefused,
    /// Connection closed cleanly before a response arrived
    ConnectionDone,
    /// Connection dropped mid-handshake or mid-stream
    ConnectionLost,
    /// Anything else; not handled by rotation
    Other(String),
}

impl TransportFailure {
    /// Failure kinds that trigger a rotation
    pub fn is_connection_failure(&self) -> bool {
        !matches!(self, TransportFailure::Other(_))
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::ConnectionRefused => f.write_str("connection refused"),
            TransportFailure::ConnectionDone => f.write_str("connection closed"),
            TransportFailure::ConnectionLost => f.write_str("connection lost"),
            TransportFailure::Other(msg) => f.write_str(msg),
        }
    }
}

impl From<&io::Error> for TransportFailure {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => TransportFailure::ConnectionRefused,
            io::ErrorKind::UnexpectedEof => TransportFailure::ConnectionDone,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportFailure::ConnectionLost,
            _ => TransportFailure::Other(err.to_string()),
        }
    }
}

impl From<&reqwest::Error> for TransportFailure {
    fn from(err: &reqwest::Error) -> Self {
        // Only socket errors classify; DNS, TLS and timeouts stay `Other`.
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            if let Some(io_err) = inner.downcast_ref::<io::Error>() {
                let failure = TransportFailure::from(io_err);
                if failure.is_connection_failure() {
                    return failure;
                }
            }
            source = inner.source();
        }

        TransportFailure::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HOST;

    #[test]
    fn test_transport_failure_from_io_error() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(
            TransportFailure::from(&refused),
            TransportFailure::ConnectionRefused
        );

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(TransportFailure::from(&reset), TransportFailure::ConnectionLost);

        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert_eq!(TransportFailure::from(&eof), TransportFailure::ConnectionDone);

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(!TransportFailure::from(&denied).is_connection_failure());
    }

    fn direct_client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_transport_failure_from_refused_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = direct_client()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();
        assert!(err.is_connect());
        assert_eq!(TransportFailure::from(&err), TransportFailure::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_transport_failure_from_dns_error_is_not_rotated() {
        let err = direct_client()
            .get("http://no-such-host.invalid/")
            .send()
            .await
            .unwrap_err();

        let failure = TransportFailure::from(&err);
        assert!(!failure.is_connection_failure(), "{:?}", failure);
    }

    #[test]
    fn test_request_builder_helpers() {
        let request = ProxyRequest::parse("https://real.example/path")
            .unwrap()
            .with_header(HOST, "real.example")
            .with_slot("real.example");

        assert_eq!(request.headers.get(HOST).unwrap(), "real.example");
        assert_eq!(request.meta.slot.as_deref(), Some("real.example"));
        assert!(request.meta.proxy.is_none());
    }

    #[test]
    fn test_response_body_text_lossy() {
        let response = ProxyResponse::new(StatusCode::BAD_GATEWAY, vec![b'o', b'k', 0xff]);
        assert_eq!(response.body_text(), "ok\u{fffd}");
    }
}
