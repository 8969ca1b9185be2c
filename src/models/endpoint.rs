use std::fmt;
use std::sync::Arc;

use http::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RotaError};

/// Sentinel session value asking for a fresh endpoint
pub const SESSION_CREATE: &str = "create";

/// Separator every usable endpoint carries (`host:port[:credentials]`)
const ENDPOINT_SEPARATOR: char = ':';

/// One upstream proxy, as handed out by the pool provider
///
/// Opaque to the controller apart from the `:` separator used to tell a sticky
/// session from a request for a new one. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    /// Parse an endpoint, trimming surrounding whitespace
    ///
    /// Fails when the value is empty or could not be sent in a header.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RotaError::InvalidEndpoint("empty endpoint".into()));
        }
        if HeaderValue::from_str(trimmed).is_err() {
            return Err(RotaError::InvalidEndpoint(trimmed.to_string()));
        }
        Ok(Endpoint(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this looks like `host:port` rather than a free-form token
    pub fn is_sticky_format(&self) -> bool {
        self.0.contains(ENDPOINT_SEPARATOR)
    }

    /// Header representation; always valid because `parse` checked it
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.0).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// Proxy target URL for this endpoint (`scheme://host:port`)
    pub fn proxy_url(&self, scheme: &str) -> String {
        format!("{}://{}", scheme, self.0)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = RotaError;

    fn try_from(value: String) -> Result<Self> {
        Endpoint::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.0.to_string()
    }
}

/// Session value carried on a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// Assign a fresh endpoint
    Create,
    /// Keep using the given endpoint
    Sticky(Endpoint),
}

impl Session {
    /// Interpret a session header value
    ///
    /// Anything that is not a well-formed `host:port` endpoint, including the
    /// `create` sentinel and non-ASCII garbage, asks for a new assignment.
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        let Some(raw) = value.and_then(|v| v.to_str().ok()) else {
            return Session::Create;
        };
        if raw == SESSION_CREATE {
            return Session::Create;
        }
        match Endpoint::parse(raw) {
            Ok(endpoint) if endpoint.is_sticky_format() => Session::Sticky(endpoint),
            _ => Session::Create,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse_trims() {
        let endpoint = Endpoint::parse("  10.0.0.1:8080  ").unwrap();
        assert_eq!(endpoint.as_str(), "10.0.0.1:8080");
        assert!(endpoint.is_sticky_format());
    }

    #[test]
    fn test_endpoint_parse_rejects_empty_and_control_chars() {
        assert!(matches!(
            Endpoint::parse("   "),
            Err(RotaError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Endpoint::parse("10.0.0.1:80\u{0}"),
            Err(RotaError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_endpoint_proxy_url() {
        let endpoint = Endpoint::parse("proxy.example:3128:user:pass").unwrap();
        assert_eq!(
            endpoint.proxy_url("http"),
            "http://proxy.example:3128:user:pass"
        );
    }

    #[test]
    fn test_session_from_header() {
        assert_eq!(Session::from_header(None), Session::Create);
        assert_eq!(
            Session::from_header(Some(&HeaderValue::from_static("create"))),
            Session::Create
        );
        assert_eq!(
            Session::from_header(Some(&HeaderValue::from_static("abc123"))),
            Session::Create
        );
        assert_eq!(
            Session::from_header(Some(&HeaderValue::from_static("1.2.3.4:8000"))),
            Session::Sticky(Endpoint::parse("1.2.3.4:8000").unwrap())
        );
    }

    #[test]
    fn test_endpoint_deserialize_validates() {
        let ok: Endpoint = serde_json::from_str("\"1.2.3.4:8000\"").unwrap();
        assert_eq!(ok.as_str(), "1.2.3.4:8000");
        assert!(serde_json::from_str::<Endpoint>("\"\"").is_err());
    }
}
