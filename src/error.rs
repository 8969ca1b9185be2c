use thiserror::Error;

/// Unified error type for rota-session
///
/// Only construction and pool bootstrap return these. The lifecycle hooks
/// absorb every proxy failure as a rotation instead of surfacing it.
#[derive(Error, Debug)]
pub enum RotaError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Pool errors
    #[error("No proxies available")]
    NoProxiesAvailable,

    #[error("Failed to fetch proxy pool from {url}, received: {status}")]
    PoolFetchFailed { url: String, status: u16 },

    #[error("Failed to reach proxy pool at {url}: {reason}")]
    PoolUnreachable { url: String, reason: String },

    #[error("Invalid proxy endpoint: {0}")]
    InvalidEndpoint(String),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type alias for rota-session operations
pub type Result<T> = std::result::Result<T, RotaError>;

impl RotaError {
    /// Whether this error means the rotation feature cannot run at all.
    ///
    /// Hosts that treat proxying as optional can disable the controller on
    /// these instead of aborting startup.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RotaError::InvalidConfig(_)
                | RotaError::NoProxiesAvailable
                | RotaError::PoolFetchFailed { .. }
                | RotaError::PoolUnreachable { .. }
                | RotaError::InvalidUrl(_)
        )
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for RotaError {
    fn from(err: url::ParseError) -> Self {
        RotaError::InvalidUrl(err.to_string())
    }
}
