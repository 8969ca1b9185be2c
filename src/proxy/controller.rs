//! Rotation controller
//!
//! Decides which endpoint each request goes through, spots bans and dropped
//! connections, rotates to the next endpoint and slows the affected download
//! slot down with a jittered backoff until a response comes back.
//!
//! Hooks are synchronous and never perform I/O. One controller must only see
//! one hook invocation at a time; [`SharedRotationController`] provides that
//! for multi-threaded hosts.

use std::sync::Arc;

use http::{HeaderName, StatusCode};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};

use crate::config::RotationConfig;
use crate::error::{Result, RotaError};
use crate::models::{Endpoint, ProxyRequest, ProxyResponse, Session, SlotStore, TransportFailure};
use crate::proxy::backoff::Backoff;
use crate::proxy::headers;
use crate::proxy::overlay::SlotDelayOverlay;
use crate::proxy::pool::EndpointPool;
use crate::proxy::source::{EndpointSource, HttpEndpointSource};

/// Why an endpoint was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// Response carried the ban status
    Banned,
    /// Connection refused, closed or lost
    ConnectionRefused,
}

impl RotationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banned => "proxy_rotation",
            Self::ConnectionRefused => "conn_refused",
        }
    }
}

/// What a response or exception hook did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to retry; the host carries on (or propagates the error)
    Passthrough,
    /// The request now points at a new endpoint and can be retried
    Rotated,
}

/// The three lifecycle hooks a host engine drives
pub trait SessionMiddleware {
    /// Assign or confirm the request's session before dispatch
    fn on_request(&mut self, request: &mut ProxyRequest);

    /// Inspect a response; rotates the request's endpoint on a ban
    fn on_response(
        &mut self,
        request: &mut ProxyRequest,
        response: &mut ProxyResponse,
        slots: &mut dyn SlotStore,
    ) -> Outcome;

    /// Inspect a transport failure; rotates on connection-level failures
    fn on_exception(
        &mut self,
        request: &mut ProxyRequest,
        failure: &TransportFailure,
        slots: &mut dyn SlotStore,
    ) -> Outcome;
}

/// State that only exists while rotation is enabled
#[derive(Debug)]
struct ActiveState {
    pool: EndpointPool,
    backoff: Backoff,
    overlay: SlotDelayOverlay,
    scheme: String,
    session_header: HeaderName,
    ban_status: StatusCode,
}

impl ActiveState {
    /// Point the request at `endpoint` in metadata and the session header
    fn assign(&self, request: &mut ProxyRequest, endpoint: &Endpoint) {
        request.meta.proxy = Some(endpoint.proxy_url(&self.scheme));
        request.meta.proxy_session = Some(endpoint.clone());
        request
            .headers
            .insert(self.session_header.clone(), endpoint.header_value());
    }

    fn rotate(&mut self, request: &mut ProxyRequest, slots: &mut dyn SlotStore, reason: RotationReason) {
        let endpoint = self.pool.next();
        info!(endpoint = %endpoint, reason = reason.as_str(), "Using new proxy");
        self.assign(request, &endpoint);

        // One draw per rotation, whether or not the slot exists
        let delay = self.backoff.next_delay();
        if let Some(key) = request.meta.slot.as_deref() {
            self.overlay.apply_override(slots, key, delay);
        }
    }
}

/// Sticky-session proxy rotation controller
#[derive(Debug)]
pub struct RotationController {
    active: Option<ActiveState>,
}

impl RotationController {
    /// A controller whose hooks do nothing
    pub fn disabled() -> Self {
        Self { active: None }
    }

    /// Build from an already fetched endpoint list
    ///
    /// Rotation is enabled only when the config turns it on and the list is
    /// non-empty.
    pub fn new(config: &RotationConfig, endpoints: Vec<Endpoint>) -> Result<Self> {
        Self::with_rng(config, endpoints, &mut StdRng::from_entropy())
    }

    /// Same as [`RotationController::new`] with pool offset and jitter drawn from `rng`
    pub fn with_rng<R: Rng + ?Sized>(
        config: &RotationConfig,
        endpoints: Vec<Endpoint>,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;

        if !config.enabled {
            return Ok(Self::disabled());
        }
        if endpoints.is_empty() {
            warn!("Proxy disabled, pool has no usable endpoints");
            return Ok(Self::disabled());
        }

        let pool = EndpointPool::with_rng(endpoints, rng)?;
        let backoff = Backoff::with_rng(
            config.backoff.strategy,
            config.backoff.step(),
            config.backoff.max(),
            StdRng::seed_from_u64(rng.gen()),
        )?;
        let session_header = HeaderName::from_bytes(config.session_header.as_bytes())
            .map_err(|e| RotaError::InvalidConfig(format!("invalid session header: {}", e)))?;
        let ban_status = StatusCode::from_u16(config.ban_status)
            .map_err(|e| RotaError::InvalidConfig(format!("invalid ban status: {}", e)))?;

        info!(
            endpoints = pool.len(),
            backoff = config.backoff.strategy.as_str(),
            "Proxy rotation enabled"
        );

        Ok(Self {
            active: Some(ActiveState {
                pool,
                backoff,
                overlay: SlotDelayOverlay::new(),
                scheme: config.scheme.clone(),
                session_header,
                ban_status,
            }),
        })
    }

    /// Fetch the pool from `source` and build the controller
    ///
    /// The source is not contacted when rotation is turned off. Fetch
    /// failures are returned; the caller decides whether they are fatal.
    pub async fn bootstrap(config: &RotationConfig, source: &dyn EndpointSource) -> Result<Self> {
        config.validate()?;
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let endpoints = source.fetch().await?;
        Self::new(config, endpoints)
    }

    /// Fetch the pool from the configured provider URL and build the controller
    pub async fn from_config(config: &RotationConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let Some(url) = config.pool_url.as_deref() else {
            warn!("Proxy disabled, missing PROXY_POOL_URL configuration");
            return Ok(Self::disabled());
        };

        let source = HttpEndpointSource::new(url, config.fetch_timeout())?;
        Self::bootstrap(config, &source).await
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Enabled and not opted out by the request
    pub fn is_enabled_for(&self, request: &ProxyRequest) -> bool {
        self.is_enabled() && !request.meta.dont_proxy
    }

    /// Number of endpoints in the pool, zero when disabled
    pub fn pool_size(&self) -> usize {
        self.active.as_ref().map(|s| s.pool.len()).unwrap_or(0)
    }

    /// Backoff delays drawn so far
    pub fn backoff_attempts(&self) -> u64 {
        self.active.as_ref().map(|s| s.backoff.attempt()).unwrap_or(0)
    }

    /// Whether a delay override is active for `slot`
    pub fn is_slot_overridden(&self, slot: &str) -> bool {
        self.active
            .as_ref()
            .map(|s| s.overlay.is_overridden(slot))
            .unwrap_or(false)
    }

    pub fn into_shared(self) -> SharedRotationController {
        SharedRotationController::new(self)
    }
}

impl SessionMiddleware for RotationController {
    fn on_request(&mut self, request: &mut ProxyRequest) {
        let Some(state) = self.active.as_mut() else {
            return;
        };

        let endpoint = match Session::from_header(request.headers.get(&state.session_header)) {
            Session::Sticky(endpoint) => endpoint,
            Session::Create => {
                let endpoint = match request.meta.proxy_session.clone() {
                    Some(suggested) => suggested,
                    None => state.pool.next(),
                };
                info!(endpoint = %endpoint, "Request using new proxy");
                endpoint
            }
        };

        state.assign(request, &endpoint);
        headers::sanitize(&mut request.headers, &request.url);
    }

    fn on_response(
        &mut self,
        request: &mut ProxyRequest,
        response: &mut ProxyResponse,
        slots: &mut dyn SlotStore,
    ) -> Outcome {
        let Some(state) = self.active.as_mut() else {
            return Outcome::Passthrough;
        };

        if let Some(session) = &request.meta.proxy_session {
            response
                .headers
                .insert(state.session_header.clone(), session.header_value());
        }

        // Restore before the ban check so a ban's fresh override wins
        if let Some(key) = request.meta.slot.as_deref() {
            state.overlay.restore_if_overridden(slots, key);
        }

        if response.status != state.ban_status {
            return Outcome::Passthrough;
        }

        error!(
            status = response.status.as_u16(),
            url = %request.url,
            "Response body: \n\n{}\n\n",
            response.body_text()
        );
        state.rotate(request, slots, RotationReason::Banned);
        Outcome::Rotated
    }

    fn on_exception(
        &mut self,
        request: &mut ProxyRequest,
        failure: &TransportFailure,
        slots: &mut dyn SlotStore,
    ) -> Outcome {
        if !self.is_enabled_for(request) || !failure.is_connection_failure() {
            return Outcome::Passthrough;
        }
        let Some(state) = self.active.as_mut() else {
            return Outcome::Passthrough;
        };

        state.rotate(request, slots, RotationReason::ConnectionRefused);
        Outcome::Rotated
    }
}

/// Clone-able, thread-safe handle to one controller
///
/// Serializes hook invocations with a mutex. The lock is only held for the
/// duration of a hook, never across an await.
#[derive(Debug, Clone)]
pub struct SharedRotationController {
    inner: Arc<Mutex<RotationController>>,
}

impl SharedRotationController {
    pub fn new(controller: RotationController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().is_enabled()
    }

    pub fn backoff_attempts(&self) -> u64 {
        self.inner.lock().backoff_attempts()
    }

    pub fn on_request(&self, request: &mut ProxyRequest) {
        self.inner.lock().on_request(request)
    }

    pub fn on_response(
        &self,
        request: &mut ProxyRequest,
        response: &mut ProxyResponse,
        slots: &mut dyn SlotStore,
    ) -> Outcome {
        self.inner.lock().on_response(request, response, slots)
    }

    pub fn on_exception(
        &self,
        request: &mut ProxyRequest,
        failure: &TransportFailure,
        slots: &mut dyn SlotStore,
    ) -> Outcome {
        self.inner.lock().on_exception(request, failure, slots)
    }
}

impl SessionMiddleware for SharedRotationController {
    fn on_request(&mut self, request: &mut ProxyRequest) {
        SharedRotationController::on_request(self, request)
    }

    fn on_response(
        &mut self,
        request: &mut ProxyRequest,
        response: &mut ProxyResponse,
        slots: &mut dyn SlotStore,
    ) -> Outcome {
        SharedRotationController::on_response(self, request, response, slots)
    }

    fn on_exception(
        &mut self,
        request: &mut ProxyRequest,
        failure: &TransportFailure,
        slots: &mut dyn SlotStore,
    ) -> Outcome {
        SharedRotationController::on_exception(self, request, failure, slots)
    }
}
