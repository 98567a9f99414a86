// ────────────────────────────────
// src/proxy/proxy.rs
// Request dispatcher: pick a backend, forward, relay.
// ────────────────────────────────

use crate::load_balancer::LoadBalancer;
use crate::metrics::{MetricsCollector, Timer};
use crate::server::PeerAddr;
use hyper::header::HeaderValue;
use hyper::{Body, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

const X_REQUEST_ID: &str = "x-request-id";

pub struct Proxy {
    balancer: Arc<LoadBalancer>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Proxy {
    pub fn new(balancer: Arc<LoadBalancer>) -> Self {
        Self {
            balancer,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub async fn handle(&self, mut req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let request_id = ensure_request_id(&mut req);
        let span = info_span!(
            "request",
            id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        self.dispatch(req).instrument(span).await
    }

    async fn dispatch(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let timer = Timer::new();
        let method = req.method().clone();

        let Some(backend) = self.balancer.next_backend() else {
            warn!("No healthy backends available");
            if let Some(metrics) = &self.metrics {
                metrics.record_no_backend();
            }
            return Err(ProxyError::NoHealthyBackends);
        };

        let peer = req.extensions().get::<PeerAddr>().map(|peer| peer.0);
        debug!(backend = %backend.address(), "Redirecting request");

        let result = backend.forward(req, peer).await;

        let status = match &result {
            Ok(response) => response.status(),
            Err(err) => {
                warn!(backend = %backend.address(), error = %err, "Upstream request failed");
                err.status()
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_request(
                method.as_str(),
                status.as_u16(),
                backend.address(),
                timer.elapsed(),
            );
        }

        result
    }
}

/// Returns the inbound request id, minting one when absent.
fn ensure_request_id(req: &mut Request<Body>) -> String {
    if let Some(id) = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
    {
        return id.to_string();
    }

    let id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        req.headers_mut().insert(X_REQUEST_ID, value);
    }
    id
}

// Custom error type for proxy operations
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No healthy backends available")]
    NoHealthyBackends,

    #[error("Backend {backend} failed: {source}")]
    Upstream {
        backend: String,
        #[source]
        source: hyper::Error,
    },

    #[error("Invalid upstream uri: {0}")]
    InvalidUri(#[from] hyper::http::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoHealthyBackends => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream { .. } | ProxyError::InvalidUri(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

// Convert ProxyError to Hyper Response for error handling
impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let message = match err {
            ProxyError::NoHealthyBackends => "No healthy backends available",
            ProxyError::Upstream { .. } | ProxyError::InvalidUri(_) => "Bad gateway",
        };

        let mut response = Response::new(Body::from(message));
        *response.status_mut() = err.status();
        response
    }
}
