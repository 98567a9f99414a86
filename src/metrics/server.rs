// src/metrics/server.rs
use super::MetricsRegistry;
use crate::load_balancer::LoadBalancer;
use crate::proxy::BackendStatus;
use anyhow::Result;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

const BACKENDS_PATH: &str = "/backends";

/// Serves the Prometheus exposition at `path` and the backend status list at
/// `/backends`.
pub fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
    balancer: Arc<LoadBalancer>,
) -> Result<JoinHandle<()>> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();
        let balancer = balancer.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let response = route(&req, &registry, &path, &balancer);
                async move { Ok::<_, Infallible>(response) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    Ok(tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    }))
}

fn route(
    req: &Request<Body>,
    registry: &MetricsRegistry,
    metrics_path: &str,
    balancer: &LoadBalancer,
) -> Response<Body> {
    let path = req.uri().path();

    if path == metrics_path {
        with_content_type(
            Response::new(Body::from(registry.gather())),
            "text/plain; version=0.0.4",
        )
    } else if path == BACKENDS_PATH {
        let statuses: Vec<BackendStatus> = balancer.backends().iter().map(|b| b.status()).collect();
        match serde_json::to_vec(&statuses) {
            Ok(json) => with_content_type(Response::new(Body::from(json)), "application/json"),
            Err(e) => {
                error!("Failed to serialize backend status: {}", e);
                status_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    } else {
        status_response(StatusCode::NOT_FOUND, "Not Found")
    }
}

fn with_content_type(mut response: Response<Body>, content_type: &'static str) -> Response<Body> {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn status_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_routes() {
        let registry = MetricsRegistry::new().unwrap();
        registry.collector().update_backend_counts(1, 2);
        let balancer = LoadBalancer::new(["127.0.0.1:9001", "127.0.0.1:9002"]);
        balancer.backends()[1].set_alive(false);

        let metrics = route(&get("/metrics"), &registry, "/metrics", &balancer);
        assert_eq!(metrics.status(), StatusCode::OK);
        assert!(body_string(metrics).await.contains("lb_total_backends 2"));

        let backends = route(&get("/backends"), &registry, "/metrics", &balancer);
        assert_eq!(backends.headers()[CONTENT_TYPE], "application/json");
        let json: serde_json::Value = serde_json::from_str(&body_string(backends).await).unwrap();
        assert_eq!(json[0]["url"], "http://127.0.0.1:9001/");
        assert_eq!(json[0]["alive"], true);
        assert_eq!(json[1]["alive"], false);

        let missing = route(&get("/nope"), &registry, "/metrics", &balancer);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
