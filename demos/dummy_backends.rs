//! demos/dummy_backends.rs
//! Run: cargo run --example dummy_backends -- [count] [first_port]
//!
//! Starts `count` (default 3) echo backends on consecutive ports starting at
//! `first_port` (default 9001). Each answers with its name and a request
//! counter. `JITTER_MS` adds a random delay per request.

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server,
};
use rand::Rng;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

#[derive(Clone)]
struct DummyBackend {
    port: u16,
    name: String,
    requests: Arc<AtomicU64>,
    jitter_ms: u64,
}

async fn handle(req: Request<Body>, backend: DummyBackend) -> Result<Response<Body>, Infallible> {
    let n = backend.requests.fetch_add(1, Ordering::SeqCst) + 1;

    let delay = if backend.jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=backend.jitter_ms)
    } else {
        0
    };
    if delay > 0 {
        sleep(Duration::from_millis(delay)).await;
    }

    let forwarded_for = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let body = format!(
        "Hello from {} (port {}), request #{} for {} [x-forwarded-for: {}]\n",
        backend.name,
        backend.port,
        n,
        req.uri(),
        forwarded_for
    );

    let mut response = Response::new(Body::from(body));
    if let Ok(value) = backend.name.parse() {
        response.headers_mut().insert("x-backend-name", value);
    }
    Ok(response)
}

async fn serve(backend: DummyBackend) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], backend.port));
    let name = backend.name.clone();

    let make_svc = make_service_fn(move |_conn| {
        let backend = backend.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle(req, backend.clone())))
        }
    });

    println!("Dummy backend '{}' on http://{}", name, addr);
    Server::try_bind(&addr)?.serve(make_svc).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let count: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "3".into())
        .parse()?;
    let first_port: u16 = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "9001".into())
        .parse()?;
    let jitter_ms = std::env::var("JITTER_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let servers = (0..count).map(|i| {
        serve(DummyBackend {
            port: first_port + i,
            name: format!("backend-{}", i + 1),
            requests: Arc::new(AtomicU64::new(0)),
            jitter_ms,
        })
    });

    for result in futures::future::join_all(servers).await {
        result?;
    }
    Ok(())
}
