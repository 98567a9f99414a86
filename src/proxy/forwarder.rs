// ────────────────────────────────
// src/proxy/forwarder.rs
// Single-host reverse proxy: one Forwarder per backend, bound to its URL.
// ────────────────────────────────
use super::ProxyError;
use hyper::client::HttpConnector;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use hyper::{Body, Client, Request, Response, Uri, Version};
use hyper_tls::HttpsConnector;
use std::net::{IpAddr, SocketAddr};
use url::{Position, Url};

pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Shared upstream client. Cloning is cheap and shares the connection pool.
pub fn build_client() -> HttpClient {
    Client::builder().build(HttpsConnector::new())
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    target: Url,
    client: HttpClient,
}

impl Forwarder {
    pub fn new(target: Url, client: HttpClient) -> Self {
        Self { target, client }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Send `req` to the target and hand back the upstream response untouched
    /// apart from hop-by-hop headers.
    pub async fn forward(
        &self,
        mut req: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError> {
        let uri = rewrite_uri(&self.target, req.uri())?;
        *req.uri_mut() = uri;
        *req.version_mut() = Version::HTTP_11;

        remove_hop_headers(req.headers_mut());
        if let Some(peer) = peer {
            append_forwarded_for(req.headers_mut(), peer.ip());
        }

        let mut response = self
            .client
            .request(req)
            .await
            .map_err(|source| ProxyError::Upstream {
                backend: self.target.to_string(),
                source,
            })?;

        remove_hop_headers(response.headers_mut());
        Ok(response)
    }
}

pub(crate) fn rewrite_uri(target: &Url, uri: &Uri) -> Result<Uri, ProxyError> {
    let authority = &target[Position::BeforeHost..Position::AfterPort];
    let path = join_paths(target.path(), uri.path());

    let query: Vec<&str> = [target.query(), uri.query()]
        .into_iter()
        .flatten()
        .filter(|q| !q.is_empty())
        .collect();

    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query.join("&"))
    };

    let uri = Uri::builder()
        .scheme(target.scheme())
        .authority(authority)
        .path_and_query(path_and_query)
        .build()?;
    Ok(uri)
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

pub(crate) fn remove_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, client_ip),
        None => client_ip.to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
