// src/proxy/backend.rs
use super::forwarder::{Forwarder, HttpClient};
use super::ProxyError;
use chrono::{DateTime, Utc};
use hyper::{Body, Request, Response};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{PoisonError, RwLock};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("invalid backend url {raw:?}: {source}")]
    Invalid {
        raw: String,
        #[source]
        source: url::ParseError,
    },

    #[error("backend url {0:?} has no host")]
    MissingHost(String),

    #[error("backend url {raw:?} uses unsupported scheme {scheme:?}")]
    UnsupportedScheme { raw: String, scheme: String },
}

/// One upstream server. Only the liveness flag (and its probe timestamp)
/// changes after construction.
#[derive(Debug)]
pub struct Backend {
    url: Url,
    address: String,
    alive: RwLock<bool>,
    last_checked: RwLock<Option<DateTime<Utc>>>,
    forwarder: Forwarder,
}

/// Point-in-time view of a backend for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub url: String,
    pub alive: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Backend {
    /// Parses `raw` into a backend that starts out alive.
    ///
    /// Accepts `http://` and `https://` URLs as well as bare `host:port`,
    /// which is treated as plain HTTP.
    pub fn parse(raw: &str, client: HttpClient) -> Result<Self, AddressError> {
        let raw = raw.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let url = Url::parse(&candidate).map_err(|source| AddressError::Invalid {
            raw: raw.to_string(),
            source,
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AddressError::UnsupportedScheme {
                raw: raw.to_string(),
                scheme: url.scheme().to_string(),
            });
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(AddressError::MissingHost(raw.to_string())),
        };
        // http and https always have a known default port
        let port = url.port_or_known_default().unwrap_or(80);
        let address = format!("{}:{}", host, port);

        Ok(Self {
            forwarder: Forwarder::new(url.clone(), client),
            url,
            address,
            alive: RwLock::new(true),
            last_checked: RwLock::new(None),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host:port` used for health probes.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_alive(&self, alive: bool) {
        *self.alive.write().unwrap_or_else(PoisonError::into_inner) = alive;
    }

    /// Stores a probe result and returns the previous liveness.
    pub fn record_probe(&self, alive: bool) -> bool {
        let previous = {
            let mut guard = self.alive.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, alive)
        };

        *self
            .last_checked
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        previous
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self.last_checked.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> BackendStatus {
        BackendStatus {
            url: self.url.to_string(),
            alive: self.is_alive(),
            last_checked: self.last_checked(),
        }
    }

    pub async fn forward(
        &self,
        req: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError> {
        self.forwarder.forward(req, peer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::build_client;
    use std::sync::Arc;

    fn backend(raw: &str) -> Backend {
        Backend::parse(raw, build_client()).unwrap()
    }

    #[test]
    fn test_parse_http_url() {
        let b = backend("http://localhost:9001");
        assert_eq!(b.address(), "localhost:9001");
        assert_eq!(b.url().as_str(), "http://localhost:9001/");
        assert!(b.is_alive());
        assert!(b.last_checked().is_none());
    }

    #[test]
    fn test_parse_defaults_and_bare_addresses() {
        assert_eq!(backend("https://api.example.com").address(), "api.example.com:443");
        assert_eq!(backend("10.0.0.5:8080").address(), "10.0.0.5:8080");
        assert_eq!(backend("http://[::1]:9000/base").address(), "[::1]:9000");
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        let client = build_client();

        assert!(matches!(
            Backend::parse("http://", client.clone()),
            Err(AddressError::Invalid { .. })
        ));
        assert!(matches!(
            Backend::parse("ftp://files.example.com", client.clone()),
            Err(AddressError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            Backend::parse("http://exa mple.com", client),
            Err(AddressError::Invalid { .. })
        ));
    }

    #[test]
    fn test_set_alive_round_trip() {
        let b = backend("127.0.0.1:9001");

        b.set_alive(false);
        assert!(!b.is_alive());
        b.set_alive(true);
        assert!(b.is_alive());
    }

    #[test]
    fn test_liveness_is_independent_per_backend() {
        let backends: Vec<Arc<Backend>> = (0..4)
            .map(|i| Arc::new(backend(&format!("127.0.0.1:{}", 9001 + i))))
            .collect();

        std::thread::scope(|scope| {
            for (i, b) in backends.iter().enumerate() {
                let b = Arc::clone(b);
                scope.spawn(move || {
                    let expected = i % 2 == 0;
                    for _ in 0..1_000 {
                        b.set_alive(!expected);
                        b.set_alive(expected);
                        assert_eq!(b.is_alive(), expected);
                    }
                });
            }
        });

        let flags: Vec<bool> = backends.iter().map(|b| b.is_alive()).collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn test_record_probe_returns_previous_state() {
        let b = backend("127.0.0.1:9001");

        assert!(b.record_probe(false));
        assert!(!b.record_probe(true));
        assert!(b.is_alive());
        assert!(b.last_checked().is_some());
    }

    #[test]
    fn test_status_serializes() {
        let b = backend("127.0.0.1:9001");
        b.set_alive(false);

        let json = serde_json::to_value(b.status()).unwrap();
        assert_eq!(json["url"], "http://127.0.0.1:9001/");
        assert_eq!(json["alive"], false);
        assert!(json["last_checked"].is_null());
    }
}
