// src/proxy/mod.rs
mod backend;
mod forwarder;
mod proxy;

pub use backend::{AddressError, Backend, BackendStatus};
pub use forwarder::{build_client, Forwarder, HttpClient};
pub use proxy::{Proxy, ProxyError};
