//! Environment-driven configuration.
//!
//! | Env var                | Default                  |
//! |------------------------|--------------------------|
//! | `GATEWAY_ADDR`         | `0.0.0.0:3000`           |
//! | `DATAMANAGER_GRPC_URL` | `http://localhost:50051` |

use std::net::SocketAddr;

use anyhow::{Context, Result};

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_BACKEND_URL: &str = "http://localhost:50051";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// gRPC endpoint of the readings backend, always with a scheme.
    pub backend_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = get("GATEWAY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let listen_addr = addr
            .parse()
            .with_context(|| format!("GATEWAY_ADDR '{addr}' is not a socket address"))?;

        let backend_url = with_scheme(
            &get("DATAMANAGER_GRPC_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
        );

        Ok(Self {
            listen_addr,
            backend_url,
        })
    }
}

/// `localhost:50051` → `http://localhost:50051`; URLs with a scheme pass through.
fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}
