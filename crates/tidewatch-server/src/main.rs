//! Tidewatch server entry point.
//!
//! Configuration comes from the environment:
//! - `TIDEWATCH_BIND`: full bind address, e.g. `127.0.0.1:4000`
//! - `PORT`: port on `0.0.0.0`, used when `TIDEWATCH_BIND` is unset
//! - `RUST_LOG`: log filter, `info` by default

use tidewatch::DEFAULT_BIND;
use tidewatch::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), TidewatchError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let addr = bind_addr(
        std::env::var("TIDEWATCH_BIND").ok(),
        std::env::var("PORT").ok(),
    );

    let server = TidewatchServer::builder().bind(&addr).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await
}

fn bind_addr(bind: Option<String>, port: Option<String>) -> String {
    if let Some(bind) = bind.filter(|b| !b.trim().is_empty()) {
        return bind;
    }
    match port.as_deref().map(str::trim).map(str::parse::<u16>) {
        Some(Ok(port)) => format!("0.0.0.0:{port}"),
        Some(Err(_)) => {
            tracing::warn!("PORT is not a valid port number, using default");
            DEFAULT_BIND.to_string()
        }
        None => DEFAULT_BIND.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr_prefers_explicit_bind() {
        assert_eq!(
            bind_addr(Some("127.0.0.1:9000".into()), Some("4000".into())),
            "127.0.0.1:9000"
        );
    }

    #[test]
    fn test_bind_addr_uses_port() {
        assert_eq!(bind_addr(None, Some(" 4000 ".into())), "0.0.0.0:4000");
    }

    #[test]
    fn test_bind_addr_falls_back_to_default() {
        assert_eq!(bind_addr(None, None), DEFAULT_BIND);
        assert_eq!(bind_addr(Some("  ".into()), Some("nope".into())), DEFAULT_BIND);
    }
}
