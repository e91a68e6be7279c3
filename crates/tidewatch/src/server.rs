//! `TidewatchServer` builder and accept loop.
//!
//! Ties the layers together: transport → codec → hub → { scoring,
//! interrupts } → session registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tidewatch_interrupt::InterruptConfig;
use tidewatch_protocol::JsonCodec;
use tidewatch_scoring::ScoringConfig;
use tidewatch_session::GameConfig;

use crate::TidewatchError;
use crate::handler::handle_connection;
use crate::hub::Hub;
use crate::transport::WebSocketListener;

/// Default address when none is configured.
pub const DEFAULT_BIND: &str = "0.0.0.0:3001";

/// Builder for configuring and starting a Tidewatch server.
///
/// # Example
///
/// ```rust,ignore
/// use tidewatch::prelude::*;
///
/// let server = TidewatchServer::builder()
///     .bind("0.0.0.0:3001")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct TidewatchServerBuilder {
    bind_addr: String,
    idle_timeout: Duration,
    game: GameConfig,
    scoring: ScoringConfig,
    interrupts: InterruptConfig,
}

impl TidewatchServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            idle_timeout: Duration::from_secs(30),
            game: GameConfig::default(),
            scoring: ScoringConfig::default(),
            interrupts: InterruptConfig::default(),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// How long a connection may stay silent before it is dropped.
    /// Clients are expected to heartbeat well inside this.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game = config;
        self
    }

    pub fn scoring_config(mut self, config: ScoringConfig) -> Self {
        self.scoring = config;
        self
    }

    pub fn interrupt_config(mut self, config: InterruptConfig) -> Self {
        self.interrupts = config;
        self
    }

    /// Binds the listener and starts the interrupt forwarder.
    ///
    /// Must be called from inside a Tokio runtime.
    pub async fn build(self) -> Result<TidewatchServer, TidewatchError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let idle_timeout = if self.idle_timeout.is_zero() {
            tracing::warn!("idle_timeout is zero, using 30s");
            Duration::from_secs(30)
        } else {
            self.idle_timeout
        };

        let (hub, events) = Hub::new(self.game, self.scoring, self.interrupts);
        let hub = Arc::new(hub);
        tokio::spawn(Arc::clone(&hub).forward_interrupts(events));

        Ok(TidewatchServer {
            listener,
            hub,
            codec: JsonCodec,
            idle_timeout,
        })
    }
}

impl Default for TidewatchServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tidewatch server. Call [`run()`](Self::run) to start
/// accepting connections.
pub struct TidewatchServer {
    listener: WebSocketListener,
    hub: Arc<Hub>,
    codec: JsonCodec,
    idle_timeout: Duration,
}

impl TidewatchServer {
    pub fn builder() -> TidewatchServerBuilder {
        TidewatchServerBuilder::new()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TidewatchError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared state, for embedding and inspection.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Accepts connections until the process is terminated, spawning a
    /// handler task for each.
    pub async fn run(self) -> Result<(), TidewatchError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Tidewatch server running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let hub = Arc::clone(&self.hub);
                    let codec = self.codec;
                    let idle_timeout = self.idle_timeout;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, hub, codec, idle_timeout).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
