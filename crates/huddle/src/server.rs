//! `Server` builder and accept loop.
//!
//! This is the entry point for running a Huddle server. It ties the
//! layers together: transport → protocol → registry → rooms.

use std::sync::Arc;

use huddle_protocol::{Codec, JsonCodec, RoomId};
use huddle_room::{ask, Registry, RoomError};
use huddle_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::gateway::handle_connection;
use crate::ServerError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks; the
/// registry sits behind a `Mutex` and is locked only for create/lookup,
/// never across room I/O.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Huddle server.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = Registry::new();
/// registry.register_protocol(ask::PROTOCOL, Ask::new);
///
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:8085")
///     .build(registry)
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    bind_addr: String,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "0.0.0.0:8085".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Builds the server around the given registry.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`; the registry is taken
    /// by value so callers assemble it (protocols, debug rooms) first.
    pub async fn build(
        self,
        registry: Registry,
    ) -> Result<Server<JsonCodec>, ServerError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(registry),
            codec: JsonCodec,
        });

        Ok(Server { transport, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Huddle server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Server<C> {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr().map_err(ServerError::Transport)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a gateway task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!("Huddle server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
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

/// Seeds the four always-joinable debug rooms (`DEBUG`, `DEBUG:QUESTION`,
/// `DEBUG:ANSWER`, `DEBUG:RESULT`).
///
/// The `ASK` protocol must already be registered.
pub fn seed_debug_rooms(registry: &mut Registry) -> Result<(), RoomError> {
    for suffix in ["", ":QUESTION", ":ANSWER", ":RESULT"] {
        let id = RoomId::normalized(&format!("DEBUG{suffix}"));
        registry.seed_room(ask::PROTOCOL, id)?;
    }
    tracing::info!("created debug ASK rooms under id DEBUG");
    Ok(())
}
