//! Huddle server binary.

use huddle::{seed_debug_rooms, ServerBuilder, ServerConfig};
use huddle_room::{ask, Ask, Registry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();

    let mut registry = Registry::new();
    registry.register_protocol(ask::PROTOCOL, Ask::new);
    if config.debug_rooms {
        seed_debug_rooms(&mut registry)?;
    }

    tracing::info!(addr = %config.bind_addr, "starting Huddle server");
    let server = ServerBuilder::new()
        .bind(&config.bind_addr)
        .build(registry)
        .await?;
    server.run().await?;
    Ok(())
}
