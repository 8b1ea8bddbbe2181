//! Environment-driven server configuration.

use std::env;

/// Default listen port.
const DEFAULT_PORT: u16 = 8085;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Whether to seed the always-joinable debug rooms at startup.
    pub debug_rooms: bool,
}

impl ServerConfig {
    /// Reads configuration from the environment.
    ///
    /// - `PORT` — listen port (default 8085). Unparseable values fall
    ///   back to the default.
    /// - `HUDDLE_DEBUG_ROOMS` — `1`/`true`/`yes` seeds the debug rooms.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let debug_rooms = env::var("HUDDLE_DEBUG_ROOMS")
            .map(|value| truthy(&value))
            .unwrap_or(false);

        Self {
            bind_addr: format!("0.0.0.0:{port}"),
            debug_rooms,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            debug_rooms: false,
        }
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8085");
        assert!(!config.debug_rooms);
    }

    #[test]
    fn test_truthy_values() {
        assert!(truthy("1"));
        assert!(truthy("true"));
        assert!(truthy("YES"));
        assert!(truthy(" true "));
        assert!(!truthy("0"));
        assert!(!truthy("false"));
        assert!(!truthy(""));
    }
}
