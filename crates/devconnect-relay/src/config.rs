//! Relay configuration loaded from environment variables.
//!
//! Every setting has a default so the relay starts with zero configuration
//! for local development.

use std::net::SocketAddr;

use devconnect_shared::constants::DEFAULT_RELAY_PORT;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address for the HTTP / WebSocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8090`
    pub http_addr: SocketAddr,

    /// Human-readable name reported by `/info`.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Maximum concurrent WebSocket connections (0 = unlimited).
    /// Env: `MAX_CONNECTIONS`
    pub max_connections: usize,

    /// Sustained inbound frames per second per connection.
    /// Env: `EVENTS_PER_SEC`
    pub events_per_sec: f64,

    /// Frames a connection may send in a burst.
    /// Env: `EVENT_BURST`
    pub event_burst: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_RELAY_PORT).into(),
            instance_name: "DevConnect Relay".to_string(),
            max_connections: 0,
            events_per_sec: 20.0,
            event_burst: 40.0,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            if !name.trim().is_empty() {
                config.instance_name = name;
            }
        }

        if let Some(val) = lookup("MAX_CONNECTIONS") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_connections = n;
            }
        }

        if let Some(val) = lookup("EVENTS_PER_SEC") {
            match val.parse::<f64>() {
                Ok(rate) if rate > 0.0 => config.events_per_sec = rate,
                _ => tracing::warn!(value = %val, "Invalid EVENTS_PER_SEC, using default"),
            }
        }

        if let Some(val) = lookup("EVENT_BURST") {
            match val.parse::<f64>() {
                Ok(burst) if burst >= 1.0 => config.event_burst = burst,
                _ => tracing::warn!(value = %val, "Invalid EVENT_BURST, using default"),
            }
        }

        config
    }
}
