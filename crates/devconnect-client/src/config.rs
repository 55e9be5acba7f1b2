//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use devconnect_shared::constants::{MAX_UPLOAD_SIZE, PRESENCE_TTL, TYPING_TIMEOUT};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite database file.
    /// Env: `DEVCONNECT_DB_PATH`
    /// Default: platform data directory.
    pub db_path: Option<PathBuf>,

    /// Root directory of the attachment buckets.
    /// Env: `DEVCONNECT_STORAGE_PATH`
    /// Default: `./storage`
    pub storage_path: PathBuf,

    /// Base URL under which stored objects are served.
    /// Env: `DEVCONNECT_PUBLIC_URL`
    pub public_url: String,

    /// Relay WebSocket URL. Unset means an in-process transport.
    /// Env: `DEVCONNECT_RELAY_URL`
    pub relay_url: Option<String>,

    /// Largest attachment accepted before upload.
    /// Env: `DEVCONNECT_MAX_UPLOAD_BYTES`
    pub max_upload_bytes: usize,

    /// Env: `DEVCONNECT_TYPING_TIMEOUT_MS`
    pub typing_timeout: Duration,

    /// Env: `DEVCONNECT_PRESENCE_TTL_SECS`
    pub presence_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            storage_path: PathBuf::from("./storage"),
            public_url: "http://localhost:8090/storage".to_string(),
            relay_url: None,
            max_upload_bytes: MAX_UPLOAD_SIZE,
            typing_timeout: TYPING_TIMEOUT,
            presence_ttl: PRESENCE_TTL,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("DEVCONNECT_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("DEVCONNECT_STORAGE_PATH").filter(|p| !p.is_empty()) {
            config.storage_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("DEVCONNECT_PUBLIC_URL").filter(|u| !u.is_empty()) {
            config.public_url = url;
        }

        if let Some(url) = lookup("DEVCONNECT_RELAY_URL").filter(|u| !u.is_empty()) {
            config.relay_url = Some(url);
        }

        if let Some(val) = lookup("DEVCONNECT_MAX_UPLOAD_BYTES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_bytes = n,
                _ => tracing::warn!(value = %val, "Invalid DEVCONNECT_MAX_UPLOAD_BYTES, using default"),
            }
        }

        if let Some(val) = lookup("DEVCONNECT_TYPING_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.typing_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid DEVCONNECT_TYPING_TIMEOUT_MS, using default"),
            }
        }

        if let Some(val) = lookup("DEVCONNECT_PRESENCE_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.presence_ttl = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid DEVCONNECT_PRESENCE_TTL_SECS, using default"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.typing_timeout, Duration::from_secs(3));
        assert!(config.relay_url.is_none());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let vars: HashMap<&str, &str> = [
            ("DEVCONNECT_RELAY_URL", "ws://relay:8090"),
            ("DEVCONNECT_TYPING_TIMEOUT_MS", "abc"),
            ("DEVCONNECT_PRESENCE_TTL_SECS", "30"),
            ("DEVCONNECT_MAX_UPLOAD_BYTES", "0"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.relay_url.as_deref(), Some("ws://relay:8090"));
        assert_eq!(config.typing_timeout, Duration::from_secs(3));
        assert_eq!(config.presence_ttl, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }
}
