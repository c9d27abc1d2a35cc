//! Configuration for the chat store and server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Environment variable for the server port.
pub const PORT_ENV: &str = "GLOSSY_PORT";
/// Environment variable for the server bind host.
pub const HOST_ENV: &str = "GLOSSY_HOST";
/// Environment variable for the server database path.
pub const SERVER_DB_ENV: &str = "GLOSSY_SERVER_DB";
/// Environment variable for the client durable tier path.
pub const DURABLE_DB_ENV: &str = "GLOSSY_DURABLE_DB";
/// Environment variable for the client fallback tier path.
pub const FALLBACK_FILE_ENV: &str = "GLOSSY_FALLBACK_FILE";
/// Environment variable for the remote API base URL.
pub const API_URL_ENV: &str = "GLOSSY_API_URL";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Storage locations.
    pub storage: StorageConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Transport client settings.
    pub client: ClientConfig,
}

impl ChatConfig {
    /// Defaults overlaid with `GLOSSY_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// Unparseable values are ignored and the default is kept.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup(PORT_ENV).and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Some(host) = lookup(HOST_ENV) {
            config.server.host = host;
        }
        if let Some(path) = lookup(SERVER_DB_ENV) {
            config.storage.server_db_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(DURABLE_DB_ENV) {
            config.storage.durable_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(FALLBACK_FILE_ENV) {
            config.storage.fallback_path = PathBuf::from(path);
        }
        if let Some(url) = lookup(API_URL_ENV) {
            config.client.api_url = url;
        }

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.server.port == 0 {
            return Err(ChatError::InvalidConfig("server.port must be > 0".to_string()));
        }

        if self.server.host.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "server.host must not be empty".to_string(),
            ));
        }

        if self.storage.durable_path == self.storage.fallback_path {
            return Err(ChatError::InvalidConfig(
                "storage.durable_path and storage.fallback_path must differ".to_string(),
            ));
        }

        Url::parse(&self.client.api_url)?;

        Ok(())
    }
}

/// Storage locations for both the client tiers and the server database.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` path of the client durable tier.
    pub durable_path: PathBuf,
    /// JSON key-value file of the client fallback tier.
    pub fallback_path: PathBuf,
    /// `SQLite` path of the server database.
    pub server_db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            durable_path: PathBuf::from("glossy_chats.sqlite"),
            fallback_path: PathBuf::from("glossy_chats.json"),
            server_db_path: PathBuf::from("chatbot.db"),
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Transport client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the remote API, including the `/api` prefix.
    pub api_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ChatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ChatConfig::from_lookup(|key| match key {
            PORT_ENV => Some("8080".to_string()),
            SERVER_DB_ENV => Some("/tmp/server.db".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.server_db_path, PathBuf::from("/tmp/server.db"));
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_from_lookup_ignores_bad_port() {
        let config = ChatConfig::from_lookup(|key| (key == PORT_ENV).then(|| "abc".to_string()));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_validate_rejects_shared_client_paths() {
        let mut config = ChatConfig::default();
        config.storage.fallback_path = config.storage.durable_path.clone();
        assert!(matches!(config.validate(), Err(ChatError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = ChatConfig::default();
        config.client.api_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ChatError::Url(_))));
    }
}
