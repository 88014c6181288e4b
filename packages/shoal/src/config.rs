//! Configuration, figment-layered from defaults / config.toml / env vars.
//!
//! Three equivalent ways to configure:
//!
//!   config.toml:     [socket]
//!                    url = "ws://localhost:8080/chat"
//!
//!   env var:         SHOAL_SOCKET__URL=ws://...   (double underscore = nesting)
//!
//!   (single underscore stays within field names: SHOAL_SOCKET__KEEP_CONNECT_SECS)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiFileConfig,
    #[serde(default)]
    pub socket: SocketFileConfig,
}

/// REST backend tunables (lives under `[api]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiFileConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
}

impl Default for ApiFileConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
        }
    }
}

/// Socket tunables (lives under `[socket]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SocketFileConfig {
    #[serde(default = "default_socket_url")]
    pub url: String,
    #[serde(default = "default_keep_connect_secs")]
    pub keep_connect_secs: u64,
}

impl Default for SocketFileConfig {
    fn default() -> Self {
        Self {
            url: default_socket_url(),
            keep_connect_secs: default_keep_connect_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost/api/v1".to_string()
}

fn default_socket_url() -> String {
    "ws://localhost:8080/chat".to_string()
}

fn default_keep_connect_secs() -> u64 {
    10
}

impl SocketFileConfig {
    pub fn keep_connect_interval(&self) -> Duration {
        Duration::from_secs(self.keep_connect_secs.max(1))
    }
}

/// Build a figment that layers: defaults → config.toml → SHOAL_* env vars.
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_dir.join("config.toml")))
        .merge(Env::prefixed("SHOAL_").split("__"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    #[test]
    fn defaults_extract() {
        let config: FileConfig = Figment::from(Serialized::defaults(FileConfig::default()))
            .extract()
            .unwrap();
        assert_eq!(config.api.url, "http://localhost/api/v1");
        assert_eq!(config.socket.url, "ws://localhost:8080/chat");
        assert_eq!(config.socket.keep_connect_secs, 10);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config: FileConfig = Figment::from(Serialized::defaults(FileConfig::default()))
            .merge(Toml::string(
                r#"
                [socket]
                url = "ws://example.test/chat"
                "#,
            ))
            .extract()
            .unwrap();
        assert_eq!(config.socket.url, "ws://example.test/chat");
        // Untouched sections keep their defaults.
        assert_eq!(config.api.url, "http://localhost/api/v1");
        assert_eq!(config.socket.keep_connect_secs, 10);
    }

    #[test]
    fn keep_connect_interval_floor_is_one_second() {
        let socket = SocketFileConfig {
            url: default_socket_url(),
            keep_connect_secs: 0,
        };
        assert_eq!(socket.keep_connect_interval(), Duration::from_secs(1));
    }
}
