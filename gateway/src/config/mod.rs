//! Configuration module for the speech proxy
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! Service credentials are optional at load time. A session for a service
//! whose credentials are missing is refused when it starts.
//!
//! # Example
//! ```rust,no_run
//! use speech_proxy_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::credentials::{DEFAULT_ASR_RESOURCE_ID, DEFAULT_TTS_VOICE_TYPE};
use crate::core::protocol::{Compression, ProtocolVariant};
use crate::core::session::SessionSettings;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub const DEFAULT_ASR_URL: &str = "wss://openspeech.bytedance.com/api/v3/sauc/bigmodel";
pub const DEFAULT_TTS_URL: &str = "wss://openspeech.bytedance.com/api/v1/tts/ws_binary";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    // ASR credentials (authenticated through handshake headers)
    pub asr_app_id: Option<String>,
    pub asr_access_token: Option<String>,
    pub asr_resource_id: String,
    pub asr_cluster: Option<String>,

    // TTS credentials (injected into the request payload)
    pub tts_app_id: Option<String>,
    pub tts_token: Option<String>,
    pub tts_cluster: Option<String>,
    pub tts_voice_type: String,

    // Upstream endpoints
    pub asr_upstream_url: String,
    pub tts_upstream_url: String,
    /// Compression for frames the relay re-encodes toward the ASR service
    pub asr_compression: Compression,
    /// Compression for frames the relay re-encodes toward the TTS service
    pub tts_compression: Compression,
    pub upstream_connect_timeout_seconds: u64,

    // Security
    /// Comma separated list of allowed origins, or "*"
    pub cors_allowed_origins: Option<String>,
    /// Maximum concurrent WebSocket connections (None = unlimited)
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            asr_app_id: None,
            asr_access_token: None,
            asr_resource_id: DEFAULT_ASR_RESOURCE_ID.to_string(),
            asr_cluster: None,
            tts_app_id: None,
            tts_token: None,
            tts_cluster: None,
            tts_voice_type: DEFAULT_TTS_VOICE_TYPE.to_string(),
            asr_upstream_url: DEFAULT_ASR_URL.to_string(),
            tts_upstream_url: DEFAULT_TTS_URL.to_string(),
            asr_compression: Compression::Gzip,
            tts_compression: Compression::None,
            upstream_connect_timeout_seconds: 10,
            cors_allowed_origins: None,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        for secret in [
            &mut self.asr_app_id,
            &mut self.asr_access_token,
            &mut self.tts_app_id,
            &mut self.tts_token,
        ]
        .into_iter()
        .flatten()
        {
            secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, overriding environment variables
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        // The .env file is loaded in main.rs, so by now it is part of the environment.
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_upstream("asr_upstream_url", &self.asr_upstream_url)?;
        validation::validate_upstream("tts_upstream_url", &self.tts_upstream_url)?;
        validation::validate_connect_timeout(self.upstream_connect_timeout_seconds)?;
        validation::validate_connection_limits(
            self.max_websocket_connections,
            self.max_connections_per_ip,
        )
    }

    /// Get the server address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn upstream_url(&self, variant: ProtocolVariant) -> &str {
        match variant {
            ProtocolVariant::Asr => &self.asr_upstream_url,
            ProtocolVariant::Tts => &self.tts_upstream_url,
        }
    }

    pub fn compression(&self, variant: ProtocolVariant) -> Compression {
        match variant {
            ProtocolVariant::Asr => self.asr_compression,
            ProtocolVariant::Tts => self.tts_compression,
        }
    }

    /// Settings handed to each new session for `variant`.
    pub fn session_settings(&self, variant: ProtocolVariant) -> SessionSettings {
        SessionSettings {
            variant,
            upstream_url: self.upstream_url(variant).to_string(),
            compression: self.compression(variant),
            connect_timeout: Duration::from_secs(self.upstream_connect_timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "VOLC_ASR_APP_ID",
        "VOLC_ASR_ACCESS_TOKEN",
        "VOLC_ASR_RESOURCE_ID",
        "VOLC_ASR_CLUSTER",
        "VOLC_TTS_APP_ID",
        "VOLC_TTS_TOKEN",
        "VOLC_TTS_CLUSTER",
        "VOLC_TTS_VOICE_TYPE",
        "VOLC_ASR_URL",
        "VOLC_TTS_URL",
        "ASR_COMPRESSION",
        "TTS_COMPRESSION",
        "UPSTREAM_CONNECT_TIMEOUT_SECONDS",
        "CORS_ALLOWED_ORIGINS",
        "MAX_WEBSOCKET_CONNECTIONS",
        "MAX_CONNECTIONS_PER_IP",
    ];

    fn cleanup_env_vars() {
        unsafe {
            for name in ENV_VARS {
                env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.address(), "0.0.0.0:8000");
        assert!(!config.is_tls_enabled());
        assert_eq!(config.asr_upstream_url, DEFAULT_ASR_URL);
        assert_eq!(config.tts_upstream_url, DEFAULT_TTS_URL);
        assert_eq!(config.asr_compression, Compression::Gzip);
        assert_eq!(config.tts_compression, Compression::None);
        assert_eq!(config.asr_resource_id, "volc.bigasr.sauc.duration");
        assert_eq!(config.tts_voice_type, "zh_male_linjiananhai_moon_bigtts");
        assert_eq!(config.upstream_connect_timeout_seconds, 10);
        assert_eq!(config.max_connections_per_ip, 100);
        assert!(config.max_websocket_connections.is_none());
        assert!(config.asr_app_id.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "9100");
            env::set_var("VOLC_ASR_APP_ID", "env-asr-app");
            env::set_var("VOLC_ASR_ACCESS_TOKEN", "env-asr-token");
            env::set_var("VOLC_TTS_URL", "ws://127.0.0.1:9300/tts");
            env::set_var("ASR_COMPRESSION", "none");
            env::set_var("MAX_WEBSOCKET_CONNECTIONS", "25");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.asr_app_id, Some("env-asr-app".to_string()));
        assert_eq!(config.asr_access_token, Some("env-asr-token".to_string()));
        assert_eq!(config.tts_upstream_url, "ws://127.0.0.1:9300/tts");
        assert_eq!(config.asr_compression, Compression::None);
        assert_eq!(config.max_websocket_connections, Some(25));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_http_upstream() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOLC_ASR_URL", "https://openspeech.bytedance.com");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("asr_upstream_url"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_half_tls() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
        }

        assert!(ServerConfig::from_env().is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

tts:
  token: "yaml-token"
  compression: "gzip"
"#;
        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "10.0.0.1");
            env::set_var("VOLC_TTS_TOKEN", "env-token");
            env::set_var("VOLC_TTS_APP_ID", "env-app");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.tts_token, Some("yaml-token".to_string()));
        assert_eq!(config.tts_compression, Compression::Gzip);
        // ENV fills what YAML leaves out
        assert_eq!(config.tts_app_id, Some("env-app".to_string()));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let result = ServerConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_session_settings() {
        let mut config = ServerConfig::default();
        config.upstream_connect_timeout_seconds = 3;
        config.tts_upstream_url = "ws://localhost:1/tts".to_string();

        let asr = config.session_settings(ProtocolVariant::Asr);
        assert_eq!(asr.upstream_url, DEFAULT_ASR_URL);
        assert_eq!(asr.compression, Compression::Gzip);
        assert_eq!(asr.connect_timeout, Duration::from_secs(3));

        let tts = config.session_settings(ProtocolVariant::Tts);
        assert_eq!(tts.upstream_url, "ws://localhost:1/tts");
        assert_eq!(tts.compression, Compression::None);
    }
}
