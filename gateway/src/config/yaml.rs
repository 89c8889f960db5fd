use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   tls:
///     cert_path: "/etc/speech-proxy/cert.pem"
///     key_path: "/etc/speech-proxy/key.pem"
///
/// asr:
///   app_id: "your-app-id"
///   access_token: "your-access-token"
///   resource_id: "volc.bigasr.sauc.duration"
///   url: "wss://openspeech.bytedance.com/api/v3/sauc/bigmodel"
///   compression: "gzip"
///
/// tts:
///   app_id: "your-app-id"
///   token: "your-token"
///   voice_type: "zh_male_linjiananhai_moon_bigtts"
///   url: "wss://openspeech.bytedance.com/api/v1/tts/ws_binary"
///   compression: "none"
///
/// upstream:
///   connect_timeout_seconds: 10
///
/// security:
///   cors_allowed_origins: "*"
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYaml,
    pub asr: AsrYaml,
    pub tts: TtsYaml,
    pub upstream: UpstreamYaml,
    pub security: SecurityYaml,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AsrYaml {
    pub app_id: Option<String>,
    pub access_token: Option<String>,
    pub resource_id: Option<String>,
    pub cluster: Option<String>,
    pub url: Option<String>,
    pub compression: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub app_id: Option<String>,
    pub token: Option<String>,
    pub cluster: Option<String>,
    pub voice_type: Option<String>,
    pub url: Option<String>,
    pub compression: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamYaml {
    pub connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Read(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML config: {e}")))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  tls:
    cert_path: "/tmp/cert.pem"
    key_path: "/tmp/key.pem"

asr:
  app_id: "asr-app"
  access_token: "asr-token"
  resource_id: "volc.bigasr.sauc.concurrent"
  url: "wss://asr.example.com/ws"
  compression: "none"

tts:
  app_id: "tts-app"
  token: "tts-token"
  voice_type: "S_custom"

upstream:
  connect_timeout_seconds: 3

security:
  cors_allowed_origins: "https://app.example.com"
  max_websocket_connections: 50
  max_connections_per_ip: 5
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.host, Some("127.0.0.1".to_string()));
        assert_eq!(config.server.port, Some(8080));
        let tls = config.server.tls.unwrap();
        assert_eq!(tls.cert_path, Some(PathBuf::from("/tmp/cert.pem")));
        assert_eq!(config.asr.app_id, Some("asr-app".to_string()));
        assert_eq!(
            config.asr.resource_id,
            Some("volc.bigasr.sauc.concurrent".to_string())
        );
        assert_eq!(config.asr.compression, Some("none".to_string()));
        assert_eq!(config.tts.voice_type, Some("S_custom".to_string()));
        assert_eq!(config.tts.url, None);
        assert_eq!(config.upstream.connect_timeout_seconds, Some(3));
        assert_eq!(config.security.max_websocket_connections, Some(50));
        assert_eq!(config.security.max_connections_per_ip, Some(5));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
tts:
  token: "only-token"
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tts.token, Some("only-token".to_string()));
        assert!(config.server.host.is_none());
        assert!(config.asr.app_id.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.port.is_none());
        assert!(config.security.cors_allowed_origins.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  host: \"localhost\"\n  port: 3000\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(config.server.host, Some("localhost".to_string()));
        assert_eq!(config.server.port, Some(3000));
    }

    #[test]
    fn test_from_file_not_found() {
        let result = YamlConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server: [unclosed").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML config")
        );
    }
}
