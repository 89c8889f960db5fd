use super::env::EnvConfig;
use super::utils::parse_compression;
use super::validation::validate_tls;
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig};

/// Layer YAML over environment values over defaults.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();
    let mut config = ServerConfig::default();

    if let Some(host) = yaml.server.host.or(env.host) {
        config.host = host;
    }
    if let Some(port) = yaml.server.port.or(env.port) {
        config.port = port;
    }
    let (yaml_cert, yaml_key) = yaml
        .server
        .tls
        .map(|tls| (tls.cert_path, tls.key_path))
        .unwrap_or_default();
    config.tls = validate_tls(
        yaml_cert.or(env.tls_cert_path),
        yaml_key.or(env.tls_key_path),
    )?;

    config.asr_app_id = yaml.asr.app_id.or(env.asr_app_id);
    config.asr_access_token = yaml.asr.access_token.or(env.asr_access_token);
    config.asr_cluster = yaml.asr.cluster.or(env.asr_cluster);
    if let Some(resource_id) = yaml.asr.resource_id.or(env.asr_resource_id) {
        config.asr_resource_id = resource_id;
    }
    if let Some(url) = yaml.asr.url.or(env.asr_url) {
        config.asr_upstream_url = url;
    }
    if let Some(name) = yaml.asr.compression.or(env.asr_compression) {
        config.asr_compression = parse_compression("asr_compression", &name)?;
    }

    config.tts_app_id = yaml.tts.app_id.or(env.tts_app_id);
    config.tts_token = yaml.tts.token.or(env.tts_token);
    config.tts_cluster = yaml.tts.cluster.or(env.tts_cluster);
    if let Some(voice_type) = yaml.tts.voice_type.or(env.tts_voice_type) {
        config.tts_voice_type = voice_type;
    }
    if let Some(url) = yaml.tts.url.or(env.tts_url) {
        config.tts_upstream_url = url;
    }
    if let Some(name) = yaml.tts.compression.or(env.tts_compression) {
        config.tts_compression = parse_compression("tts_compression", &name)?;
    }

    if let Some(seconds) = yaml
        .upstream
        .connect_timeout_seconds
        .or(env.upstream_connect_timeout_seconds)
    {
        config.upstream_connect_timeout_seconds = seconds;
    }

    config.cors_allowed_origins = yaml
        .security
        .cors_allowed_origins
        .or(env.cors_allowed_origins);
    config.max_websocket_connections = yaml
        .security
        .max_websocket_connections
        .or(env.max_websocket_connections);
    if let Some(limit) = yaml
        .security
        .max_connections_per_ip
        .or(env.max_connections_per_ip)
    {
        config.max_connections_per_ip = limit;
    }

    Ok(config)
}
