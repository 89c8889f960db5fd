use std::path::PathBuf;

use super::ConfigError;
use super::utils::{env_parse, env_string};

/// Values read from the process environment (including `.env`).
#[derive(Debug, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,

    pub asr_app_id: Option<String>,
    pub asr_access_token: Option<String>,
    pub asr_resource_id: Option<String>,
    pub asr_cluster: Option<String>,
    pub asr_url: Option<String>,
    pub asr_compression: Option<String>,

    pub tts_app_id: Option<String>,
    pub tts_token: Option<String>,
    pub tts_cluster: Option<String>,
    pub tts_voice_type: Option<String>,
    pub tts_url: Option<String>,
    pub tts_compression: Option<String>,

    pub upstream_connect_timeout_seconds: Option<u64>,

    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_string("HOST"),
            port: env_parse("PORT")?,
            tls_cert_path: env_string("TLS_CERT_PATH").map(PathBuf::from),
            tls_key_path: env_string("TLS_KEY_PATH").map(PathBuf::from),

            asr_app_id: env_string("VOLC_ASR_APP_ID"),
            asr_access_token: env_string("VOLC_ASR_ACCESS_TOKEN"),
            asr_resource_id: env_string("VOLC_ASR_RESOURCE_ID"),
            asr_cluster: env_string("VOLC_ASR_CLUSTER"),
            asr_url: env_string("VOLC_ASR_URL"),
            asr_compression: env_string("ASR_COMPRESSION"),

            tts_app_id: env_string("VOLC_TTS_APP_ID"),
            tts_token: env_string("VOLC_TTS_TOKEN"),
            tts_cluster: env_string("VOLC_TTS_CLUSTER"),
            tts_voice_type: env_string("VOLC_TTS_VOICE_TYPE"),
            tts_url: env_string("VOLC_TTS_URL"),
            tts_compression: env_string("TTS_COMPRESSION"),

            upstream_connect_timeout_seconds: env_parse("UPSTREAM_CONNECT_TIMEOUT_SECONDS")?,

            cors_allowed_origins: env_string("CORS_ALLOWED_ORIGINS"),
            max_websocket_connections: env_parse("MAX_WEBSOCKET_CONNECTIONS")?,
            max_connections_per_ip: env_parse("MAX_CONNECTIONS_PER_IP")?,
        })
    }
}
