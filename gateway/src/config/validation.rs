use std::path::PathBuf;

use super::{ConfigError, TlsConfig};
use crate::utils::url_validation::validate_upstream_url;

/// Both TLS paths or neither.
pub fn validate_tls(
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
) -> Result<Option<TlsConfig>, ConfigError> {
    match (cert_path, key_path) {
        (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
            cert_path,
            key_path,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Invalid {
            field: "tls".to_string(),
            reason: "certificate path set without a key path".to_string(),
        }),
        (None, Some(_)) => Err(ConfigError::Invalid {
            field: "tls".to_string(),
            reason: "key path set without a certificate path".to_string(),
        }),
    }
}

pub fn validate_upstream(field: &str, url: &str) -> Result<(), ConfigError> {
    validate_upstream_url(url)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

pub fn validate_connect_timeout(seconds: u64) -> Result<(), ConfigError> {
    if seconds == 0 {
        return Err(ConfigError::Invalid {
            field: "upstream_connect_timeout_seconds".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_connection_limits(
    max_websocket_connections: Option<usize>,
    max_connections_per_ip: u32,
) -> Result<(), ConfigError> {
    if max_websocket_connections == Some(0) {
        return Err(ConfigError::Invalid {
            field: "max_websocket_connections".to_string(),
            reason: "must be greater than zero, omit it for no limit".to_string(),
        });
    }
    if max_connections_per_ip == 0 {
        return Err(ConfigError::Invalid {
            field: "max_connections_per_ip".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
