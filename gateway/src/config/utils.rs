//! Parsing helpers shared by the env and merge stages.

use std::str::FromStr;

use super::ConfigError;
use crate::core::protocol::Compression;

/// Read an environment variable, treating empty values as unset.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an environment variable.
pub fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                field: name.to_string(),
                reason: format!("{raw:?}: {e}"),
            })
        })
        .transpose()
}

/// Parse a compression name as used in config files.
pub fn parse_compression(field: &str, value: &str) -> Result<Compression, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gzip" => Ok(Compression::Gzip),
        "none" | "" => Ok(Compression::None),
        other => Err(ConfigError::Invalid {
            field: field.to_string(),
            reason: format!("unknown compression {other:?}, expected \"gzip\" or \"none\""),
        }),
    }
}
