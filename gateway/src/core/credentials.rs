//! Service credentials and the provider that hands them to sessions.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::ServerConfig;
use crate::core::protocol::ProtocolVariant;
use crate::core::session::SessionError;

pub const KEY_APP_ID: &str = "appId";
pub const KEY_TOKEN: &str = "token";
pub const KEY_CLUSTER: &str = "cluster";
pub const KEY_RESOURCE_ID: &str = "resourceId";
pub const KEY_VOICE_TYPE: &str = "voiceType";

pub const DEFAULT_ASR_RESOURCE_ID: &str = "volc.bigasr.sauc.duration";
pub const DEFAULT_TTS_VOICE_TYPE: &str = "zh_male_linjiananhai_moon_bigtts";

/// Speech service a session proxies to. Doubles as the config category.
pub type ServiceKind = ProtocolVariant;

/// Cluster for a TTS voice. Cloned voices (`S_` prefix) live on the ICL cluster.
pub fn tts_cluster_for_voice(voice_type: &str) -> &'static str {
    if voice_type.starts_with("S_") {
        "volcano_icl"
    } else {
        "volcano_tts"
    }
}

/// Credentials for one service, resolved once at session start.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CredentialSet {
    pub app_id: String,
    pub token: String,
    pub cluster: String,
    pub resource_id: String,
}

impl CredentialSet {
    pub fn new(
        app_id: impl Into<String>,
        token: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            token: token.into(),
            cluster: cluster.into(),
            resource_id: DEFAULT_ASR_RESOURCE_ID.to_string(),
        }
    }

    /// Build from a provider mapping. `appId` and `token` must be non-empty.
    pub fn from_mapping(
        kind: ServiceKind,
        map: &HashMap<String, String>,
    ) -> Result<Self, SessionError> {
        let required = |key: &str| -> Result<String, SessionError> {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| SessionError::ConfigMissing(format!("{kind}.{key}")))
        };
        let optional = |key: &str| map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let app_id = required(KEY_APP_ID)?;
        let token = required(KEY_TOKEN)?;

        let cluster = match kind {
            ProtocolVariant::Asr => optional(KEY_CLUSTER).unwrap_or_default().to_string(),
            ProtocolVariant::Tts => match optional(KEY_CLUSTER) {
                Some(cluster) => cluster.to_string(),
                None => {
                    let voice = optional(KEY_VOICE_TYPE).unwrap_or(DEFAULT_TTS_VOICE_TYPE);
                    tts_cluster_for_voice(voice).to_string()
                }
            },
        };
        let resource_id = optional(KEY_RESOURCE_ID)
            .unwrap_or(DEFAULT_ASR_RESOURCE_ID)
            .to_string();

        Ok(Self {
            app_id,
            token,
            cluster,
            resource_id,
        })
    }

    /// Short app id prefix that is safe to log.
    pub fn app_id_hint(&self) -> String {
        let prefix: String = self.app_id.chars().take(8).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("app_id", &self.app_id_hint())
            .field("token", &"[REDACTED]")
            .field("cluster", &self.cluster)
            .field("resource_id", &self.resource_id)
            .finish()
    }
}

/// Source of per-service credential mappings.
///
/// Keys follow the stored config names: `appId`, `token`, `cluster`,
/// `resourceId`, `voiceType`. Missing keys are simply absent.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn get(&self, category: ServiceKind) -> HashMap<String, String>;
}

/// Immutable snapshot of both services' settings.
#[derive(Default)]
pub struct StaticConfigProvider {
    asr: HashMap<String, String>,
    tts: HashMap<String, String>,
}

impl StaticConfigProvider {
    pub fn new(asr: HashMap<String, String>, tts: HashMap<String, String>) -> Self {
        Self { asr, tts }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        fn put(map: &mut HashMap<String, String>, key: &str, value: &Option<String>) {
            if let Some(value) = value {
                map.insert(key.to_string(), value.clone());
            }
        }

        let mut asr = HashMap::new();
        put(&mut asr, KEY_APP_ID, &config.asr_app_id);
        put(&mut asr, KEY_TOKEN, &config.asr_access_token);
        put(&mut asr, KEY_CLUSTER, &config.asr_cluster);
        asr.insert(KEY_RESOURCE_ID.to_string(), config.asr_resource_id.clone());

        let mut tts = HashMap::new();
        put(&mut tts, KEY_APP_ID, &config.tts_app_id);
        put(&mut tts, KEY_TOKEN, &config.tts_token);
        put(&mut tts, KEY_CLUSTER, &config.tts_cluster);
        tts.insert(KEY_VOICE_TYPE.to_string(), config.tts_voice_type.clone());

        Self { asr, tts }
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn get(&self, category: ServiceKind) -> HashMap<String, String> {
        match category {
            ProtocolVariant::Asr => self.asr.clone(),
            ProtocolVariant::Tts => self.tts.clone(),
        }
    }
}

impl Drop for StaticConfigProvider {
    fn drop(&mut self) {
        for value in self.asr.values_mut().chain(self.tts.values_mut()) {
            value.zeroize();
        }
    }
}
