//! Rewrites client control payloads before they go upstream.
//!
//! TTS requests get the server's `app` block plus generated `user.uid` and
//! `request.reqid`. ASR authenticates in the handshake headers, so its
//! payload is only re-serialized.

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::core::credentials::CredentialSet;
use crate::core::protocol::ProtocolVariant;

/// Rewrite a JSON control payload. `None` when it is not a JSON object.
pub fn try_inject_credentials(
    variant: ProtocolVariant,
    payload: &[u8],
    credentials: &CredentialSet,
) -> Option<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(payload).ok()?;
    let root = value.as_object_mut()?;

    if variant == ProtocolVariant::Tts {
        // Whatever the client sent as `app` is discarded wholesale.
        root.insert(
            "app".to_string(),
            json!({
                "appid": credentials.app_id,
                "token": credentials.token,
                "cluster": credentials.cluster,
            }),
        );
        ensure_field(root, "user", "uid");
        ensure_field(root, "request", "reqid");
    }

    serde_json::to_vec(&value).ok()
}

/// Like [`try_inject_credentials`], falling back to the original bytes.
pub fn inject_credentials(
    variant: ProtocolVariant,
    payload: &[u8],
    credentials: &CredentialSet,
) -> Vec<u8> {
    try_inject_credentials(variant, payload, credentials).unwrap_or_else(|| payload.to_vec())
}

/// Make sure `root[object].field` exists, generating a UUID when absent.
fn ensure_field(root: &mut Map<String, Value>, object: &str, field: &str) {
    let entry = root
        .entry(object.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Some(map) = entry.as_object_mut() {
        map.entry(field.to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    }
}
