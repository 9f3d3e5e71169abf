//! Serialized browser session state for the cross-process login handshake
//!
//! Phase 1 of the login captures cookies plus the current origin's
//! localStorage; phase 2 restores them in a fresh browser before
//! re-entering the code screen. Everything outside this module treats the
//! state as an opaque blob.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::backend::PageBackend;
use crate::error::{AutomationError, Result};

/// Captured browser-context state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<Value>,

    #[serde(default)]
    pub origins: Vec<OriginState>,
}

/// localStorage snapshot for one origin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,

    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

impl SessionState {
    /// Export the live browser context
    pub async fn capture<B: PageBackend>(backend: &B) -> Result<Self> {
        let cookies = backend
            .cookies()
            .await
            .map_err(|e| AutomationError::Session(e.to_string()))?;

        let url = backend
            .current_url()
            .await
            .map_err(|e| AutomationError::Session(e.to_string()))?;
        let origin = origin_of(&url);

        // localStorage export can fail on about:blank; treat as empty.
        let entries = backend.local_storage().await.unwrap_or_default();
        let origins = if entries.is_empty() {
            Vec::new()
        } else {
            vec![OriginState {
                origin,
                local_storage: entries
                    .into_iter()
                    .map(|(name, value)| StorageEntry { name, value })
                    .collect(),
            }]
        };

        Ok(Self { cookies, origins })
    }

    /// Restore cookies. Call before navigating.
    pub async fn apply_cookies<B: PageBackend>(&self, backend: &B) -> Result<()> {
        if self.cookies.is_empty() {
            return Ok(());
        }
        info!(cookies = self.cookies.len(), "restoring session cookies");
        backend
            .set_cookies(self.cookies.clone())
            .await
            .map_err(|e| AutomationError::Session(e.to_string()))
    }

    /// Restore localStorage for the current origin. Call after navigating,
    /// since storage writes only land on a loaded origin.
    pub async fn apply_storage<B: PageBackend>(&self, backend: &B) -> Result<()> {
        if self.origins.is_empty() {
            return Ok(());
        }

        let url = backend
            .current_url()
            .await
            .map_err(|e| AutomationError::Session(e.to_string()))?;
        let origin = origin_of(&url);

        for origin_state in self.origins.iter().filter(|o| o.origin == origin) {
            let entries: Vec<(String, String)> = origin_state
                .local_storage
                .iter()
                .map(|e| (e.name.clone(), e.value.clone()))
                .collect();
            info!(
                origin = %origin_state.origin,
                entries = entries.len(),
                "restoring localStorage"
            );
            backend
                .set_local_storage(&entries)
                .await
                .map_err(|e| AutomationError::Session(e.to_string()))?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AutomationError::Session(e.to_string()))?;
        std::fs::write(path, json)?;
        info!("Session state saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| AutomationError::Session(format!("invalid session state file: {e}")))
    }
}

/// `scheme://host[:port]` prefix of a URL
fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(i) => {
            let host_start = i + 3;
            let end = url[host_start..]
                .find('/')
                .map(|j| host_start + j)
                .unwrap_or(url.len());
            url[..end].to_string()
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://crm.infinitegear.app/login"),
            "https://crm.infinitegear.app"
        );
        assert_eq!(
            origin_of("https://crm.infinitegear.app"),
            "https://crm.infinitegear.app"
        );
        assert_eq!(origin_of("about:blank"), "about:blank");
    }

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let state = SessionState {
            cookies: vec![serde_json::json!({"name": "s", "value": "v"})],
            origins: vec![OriginState {
                origin: "https://crm.infinitegear.app".to_string(),
                local_storage: vec![StorageEntry {
                    name: "token".to_string(),
                    value: "abc".to_string(),
                }],
            }],
        };

        let json = serde_json::to_value(&state).unwrap();
        assert!(json["origins"][0]["localStorage"].is_array());
        assert_eq!(json["origins"][0]["localStorage"][0]["name"], "token");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth_state.json");
        std::fs::write(&path, "not json at all").unwrap();

        let err = SessionState::load(&path).unwrap_err();
        assert!(matches!(err, AutomationError::Session(_)));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth_state.json");

        let state = SessionState {
            cookies: vec![serde_json::json!({"name": "sid", "value": "42"})],
            origins: Vec::new(),
        };
        state.save(&path).unwrap();

        let restored = SessionState::load(&path).unwrap();
        assert_eq!(restored.cookies.len(), 1);
        assert_eq!(restored.cookies[0]["name"], "sid");
        assert!(restored.origins.is_empty());
    }
}
