//! Global configuration at ~/.config/kansync/config.toml
//!
//! Holds the store provider selection (with its free-form settings,
//! passed through to the provider verbatim) and the signed-in user.
//! The user entry is what `kansync login` writes; a real deployment
//! would populate it from an external identity system.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use kansync_core::CurrentUser;
use kansync_core::remote::StoreConfig;

fn default_provider() -> String {
    "local".to_string()
}

/// Store provider configuration (e.g. the local provider's data file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(flatten)]
    pub config: HashMap<String, toml::Value>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            provider: default_provider(),
            config: HashMap::new(),
        }
    }
}

impl StoreSettings {
    /// The provider-bound settings as the JSON map the protocol carries.
    pub fn store_config(&self) -> StoreConfig {
        self.config
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub store: StoreSettings,
    pub user: Option<UserConfig>,
}

impl GlobalConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("kansync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the global config, falling back to defaults when the file
    /// does not exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, raw).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// The auth context handed to controllers.
    pub fn current_user(&self) -> CurrentUser {
        match &self.user {
            Some(user) => CurrentUser::signed_in(&user.id, user.name.clone()),
            None => CurrentUser::Anonymous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_user_is_anonymous() {
        let config = GlobalConfig::default();
        assert_eq!(config.current_user(), CurrentUser::Anonymous);
        assert_eq!(config.store.provider, "local");
    }

    #[test]
    fn store_settings_pass_through_as_json() {
        let raw = r#"
            [store]
            provider = "local"
            path = "/tmp/kansync-test.json"

            [user]
            id = "u1"
            name = "Uma"
        "#;
        let config: GlobalConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.store.provider, "local");
        let store_config = config.store.store_config();
        assert_eq!(
            store_config.get("path").and_then(|v| v.as_str()),
            Some("/tmp/kansync-test.json")
        );
        assert_eq!(config.current_user().id(), Some("u1"));
    }
}
