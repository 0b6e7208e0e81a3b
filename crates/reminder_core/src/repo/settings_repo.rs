//! Notification settings persistence.

use crate::model::settings::NotificationSettings;
use crate::repo::{RepoError, RepoResult};
use crate::store::KeyValueStore;
use std::sync::Arc;

/// Store key holding the settings object.
pub const SETTINGS_KEY: &str = "notification_settings";

/// Typed access to persisted [`NotificationSettings`].
pub struct SettingsRepository<K: KeyValueStore> {
    store: Arc<K>,
    key: String,
}

impl<K: KeyValueStore> SettingsRepository<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self::with_key(store, SETTINGS_KEY)
    }

    pub fn with_key(store: Arc<K>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Loads settings; a missing key yields defaults.
    pub async fn load(&self) -> RepoResult<NotificationSettings> {
        match self.store.get(self.key.as_str()).await? {
            Some(raw) => serde_json::from_str(raw.as_str()).map_err(|err| {
                RepoError::InvalidData(format!("settings under `{}`: {err}", self.key))
            }),
            None => Ok(NotificationSettings::default()),
        }
    }

    pub async fn save(&self, settings: &NotificationSettings) -> RepoResult<()> {
        let encoded = serde_json::to_string(settings)
            .map_err(|err| RepoError::InvalidData(format!("settings encode: {err}")))?;
        self.store.set(self.key.as_str(), encoded.as_str()).await?;
        Ok(())
    }
}
