//! Settings blobs.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    DbResult, LocalStore, KEY_NOTIFICATION_SETTINGS, KEY_SECURITY_SETTINGS, KEY_USER_PROFILE,
};
use crate::models::{NotificationSettings, SecuritySettings, UserProfileSettings};

impl LocalStore {
    fn load_blob<T: DeserializeOwned + Default>(&self, key: &str) -> DbResult<T> {
        match self.get_item(key)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(T::default()),
        }
    }

    fn save_blob<T: Serialize>(&self, key: &str, value: &T) -> DbResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_item(key, &json)
    }

    pub fn load_user_profile(&self) -> DbResult<UserProfileSettings> {
        self.load_blob(KEY_USER_PROFILE)
    }

    /// Save the profile blob; `username` is refreshed from the display name.
    pub fn save_user_profile(&self, profile: &UserProfileSettings) -> DbResult<()> {
        let mut profile = profile.clone();
        let display_name = profile.display_name();
        if !display_name.is_empty() {
            profile.username = Some(display_name);
        }
        self.save_blob(KEY_USER_PROFILE, &profile)
    }

    pub fn load_notification_settings(&self) -> DbResult<NotificationSettings> {
        self.load_blob(KEY_NOTIFICATION_SETTINGS)
    }

    pub fn save_notification_settings(&self, settings: &NotificationSettings) -> DbResult<()> {
        self.save_blob(KEY_NOTIFICATION_SETTINGS, settings)
    }

    pub fn load_security_settings(&self) -> DbResult<SecuritySettings> {
        self.load_blob(KEY_SECURITY_SETTINGS)
    }

    pub fn save_security_settings(&self, settings: &SecuritySettings) -> DbResult<()> {
        self.save_blob(KEY_SECURITY_SETTINGS, settings)
    }
}
