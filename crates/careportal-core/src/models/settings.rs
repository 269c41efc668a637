//! Settings blobs kept in the local store.

use serde::{Deserialize, Serialize};

/// Profile details shown in the header and settings page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfileSettings {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub profile_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Default for UserProfileSettings {
    fn default() -> Self {
        Self {
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "john.doe@example.com".into(),
            phone: "+91 98765 43210".into(),
            profile_image: String::new(),
            username: Some("John Doe".into()),
        }
    }
}

impl UserProfileSettings {
    /// Profile written when a visitor enters as guest.
    pub fn guest() -> Self {
        Self {
            first_name: "Guest".into(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            profile_image: String::new(),
            username: Some("Guest".into()),
        }
    }

    /// "First Last", trimmed.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Notification preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub appointment_reminders: bool,
    pub test_results: bool,
    pub health_tips: bool,
    pub reminder_tone: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            appointment_reminders: false,
            test_results: true,
            health_tips: false,
            reminder_tone: "pleasant".into(),
        }
    }
}

/// Security preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    pub two_factor_auth: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut profile = UserProfileSettings::default();
        assert_eq!(profile.display_name(), "John Doe");
        profile.last_name.clear();
        assert_eq!(profile.display_name(), "John");
    }

    #[test]
    fn test_partial_blob_uses_defaults() {
        let settings: NotificationSettings =
            serde_json::from_str(r#"{"healthTips":true}"#).unwrap();
        assert!(settings.health_tips);
        assert!(settings.test_results);
        assert_eq!(settings.reminder_tone, "pleasant");
    }
}
