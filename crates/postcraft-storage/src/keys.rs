//! Fixed logical keys for the key-value store

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageKey {
    BrandKit,
    UserInfo,
    CampaignVariable,
    AppPreferences,
    RecentPrompts,
    DiagnosticLog,
}

impl StorageKey {
    /// Keys holding user-facing settings categories.
    pub const SETTINGS: [StorageKey; 5] = [
        StorageKey::BrandKit,
        StorageKey::UserInfo,
        StorageKey::CampaignVariable,
        StorageKey::AppPreferences,
        StorageKey::RecentPrompts,
    ];

    pub const ALL: [StorageKey; 6] = [
        StorageKey::BrandKit,
        StorageKey::UserInfo,
        StorageKey::CampaignVariable,
        StorageKey::AppPreferences,
        StorageKey::RecentPrompts,
        StorageKey::DiagnosticLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::BrandKit => "postcraft.brandKit",
            StorageKey::UserInfo => "postcraft.userInfo",
            StorageKey::CampaignVariable => "postcraft.campaignVariable",
            StorageKey::AppPreferences => "postcraft.appPreferences",
            StorageKey::RecentPrompts => "postcraft.recentPrompts",
            StorageKey::DiagnosticLog => "postcraft.diagnosticLog",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for key in StorageKey::ALL {
            assert_eq!(StorageKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(StorageKey::from_name("postcraft.unknown"), None);
    }
}
