//! Export / import snapshot format
//!
//! Every field is optional on the way in so that snapshots written by older
//! versions import partially. Settings pass through
//! [`Settings::with_defaults`] while parsing.

use chrono::{DateTime, Utc};
use postcraft_storage::DocumentStoreInfo;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::content::GeneratedContent;
use crate::settings::{AppPreferences, BrandKit, CampaignVariable, RecentPrompts, Settings, UserInfo};
use crate::Result;

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

fn lenient<'de, D, S>(deserializer: D) -> std::result::Result<Option<S>, D::Error>
where
    D: Deserializer<'de>,
    S: Settings,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_null()).map(|v| S::with_defaults(&v)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub brand_kit: Option<BrandKit>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub campaign_variable: Option<CampaignVariable>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub app_preferences: Option<AppPreferences>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub recent_prompts: Option<RecentPrompts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<GeneratedContent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExportMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_info: Option<DocumentStoreInfo>,
}

impl ExportSnapshot {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_snapshot_parses() {
        let snapshot = ExportSnapshot::from_json(
            r##"{ "brandKit": { "typography": "Serif" }, "metadata": { "exportedAt": "2024-05-01T00:00:00Z", "version": "0.9" } }"##,
        )
        .unwrap();

        let kit = snapshot.brand_kit.unwrap();
        assert_eq!(kit.typography, "Serif");
        assert_eq!(kit.colors, BrandKit::default().colors);
        assert!(snapshot.user_info.is_none());
        assert!(snapshot.images.is_none());
        assert_eq!(snapshot.metadata.unwrap().version, "0.9");
    }

    #[test]
    fn test_mistyped_settings_field_is_backfilled() {
        let snapshot: ExportSnapshot = serde_json::from_value(json!({
            "appPreferences": { "theme": "neon", "autoSave": false },
            "userInfo": null,
        }))
        .unwrap();

        let prefs = snapshot.app_preferences.unwrap();
        assert_eq!(prefs.theme, AppPreferences::default().theme);
        assert!(!prefs.auto_save);
        assert!(snapshot.user_info.is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let snapshot = ExportSnapshot {
            recent_prompts: Some(RecentPrompts {
                prompts: vec!["a".to_string()],
            }),
            images: Some(Vec::new()),
            ..Default::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value, json!({ "recentPrompts": ["a"], "images": [] }));
    }
}
