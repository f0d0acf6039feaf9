//! Settings categories
//!
//! Each category is stored under a fixed key. Reads always produce a fully
//! populated value: [`Settings::with_defaults`] backfills any field that is
//! missing or has the wrong shape.

use postcraft_storage::StorageKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MAX_BRAND_COLORS: usize = 5;
pub const MAX_RECENT_PROMPTS: usize = 10;

pub trait Settings: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    const KEY: StorageKey;

    /// Build a full value from whatever was stored. Pure.
    fn with_defaults(partial: &Value) -> Self;
}

fn field<T: DeserializeOwned>(obj: Option<&Map<String, Value>>, name: &str) -> Option<T> {
    obj?.get(name)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrandKit {
    pub colors: Vec<String>,
    pub typography: String,
    pub style_keywords: Vec<String>,
    pub campaign_directive: String,
}

impl Default for BrandKit {
    fn default() -> Self {
        Self {
            colors: vec![
                "#1F2937".to_string(),
                "#F9FAFB".to_string(),
                "#3B82F6".to_string(),
            ],
            typography: String::new(),
            style_keywords: Vec::new(),
            campaign_directive: String::new(),
        }
    }
}

impl Settings for BrandKit {
    const KEY: StorageKey = StorageKey::BrandKit;

    fn with_defaults(partial: &Value) -> Self {
        let obj = partial.as_object();
        let defaults = Self::default();

        let mut colors: Vec<String> = field(obj, "colors").unwrap_or(defaults.colors);
        colors.truncate(MAX_BRAND_COLORS);

        Self {
            colors,
            typography: field(obj, "typography").unwrap_or(defaults.typography),
            style_keywords: field(obj, "styleKeywords").unwrap_or(defaults.style_keywords),
            campaign_directive: field(obj, "campaignDirective")
                .unwrap_or(defaults.campaign_directive),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    pub name: String,
    pub email: String,
    pub company: String,
    pub role: String,
}

impl Settings for UserInfo {
    const KEY: StorageKey = StorageKey::UserInfo;

    fn with_defaults(partial: &Value) -> Self {
        let obj = partial.as_object();
        Self {
            name: field(obj, "name").unwrap_or_default(),
            email: field(obj, "email").unwrap_or_default(),
            company: field(obj, "company").unwrap_or_default(),
            role: field(obj, "role").unwrap_or_default(),
        }
    }
}

/// Named value substituted into prompts for the running campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignVariable {
    pub name: String,
    pub value: String,
}

impl Settings for CampaignVariable {
    const KEY: StorageKey = StorageKey::CampaignVariable;

    fn with_defaults(partial: &Value) -> Self {
        // Older data stored the bare value as a string
        if let Some(value) = partial.as_str() {
            return Self {
                name: String::new(),
                value: value.to_string(),
            };
        }

        let obj = partial.as_object();
        Self {
            name: field(obj, "name").unwrap_or_default(),
            value: field(obj, "value").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppPreferences {
    pub default_platform: String,
    pub theme: Theme,
    pub auto_save: bool,
    pub show_tips: bool,
    pub maintenance_max_age_days: u32,
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            default_platform: "instagram".to_string(),
            theme: Theme::System,
            auto_save: true,
            show_tips: true,
            maintenance_max_age_days: 30,
        }
    }
}

impl Settings for AppPreferences {
    const KEY: StorageKey = StorageKey::AppPreferences;

    fn with_defaults(partial: &Value) -> Self {
        let obj = partial.as_object();
        let defaults = Self::default();

        Self {
            default_platform: field(obj, "defaultPlatform").unwrap_or(defaults.default_platform),
            theme: field(obj, "theme").unwrap_or(defaults.theme),
            auto_save: field(obj, "autoSave").unwrap_or(defaults.auto_save),
            show_tips: field(obj, "showTips").unwrap_or(defaults.show_tips),
            maintenance_max_age_days: field(obj, "maintenanceMaxAgeDays")
                .unwrap_or(defaults.maintenance_max_age_days),
        }
    }
}

/// Newest-first prompt history, at most [`MAX_RECENT_PROMPTS`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentPrompts {
    pub prompts: Vec<String>,
}

impl RecentPrompts {
    /// Move `prompt` to the front, dropping older duplicates and overflow.
    pub fn push(&mut self, prompt: &str) {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return;
        }

        self.prompts.retain(|p| p != prompt);
        self.prompts.insert(0, prompt.to_string());
        self.prompts.truncate(MAX_RECENT_PROMPTS);
    }
}

impl Settings for RecentPrompts {
    const KEY: StorageKey = StorageKey::RecentPrompts;

    fn with_defaults(partial: &Value) -> Self {
        let list = partial
            .as_array()
            .or_else(|| partial.get("prompts").and_then(Value::as_array));

        let mut prompts: Vec<String> = Vec::new();
        for prompt in list.into_iter().flatten().filter_map(Value::as_str) {
            let prompt = prompt.trim();
            if !prompt.is_empty() && !prompts.iter().any(|p| p == prompt) {
                prompts.push(prompt.to_string());
            }
        }
        prompts.truncate(MAX_RECENT_PROMPTS);

        Self { prompts }
    }
}
