//! Document records: generated content, layouts and projects

use chrono::{DateTime, Utc};
use postcraft_storage::{Collection, Record};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::Result;

/// A typed record stored in one document collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Option<&str>;

    fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(CoreError::InvalidRecord(format!(
                "{} record serialized to {other}",
                Self::COLLECTION
            ))),
        }
    }

    fn from_record(record: Record) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

/// Timestamps are written in the store's fixed-precision format so that
/// index order matches time order. Unparseable values read back as `None`.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&postcraft_storage::format_timestamp(*at)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(postcraft_storage::parse_timestamp))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImagePayload {
    Uri {
        uri: String,
    },
    /// Base64 image bytes
    Inline {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
}

/// One generated visual and what produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub prompt: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
}

impl GeneratedContent {
    pub fn new(prompt: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: None,
            created_at: None,
            updated_at: None,
            prompt: prompt.into(),
            platform: platform.into(),
            refined_prompt: None,
            description: None,
            metadata: Map::new(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }

    /// Case-insensitive substring match on the prompt.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.prompt.to_lowercase().contains(needle_lower)
    }
}

impl Document for GeneratedContent {
    const COLLECTION: Collection = Collection::Images;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Placement of a generated visual on a target platform.
///
/// `image_id` is a logical reference only. Deleting the content record does
/// not delete its layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub image_id: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Layout {
    pub fn new(image_id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: None,
            created_at: None,
            updated_at: None,
            image_id: image_id.into(),
            platform: platform.into(),
            config: Map::new(),
        }
    }
}

impl Document for Layout {
    const COLLECTION: Collection = Collection::Layouts;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            created_at: None,
            updated_at: None,
            name: name.into(),
            description: String::new(),
        }
    }
}

impl Document for Project {
    const COLLECTION: Collection = Collection::Projects;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
