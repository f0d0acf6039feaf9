//! Remote content store
//!
//! Same logical operations as the local store, persisted through an HTTP
//! API. Transport failures surface as [`CoreError::RemoteUnreachable`] so the
//! façade can fall back to local storage.

use async_trait::async_trait;
use postcraft_storage::StorageKey;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::RemoteConfig;
use crate::content::{GeneratedContent, Layout};
use crate::error::CoreError;
use crate::strategy::{ContentStore, StorageMode};
use crate::Result;

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

pub struct RemoteContentStore {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl RemoteContentStore {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| CoreError::Config(format!("HTTP client: {e}")))?;

        // Relative joins only append to a base ending in '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| CoreError::Config(format!("invalid endpoint {path}: {e}")))
    }

    /// `path` followed by `id` as a single escaped segment.
    pub(crate) fn item_endpoint(&self, path: &str, id: &str) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|()| CoreError::Config(format!("{} cannot hold a path", self.base_url)))?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| CoreError::RemoteUnreachable(e.to_string()))
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(CoreError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| CoreError::Remote {
            status,
            message: format!("unreadable response body: {e}"),
        })
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(Self::decode(response).await?))
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        Ok(self.get_optional(url).await?.unwrap_or_default())
    }

    async fn post<T: serde::Serialize + Sync>(&self, path: &str, body: &T) -> Result<String> {
        let url = self.endpoint(path)?;
        let response = self.send(self.request(Method::POST, url).json(body)).await?;
        let created: CreatedResponse = Self::decode(Self::check(response).await?).await?;
        Ok(created.id)
    }
}

#[async_trait]
impl ContentStore for RemoteContentStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Remote
    }

    async fn load_settings(&self, key: StorageKey) -> Result<Option<Value>> {
        let url = self.item_endpoint("settings", key.as_str())?;
        self.get_optional(url).await
    }

    async fn save_settings(&self, key: StorageKey, value: Value) -> Result<()> {
        let url = self.item_endpoint("settings", key.as_str())?;
        let response = self.send(self.request(Method::PUT, url).json(&value)).await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn save_content(&self, content: GeneratedContent) -> Result<String> {
        self.post("images", &content).await
    }

    async fn load_content(&self, id: &str) -> Result<Option<GeneratedContent>> {
        let url = self.item_endpoint("images", id)?;
        self.get_optional(url).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<GeneratedContent>> {
        let mut url = self.endpoint("images")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.get_list(url).await
    }

    async fn search(&self, text: &str) -> Result<Vec<GeneratedContent>> {
        let mut url = self.endpoint("images/search")?;
        url.query_pairs_mut().append_pair("q", text);
        self.get_list(url).await
    }

    async fn delete_content(&self, id: &str) -> Result<bool> {
        let url = self.item_endpoint("images", id)?;
        let response = self.send(self.request(Method::DELETE, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response).await?;
        Ok(true)
    }

    async fn save_layout(&self, layout: Layout) -> Result<String> {
        self.post("layouts", &layout).await
    }

    async fn list_layouts_for_content(&self, image_id: &str) -> Result<Vec<Layout>> {
        let mut url = self.endpoint("layouts")?;
        url.query_pairs_mut().append_pair("imageId", image_id);
        self.get_list(url).await
    }
}
