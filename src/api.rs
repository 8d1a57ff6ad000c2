use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::FetchError;

/// A sound resource as served by the annotation API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sound {
    pub id: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub low_quality_audio_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub info_url: Option<String>,
}

impl Sound {
    /// Low quality audio is preferred for playback when the server offers it.
    pub fn playback_url(&self) -> Option<&str> {
        self.low_quality_audio_url
            .as_deref()
            .or(self.audio_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

/// A time span on a sound, optionally pointing at a feature blob.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub id: Option<String>,
    pub sound: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub end_seconds: Option<f64>,
    #[serde(default)]
    pub data_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Paged listing envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
}

/// The remote collaborators the resource cache depends on.
///
/// Implemented over HTTP by [`ApiClient`]; tests substitute an in-process
/// fake.
pub trait SoundSource {
    fn get_sound(&self, sound_uri: &str) -> impl Future<Output = Result<Sound, FetchError>> + Send;

    /// Annotations on `sound_id` produced by the feature bot `bot_id`.
    fn get_feature_annotations(
        &self,
        sound_id: &str,
        bot_id: &str,
    ) -> impl Future<Output = Result<Page<Annotation>, FetchError>> + Send;

    fn fetch_binary(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// HTTP client for the annotation API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    host: String,
    username: Option<String>,
    password: Option<String>,
    page_size: u32,
    client: Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let host = config.host.clone().unwrap_or_else(|| crate::config::DEFAULT_API_HOST.to_string());
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms.unwrap_or(2_000)))
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms.unwrap_or(30_000)))
            .build()
            .map_err(|e| FetchError::network(&host, e))?;

        Ok(ApiClient {
            host: host.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            page_size: config.page_size.unwrap_or(100),
            client,
        })
    }

    /// Resource paths like `/sounds/abc` are resolved against the API host;
    /// absolute URLs pass through untouched.
    pub fn build_uri(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.host, path.trim_start_matches('/'))
        }
    }

    /// Annotations whose tags match `query`.
    pub async fn get_annotations(&self, query: &str) -> Result<Page<Annotation>, FetchError> {
        let url = self.build_uri("/annotations");
        let page_size = self.page_size.to_string();
        self.get_json(&url, &[("tags", query), ("page_size", page_size.as_str())]).await
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, FetchError> {
        log::debug!("GET {}", url);
        let response = self
            .request(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;
        check_status(url, &response)?;

        let text = response.text().await.map_err(|e| FetchError::network(url, e))?;
        serde_json::from_str(&text).map_err(|e| FetchError::InvalidResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl SoundSource for ApiClient {
    async fn get_sound(&self, sound_uri: &str) -> Result<Sound, FetchError> {
        let url = self.build_uri(sound_uri);
        self.get_json(&url, &[]).await
    }

    async fn get_feature_annotations(&self, sound_id: &str, bot_id: &str) -> Result<Page<Annotation>, FetchError> {
        let url = self.build_uri(&format!("/sounds/{sound_id}/annotations"));
        let page_size = self.page_size.to_string();
        self.get_json(&url, &[("created_by", bot_id), ("page_size", page_size.as_str())])
            .await
    }

    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.build_uri(url);
        log::debug!("GET {} (binary)", url);
        // blobs on object storage are public; only API paths carry credentials
        let builder = if url.starts_with(&self.host) { self.request(&url) } else { self.client.get(&url) };
        let response = builder.send().await.map_err(|e| FetchError::network(&url, e))?;
        check_status(&url, &response)?;
        let bytes = response.bytes().await.map_err(|e| FetchError::network(&url, e))?;
        log::debug!("received {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

fn check_status(url: &str, response: &reqwest::Response) -> Result<(), FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status { url: url.to_string(), status: status.as_u16() })
    }
}
