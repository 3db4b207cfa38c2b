//! ArcGIS REST client for hosted feature layers.
//!
//! Resolves a portal item to a feature layer URL and submits features through
//! the layer's `addFeatures` operation. Tokens are taken as given; no token is
//! generated here.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{EditResponse, FeatureSink};
use crate::config::ArcGisConfig;
use crate::error::{UploadError, UploadResult};
use crate::models::Feature;

/// Portal item metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub owner: String,
    /// Feature service URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Feature layer properties used for reporting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub geometry_type: Option<String>,
    #[serde(default)]
    pub capabilities: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceInfo {
    #[serde(default)]
    layers: Vec<LayerRef>,
}

#[derive(Debug, Deserialize)]
struct LayerRef {
    id: i64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Client for a portal and its hosted feature layers.
#[derive(Clone)]
pub struct ArcGisClient {
    http: reqwest::Client,
    config: ArcGisConfig,
}

impl ArcGisClient {
    pub fn new(config: ArcGisConfig) -> UploadResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ArcGisConfig {
        &self.config
    }

    /// Fetch the configured portal item, if an item id is set.
    pub async fn item(&self) -> UploadResult<Option<ItemInfo>> {
        let Some(item_id) = self.config.item_id.as_deref() else {
            return Ok(None);
        };
        let url = format!(
            "{}/sharing/rest/content/items/{}",
            self.config.portal_url.trim_end_matches('/'),
            item_id
        );
        self.get_json(&url).await.map(Some)
    }

    /// Resolve the feature layer to upload into.
    ///
    /// A configured layer URL wins; otherwise the item's service URL is
    /// combined with the configured layer index.
    pub async fn resolve_layer(&self) -> UploadResult<FeatureLayer> {
        if let Some(url) = self.config.layer_url.as_deref() {
            return Ok(self.layer_at(url.trim_end_matches('/').to_string()));
        }

        let item = self
            .item()
            .await?
            .ok_or_else(|| UploadError::LayerNotFound("no item id configured".to_string()))?;
        info!(title = %item.title, kind = %item.item_type, owner = %item.owner, "resolved item");

        let service_url = item.url.ok_or_else(|| {
            UploadError::LayerNotFound(format!("item {} has no service URL", item.id))
        })?;
        let service_url = service_url.trim_end_matches('/');

        let service: ServiceInfo = self.get_json(service_url).await?;
        let index = self.config.layer_index;
        let layer = service.layers.get(index).ok_or_else(|| {
            UploadError::LayerNotFound(format!(
                "layer index {} out of range ({} layers)",
                index,
                service.layers.len()
            ))
        })?;
        debug!(layer_id = layer.id, name = %layer.name, "selected layer");

        Ok(self.layer_at(format!("{}/{}", service_url, layer.id)))
    }

    /// Fetch name, geometry type and capabilities of a layer.
    pub async fn layer_info(&self, layer: &FeatureLayer) -> UploadResult<LayerInfo> {
        self.get_json(&layer.url).await
    }

    fn layer_at(&self, url: String) -> FeatureLayer {
        FeatureLayer {
            http: self.http.clone(),
            url,
            token: self.config.token.clone(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> UploadResult<T> {
        let mut query = vec![("f", "json")];
        if let Some(token) = self.config.token.as_deref() {
            query.push(("token", token));
        }

        let response = self.http.get(url).query(&query).send().await?;
        let body = read_body(response).await?;
        decode(&body)
    }
}

/// A single feature layer endpoint.
#[derive(Clone)]
pub struct FeatureLayer {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl FeatureLayer {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeatureSink for FeatureLayer {
    async fn add_features(&self, features: &[Feature]) -> UploadResult<EditResponse> {
        let payload = serde_json::to_string(features)?;
        let mut form = vec![("f", "json"), ("features", payload.as_str())];
        if let Some(token) = self.token.as_deref() {
            form.push(("token", token));
        }

        let response = self
            .http
            .post(format!("{}/addFeatures", self.url))
            .form(&form)
            .send()
            .await?;
        let body = read_body(response).await?;

        // request-level errors stay inside the response for the batch loop
        Ok(serde_json::from_str(&body)?)
    }
}

async fn read_body(response: reqwest::Response) -> UploadResult<String> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(UploadError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Decode a REST response, turning an `error` envelope into [`UploadError::Service`].
fn decode<T: DeserializeOwned>(body: &str) -> UploadResult<T> {
    let value: Value = serde_json::from_str(body)?;
    if value.get("error").is_some() {
        let envelope: ErrorEnvelope = serde_json::from_value(value)?;
        return Err(UploadError::Service {
            code: envelope.error.code,
            message: envelope.error.message,
        });
    }
    Ok(serde_json::from_value(value)?)
}
