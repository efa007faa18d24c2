//! Authenticated image retrieval for visitor, asset, guest and profile photos

use axum::body::Bytes;
use reqwest::{header::CONTENT_TYPE, StatusCode};

use crate::{config::UpstreamConfig, error::AppResult, models::image::ImageKind};

use super::client::UpstreamClient;

/// Binary image data held for a view
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlob {
    pub content_type: String,
    pub bytes: Bytes,
}

/// What an image endpoint answered with
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    /// Raw image bytes
    Bytes(ImageBlob),
    /// A JSON body naming a URL to use instead
    Link(String),
}

#[derive(Clone)]
pub struct ImagesRepository {
    client: UpstreamClient,
    visitor_path: String,
    asset_path: String,
    guest_path: String,
    profile_path: String,
}

impl ImagesRepository {
    pub fn new(client: UpstreamClient, config: &UpstreamConfig) -> Self {
        Self {
            client,
            visitor_path: config.visitor_image_path.clone(),
            asset_path: config.asset_image_path.clone(),
            guest_path: config.guest_photo_path.clone(),
            profile_path: config.profile_image_path.clone(),
        }
    }

    fn endpoint(&self, kind: ImageKind) -> &str {
        match kind {
            ImageKind::Visitor => &self.visitor_path,
            ImageKind::Asset => &self.asset_path,
            ImageKind::Guest => &self.guest_path,
            ImageKind::HostProfile => &self.profile_path,
        }
    }

    /// Exchange an opaque storage path for image data. `None` when the
    /// upstream has no such image.
    pub async fn fetch(
        &self,
        kind: ImageKind,
        path: &str,
        token: &str,
    ) -> AppResult<Option<ImagePayload>> {
        let request = self
            .client
            .get(self.endpoint(kind), token)
            .query(&[("path", path)]);

        let response = match self.client.send(request).await {
            Ok(response) => response,
            Err(crate::error::AppError::Upstream { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if content_type.starts_with("application/json") {
            let value: serde_json::Value = response.json().await?;
            let link = ["url", "blobUrl", "imageUrl", "data"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string);
            return Ok(link.map(ImagePayload::Link));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(ImagePayload::Bytes(ImageBlob {
            content_type,
            bytes,
        })))
    }
}
