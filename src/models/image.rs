//! Image references carried by visitor, guest, asset and host records

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Kind of resource an image belongs to; selects the upstream fetch endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Visitor,
    Asset,
    Guest,
    HostProfile,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Visitor => "visitor",
            ImageKind::Asset => "asset",
            ImageKind::Guest => "guest",
            ImageKind::HostProfile => "host_profile",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An opaque image reference as stored on a record.
///
/// Absolute URLs and data URIs are already displayable; storage paths need an
/// authenticated fetch before a view can render them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageReference {
    AbsoluteUrl(String),
    DataUri(String),
    StoragePath(String),
}

impl ImageReference {
    /// Classify a raw reference. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let reference = if raw.starts_with("http") {
            ImageReference::AbsoluteUrl(raw.to_string())
        } else if raw.starts_with("data:") {
            ImageReference::DataUri(raw.to_string())
        } else {
            ImageReference::StoragePath(raw.to_string())
        };
        Some(reference)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageReference::AbsoluteUrl(s)
            | ImageReference::DataUri(s)
            | ImageReference::StoragePath(s) => s,
        }
    }

    /// True when the reference can be handed to a renderer as-is
    pub fn is_displayable(&self) -> bool {
        !matches!(self, ImageReference::StoragePath(_))
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ImageReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A value a renderer accepts: `blob:`, `data:` or `http(s)` URLs
pub fn is_renderable_url(url: &str) -> bool {
    url.starts_with("blob:") || url.starts_with("data:") || url.starts_with("http")
}

/// Serde adapter for `Option<ImageReference>` fields; blank strings and
/// nulls both deserialize to `None`.
pub mod opt_ref {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<ImageReference>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(reference) => serializer.serialize_str(reference.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ImageReference>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(ImageReference::parse))
    }
}
