//! UI-ready visitor shapes produced by the preview aggregator

use serde::Serialize;
use utoipa::ToSchema;

use super::image::ImageKind;
use super::visitor::{AssetType, VisitorStatus};

/// Where a preview's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSource {
    /// Server-confirmed record fetched by id
    Server,
    /// In-memory form data from the compose step
    Draft,
}

/// An image slot: the stored reference and, once resolved, a renderable URL.
/// `url == None` means the view falls back to the initials avatar.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DisplayImage {
    pub kind: ImageKind,
    pub reference: Option<String>,
    pub url: Option<String>,
}

impl DisplayImage {
    pub fn new(kind: ImageKind, reference: Option<String>) -> Self {
        Self {
            kind,
            reference,
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DisplayGuest {
    pub name: String,
    pub initials: String,
    pub image: DisplayImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DisplayAsset {
    pub name: String,
    pub serial_number: String,
    pub asset_type: AssetType,
    pub image: DisplayImage,
}

/// Assets split by ownership with independent counts
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct AssetGroups {
    pub personal: Vec<DisplayAsset>,
    pub company: Vec<DisplayAsset>,
    pub personal_count: usize,
    pub company_count: usize,
    pub total: usize,
    /// e.g. `Total Assets: 05`
    pub total_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DisplayHost {
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub initials: String,
    pub image: DisplayImage,
}

/// A normalized visitor ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DisplayVisitor {
    pub source: PreviewSource,
    pub id: Option<String>,
    pub full_name: String,
    pub initials: String,
    pub phone: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    pub purpose: String,
    pub company: Option<String>,
    pub location: Option<String>,
    /// `DD/MM/YYYY h:mmam`, or `-` when the date or time is unusable
    pub scheduled_at: String,
    pub status: Option<VisitorStatus>,
    pub image: DisplayImage,
    pub guests: Vec<DisplayGuest>,
    pub assets: AssetGroups,
    pub host: Option<DisplayHost>,
}

/// Result of aggregation: a visitor, or an explicit empty state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PreviewData {
    Visitor(Box<DisplayVisitor>),
    NoData,
}

impl PreviewData {
    pub fn visitor(&self) -> Option<&DisplayVisitor> {
        match self {
            PreviewData::Visitor(v) => Some(v.as_ref()),
            PreviewData::NoData => None,
        }
    }
}
