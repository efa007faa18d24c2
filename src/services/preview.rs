//! Preview aggregation
//!
//! Chooses between a server-confirmed record and the in-memory draft, then
//! derives what the preview renders: the formatted schedule, avatar initials
//! and assets grouped by ownership.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    models::{
        image::ImageKind,
        preview::{AssetGroups, DisplayAsset, DisplayGuest, DisplayHost, DisplayImage},
        Asset, AssetType, DisplayVisitor, HostDetails, PreviewData, PreviewSource,
        VisitorFormData, VisitorRecord, VisitorStatus,
    },
    repository::VisitorApi,
};

use super::{
    directory::{self, DirectoryService},
    formatting::{
        avatar_initials, format_date_time, total_assets_label, visitor_initials,
        PERSON_FALLBACK_INITIAL,
    },
    images::{ImageArena, ImageResolver},
};

/// A fetched record takes precedence over draft form data; with neither the
/// preview is explicitly empty.
pub fn aggregate(form: Option<&VisitorFormData>, fetched: Option<&VisitorRecord>) -> PreviewData {
    match (fetched, form) {
        (Some(record), _) => {
            let fields = VisitorFormData::from(record);
            PreviewData::Visitor(Box::new(display(
                &fields,
                PreviewSource::Server,
                Some(record.id.clone()),
                Some(record.status),
            )))
        }
        (None, Some(form)) => {
            PreviewData::Visitor(Box::new(display(form, PreviewSource::Draft, None, None)))
        }
        (None, None) => PreviewData::NoData,
    }
}

fn display(
    fields: &VisitorFormData,
    source: PreviewSource,
    id: Option<String>,
    status: Option<VisitorStatus>,
) -> DisplayVisitor {
    DisplayVisitor {
        source,
        id,
        full_name: fields.full_name.clone(),
        initials: visitor_initials(Some(&fields.full_name)),
        phone: fields.phone.clone(),
        email: fields.email.clone(),
        gender: fields.gender.clone(),
        id_type: fields.id_type.clone(),
        id_number: fields.id_number.clone(),
        purpose: fields.purpose.clone(),
        company: fields.company.clone(),
        location: fields.location.clone(),
        scheduled_at: format_date_time(&fields.date, &fields.time),
        status,
        image: DisplayImage::new(
            ImageKind::Visitor,
            fields.img_url.as_ref().map(|r| r.to_string()),
        ),
        guests: fields
            .guests
            .iter()
            .map(|g| DisplayGuest {
                name: g.guest_name.clone(),
                initials: avatar_initials(Some(&g.guest_name), PERSON_FALLBACK_INITIAL),
                image: DisplayImage::new(
                    ImageKind::Guest,
                    g.img_url.as_ref().map(|r| r.to_string()),
                ),
            })
            .collect(),
        assets: group_assets(&fields.assets),
        host: fields.host_details.as_ref().map(display_host),
    }
}

/// Split assets into Personal and Company buckets
pub fn group_assets(assets: &[Asset]) -> AssetGroups {
    let (personal, company): (Vec<DisplayAsset>, Vec<DisplayAsset>) = assets
        .iter()
        .map(|a| DisplayAsset {
            name: a.asset_name.clone(),
            serial_number: a.serial_number.clone(),
            asset_type: a.asset_type,
            image: DisplayImage::new(
                ImageKind::Asset,
                a.img_url.as_ref().map(|r| r.to_string()),
            ),
        })
        .partition(|a| a.asset_type == AssetType::Personal);

    let total = personal.len() + company.len();
    AssetGroups {
        personal_count: personal.len(),
        company_count: company.len(),
        total,
        total_label: total_assets_label(total),
        personal,
        company,
    }
}

fn display_host(host: &HostDetails) -> DisplayHost {
    DisplayHost {
        user_id: host.user_id,
        name: host.name.clone(),
        email: host.email.clone(),
        phone_number: host.phone_number.clone(),
        initials: avatar_initials(Some(&host.name), PERSON_FALLBACK_INITIAL),
        image: DisplayImage::new(
            ImageKind::HostProfile,
            host.profile_image_url.as_ref().map(|r| r.to_string()),
        ),
    }
}

/// Builds complete previews: fetch, reconcile, aggregate, resolve images.
#[derive(Clone)]
pub struct PreviewService {
    api: Arc<dyn VisitorApi>,
    directory: DirectoryService,
    images: ImageResolver,
}

impl PreviewService {
    pub fn new(api: Arc<dyn VisitorApi>, directory: DirectoryService, images: ImageResolver) -> Self {
        Self {
            api,
            directory,
            images,
        }
    }

    /// Look a visitor up by id. Failures are logged and read as "not found".
    pub async fn fetch_visitor(&self, id: &str, token: &str) -> Option<VisitorRecord> {
        match self.api.get_visitors(token).await {
            Ok(visitors) => {
                let found = visitors.into_iter().find(|v| v.id == id);
                if found.is_none() {
                    tracing::debug!("Visitor {} not in upstream listing", id);
                }
                found
            }
            Err(e) => {
                tracing::warn!("Failed to fetch visitor {}: {}", id, e);
                None
            }
        }
    }

    pub async fn build(
        &self,
        form: Option<VisitorFormData>,
        visitor_id: Option<&str>,
        token: &str,
        flow_id: Uuid,
        arena: &Arc<ImageArena>,
    ) -> PreviewData {
        let fetched = match visitor_id {
            Some(id) => self.fetch_visitor(id, token).await,
            None => None,
        };
        if fetched.is_none() && form.is_none() {
            return PreviewData::NoData;
        }

        let employees = self.directory.load(token).await;
        let fetched = fetched.map(|v| directory::reconcile_visitor(v, &employees));
        let form = form.map(|f| directory::reconcile_form(f, &employees));

        let view_key = match (&fetched, &form) {
            (Some(record), _) => format!("visitor:{}", record.id),
            (None, Some(form)) => format!("draft:{}", form.fingerprint().as_str()),
            (None, None) => return PreviewData::NoData,
        };

        let mut preview = aggregate(form.as_ref(), fetched.as_ref());
        if let PreviewData::Visitor(visitor) = &mut preview {
            let view = arena.begin_view(flow_id, &view_key).await;
            self.images.resolve_visitor(visitor, token, &view).await;
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmployeeRecord, ImageReference};
    use crate::repository::{ImageBlob, ImagePayload, MockVisitorApi};
    use axum::body::Bytes;

    fn asset(name: &str, asset_type: AssetType) -> Asset {
        Asset {
            asset_name: name.to_string(),
            serial_number: format!("SN-{}", name),
            asset_type,
            img_url: None,
        }
    }

    fn form() -> VisitorFormData {
        VisitorFormData {
            full_name: "Jane Roe".to_string(),
            phone: "9876543210".to_string(),
            purpose: "Meeting".to_string(),
            date: "2026-10-18".to_string(),
            time: "15:45".to_string(),
            ..Default::default()
        }
    }

    fn record(id: &str) -> VisitorRecord {
        VisitorRecord {
            id: id.to_string(),
            full_name: "John Doe".to_string(),
            phone: "9123456780".to_string(),
            purpose: "Interview".to_string(),
            date: "2025-01-29T00:00:00.000Z".to_string(),
            time: "09:05".to_string(),
            status: VisitorStatus::Approved,
            img_url: ImageReference::parse("visitors/v1.jpg"),
            host_details: Some(HostDetails {
                user_id: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_fetched_record_takes_precedence() {
        let f = form();
        let r = record("v1");
        let out = aggregate(Some(&f), Some(&r));
        let visitor = out.visitor().unwrap();
        assert_eq!(visitor.source, PreviewSource::Server);
        assert_eq!(visitor.id.as_deref(), Some("v1"));
        assert_eq!(visitor.initials, "JD");
        assert_eq!(visitor.scheduled_at, "29/01/2025 9:05am");
        assert_eq!(visitor.status, Some(VisitorStatus::Approved));
    }

    #[test]
    fn test_falls_back_to_draft_then_no_data() {
        let f = form();
        let out = aggregate(Some(&f), None);
        let visitor = out.visitor().unwrap();
        assert_eq!(visitor.source, PreviewSource::Draft);
        assert_eq!(visitor.id, None);
        assert_eq!(visitor.scheduled_at, "18/10/2026 3:45pm");

        assert_eq!(aggregate(None, None), PreviewData::NoData);
    }

    #[test]
    fn test_asset_grouping() {
        let assets = vec![
            asset("Laptop", AssetType::Personal),
            asset("Badge", AssetType::Company),
            asset("Phone", AssetType::Personal),
            asset("Tablet", AssetType::Company),
            asset("Camera", AssetType::Personal),
        ];
        let groups = group_assets(&assets);
        assert_eq!(groups.total_label, "Total Assets: 05");
        assert_eq!(groups.personal.len(), 3);
        assert_eq!(groups.company.len(), 2);
        assert_eq!(groups.personal_count, 3);
        assert_eq!(groups.company_count, 2);
        for p in &groups.personal {
            assert!(groups.company.iter().all(|c| c.name != p.name));
        }
    }

    #[test]
    fn test_empty_name_initials() {
        let mut f = form();
        f.full_name.clear();
        let out = aggregate(Some(&f), None);
        assert_eq!(out.visitor().unwrap().initials, "V");
    }

    #[tokio::test]
    async fn test_build_reconciles_host_and_resolves_images() {
        let mut api = MockVisitorApi::new();
        api.expect_get_visitors()
            .returning(|_| Ok(vec![record("v0"), record("v1")]));
        api.expect_get_employees().returning(|_| {
            Ok(vec![EmployeeRecord {
                user_id: Some(5),
                name: "Asha Mehta".to_string(),
                phone_number: "9000000001".to_string(),
                profile_image_url: ImageReference::parse("https://cdn.example.com/asha.png"),
                ..Default::default()
            }])
        });
        api.expect_fetch_image().returning(|_, _, _| {
            Ok(Some(ImagePayload::Bytes(ImageBlob {
                content_type: "image/jpeg".to_string(),
                bytes: Bytes::from_static(b"jpeg"),
            })))
        });

        let api: Arc<dyn VisitorApi> = Arc::new(api);
        let service = PreviewService::new(
            api.clone(),
            DirectoryService::new(api.clone()),
            ImageResolver::new(api, "http://localhost:8080"),
        );
        let arena = Arc::new(ImageArena::new());
        let out = service
            .build(None, Some("v1"), "t", Uuid::new_v4(), &arena)
            .await;

        let visitor = out.visitor().unwrap();
        assert_eq!(visitor.id.as_deref(), Some("v1"));
        let host = visitor.host.as_ref().unwrap();
        assert_eq!(host.name, "Asha Mehta");
        assert_eq!(host.initials, "AM");
        assert_eq!(host.image.url.as_deref(), Some("https://cdn.example.com/asha.png"));
        assert!(visitor.image.url.as_deref().unwrap().starts_with("blob:"));
    }

    #[tokio::test]
    async fn test_build_without_anything_is_no_data() {
        let mut api = MockVisitorApi::new();
        api.expect_get_visitors().returning(|_| Ok(vec![]));
        api.expect_get_employees().never();
        let api: Arc<dyn VisitorApi> = Arc::new(api);
        let service = PreviewService::new(
            api.clone(),
            DirectoryService::new(api.clone()),
            ImageResolver::new(api, "http://localhost:8080"),
        );
        let arena = Arc::new(ImageArena::new());
        let out = service
            .build(None, Some("missing"), "t", Uuid::new_v4(), &arena)
            .await;
        assert_eq!(out, PreviewData::NoData);
    }
}
