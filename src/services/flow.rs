//! Host-to-visitor registration flow (compose -> preview -> share)
//!
//! Each open flow owns a [`FlowContext`] holding the draft form and the id of a
//! visitor created upstream but not yet shared. Both pieces of state are
//! independent except for one rule: storing a draft whose fingerprint differs
//! from the last one seen clears the pending visitor id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::FlowConfig,
    error::{AppError, AppResult},
    models::{Fingerprint, PreviewData, VisitorFormData},
    repository::{ImageBlob, VisitorApi},
};

use super::{images::ImageArena, preview::PreviewService};

pub const INVITE_LABEL: &str = "Invite";
pub const REINVITE_LABEL: &str = "Reinvite";

#[derive(Debug, Default)]
pub struct FlowContext {
    form_data: Option<VisitorFormData>,
    pending_visitor_id: Option<String>,
    last_fingerprint: Option<Fingerprint>,
    should_reset_form: bool,
}

impl FlowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form_data(&self) -> Option<&VisitorFormData> {
        self.form_data.as_ref()
    }

    pub fn pending_visitor_id(&self) -> Option<&str> {
        self.pending_visitor_id.as_deref()
    }

    /// Store (or clear) the draft. A draft for a different visitor
    /// invalidates any visitor already created for the previous one.
    pub fn set_form_data(&mut self, form: Option<VisitorFormData>) {
        if let Some(form) = &form {
            let fingerprint = form.fingerprint();
            if self.last_fingerprint.as_ref() != Some(&fingerprint) {
                if let Some(id) = self.pending_visitor_id.take() {
                    tracing::debug!("New visitor entered; dropping pending visitor {}", id);
                }
                self.last_fingerprint = Some(fingerprint);
            }
        }
        self.form_data = form;
    }

    pub fn set_pending_visitor_id(&mut self, id: String) {
        self.pending_visitor_id = Some(id);
    }

    /// Explicit cancel from the preview
    pub fn cancel(&mut self) {
        self.form_data = None;
        self.pending_visitor_id = None;
    }

    /// Final submission finished: drop the draft and tell the compose view to
    /// start clean next time.
    pub fn complete(&mut self) {
        self.form_data = None;
        self.should_reset_form = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Read and clear the compose-reset signal
    pub fn take_reset_flag(&mut self) -> bool {
        std::mem::take(&mut self.should_reset_form)
    }

    pub fn invite_label(&self) -> &'static str {
        if self.pending_visitor_id.is_some() {
            REINVITE_LABEL
        } else {
            INVITE_LABEL
        }
    }

    pub fn share_enabled(&self) -> bool {
        self.pending_visitor_id.is_some()
    }

    pub fn snapshot(&self, flow_id: Uuid) -> FlowSnapshot {
        FlowSnapshot {
            flow_id,
            has_form: self.form_data.is_some(),
            pending_visitor_id: self.pending_visitor_id.clone(),
            invite_label: self.invite_label().to_string(),
            share_enabled: self.share_enabled(),
            should_reset_form: self.should_reset_form,
        }
    }
}

/// What the views need to know about a flow's state
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FlowSnapshot {
    pub flow_id: Uuid,
    pub has_form: bool,
    pub pending_visitor_id: Option<String>,
    pub invite_label: String,
    pub share_enabled: bool,
    pub should_reset_form: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShareLink {
    pub visitor_id: String,
    /// Link encoded in the visitor pass QR
    pub url: String,
}

pub struct FlowSession {
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub context: Mutex<FlowContext>,
    pub arena: Arc<ImageArena>,
    /// SHA-256 of the bearer token that opened the flow
    owner: String,
    last_seen: std::sync::Mutex<Instant>,
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl FlowSession {
    fn new(token: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: token_digest(token),
            opened_at: Utc::now(),
            context: Mutex::new(FlowContext::new()),
            arena: Arc::new(ImageArena::new()),
            last_seen: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn is_owned_by(&self, token: &str) -> bool {
        self.owner == token_digest(token)
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_at(&self, now: Instant) -> Duration {
        let last_seen = *self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        now.saturating_duration_since(last_seen)
    }
}

/// Open flows, keyed by id. Sessions not looked up for `idle_timeout` are
/// evicted along with their images.
pub struct FlowStore {
    sessions: RwLock<HashMap<Uuid, Arc<FlowSession>>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl FlowStore {
    pub fn new(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            idle_timeout,
        }
    }

    pub async fn open(&self, token: &str) -> AppResult<Arc<FlowSession>> {
        self.evict_idle(Instant::now()).await;
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(AppError::Conflict(format!(
                "Too many open visitor flows (limit {})",
                self.max_sessions
            )));
        }
        let session = Arc::new(FlowSession::new(token));
        sessions.insert(session.id, Arc::clone(&session));
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Arc<FlowSession>> {
        let session = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Visitor flow {} not found", id)))?;
        session.touch();
        Ok(session)
    }

    /// Drop every session idle for longer than the timeout as of `now`.
    /// Returns how many were evicted.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let expired: Vec<Arc<FlowSession>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .values()
                .filter(|s| s.idle_at(now) > self.idle_timeout)
                .map(|s| s.id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            session.arena.teardown().await;
            tracing::info!(
                "Visitor flow {} (opened {}) evicted after inactivity",
                session.id,
                session.opened_at
            );
        }
        expired.len()
    }

    pub async fn close(&self, id: Uuid) -> AppResult<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Visitor flow {} not found", id)))?;
        session.arena.teardown().await;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreviewResponse {
    #[schema(value_type = Object)]
    pub preview: PreviewData,
    pub flow: FlowSnapshot,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InviteResponse {
    pub visitor_id: String,
    pub reinvited: bool,
    pub flow: FlowSnapshot,
}

#[derive(Clone)]
pub struct FlowService {
    store: Arc<FlowStore>,
    api: Arc<dyn VisitorApi>,
    preview: PreviewService,
    share_base_url: String,
}

impl FlowService {
    pub fn new(config: &FlowConfig, api: Arc<dyn VisitorApi>, preview: PreviewService) -> Self {
        Self {
            store: Arc::new(FlowStore::new(
                config.max_sessions,
                Duration::from_secs(config.idle_timeout_seconds),
            )),
            api,
            preview,
            share_base_url: config.share_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> &FlowStore {
        &self.store
    }

    /// Periodically evict abandoned flows (tabs that never sent close)
    pub fn spawn_idle_sweep(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(Instant::now()).await;
                if evicted > 0 {
                    tracing::debug!("Idle sweep evicted {} visitor flows", evicted);
                }
            }
        })
    }

    /// Page-group entry. The flow is bound to the caller's token.
    pub async fn open(&self, token: &str) -> AppResult<FlowSnapshot> {
        let session = self.store.open(token).await?;
        tracing::info!("Visitor flow {} opened", session.id);
        let ctx = session.context.lock().await;
        Ok(ctx.snapshot(session.id))
    }

    /// Reject callers other than the one that opened the flow. Foreign flows
    /// look exactly like missing ones.
    pub async fn authorize(&self, flow_id: Uuid, token: &str) -> AppResult<()> {
        let session = self.store.get(flow_id).await?;
        if session.is_owned_by(token) {
            Ok(())
        } else {
            tracing::warn!("Rejected access to visitor flow {} by another caller", flow_id);
            Err(AppError::NotFound(format!("Visitor flow {} not found", flow_id)))
        }
    }

    /// Tab unload: all flow state and resolved images go away
    pub async fn close(&self, flow_id: Uuid) -> AppResult<()> {
        self.store.close(flow_id).await?;
        tracing::info!("Visitor flow {} closed", flow_id);
        Ok(())
    }

    /// Draft for the compose view to pre-fill. A pending reset signal wipes
    /// the flow first.
    pub async fn draft(&self, flow_id: Uuid) -> AppResult<Option<VisitorFormData>> {
        let session = self.store.get(flow_id).await?;
        let mut ctx = session.context.lock().await;
        if ctx.take_reset_flag() {
            ctx.reset();
            session.arena.teardown().await;
        }
        Ok(ctx.form_data().cloned())
    }

    /// Validate the compose form and store it for the preview
    pub async fn compose(
        &self,
        flow_id: Uuid,
        form: VisitorFormData,
        now: NaiveDateTime,
    ) -> AppResult<FlowSnapshot> {
        form.validate_at(now)?;

        let session = self.store.get(flow_id).await?;
        let mut ctx = session.context.lock().await;
        if ctx.take_reset_flag() {
            ctx.reset();
            session.arena.teardown().await;
        }
        ctx.set_form_data(Some(form));
        Ok(ctx.snapshot(flow_id))
    }

    /// Render the preview from a fetched record (explicit id, else the
    /// pending visitor) or the draft
    pub async fn preview(
        &self,
        flow_id: Uuid,
        visitor_id: Option<String>,
        token: &str,
    ) -> AppResult<PreviewResponse> {
        let session = self.store.get(flow_id).await?;
        let (form, target) = {
            let ctx = session.context.lock().await;
            let target = visitor_id.or_else(|| ctx.pending_visitor_id().map(str::to_string));
            (ctx.form_data().cloned(), target)
        };

        let preview = self
            .preview
            .build(form, target.as_deref(), token, flow_id, &session.arena)
            .await;

        let ctx = session.context.lock().await;
        Ok(PreviewResponse {
            preview,
            flow: ctx.snapshot(flow_id),
        })
    }

    /// Create the visitor, or update the already-created one on Reinvite
    pub async fn invite(&self, flow_id: Uuid, token: &str) -> AppResult<InviteResponse> {
        let session = self.store.get(flow_id).await?;
        let (form, pending) = {
            let ctx = session.context.lock().await;
            let form = ctx
                .form_data()
                .cloned()
                .ok_or_else(|| AppError::MissingData("No visitor details to invite".to_string()))?;
            (form, ctx.pending_visitor_id().map(str::to_string))
        };
        form.validate()?;

        let reinvited = pending.is_some();
        let visitor_id = match pending {
            None => {
                let created = self.api.create_visitor(&form, token).await.map_err(|e| {
                    tracing::error!("Creating visitor {} failed: {}", form.full_name, e);
                    e
                })?;
                created.id
            }
            Some(id) => {
                let patch = serde_json::to_value(&form)
                    .map_err(|e| AppError::Internal(format!("Failed to encode visitor: {}", e)))?;
                self.api.update_visitor(&id, &patch, token).await.map_err(|e| {
                    tracing::error!("Re-inviting visitor {} failed: {}", id, e);
                    e
                })?;
                id
            }
        };

        let mut ctx = session.context.lock().await;
        let still_same = ctx.form_data().map(|f| f.fingerprint()) == Some(form.fingerprint());
        if still_same {
            ctx.set_pending_visitor_id(visitor_id.clone());
        } else {
            tracing::warn!(
                "Draft changed while visitor {} was being submitted; not marking it pending",
                visitor_id
            );
        }
        tracing::info!("Visitor {} invited (reinvite: {})", visitor_id, reinvited);

        Ok(InviteResponse {
            visitor_id,
            reinvited,
            flow: ctx.snapshot(flow_id),
        })
    }

    /// Share the visitor pass; completes the flow
    pub async fn share(&self, flow_id: Uuid) -> AppResult<ShareLink> {
        let session = self.store.get(flow_id).await?;
        let mut ctx = session.context.lock().await;
        let visitor_id = ctx
            .pending_visitor_id()
            .map(str::to_string)
            .ok_or_else(|| AppError::MissingData("Invite the visitor before sharing".to_string()))?;
        ctx.complete();

        Ok(ShareLink {
            url: format!("{}/{}", self.share_base_url, visitor_id),
            visitor_id,
        })
    }

    pub async fn cancel(&self, flow_id: Uuid) -> AppResult<FlowSnapshot> {
        let session = self.store.get(flow_id).await?;
        let mut ctx = session.context.lock().await;
        ctx.cancel();
        session.arena.teardown().await;
        Ok(ctx.snapshot(flow_id))
    }

    pub async fn snapshot(&self, flow_id: Uuid) -> AppResult<FlowSnapshot> {
        let session = self.store.get(flow_id).await?;
        let ctx = session.context.lock().await;
        Ok(ctx.snapshot(flow_id))
    }

    pub async fn blob(&self, flow_id: Uuid, blob_id: Uuid) -> AppResult<ImageBlob> {
        let session = self.store.get(flow_id).await?;
        session
            .arena
            .blob(blob_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", blob_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::visitor::CreatedVisitor;
    use crate::repository::MockVisitorApi;
    use crate::services::{directory::DirectoryService, images::ImageResolver};
    use chrono::NaiveDate;

    fn form(name: &str, time: &str) -> VisitorFormData {
        VisitorFormData {
            full_name: name.to_string(),
            phone: "9876543210".to_string(),
            purpose: "Meeting".to_string(),
            date: "2026-10-18".to_string(),
            time: time.to_string(),
            ..Default::default()
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn service(api: MockVisitorApi) -> FlowService {
        let api: Arc<dyn VisitorApi> = Arc::new(api);
        let preview = PreviewService::new(
            api.clone(),
            DirectoryService::new(api.clone()),
            ImageResolver::new(api.clone(), "http://localhost:8080"),
        );
        FlowService::new(
            &FlowConfig {
                max_sessions: 2,
                share_base_url: "https://pass.example.com/v/".to_string(),
                idle_timeout_seconds: 60,
            },
            api,
            preview,
        )
    }

    #[test]
    fn test_new_fingerprint_resets_pending_id() {
        let mut ctx = FlowContext::new();
        ctx.set_form_data(Some(form("Jane Roe", "11:30")));
        ctx.set_pending_visitor_id("v1".to_string());

        // Same visitor, other fields edited: pending id survives.
        let mut edited = form("Jane Roe", "11:30");
        edited.purpose = "Delivery".to_string();
        ctx.set_form_data(Some(edited));
        assert_eq!(ctx.pending_visitor_id(), Some("v1"));
        assert_eq!(ctx.invite_label(), REINVITE_LABEL);

        ctx.set_form_data(Some(form("Jane Roe", "12:00")));
        assert_eq!(ctx.pending_visitor_id(), None);
        assert_eq!(ctx.invite_label(), INVITE_LABEL);
        assert!(!ctx.share_enabled());
    }

    #[test]
    fn test_cancel_complete_and_reset_flag() {
        let mut ctx = FlowContext::new();
        ctx.set_form_data(Some(form("Jane Roe", "11:30")));
        ctx.set_pending_visitor_id("v1".to_string());
        ctx.complete();
        assert!(ctx.form_data().is_none());
        assert!(ctx.take_reset_flag());
        assert!(!ctx.take_reset_flag());

        ctx.cancel();
        assert!(ctx.pending_visitor_id().is_none());
    }

    #[tokio::test]
    async fn test_compose_invite_reinvite_share() {
        let mut api = MockVisitorApi::new();
        api.expect_create_visitor()
            .times(1)
            .returning(|_, _| Ok(CreatedVisitor { id: "v42".to_string() }));
        api.expect_update_visitor()
            .times(1)
            .withf(|id, patch, _| id == "v42" && patch["fullName"] == "Jane Roe")
            .returning(|_, _, _| Ok(()));
        api.expect_get_visitors().returning(|_| Ok(vec![]));
        api.expect_get_employees().returning(|_| Ok(vec![]));
        let flows = service(api);

        let opened = flows.open("t").await.unwrap();
        let id = opened.flow_id;
        assert_eq!(opened.invite_label, INVITE_LABEL);

        let snap = flows.compose(id, form("Jane Roe", "11:30"), now()).await.unwrap();
        assert!(snap.has_form);
        assert_eq!(snap.invite_label, INVITE_LABEL);
        assert!(!snap.share_enabled);

        let preview = flows.preview(id, None, "t").await.unwrap();
        assert_eq!(preview.flow.invite_label, INVITE_LABEL);
        assert_eq!(preview.preview.visitor().unwrap().full_name, "Jane Roe");

        let invited = flows.invite(id, "t").await.unwrap();
        assert_eq!(invited.visitor_id, "v42");
        assert!(!invited.reinvited);
        assert_eq!(invited.flow.pending_visitor_id.as_deref(), Some("v42"));
        assert_eq!(invited.flow.invite_label, REINVITE_LABEL);
        assert!(invited.flow.share_enabled);

        let again = flows.invite(id, "t").await.unwrap();
        assert!(again.reinvited);

        let link = flows.share(id).await.unwrap();
        assert_eq!(link.url, "https://pass.example.com/v/v42");
        assert!(flows.draft(id).await.unwrap().is_none());
        let snap = flows.snapshot(id).await.unwrap();
        assert_eq!(snap.pending_visitor_id, None);
        assert!(!snap.should_reset_form);
    }

    #[tokio::test]
    async fn test_missing_data_errors() {
        let flows = service(MockVisitorApi::new());
        let id = flows.open("t").await.unwrap().flow_id;

        assert!(matches!(flows.invite(id, "t").await, Err(AppError::MissingData(_))));
        assert!(matches!(flows.share(id).await, Err(AppError::MissingData(_))));
        assert!(matches!(
            flows.compose(id, form("", "11:30"), now()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_flow_retryable() {
        let mut api = MockVisitorApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_create_visitor()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(AppError::Upstream {
                    status: 409,
                    message: "Visitor already scheduled".to_string(),
                })
            });
        api.expect_create_visitor()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(CreatedVisitor { id: "v7".to_string() }));
        let flows = service(api);
        let id = flows.open("t").await.unwrap().flow_id;
        flows.compose(id, form("Jane Roe", "11:30"), now()).await.unwrap();

        match flows.invite(id, "t").await {
            Err(AppError::Upstream { message, .. }) => {
                assert_eq!(message, "Visitor already scheduled")
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.visitor_id)),
        }
        assert_eq!(flows.snapshot(id).await.unwrap().invite_label, INVITE_LABEL);

        let retried = flows.invite(id, "t").await.unwrap();
        assert_eq!(retried.visitor_id, "v7");
    }

    #[tokio::test]
    async fn test_session_cap_and_close() {
        let flows = service(MockVisitorApi::new());
        let a = flows.open("t").await.unwrap().flow_id;
        flows.open("t").await.unwrap();
        assert!(matches!(flows.open("t").await, Err(AppError::Conflict(_))));

        flows.close(a).await.unwrap();
        assert_eq!(flows.store().len().await, 1);
        assert!(matches!(flows.snapshot(a).await, Err(AppError::NotFound(_))));
        flows.open("t").await.unwrap();
    }

    #[tokio::test]
    async fn test_flow_bound_to_opening_token() {
        let flows = service(MockVisitorApi::new());
        let id = flows.open("t").await.unwrap().flow_id;
        assert!(flows.authorize(id, "t").await.is_ok());
        assert!(matches!(
            flows.authorize(id, "someone-else").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            flows.authorize(Uuid::new_v4(), "t").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let flows = service(MockVisitorApi::new());
        let stale = flows.open("t").await.unwrap().flow_id;
        let fresh = flows.open("t").await.unwrap().flow_id;

        let later = Instant::now() + Duration::from_secs(61);
        flows.store().get(fresh).await.unwrap();
        assert_eq!(flows.store().evict_idle(Instant::now()).await, 0);
        assert_eq!(flows.store().evict_idle(later).await, 2);
        assert!(flows.store().is_empty().await);
        assert!(matches!(flows.snapshot(stale).await, Err(AppError::NotFound(_))));

        // A full store of abandoned flows no longer blocks new ones.
        flows.open("t").await.unwrap();
    }

    #[tokio::test]
    async fn test_compose_after_share_releases_images() {
        let flows = service(MockVisitorApi::new());
        let id = flows.open("t").await.unwrap().flow_id;
        let session = flows.store().get(id).await.unwrap();
        let scope = session.arena.begin_view(id, "visitor:v1").await;

        {
            let mut ctx = session.context.lock().await;
            ctx.set_form_data(Some(form("Jane Roe", "11:30")));
            ctx.set_pending_visitor_id("v1".to_string());
            ctx.complete();
        }
        flows.compose(id, form("John Doe", "12:00"), now()).await.unwrap();

        assert!(!scope.is_live().await);
        assert_eq!(flows.snapshot(id).await.unwrap().pending_visitor_id, None);
    }
}
