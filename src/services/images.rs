//! Image reference resolution
//!
//! Absolute URLs and data URIs pass straight through. Storage paths are
//! exchanged with the upstream API for image bytes, which are parked in the
//! flow's [`ImageArena`] and handed back as `blob:` URLs served by this
//! service. Results are cached per view, keyed by kind and path; the cache and
//! the blobs are dropped when the view changes or the flow closes.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        image::{is_renderable_url, ImageKind, ImageReference},
        preview::DisplayImage,
        DisplayVisitor,
    },
    repository::{ImageBlob, ImagePayload, VisitorApi},
};

#[derive(Default)]
struct ArenaInner {
    generation: u64,
    /// Identity of the record the current view renders
    view_key: Option<String>,
    resolved: HashMap<(ImageKind, String), String>,
    blobs: HashMap<Uuid, ImageBlob>,
}

/// Per-flow store of resolved image URLs and the blobs behind them
#[derive(Default)]
pub struct ImageArena {
    inner: RwLock<ArenaInner>,
}

impl ImageArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a view of the record identified by `view_key`. Re-entering the
    /// same view keeps its cache; a different record starts a fresh one.
    pub async fn begin_view(self: &Arc<Self>, flow_id: Uuid, view_key: &str) -> ViewScope {
        let mut inner = self.inner.write().await;
        if inner.view_key.as_deref() != Some(view_key) {
            inner.generation += 1;
            inner.view_key = Some(view_key.to_string());
            inner.resolved.clear();
            inner.blobs.clear();
        }
        ViewScope {
            flow_id,
            arena: Arc::clone(self),
            generation: inner.generation,
        }
    }

    /// Navigation away: drop everything and invalidate outstanding scopes
    pub async fn teardown(&self) {
        let mut inner = self.inner.write().await;
        inner.generation += 1;
        inner.view_key = None;
        inner.resolved.clear();
        inner.blobs.clear();
    }

    pub async fn blob(&self, id: Uuid) -> Option<ImageBlob> {
        self.inner.read().await.blobs.get(&id).cloned()
    }

    pub async fn resolved_count(&self) -> usize {
        self.inner.read().await.resolved.len()
    }
}

/// Handle on one view's slice of an arena. Writes through a scope whose view
/// has ended are discarded.
#[derive(Clone)]
pub struct ViewScope {
    flow_id: Uuid,
    arena: Arc<ImageArena>,
    generation: u64,
}

impl ViewScope {
    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub async fn is_live(&self) -> bool {
        self.arena.inner.read().await.generation == self.generation
    }

    async fn cached(&self, kind: ImageKind, path: &str) -> Option<String> {
        let inner = self.arena.inner.read().await;
        if inner.generation != self.generation {
            return None;
        }
        inner.resolved.get(&(kind, path.to_string())).cloned()
    }

    async fn record(&self, kind: ImageKind, path: &str, url: &str) -> bool {
        let mut inner = self.arena.inner.write().await;
        if inner.generation != self.generation {
            return false;
        }
        inner.resolved.insert((kind, path.to_string()), url.to_string());
        true
    }

    async fn store_blob(&self, blob: ImageBlob) -> Option<Uuid> {
        let mut inner = self.arena.inner.write().await;
        if inner.generation != self.generation {
            return None;
        }
        let id = Uuid::new_v4();
        inner.blobs.insert(id, blob);
        Some(id)
    }
}

#[derive(Clone)]
pub struct ImageResolver {
    api: Arc<dyn VisitorApi>,
    public_url: String,
}

impl ImageResolver {
    pub fn new(api: Arc<dyn VisitorApi>, public_url: &str) -> Self {
        Self {
            api,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// `blob:`-prefixed handle for a parked image. It is not a browser object
    /// URL: clients strip the `blob:` prefix and GET the remainder with their
    /// bearer token to receive the bytes.
    pub fn blob_url(&self, flow_id: Uuid, blob_id: Uuid) -> String {
        format!(
            "blob:{}/api/v1/flows/{}/blobs/{}",
            self.public_url, flow_id, blob_id
        )
    }

    /// Produce a renderable URL for `reference`, or `None` to fall back to
    /// initials. Never fails.
    pub async fn resolve(
        &self,
        reference: Option<&ImageReference>,
        kind: ImageKind,
        token: &str,
        view: &ViewScope,
    ) -> Option<String> {
        let path = match reference? {
            ImageReference::AbsoluteUrl(url) | ImageReference::DataUri(url) => {
                return Some(url.clone());
            }
            ImageReference::StoragePath(path) => path,
        };

        if let Some(url) = view.cached(kind, path).await {
            return Some(url);
        }

        match self.fetch_url(kind, path, token, view).await {
            Ok(Some(url)) if is_renderable_url(&url) => {
                if !view.record(kind, path, &url).await {
                    tracing::debug!("Dropping {} image resolved after its view ended", kind);
                    return None;
                }
                Some(url)
            }
            Ok(Some(url)) => {
                tracing::warn!(
                    "Discarding non-renderable {} image URL for {}: {}",
                    kind,
                    path,
                    url
                );
                None
            }
            Ok(None) => {
                tracing::debug!("No {} image stored at {}", kind, path);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to resolve {} image {}: {}", kind, path, e);
                None
            }
        }
    }

    async fn fetch_url(
        &self,
        kind: ImageKind,
        path: &str,
        token: &str,
        view: &ViewScope,
    ) -> AppResult<Option<String>> {
        Ok(match self.api.fetch_image(kind, path, token).await? {
            None => None,
            Some(ImagePayload::Link(url)) => Some(url),
            Some(ImagePayload::Bytes(blob)) => view
                .store_blob(blob)
                .await
                .map(|id| self.blob_url(view.flow_id, id)),
        })
    }

    /// Resolve one display slot in place
    pub async fn resolve_slot(&self, slot: &mut DisplayImage, token: &str, view: &ViewScope) {
        let reference = slot.reference.as_deref().and_then(ImageReference::parse);
        slot.url = self.resolve(reference.as_ref(), slot.kind, token, view).await;
    }

    /// Resolve every image on a visitor concurrently. Completion order is
    /// irrelevant: each slot owns its own URL and each path its own cache key.
    pub async fn resolve_visitor(&self, visitor: &mut DisplayVisitor, token: &str, view: &ViewScope) {
        let mut slots: Vec<&mut DisplayImage> = vec![&mut visitor.image];
        slots.extend(visitor.guests.iter_mut().map(|g| &mut g.image));
        slots.extend(visitor.assets.personal.iter_mut().map(|a| &mut a.image));
        slots.extend(visitor.assets.company.iter_mut().map(|a| &mut a.image));
        if let Some(host) = visitor.host.as_mut() {
            slots.push(&mut host.image);
        }

        join_all(
            slots
                .into_iter()
                .map(|slot| self.resolve_slot(slot, token, view)),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::repository::MockVisitorApi;
    use axum::body::Bytes;

    fn png() -> ImagePayload {
        ImagePayload::Bytes(ImageBlob {
            content_type: "image/png".to_string(),
            bytes: Bytes::from_static(b"\x89PNG"),
        })
    }

    async fn scope(arena: &Arc<ImageArena>) -> ViewScope {
        arena.begin_view(Uuid::nil(), "visitor-1").await
    }

    #[tokio::test]
    async fn test_displayable_references_skip_network() {
        let mut api = MockVisitorApi::new();
        api.expect_fetch_image().never();
        let resolver = ImageResolver::new(Arc::new(api), "http://localhost:8080");
        let arena = Arc::new(ImageArena::new());
        let view = scope(&arena).await;

        for raw in ["http://a/b.png", "https://a/b.png", "data:image/png;base64,AAAA"] {
            let reference = ImageReference::parse(raw);
            let out = resolver
                .resolve(reference.as_ref(), ImageKind::Visitor, "t", &view)
                .await;
            assert_eq!(out.as_deref(), Some(raw));
        }
        assert_eq!(resolver.resolve(None, ImageKind::Guest, "t", &view).await, None);
    }

    #[tokio::test]
    async fn test_storage_path_becomes_blob_url_and_is_cached() {
        let mut api = MockVisitorApi::new();
        api.expect_fetch_image()
            .times(1)
            .withf(|kind, path, token| {
                *kind == ImageKind::Asset && path == "assets/7.jpg" && token == "secret"
            })
            .returning(|_, _, _| Ok(Some(png())));
        let resolver = ImageResolver::new(Arc::new(api), "http://localhost:8080/");
        let arena = Arc::new(ImageArena::new());
        let view = scope(&arena).await;
        let reference = ImageReference::parse("assets/7.jpg");

        let first = resolver
            .resolve(reference.as_ref(), ImageKind::Asset, "secret", &view)
            .await
            .unwrap();
        assert!(first.starts_with("blob:http://localhost:8080/api/v1/flows/"));

        let second = resolver
            .resolve(reference.as_ref(), ImageKind::Asset, "secret", &view)
            .await;
        assert_eq!(second.as_deref(), Some(first.as_str()));

        let blob_id: Uuid = first.rsplit('/').next().unwrap().parse().unwrap();
        assert!(arena.blob(blob_id).await.is_some());
    }

    #[tokio::test]
    async fn test_echoed_path_is_rejected() {
        let mut api = MockVisitorApi::new();
        api.expect_fetch_image()
            .returning(|_, path, _| Ok(Some(ImagePayload::Link(path.to_string()))));
        let resolver = ImageResolver::new(Arc::new(api), "http://localhost:8080");
        let arena = Arc::new(ImageArena::new());
        let view = scope(&arena).await;

        let reference = ImageReference::parse("guests/3.jpg");
        let out = resolver
            .resolve(reference.as_ref(), ImageKind::Guest, "t", &view)
            .await;
        assert_eq!(out, None);
        assert_eq!(arena.resolved_count().await, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_none() {
        let mut api = MockVisitorApi::new();
        api.expect_fetch_image().returning(|_, _, _| {
            Err(AppError::Upstream {
                status: 401,
                message: "Token expired".to_string(),
            })
        });
        let resolver = ImageResolver::new(Arc::new(api), "http://localhost:8080");
        let arena = Arc::new(ImageArena::new());
        let view = scope(&arena).await;

        let reference = ImageReference::parse("visitors/1.jpg");
        assert_eq!(
            resolver
                .resolve(reference.as_ref(), ImageKind::Visitor, "t", &view)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_stale_scope_writes_are_discarded() {
        let mut api = MockVisitorApi::new();
        api.expect_fetch_image().returning(|_, _, _| Ok(Some(png())));
        let resolver = ImageResolver::new(Arc::new(api), "http://localhost:8080");
        let arena = Arc::new(ImageArena::new());
        let stale = scope(&arena).await;
        arena.teardown().await;

        assert!(!stale.is_live().await);
        let reference = ImageReference::parse("visitors/1.jpg");
        let out = resolver
            .resolve(reference.as_ref(), ImageKind::Visitor, "t", &stale)
            .await;
        assert_eq!(out, None);
        assert_eq!(arena.resolved_count().await, 0);
    }

    #[tokio::test]
    async fn test_same_view_keeps_cache_new_view_clears_it() {
        let mut api = MockVisitorApi::new();
        api.expect_fetch_image().times(2).returning(|_, _, _| Ok(Some(png())));
        let resolver = ImageResolver::new(Arc::new(api), "http://localhost:8080");
        let arena = Arc::new(ImageArena::new());
        let reference = ImageReference::parse("visitors/1.jpg");

        let view = arena.begin_view(Uuid::nil(), "a").await;
        resolver.resolve(reference.as_ref(), ImageKind::Visitor, "t", &view).await;
        let view = arena.begin_view(Uuid::nil(), "a").await;
        resolver.resolve(reference.as_ref(), ImageKind::Visitor, "t", &view).await;
        assert_eq!(arena.resolved_count().await, 1);

        let view = arena.begin_view(Uuid::nil(), "b").await;
        assert_eq!(arena.resolved_count().await, 0);
        resolver.resolve(reference.as_ref(), ImageKind::Visitor, "t", &view).await;
        assert_eq!(arena.resolved_count().await, 1);
    }
}
