//! Repository layer: the external visitor API behind one async trait

pub mod client;
pub mod employees;
pub mod images;
pub mod visitors;

use async_trait::async_trait;

use crate::{
    config::UpstreamConfig,
    error::AppResult,
    models::{
        employee::EmployeeRecord,
        image::ImageKind,
        visitor::{CreatedVisitor, VisitorFormData, VisitorRecord},
    },
};

pub use images::{ImageBlob, ImagePayload};

/// Calls the core makes against the external visitor API. Every call carries
/// the caller's bearer token unchanged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitorApi: Send + Sync {
    async fn get_visitors(&self, token: &str) -> AppResult<Vec<VisitorRecord>>;

    async fn create_visitor(&self, data: &VisitorFormData, token: &str)
        -> AppResult<CreatedVisitor>;

    async fn update_visitor(
        &self,
        id: &str,
        patch: &serde_json::Value,
        token: &str,
    ) -> AppResult<()>;

    async fn get_employees(&self, token: &str) -> AppResult<Vec<EmployeeRecord>>;

    async fn fetch_image(
        &self,
        kind: ImageKind,
        path: &str,
        token: &str,
    ) -> AppResult<Option<ImagePayload>>;
}

/// HTTP implementation of [`VisitorApi`]
#[derive(Clone)]
pub struct Repository {
    pub visitors: visitors::VisitorsRepository,
    pub employees: employees::EmployeesRepository,
    pub images: images::ImagesRepository,
}

impl Repository {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = client::UpstreamClient::new(config)?;
        Ok(Self {
            visitors: visitors::VisitorsRepository::new(
                client.clone(),
                config.visitors_path.clone(),
            ),
            employees: employees::EmployeesRepository::new(
                client.clone(),
                config.employees_path.clone(),
            ),
            images: images::ImagesRepository::new(client, config),
        })
    }
}

#[async_trait]
impl VisitorApi for Repository {
    async fn get_visitors(&self, token: &str) -> AppResult<Vec<VisitorRecord>> {
        self.visitors.list(token).await
    }

    async fn create_visitor(
        &self,
        data: &VisitorFormData,
        token: &str,
    ) -> AppResult<CreatedVisitor> {
        self.visitors.create(data, token).await
    }

    async fn update_visitor(
        &self,
        id: &str,
        patch: &serde_json::Value,
        token: &str,
    ) -> AppResult<()> {
        self.visitors.update(id, patch, token).await
    }

    async fn get_employees(&self, token: &str) -> AppResult<Vec<EmployeeRecord>> {
        self.employees.list(token).await
    }

    async fn fetch_image(
        &self,
        kind: ImageKind,
        path: &str,
        token: &str,
    ) -> AppResult<Option<ImagePayload>> {
        self.images.fetch(kind, path, token).await
    }
}
