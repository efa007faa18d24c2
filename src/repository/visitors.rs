//! Visitor CRUD against the external visitor API

use crate::{
    error::AppResult,
    models::visitor::{
        CreateVisitorEnvelope, CreatedVisitor, VisitorFormData, VisitorRecord, VisitorsEnvelope,
    },
};

use super::client::UpstreamClient;

#[derive(Clone)]
pub struct VisitorsRepository {
    client: UpstreamClient,
    path: String,
}

impl VisitorsRepository {
    pub fn new(client: UpstreamClient, path: String) -> Self {
        Self { client, path }
    }

    /// List all visitors visible to the token holder
    pub async fn list(&self, token: &str) -> AppResult<Vec<VisitorRecord>> {
        let response = self.client.send(self.client.get(&self.path, token)).await?;
        let envelope: VisitorsEnvelope = response.json().await?;
        Ok(envelope.visitors)
    }

    /// Create a visitor from form data
    pub async fn create(&self, data: &VisitorFormData, token: &str) -> AppResult<CreatedVisitor> {
        let response = self
            .client
            .send(self.client.post(&self.path, token).json(data))
            .await?;
        let envelope: CreateVisitorEnvelope = response.json().await?;
        tracing::info!("Visitor {} created upstream", envelope.visitor.id);
        Ok(envelope.visitor)
    }

    /// Apply a partial update to a visitor
    pub async fn update(&self, id: &str, patch: &serde_json::Value, token: &str) -> AppResult<()> {
        let path = format!("{}/{}", self.path.trim_end_matches('/'), id);
        self.client
            .send(self.client.put(&path, token).json(patch))
            .await?;
        tracing::debug!("Visitor {} updated upstream", id);
        Ok(())
    }
}
