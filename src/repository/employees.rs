//! Employee directory lookup

use crate::{
    error::AppResult,
    models::employee::{EmployeeRecord, EmployeesEnvelope},
};

use super::client::UpstreamClient;

#[derive(Clone)]
pub struct EmployeesRepository {
    client: UpstreamClient,
    path: String,
}

impl EmployeesRepository {
    pub fn new(client: UpstreamClient, path: String) -> Self {
        Self { client, path }
    }

    pub async fn list(&self, token: &str) -> AppResult<Vec<EmployeeRecord>> {
        let response = self.client.send(self.client.get(&self.path, token)).await?;
        let envelope: EmployeesEnvelope = response.json().await?;
        Ok(envelope.employees)
    }
}
