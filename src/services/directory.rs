//! Host reconciliation against the employee directory
//!
//! Host snapshots embedded in visitor records are often incomplete. The
//! employee directory is treated as authoritative: missing photo and phone
//! values are filled from it, and the name is replaced whenever the directory
//! disagrees. Present photo and phone values are never overwritten.
//!
//! Every function here is idempotent.

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{EmployeeRecord, HostDetails, VisitorFormData, VisitorRecord},
    repository::VisitorApi,
};

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Primary-key match on the numeric user id
pub fn find_by_user_id(host: &HostDetails, directory: &[EmployeeRecord]) -> Option<usize> {
    let user_id = host.user_id?;
    directory.iter().position(|e| e.user_id == Some(user_id))
}

/// Secondary match used where only contact details are known. Email is the
/// key whenever present; the name is consulted only for hosts without one,
/// so a name rewritten by [`apply`] never changes which employee matches.
pub fn find_by_contact(host: &HostDetails, directory: &[EmployeeRecord]) -> Option<usize> {
    let email = host.email.trim();
    if !email.is_empty() {
        return directory
            .iter()
            .position(|e| e.email.eq_ignore_ascii_case(email));
    }
    if is_blank(&host.name) {
        return None;
    }
    directory.iter().position(|e| e.name == host.name)
}

fn apply(mut host: HostDetails, employee: &EmployeeRecord) -> HostDetails {
    if host.profile_image_url.is_none() && employee.profile_image_url.is_some() {
        host.profile_image_url = employee.profile_image_url.clone();
    }
    if is_blank(&host.phone_number) && !is_blank(&employee.phone_number) {
        host.phone_number = employee.phone_number.clone();
    }
    // Directory name wins outright, not just when the host's is empty.
    if !is_blank(&employee.name) && employee.name != host.name {
        host.name = employee.name.clone();
    }
    if is_blank(&host.email) && !is_blank(&employee.email) {
        host.email = employee.email.clone();
    }
    host
}

/// Reconcile a host by user id; unchanged when no employee matches
pub fn reconcile(host: HostDetails, directory: &[EmployeeRecord]) -> HostDetails {
    match find_by_user_id(&host, directory) {
        Some(idx) => apply(host, &directory[idx]),
        None => host,
    }
}

/// Reconcile a host matched on email or name
pub fn reconcile_by_contact(host: HostDetails, directory: &[EmployeeRecord]) -> HostDetails {
    match find_by_contact(&host, directory) {
        Some(idx) => apply(host, &directory[idx]),
        None => host,
    }
}

pub fn reconcile_visitor(mut visitor: VisitorRecord, directory: &[EmployeeRecord]) -> VisitorRecord {
    visitor.host_details = visitor.host_details.map(|h| reconcile(h, directory));
    visitor
}

pub fn reconcile_visitors(
    visitors: Vec<VisitorRecord>,
    directory: &[EmployeeRecord],
) -> Vec<VisitorRecord> {
    visitors
        .into_iter()
        .map(|v| reconcile_visitor(v, directory))
        .collect()
}

/// In-flight form data only knows the host by contact details when the
/// compose view did not carry a user id.
pub fn reconcile_form(mut form: VisitorFormData, directory: &[EmployeeRecord]) -> VisitorFormData {
    form.host_details = form.host_details.map(|h| {
        if h.user_id.is_some() {
            reconcile(h, directory)
        } else {
            reconcile_by_contact(h, directory)
        }
    });
    form
}

/// Loads the employee directory; failures degrade to an empty directory.
#[derive(Clone)]
pub struct DirectoryService {
    api: Arc<dyn VisitorApi>,
}

impl DirectoryService {
    pub fn new(api: Arc<dyn VisitorApi>) -> Self {
        Self { api }
    }

    pub async fn list(&self, token: &str) -> AppResult<Vec<EmployeeRecord>> {
        self.api.get_employees(token).await
    }

    /// Directory for reconciliation. Never fails: hosts stay unfilled instead.
    pub async fn load(&self, token: &str) -> Vec<EmployeeRecord> {
        match self.api.get_employees(token).await {
            Ok(employees) => {
                tracing::debug!("Loaded {} employees for host reconciliation", employees.len());
                employees
            }
            Err(e) => {
                tracing::warn!("Employee directory unavailable, hosts left as-is: {}", e);
                Vec::new()
            }
        }
    }
}
