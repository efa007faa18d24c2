//! Visitor history and status actions (approval, check-in, check-out)

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    models::{VisitorRecord, VisitorStatus},
    repository::VisitorApi,
};

use super::{
    directory::{self, DirectoryService},
    formatting::parse_schedule,
};

/// Number of past visits shown next to a returning visitor
pub const LAST_VISITS: usize = 2;

#[derive(Clone)]
pub struct VisitorsService {
    api: Arc<dyn VisitorApi>,
    directory: DirectoryService,
}

impl VisitorsService {
    pub fn new(api: Arc<dyn VisitorApi>, directory: DirectoryService) -> Self {
        Self { api, directory }
    }

    /// All visitors, most recent schedule first, hosts reconciled
    pub async fn history(&self, token: &str) -> AppResult<Vec<VisitorRecord>> {
        let visitors = self.api.get_visitors(token).await?;
        let employees = self.directory.load(token).await;
        let mut visitors = directory::reconcile_visitors(visitors, &employees);
        sort_recent_first(&mut visitors);
        Ok(visitors)
    }

    /// The most recent visits for a phone number
    pub async fn last_visits(
        &self,
        phone: &str,
        limit: usize,
        token: &str,
    ) -> AppResult<Vec<VisitorRecord>> {
        let wanted = digits(phone);
        if wanted.is_empty() {
            return Err(AppError::MissingData("Phone number is required".to_string()));
        }
        let mut visits: Vec<VisitorRecord> = self
            .api
            .get_visitors(token)
            .await?
            .into_iter()
            .filter(|v| digits(&v.phone) == wanted)
            .collect();
        sort_recent_first(&mut visits);
        visits.truncate(limit);

        let employees = self.directory.load(token).await;
        Ok(directory::reconcile_visitors(visits, &employees))
    }

    /// A single visitor, host reconciled
    pub async fn get(&self, id: &str, token: &str) -> AppResult<VisitorRecord> {
        let visitor = self.fetch(id, token).await?;
        let employees = self.directory.load(token).await;
        Ok(directory::reconcile_visitor(visitor, &employees))
    }

    async fn fetch(&self, id: &str, token: &str) -> AppResult<VisitorRecord> {
        self.api
            .get_visitors(token)
            .await?
            .into_iter()
            .find(|v| v.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Visitor {} not found", id)))
    }

    pub async fn approve(&self, id: &str, token: &str) -> AppResult<VisitorRecord> {
        self.transition(id, VisitorStatus::Approved, Utc::now(), token).await
    }

    pub async fn reject(&self, id: &str, token: &str) -> AppResult<VisitorRecord> {
        self.transition(id, VisitorStatus::Rejected, Utc::now(), token).await
    }

    pub async fn check_in(
        &self,
        id: &str,
        at: DateTime<Utc>,
        token: &str,
    ) -> AppResult<VisitorRecord> {
        self.transition(id, VisitorStatus::CheckedIn, at, token).await
    }

    pub async fn check_out(
        &self,
        id: &str,
        at: DateTime<Utc>,
        token: &str,
    ) -> AppResult<VisitorRecord> {
        self.transition(id, VisitorStatus::CheckedOut, at, token).await
    }

    async fn transition(
        &self,
        id: &str,
        next: VisitorStatus,
        at: DateTime<Utc>,
        token: &str,
    ) -> AppResult<VisitorRecord> {
        let mut visitor = self.fetch(id, token).await?;
        let patch = status_patch(&visitor, next, at)?;

        self.api.update_visitor(id, &patch, token).await.map_err(|e| {
            tracing::error!("Moving visitor {} to {} failed: {}", id, next, e);
            e
        })?;
        tracing::info!("Visitor {} moved {} -> {}", id, visitor.status, next);

        visitor.status = next;
        match next {
            VisitorStatus::CheckedIn => visitor.check_in_time = Some(at),
            VisitorStatus::CheckedOut => visitor.check_out_time = Some(at),
            _ => {}
        }
        Ok(visitor)
    }
}

/// Partial update for a status change, enforcing forward-only transitions
/// and check-out not preceding check-in
pub fn status_patch(
    visitor: &VisitorRecord,
    next: VisitorStatus,
    at: DateTime<Utc>,
) -> AppResult<serde_json::Value> {
    if !visitor.status.can_transition_to(next) {
        return Err(AppError::BusinessRule(format!(
            "Visitor {} cannot move from {} to {}",
            visitor.id, visitor.status, next
        )));
    }

    Ok(match next {
        VisitorStatus::CheckedIn => json!({ "status": next, "checkInTime": at }),
        VisitorStatus::CheckedOut => {
            let checked_in = visitor.check_in_time.ok_or_else(|| {
                AppError::BusinessRule(format!("Visitor {} has no check-in time", visitor.id))
            })?;
            if at < checked_in {
                return Err(AppError::BusinessRule(
                    "Check-out cannot precede check-in".to_string(),
                ));
            }
            json!({ "status": next, "checkOutTime": at })
        }
        _ => json!({ "status": next }),
    })
}

fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn sort_recent_first(visitors: &mut [VisitorRecord]) {
    // Unparseable schedules sort last
    visitors.sort_by_key(|v| Reverse(parse_schedule(&v.date, &v.time)));
}
