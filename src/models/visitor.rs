//! Visitor model and related types

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::de;
use super::image::{opt_ref, ImageReference};
use crate::error::{AppError, AppResult};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid phone regex"));

// ---------------------------------------------------------------------------
// VisitorStatus
// ---------------------------------------------------------------------------

/// Visit lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitorStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    CheckedIn,
    CheckedOut,
}

impl VisitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitorStatus::Pending => "PENDING",
            VisitorStatus::Approved => "APPROVED",
            VisitorStatus::Rejected => "REJECTED",
            VisitorStatus::CheckedIn => "CHECKED_IN",
            VisitorStatus::CheckedOut => "CHECKED_OUT",
        }
    }

    /// Forward-only lifecycle: PENDING -> APPROVED -> CHECKED_IN -> CHECKED_OUT,
    /// or PENDING -> REJECTED.
    pub fn can_transition_to(&self, next: VisitorStatus) -> bool {
        matches!(
            (self, next),
            (VisitorStatus::Pending, VisitorStatus::Approved)
                | (VisitorStatus::Pending, VisitorStatus::Rejected)
                | (VisitorStatus::Approved, VisitorStatus::CheckedIn)
                | (VisitorStatus::CheckedIn, VisitorStatus::CheckedOut)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitorStatus::Rejected | VisitorStatus::CheckedOut)
    }
}

impl std::fmt::Display for VisitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VisitorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(VisitorStatus::Pending),
            "APPROVED" => Ok(VisitorStatus::Approved),
            "REJECTED" => Ok(VisitorStatus::Rejected),
            "CHECKED_IN" => Ok(VisitorStatus::CheckedIn),
            "CHECKED_OUT" => Ok(VisitorStatus::CheckedOut),
            _ => Err(format!("Invalid visitor status: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Guests and assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum AssetType {
    #[default]
    #[serde(alias = "personal", alias = "PERSONAL")]
    Personal,
    #[serde(alias = "company", alias = "COMPANY")]
    Company,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub guest_name: String,
    #[serde(default, with = "opt_ref")]
    #[schema(value_type = Option<String>)]
    pub img_url: Option<ImageReference>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub asset_name: String,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub serial_number: String,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default, with = "opt_ref")]
    #[schema(value_type = Option<String>)]
    pub img_url: Option<ImageReference>,
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Host snapshot embedded in a visitor record. Fields may be incomplete until
/// reconciled against the employee directory.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostDetails {
    #[serde(default, deserialize_with = "de::opt_numeric_id")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub phone_number: String,
    #[serde(default, with = "opt_ref")]
    #[schema(value_type = Option<String>)]
    pub profile_image_url: Option<ImageReference>,
}

// ---------------------------------------------------------------------------
// Visitor records
// ---------------------------------------------------------------------------

/// A visitor as persisted by the external visitor API
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRecord {
    #[serde(alias = "_id", deserialize_with = "de::id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub full_name: String,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub phone: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub purpose: String,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Scheduled date: ISO datetime, `YYYY-MM-DD` or `DD/MM/YYYY`
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub date: String,
    /// Scheduled time, `HH:MM`
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub time: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: VisitorStatus,
    #[serde(default, alias = "image", with = "opt_ref")]
    #[schema(value_type = Option<String>)]
    pub img_url: Option<ImageReference>,
    #[serde(default)]
    pub guests: Vec<Guest>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    pub host_details: Option<HostDetails>,
    pub created_at: Option<DateTime<Utc>>,
}

impl VisitorRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.full_name, &self.phone, &self.date, &self.time)
    }
}

/// Host-entered visitor registration form
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorFormData {
    #[validate(length(min = 1, message = "Full name is required"))]
    #[serde(default)]
    pub full_name: String,
    #[validate(custom(function = "validate_phone"))]
    #[serde(default)]
    pub phone: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub gender: Option<String>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    #[validate(length(min = 1, message = "Purpose is required"))]
    #[serde(default)]
    pub purpose: String,
    pub company: Option<String>,
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// `HH:MM`
    #[serde(default)]
    pub time: String,
    #[serde(default, with = "opt_ref")]
    #[schema(value_type = Option<String>)]
    pub img_url: Option<ImageReference>,
    #[serde(default)]
    pub guests: Vec<Guest>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    pub host_details: Option<HostDetails>,
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Phone number must be 10 digits".into());
        Err(err)
    }
}

impl VisitorFormData {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.full_name, &self.phone, &self.date, &self.time)
    }

    /// Parsed scheduled date and time
    pub fn scheduled_at(&self) -> AppResult<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::Validation("Date must be in YYYY-MM-DD format".to_string()))?;
        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .map_err(|_| AppError::Validation("Time must be in HH:MM format".to_string()))?;
        Ok(date.and_time(time))
    }

    /// Field validation plus the rule that a visit cannot be scheduled in the past
    pub fn validate_at(&self, now: NaiveDateTime) -> AppResult<()> {
        self.validate()?;
        let scheduled = self.scheduled_at()?;
        if scheduled.date() < now.date() {
            return Err(AppError::Validation("Visit date cannot be in the past".to_string()));
        }
        if scheduled <= now {
            return Err(AppError::Validation(
                "Visit time must be later than the current time".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&VisitorRecord> for VisitorFormData {
    fn from(record: &VisitorRecord) -> Self {
        Self {
            full_name: record.full_name.clone(),
            phone: record.phone.clone(),
            email: record.email.clone(),
            gender: record.gender.clone(),
            id_type: record.id_type.clone(),
            id_number: record.id_number.clone(),
            purpose: record.purpose.clone(),
            company: record.company.clone(),
            location: record.location.clone(),
            date: record.date.clone(),
            time: record.time.clone(),
            img_url: record.img_url.clone(),
            guests: record.guests.clone(),
            assets: record.assets.clone(),
            host_details: record.host_details.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Composite identity of an in-flight visitor: name, phone, date and time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(full_name: &str, phone: &str, date: &str, time: &str) -> Self {
        let name = full_name
            .nfc()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let phone: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

        let mut hasher = Sha256::new();
        for part in [name.as_str(), phone.as_str(), date.trim(), time.trim()] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Upstream envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct VisitorsEnvelope {
    #[serde(default)]
    pub visitors: Vec<VisitorRecord>,
}

/// Identity of a visitor the upstream API just created
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreatedVisitor {
    #[serde(alias = "_id", deserialize_with = "de::id_string")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVisitorEnvelope {
    pub visitor: CreatedVisitor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn form() -> VisitorFormData {
        VisitorFormData {
            full_name: "Jane Roe".to_string(),
            phone: "9876543210".to_string(),
            purpose: "Meeting".to_string(),
            date: "2026-10-18".to_string(),
            time: "11:30".to_string(),
            ..Default::default()
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_status_transitions_are_forward_only() {
        use VisitorStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(CheckedIn));
        assert!(CheckedIn.can_transition_to(CheckedOut));
        assert!(!CheckedOut.can_transition_to(CheckedIn));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(CheckedOut));
    }

    #[test]
    fn test_status_serde() {
        let status: VisitorStatus = serde_json::from_str("\"CHECKED_IN\"").unwrap();
        assert_eq!(status, VisitorStatus::CheckedIn);
        assert_eq!("checked_out".parse::<VisitorStatus>(), Ok(VisitorStatus::CheckedOut));
    }

    #[test]
    fn test_form_validation() {
        assert!(form().validate_at(at(10, 0)).is_ok());

        let mut bad_phone = form();
        bad_phone.phone = "12345".to_string();
        assert!(matches!(bad_phone.validate_at(at(10, 0)), Err(AppError::Validation(_))));

        let mut no_name = form();
        no_name.full_name.clear();
        assert!(no_name.validate_at(at(10, 0)).is_err());

        assert!(form().validate_at(at(12, 0)).is_err());

        let mut bad_time = form();
        bad_time.time = "half past".to_string();
        assert!(bad_time.validate_at(at(10, 0)).is_err());
    }

    #[test]
    fn test_fingerprint_normalizes_name_and_phone() {
        let a = Fingerprint::of("Jane  Roe", "98765 43210", "2026-10-18", "11:30");
        let b = Fingerprint::of("jane roe", "9876543210", "2026-10-18", "11:30");
        let c = Fingerprint::of("Jane Roe", "9876543210", "2026-10-18", "11:45");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_record_deserializes_upstream_shape() {
        let json = r#"{
            "_id": 91,
            "fullName": "John Doe",
            "phone": "9123456780",
            "purpose": "Interview",
            "date": "2025-01-29T00:00:00.000Z",
            "time": "09:05",
            "status": "APPROVED",
            "image": "uploads/visitors/91.jpg",
            "checkInTime": null,
            "assets": [{"assetName": "Laptop", "serialNumber": "SN1", "assetType": "Company", "imgUrl": ""}],
            "hostDetails": {"userId": "7", "email": "host@example.com", "name": null, "phoneNumber": ""}
        }"#;
        let record: VisitorRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "91");
        assert_eq!(record.status, VisitorStatus::Approved);
        assert_eq!(
            record.img_url,
            Some(ImageReference::StoragePath("uploads/visitors/91.jpg".to_string()))
        );
        assert_eq!(record.assets[0].asset_type, AssetType::Company);
        assert_eq!(record.assets[0].img_url, None);
        let host = record.host_details.unwrap();
        assert_eq!(host.user_id, Some(7));
        assert!(host.name.is_empty());
    }
}
