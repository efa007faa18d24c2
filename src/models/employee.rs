//! Employee directory entries

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use super::de;
use super::image::{opt_ref, ImageReference};

/// An employee as listed by the directory endpoint. Authoritative source for
/// host names, photos and phone numbers.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    #[serde(default, alias = "id", deserialize_with = "de::opt_numeric_id")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub name: String,
    #[serde(default, alias = "phone", deserialize_with = "de::null_as_empty")]
    pub phone_number: String,
    #[serde(default, with = "opt_ref")]
    #[schema(value_type = Option<String>)]
    pub profile_image_url: Option<ImageReference>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeesEnvelope {
    #[serde(default)]
    pub employees: Vec<EmployeeRecord>,
}
