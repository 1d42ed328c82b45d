use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::booking::BookingStatus;
use super::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum RequestStatus {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub id: i64,
    pub booking_id: i64,
    pub employee_user_id: i64,
    pub status: RequestStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestResponse {
    Accepted,
    Declined,
}

impl From<RequestResponse> for RequestStatus {
    fn from(response: RequestResponse) -> Self {
        match response {
            RequestResponse::Accepted => RequestStatus::Accepted,
            RequestResponse::Declined => RequestStatus::Declined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEmployeesInput {
    #[serde(default)]
    pub employee_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondToRequestInput {
    pub response: RequestResponse,
}

/// A request as the invited employee sees it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequestView {
    pub id: i64,
    pub booking_id: i64,
    pub status: RequestStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub booking_title: String,
    pub booking_starts_at: DateTime<Utc>,
    pub booking_ends_at: DateTime<Utc>,
    pub booking_status: BookingStatus,
    pub company_name: String,
    pub waitlist_entry_id: Option<i64>,
    pub waitlist_position: Option<i32>,
}
