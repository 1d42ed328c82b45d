use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::macros::string_enum;
use crate::error::AppError;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum AssignmentStatus {
        Assigned => "assigned",
        Cancelled => "cancelled",
        Completed => "completed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub booking_id: i64,
    pub employee_user_id: i64,
    pub status: AssignmentStatus,
    pub assigned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Pay rate snapshot taken when the assignment was made.
    pub worker_rate: Option<BigDecimal>,
    /// Bill rate snapshot taken when the assignment was made.
    pub customer_rate: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_assigned(&self) -> bool {
        self.status == AssignmentStatus::Assigned
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AddEmployeeOutcome {
    Assigned,
    Waitlisted,
    AlreadyAssigned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRatesInput {
    pub worker_rate: Option<BigDecimal>,
    pub customer_rate: Option<BigDecimal>,
}

impl AssignmentRatesInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let negative = [&self.worker_rate, &self.customer_rate]
            .into_iter()
            .flatten()
            .any(|rate| *rate < BigDecimal::from(0));
        if negative {
            return Err(AppError::BadRequest(
                "rates must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
