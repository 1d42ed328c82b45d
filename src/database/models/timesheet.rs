use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::macros::string_enum;
use crate::error::AppError;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum TimesheetStatus {
        Draft => "draft",
        Submitted => "submitted",
        Approved => "approved",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    pub id: i64,
    pub booking_id: i64,
    pub employee_user_id: i64,
    pub hours_worked: BigDecimal,
    pub hourly_wage: Option<BigDecimal>,
    pub hourly_price: Option<BigDecimal>,
    pub wage_total: Option<BigDecimal>,
    pub price_total: Option<BigDecimal>,
    pub status: TimesheetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full row content for an insert-or-update keyed on (booking, employee).
#[derive(Debug, Clone, PartialEq)]
pub struct TimesheetUpsert {
    pub booking_id: i64,
    pub employee_user_id: i64,
    pub hours_worked: BigDecimal,
    pub hourly_wage: Option<BigDecimal>,
    pub hourly_price: Option<BigDecimal>,
    pub wage_total: Option<BigDecimal>,
    pub price_total: Option<BigDecimal>,
    pub status: TimesheetStatus,
}

impl From<&Timesheet> for TimesheetUpsert {
    fn from(timesheet: &Timesheet) -> Self {
        Self {
            booking_id: timesheet.booking_id,
            employee_user_id: timesheet.employee_user_id,
            hours_worked: timesheet.hours_worked.clone(),
            hourly_wage: timesheet.hourly_wage.clone(),
            hourly_price: timesheet.hourly_price.clone(),
            wage_total: timesheet.wage_total.clone(),
            price_total: timesheet.price_total.clone(),
            status: timesheet.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHoursInput {
    pub hours_worked: BigDecimal,
}

impl RecordHoursInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.hours_worked < BigDecimal::from(0) {
            return Err(AppError::BadRequest(
                "hours_worked must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
