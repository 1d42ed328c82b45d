use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assignment::Assignment;
use super::macros::string_enum;
use super::money::planned_hours;
use super::request::BookingRequest;
use super::timesheet::{Timesheet, TimesheetStatus};
use super::waitlist::WaitlistEntry;
use crate::error::AppError;

pub const MAX_REQUIRED_WORKERS: i32 = 1000;
pub const MAX_TITLE_LENGTH: usize = 255;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum BookingStatus {
        Open => "open",
        Filled => "filled",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl BookingStatus {
    /// Manually set or terminal statuses are never recomputed from staffing.
    pub fn is_sticky(&self) -> bool {
        matches!(
            self,
            BookingStatus::InProgress | BookingStatus::Completed | BookingStatus::Cancelled
        )
    }

    pub fn from_staffing(assigned_count: i64, required_workers: i32) -> Self {
        if assigned_count >= i64::from(required_workers) {
            BookingStatus::Filled
        } else {
            BookingStatus::Open
        }
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
    #[serde(rename_all = "snake_case")]
    pub enum AssignmentMode {
        #[default]
        SpecificEmployees => "specific_employees",
        FirstComeFirstServed => "first_come_first_served",
    }
}

/// Summary of where a booking sits between approval and payment. Never stored.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Open,
    Approved,
    Executed,
    Invoiced,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub company_id: i64,
    pub company_address_id: Option<i64>,
    pub created_by: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub required_workers: i32,
    pub assignment_mode: AssignmentMode,
    pub show_employee_names_to_company: bool,
    pub status: BookingStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<i64>,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<i64>,
    pub is_invoiced: bool,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn workflow_status(&self) -> WorkflowStatus {
        if self.is_paid {
            WorkflowStatus::Paid
        } else if self.is_invoiced {
            WorkflowStatus::Invoiced
        } else if self.executed_at.is_some() {
            WorkflowStatus::Executed
        } else if self.approved_at.is_some() {
            WorkflowStatus::Approved
        } else {
            WorkflowStatus::Open
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }

    pub fn is_executed(&self) -> bool {
        self.executed_at.is_some()
    }

    /// Execution is the lock point for edits, deletes and staffing changes.
    pub fn can_be_edited(&self) -> bool {
        !self.is_executed()
    }

    pub fn can_be_approved(&self) -> bool {
        !self.is_approved() && !self.is_executed()
    }

    pub fn can_approval_be_revoked(&self) -> bool {
        self.is_approved() && !self.is_executed()
    }

    pub fn can_be_invoiced(&self) -> bool {
        self.is_executed() && !self.is_invoiced
    }

    pub fn can_invoice_be_removed(&self) -> bool {
        self.is_invoiced && !self.is_paid
    }

    pub fn can_be_paid(&self) -> bool {
        self.is_executed() && self.is_invoiced && !self.is_paid
    }

    pub fn can_payment_be_removed(&self) -> bool {
        self.is_paid
    }

    /// The payment gate: `can_be_paid` plus every timesheet row approved.
    /// A booking without timesheet rows is not blocked.
    pub fn passes_payment_gate<'a>(
        &self,
        timesheet_statuses: impl IntoIterator<Item = &'a TimesheetStatus>,
    ) -> bool {
        self.can_be_paid()
            && timesheet_statuses
                .into_iter()
                .all(|status| *status == TimesheetStatus::Approved)
    }

    pub fn is_due_for_execution(&self, now: DateTime<Utc>) -> bool {
        self.is_approved() && !self.is_executed() && self.ends_at < now
    }

    pub fn planned_hours(&self) -> BigDecimal {
        planned_hours(self.starts_at, self.ends_at)
    }
}

/// A booking with everything staffed against it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub workflow_status: WorkflowStatus,
    pub assignments: Vec<Assignment>,
    pub waitlist: Vec<WaitlistEntry>,
    pub requests: Vec<BookingRequest>,
    pub timesheets: Vec<Timesheet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    pub company_id: i64,
    pub company_address_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub required_workers: i32,
    #[serde(default)]
    pub assignment_mode: AssignmentMode,
    #[serde(default)]
    pub show_employee_names_to_company: bool,
}

impl BookingInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("title is required".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(AppError::BadRequest(format!(
                "title must be at most {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if self.starts_at >= self.ends_at {
            return Err(AppError::BadRequest(
                "starts_at must be before ends_at".to_string(),
            ));
        }
        if !(1..=MAX_REQUIRED_WORKERS).contains(&self.required_workers) {
            return Err(AppError::BadRequest(format!(
                "required_workers must be between 1 and {}",
                MAX_REQUIRED_WORKERS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::booking_fixture;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn workflow_status_takes_the_furthest_flag() {
        let mut booking = booking_fixture(1, 2);
        assert_eq!(booking.workflow_status(), WorkflowStatus::Open);

        booking.approved_at = Some(booking.starts_at);
        assert_eq!(booking.workflow_status(), WorkflowStatus::Approved);

        booking.executed_at = Some(booking.ends_at);
        assert_eq!(booking.workflow_status(), WorkflowStatus::Executed);

        booking.is_invoiced = true;
        assert_eq!(booking.workflow_status(), WorkflowStatus::Invoiced);

        booking.is_paid = true;
        assert_eq!(booking.workflow_status(), WorkflowStatus::Paid);
    }

    #[test]
    fn gates_follow_the_lifecycle() {
        let mut booking = booking_fixture(1, 1);
        assert!(booking.can_be_edited());
        assert!(booking.can_be_approved());
        assert!(!booking.can_approval_be_revoked());
        assert!(!booking.can_be_invoiced());

        booking.approved_at = Some(booking.starts_at);
        assert!(!booking.can_be_approved());
        assert!(booking.can_approval_be_revoked());

        booking.executed_at = Some(booking.ends_at);
        assert!(!booking.can_be_edited());
        assert!(!booking.can_approval_be_revoked());
        assert!(booking.can_be_invoiced());
        assert!(!booking.can_be_paid());

        booking.is_invoiced = true;
        assert!(booking.can_invoice_be_removed());
        assert!(booking.can_be_paid());

        booking.is_paid = true;
        assert!(!booking.can_invoice_be_removed());
        assert!(booking.can_payment_be_removed());
    }

    #[test]
    fn a_single_unapproved_timesheet_blocks_payment() {
        let mut booking = booking_fixture(1, 2);
        booking.approved_at = Some(booking.starts_at);
        booking.executed_at = Some(booking.ends_at);
        booking.is_invoiced = true;

        let blocked = [TimesheetStatus::Approved, TimesheetStatus::Submitted];
        let clear = [TimesheetStatus::Approved, TimesheetStatus::Approved];

        assert!(!booking.passes_payment_gate(&blocked));
        assert!(booking.passes_payment_gate(&clear));
        assert!(booking.passes_payment_gate(&[]));
    }

    #[test]
    fn status_from_staffing_counts_against_capacity() {
        assert_eq!(BookingStatus::from_staffing(1, 2), BookingStatus::Open);
        assert_eq!(BookingStatus::from_staffing(2, 2), BookingStatus::Filled);
        assert!(BookingStatus::Completed.is_sticky());
        assert!(!BookingStatus::Filled.is_sticky());
    }

    #[test]
    fn input_validation_rejects_bad_windows_and_capacity() {
        let booking = booking_fixture(1, 1);
        let valid = BookingInput {
            company_id: booking.company_id,
            company_address_id: None,
            title: "Warehouse".to_string(),
            description: None,
            starts_at: booking.starts_at,
            ends_at: booking.ends_at,
            required_workers: 3,
            assignment_mode: AssignmentMode::SpecificEmployees,
            show_employee_names_to_company: false,
        };
        assert!(valid.validate().is_ok());

        let reversed = BookingInput {
            ends_at: valid.starts_at - Duration::hours(1),
            ..valid.clone()
        };
        assert!(matches!(reversed.validate(), Err(AppError::BadRequest(_))));

        let too_many = BookingInput {
            required_workers: MAX_REQUIRED_WORKERS + 1,
            ..valid.clone()
        };
        assert!(matches!(too_many.validate(), Err(AppError::BadRequest(_))));

        let untitled = BookingInput {
            title: "   ".to_string(),
            ..valid
        };
        assert!(matches!(untitled.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn string_enums_round_trip_through_their_column_values() {
        assert_eq!(BookingStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "first_come_first_served".parse::<AssignmentMode>(),
            Ok(AssignmentMode::FirstComeFirstServed)
        );
        assert!("bogus".parse::<BookingStatus>().is_err());
    }
}
