use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::database::models::{
    Assignment, Booking, Timesheet, TimesheetStatus, TimesheetUpsert,
    money::{line_total, round2},
};
use crate::error::AppError;
use crate::services::store::BookingStore;

/// Timesheet content after (re)syncing with an assignment. Recorded hours and
/// status survive; rate snapshots and totals follow the assignment.
pub fn synced_timesheet(
    existing: Option<&Timesheet>,
    booking: &Booking,
    assignment: &Assignment,
) -> TimesheetUpsert {
    let (hours_worked, status) = match existing {
        Some(timesheet) => (timesheet.hours_worked.clone(), timesheet.status),
        None => (booking.planned_hours(), TimesheetStatus::Draft),
    };

    TimesheetUpsert {
        booking_id: booking.id,
        employee_user_id: assignment.employee_user_id,
        wage_total: line_total(&hours_worked, assignment.worker_rate.as_ref()),
        price_total: line_total(&hours_worked, assignment.customer_rate.as_ref()),
        hourly_wage: assignment.worker_rate.clone(),
        hourly_price: assignment.customer_rate.clone(),
        hours_worked,
        status,
    }
}

pub(crate) async fn sync_for_assignment<S: BookingStore>(
    store: &mut S,
    booking: &Booking,
    assignment: &Assignment,
    now: DateTime<Utc>,
) -> Result<Timesheet, AppError> {
    let existing = store
        .find_timesheet_for(booking.id, assignment.employee_user_id)
        .await?;
    let synced = synced_timesheet(existing.as_ref(), booking, assignment);
    store.upsert_timesheet(&synced, now).await
}

/// Approval and correction of recorded hours.
pub struct TimesheetWorkflow<S> {
    store: S,
    now: DateTime<Utc>,
}

impl<S: BookingStore> TimesheetWorkflow<S> {
    pub fn new(store: S, now: DateTime<Utc>) -> Self {
        Self { store, now }
    }

    async fn timesheet(&mut self, timesheet_id: i64) -> Result<Timesheet, AppError> {
        self.store
            .find_timesheet(timesheet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Timesheet {} not found", timesheet_id)))
    }

    /// Lock the owning booking, then re-read the timesheet under that lock.
    async fn locked(&mut self, timesheet_id: i64) -> Result<(Booking, Timesheet), AppError> {
        let booking_id = self.timesheet(timesheet_id).await?.booking_id;
        let booking = self
            .store
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::booking_not_found(booking_id))?;
        let timesheet = self.timesheet(timesheet_id).await?;
        Ok((booking, timesheet))
    }

    /// Approving an approved timesheet changes nothing.
    pub async fn approve(&mut self, timesheet_id: i64) -> Result<Timesheet, AppError> {
        let (_, timesheet) = self.locked(timesheet_id).await?;
        if timesheet.status == TimesheetStatus::Approved {
            log::debug!("Timesheet {} already approved", timesheet_id);
            return Ok(timesheet);
        }

        let approved = TimesheetUpsert {
            status: TimesheetStatus::Approved,
            ..TimesheetUpsert::from(&timesheet)
        };
        let timesheet = self.store.upsert_timesheet(&approved, self.now).await?;
        log::info!("Timesheet {} approved", timesheet_id);
        Ok(timesheet)
    }

    pub async fn reopen(&mut self, timesheet_id: i64) -> Result<Timesheet, AppError> {
        let (_, timesheet) = self.locked(timesheet_id).await?;
        if timesheet.status != TimesheetStatus::Approved {
            return Err(AppError::Conflict(
                "only approved timesheets can be reopened".to_string(),
            ));
        }

        let reopened = TimesheetUpsert {
            status: TimesheetStatus::Submitted,
            ..TimesheetUpsert::from(&timesheet)
        };
        let timesheet = self.store.upsert_timesheet(&reopened, self.now).await?;
        log::info!("Timesheet {} reopened", timesheet_id);
        Ok(timesheet)
    }

    /// Record actual hours and recompute totals from the rate snapshots.
    pub async fn record_hours(
        &mut self,
        timesheet_id: i64,
        hours_worked: &BigDecimal,
    ) -> Result<Timesheet, AppError> {
        if *hours_worked < BigDecimal::from(0) {
            return Err(AppError::BadRequest(
                "hours_worked must not be negative".to_string(),
            ));
        }

        let (booking, timesheet) = self.locked(timesheet_id).await?;
        if booking.is_paid {
            return Err(AppError::Conflict(
                "hours cannot change on a paid booking".to_string(),
            ));
        }
        if timesheet.status == TimesheetStatus::Approved {
            return Err(AppError::Conflict(
                "approved timesheets must be reopened before editing".to_string(),
            ));
        }

        let hours_worked = round2(hours_worked);
        let recorded = TimesheetUpsert {
            wage_total: line_total(&hours_worked, timesheet.hourly_wage.as_ref()),
            price_total: line_total(&hours_worked, timesheet.hourly_price.as_ref()),
            hours_worked,
            status: TimesheetStatus::Submitted,
            ..TimesheetUpsert::from(&timesheet)
        };
        let timesheet = self.store.upsert_timesheet(&recorded, self.now).await?;
        log::info!(
            "Recorded {} hours on timesheet {}",
            timesheet.hours_worked,
            timesheet_id
        );
        Ok(timesheet)
    }
}
