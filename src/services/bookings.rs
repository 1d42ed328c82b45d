use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use crate::database::models::{
    AddEmployeeOutcome, Assignment, AssignmentRatesInput, Booking, BookingDetail, BookingInput,
    BookingRequest, EmployeeRequestView, RequestResponse,
};
use crate::database::repositories::{
    assignment as assignment_repo, booking as booking_repo, company as company_repo,
    request as request_repo, timesheet as timesheet_repo, waitlist as waitlist_repo,
};
use crate::database::transaction::{self, Tx};
use crate::error::AppError;
use crate::services::directory::{
    Directory, PgDirectory, ensure_active_employee, resolve_request_targets,
};
use crate::services::lifecycle::BookingLifecycle;
use crate::services::notifications::{Notification, NotificationDispatcher};
use crate::services::staffing::StaffingEngine;
use crate::services::store::PgStore;

type Outcome<T> = Result<(T, Vec<Notification>), AppError>;

/// Transactional entry points for booking records, approval and staffing.
/// Each call is one transaction; notifications go out after commit.
#[derive(Clone)]
pub struct BookingService {
    pool: PgPool,
    notifier: NotificationDispatcher,
}

impl BookingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifier: NotificationDispatcher::new(pool.clone()),
            pool,
        }
    }

    async fn commit<T>(&self, tx: Tx, result: Outcome<T>) -> Result<T, AppError> {
        let (value, notifications) = transaction::finish(tx, result).await?;
        self.notifier.dispatch(notifications).await;
        Ok(value)
    }

    pub async fn create(&self, input: &BookingInput, created_by: i64) -> Result<Booking, AppError> {
        input.validate()?;

        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            check_company_references(&mut tx, input).await?;
            Ok::<_, AppError>(booking_repo::create(&mut tx, input, Some(created_by), Utc::now()).await?)
        }
        .await;
        let booking = transaction::finish(tx, result).await?;

        log::info!("Booking {} created by user {}", booking.id, created_by);
        Ok(booking)
    }

    pub async fn get(&self, booking_id: i64) -> Result<BookingDetail, AppError> {
        let mut conn = self.pool.acquire().await?;
        let booking = booking_repo::find_by_id(&mut conn, booking_id)
            .await?
            .ok_or_else(|| AppError::booking_not_found(booking_id))?;

        Ok(BookingDetail {
            workflow_status: booking.workflow_status(),
            assignments: assignment_repo::list_for_booking(&mut conn, booking_id).await?,
            waitlist: waitlist_repo::list_active(&mut conn, booking_id).await?,
            requests: request_repo::list_for_booking(&mut conn, booking_id).await?,
            timesheets: timesheet_repo::list_for_booking(&mut conn, booking_id).await?,
            booking,
        })
    }

    pub async fn update(&self, booking_id: i64, input: &BookingInput) -> Result<Booking, AppError> {
        input.validate()?;

        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            check_company_references(&mut tx, input).await?;
            let mut lifecycle = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now());
            lifecycle.update(booking_id, input).await
        }
        .await;
        transaction::finish(tx, result).await
    }

    pub async fn delete(&self, booking_id: i64) -> Result<(), AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .delete(booking_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn approve(&self, booking_id: i64, approved_by: i64) -> Result<Booking, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            let company_id = find_booking(&mut tx, booking_id).await?.company_id;
            let contacts = PgDirectory::new(&mut tx)
                .company_contact_ids(company_id)
                .await?;

            let mut lifecycle = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now());
            let booking = lifecycle.approve(booking_id, approved_by, &contacts).await?;
            Ok::<_, AppError>((booking, lifecycle.into_notifications()))
        }
        .await;
        self.commit(tx, result).await
    }

    pub async fn revoke_approval(&self, booking_id: i64) -> Result<Booking, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .revoke_approval(booking_id)
            .await;
        transaction::finish(tx, result).await
    }

    /// Run the auto-execution sweep on its own.
    pub async fn sync_executed(&self) -> Result<u64, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .sweep()
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn add_employee(
        &self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<AddEmployeeOutcome, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            ensure_active_employee(&mut PgDirectory::new(&mut tx), employee_user_id).await?;

            let mut engine = StaffingEngine::new(PgStore::new(&mut tx), Utc::now());
            let outcome = engine.add_employee(booking_id, employee_user_id).await?;
            Ok::<_, AppError>((outcome, engine.into_notifications()))
        }
        .await;
        self.commit(tx, result).await
    }

    pub async fn request_employees(
        &self,
        booking_id: i64,
        employee_user_ids: &[i64],
    ) -> Result<Vec<BookingRequest>, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            let mode = find_booking(&mut tx, booking_id).await?.assignment_mode;
            let targets =
                resolve_request_targets(&mut PgDirectory::new(&mut tx), mode, employee_user_ids)
                    .await?;

            let mut engine = StaffingEngine::new(PgStore::new(&mut tx), Utc::now());
            let requests = engine.request_employees(booking_id, &targets).await?;
            Ok::<_, AppError>((requests, engine.into_notifications()))
        }
        .await;
        self.commit(tx, result).await
    }

    pub async fn cancel_assignment(
        &self,
        booking_id: i64,
        assignment_id: i64,
    ) -> Result<bool, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            let mut engine = StaffingEngine::new(PgStore::new(&mut tx), Utc::now());
            let cancelled = engine
                .cancel_assignment(assignment_id, Some(booking_id))
                .await?;
            Ok::<_, AppError>((cancelled, engine.into_notifications()))
        }
        .await;
        self.commit(tx, result).await
    }

    pub async fn update_assignment_rates(
        &self,
        booking_id: i64,
        assignment_id: i64,
        input: &AssignmentRatesInput,
    ) -> Result<Assignment, AppError> {
        input.validate()?;

        let mut tx = transaction::begin(&self.pool).await?;
        let result = StaffingEngine::new(PgStore::new(&mut tx), Utc::now())
            .update_assignment_rates(
                assignment_id,
                Some(booking_id),
                input.worker_rate.as_ref(),
                input.customer_rate.as_ref(),
            )
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn promote_waitlist_entry(
        &self,
        booking_id: i64,
        entry_id: i64,
    ) -> Result<bool, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            let mut engine = StaffingEngine::new(PgStore::new(&mut tx), Utc::now());
            let promoted = engine
                .promote_waitlist_entry(entry_id, Some(booking_id))
                .await?;
            Ok::<_, AppError>((promoted, engine.into_notifications()))
        }
        .await;
        self.commit(tx, result).await
    }

    pub async fn remove_waitlist_entry(
        &self,
        booking_id: i64,
        entry_id: i64,
    ) -> Result<bool, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = StaffingEngine::new(PgStore::new(&mut tx), Utc::now())
            .remove_waitlist_entry(entry_id, booking_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn employee_requests(
        &self,
        employee_user_id: i64,
    ) -> Result<Vec<EmployeeRequestView>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Ok(request_repo::list_for_employee(&mut conn, employee_user_id).await?)
    }

    pub async fn respond_to_request(
        &self,
        request_id: i64,
        employee_user_id: i64,
        response: RequestResponse,
    ) -> Result<bool, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            let mut engine = StaffingEngine::new(PgStore::new(&mut tx), Utc::now());
            let applied = engine
                .respond_to_request(request_id, response, Some(employee_user_id))
                .await?;
            Ok::<_, AppError>((applied, engine.into_notifications()))
        }
        .await;
        self.commit(tx, result).await
    }

    pub async fn leave_waitlist(
        &self,
        entry_id: i64,
        employee_user_id: i64,
    ) -> Result<bool, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = StaffingEngine::new(PgStore::new(&mut tx), Utc::now())
            .leave_waitlist(entry_id, employee_user_id)
            .await;
        transaction::finish(tx, result).await
    }
}

async fn find_booking(conn: &mut PgConnection, booking_id: i64) -> Result<Booking, AppError> {
    booking_repo::find_by_id(conn, booking_id)
        .await?
        .ok_or_else(|| AppError::booking_not_found(booking_id))
}

async fn check_company_references(
    conn: &mut PgConnection,
    input: &BookingInput,
) -> Result<(), AppError> {
    if !company_repo::exists(conn, input.company_id).await? {
        return Err(AppError::BadRequest(format!(
            "company {} does not exist",
            input.company_id
        )));
    }
    if let Some(address_id) = input.company_address_id {
        if !company_repo::address_belongs_to(conn, address_id, input.company_id).await? {
            return Err(AppError::BadRequest(format!(
                "address {} does not belong to company {}",
                address_id, input.company_id
            )));
        }
    }
    Ok(())
}
