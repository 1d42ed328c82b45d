use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::models::{
    Assignment, Booking, BookingInput, BookingRequest, BookingStatus, DocumentStatus,
    EmployeeRates, EmployeeSummary, FinanceDocument, FinanceDocumentLine, NewDocument,
    NewDocumentLine, RequestStatus, Timesheet, TimesheetUpsert, WaitlistEntry,
};
use crate::database::repositories::{
    assignment as assignment_repo, booking as booking_repo, employee as employee_repo,
    finance_document as document_repo, request as request_repo, timesheet as timesheet_repo,
    waitlist as waitlist_repo,
};
use crate::error::AppError;

/// Storage seen by the staffing and lifecycle services. One value spans one
/// unit of work; `lock_booking` must serialize concurrent writers on the
/// same booking until that unit ends.
#[allow(async_fn_in_trait)]
pub trait BookingStore {
    async fn lock_booking(&mut self, booking_id: i64) -> Result<Option<Booking>, AppError>;
    async fn update_booking(
        &mut self,
        booking_id: i64,
        input: &BookingInput,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError>;
    async fn delete_booking(&mut self, booking_id: i64) -> Result<bool, AppError>;
    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn approve_booking(
        &mut self,
        booking_id: i64,
        approved_by: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn revoke_booking_approval(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn set_billing_flags(
        &mut self,
        booking_id: i64,
        is_invoiced: bool,
        is_paid: bool,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn mark_executed_due(&mut self, now: DateTime<Utc>) -> Result<u64, AppError>;

    async fn count_assigned(&mut self, booking_id: i64) -> Result<i64, AppError>;
    async fn assignments_for_booking(&mut self, booking_id: i64)
    -> Result<Vec<Assignment>, AppError>;
    async fn find_assignment(&mut self, assignment_id: i64)
    -> Result<Option<Assignment>, AppError>;
    async fn find_assignment_for(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<Option<Assignment>, AppError>;
    async fn upsert_assigned(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        rates: &EmployeeRates,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AppError>;
    async fn cancel_assignment(
        &mut self,
        assignment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn update_assignment_rates(
        &mut self,
        assignment_id: i64,
        worker_rate: Option<&BigDecimal>,
        customer_rate: Option<&BigDecimal>,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AppError>;

    /// Active entries ordered by position, then id.
    async fn active_waitlist(&mut self, booking_id: i64) -> Result<Vec<WaitlistEntry>, AppError>;
    async fn find_waitlist_entry(&mut self, entry_id: i64)
    -> Result<Option<WaitlistEntry>, AppError>;
    async fn upsert_waitlist_entry(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        position: i32,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, AppError>;
    async fn mark_waitlist_left(&mut self, entry_id: i64, now: DateTime<Utc>)
    -> Result<(), AppError>;
    async fn set_waitlist_position(
        &mut self,
        entry_id: i64,
        position: i32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn find_request(&mut self, request_id: i64) -> Result<Option<BookingRequest>, AppError>;
    async fn upsert_pending_request(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<BookingRequest, AppError>;
    async fn set_request_status(
        &mut self,
        request_id: i64,
        status: RequestStatus,
        responded_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn find_timesheet(&mut self, timesheet_id: i64) -> Result<Option<Timesheet>, AppError>;
    async fn find_timesheet_for(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<Option<Timesheet>, AppError>;
    async fn timesheets_for_booking(&mut self, booking_id: i64)
    -> Result<Vec<Timesheet>, AppError>;
    async fn upsert_timesheet(
        &mut self,
        timesheet: &TimesheetUpsert,
        now: DateTime<Utc>,
    ) -> Result<Timesheet, AppError>;

    async fn default_rates(&mut self, employee_user_id: i64) -> Result<EmployeeRates, AppError>;
    async fn employee_summaries(
        &mut self,
        employee_user_ids: &[i64],
    ) -> Result<Vec<EmployeeSummary>, AppError>;
}

/// Additional storage needed to build and finalize finance documents.
#[allow(async_fn_in_trait)]
pub trait FinanceStore: BookingStore {
    /// Lock the bookings that exist among `booking_ids`, in id order.
    async fn lock_bookings(&mut self, booking_ids: &[i64]) -> Result<Vec<Booking>, AppError>;
    async fn insert_document(
        &mut self,
        document: &NewDocument,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError>;
    async fn insert_document_line(
        &mut self,
        document_id: i64,
        line: &NewDocumentLine,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocumentLine, AppError>;
    async fn sync_document_totals(
        &mut self,
        document_id: i64,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError>;
    async fn lock_document(&mut self, document_id: i64)
    -> Result<Option<FinanceDocument>, AppError>;
    async fn document_lines(
        &mut self,
        document_id: i64,
    ) -> Result<Vec<FinanceDocumentLine>, AppError>;
    async fn set_document_status(
        &mut self,
        document_id: i64,
        status: DocumentStatus,
        finalized_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError>;
}

/// Postgres-backed store over a connection that is inside a transaction.
pub struct PgStore<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

impl BookingStore for PgStore<'_> {
    async fn lock_booking(&mut self, booking_id: i64) -> Result<Option<Booking>, AppError> {
        Ok(booking_repo::lock_by_id(self.conn, booking_id).await?)
    }

    async fn update_booking(
        &mut self,
        booking_id: i64,
        input: &BookingInput,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        Ok(booking_repo::update_details(self.conn, booking_id, input, now).await?)
    }

    async fn delete_booking(&mut self, booking_id: i64) -> Result<bool, AppError> {
        Ok(booking_repo::delete(self.conn, booking_id).await?)
    }

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(booking_repo::update_status(self.conn, booking_id, status, now).await?)
    }

    async fn approve_booking(
        &mut self,
        booking_id: i64,
        approved_by: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(booking_repo::approve(self.conn, booking_id, approved_by, now).await?)
    }

    async fn revoke_booking_approval(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(booking_repo::revoke_approval(self.conn, booking_id, status, now).await?)
    }

    async fn set_billing_flags(
        &mut self,
        booking_id: i64,
        is_invoiced: bool,
        is_paid: bool,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(booking_repo::set_billing_flags(self.conn, booking_id, is_invoiced, is_paid, now).await?)
    }

    async fn mark_executed_due(&mut self, now: DateTime<Utc>) -> Result<u64, AppError> {
        Ok(booking_repo::mark_executed_due(self.conn, now).await?)
    }

    async fn count_assigned(&mut self, booking_id: i64) -> Result<i64, AppError> {
        Ok(assignment_repo::count_assigned(self.conn, booking_id).await?)
    }

    async fn assignments_for_booking(
        &mut self,
        booking_id: i64,
    ) -> Result<Vec<Assignment>, AppError> {
        Ok(assignment_repo::list_for_booking(self.conn, booking_id).await?)
    }

    async fn find_assignment(
        &mut self,
        assignment_id: i64,
    ) -> Result<Option<Assignment>, AppError> {
        Ok(assignment_repo::find_by_id(self.conn, assignment_id).await?)
    }

    async fn find_assignment_for(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<Option<Assignment>, AppError> {
        Ok(assignment_repo::find_for_employee(self.conn, booking_id, employee_user_id).await?)
    }

    async fn upsert_assigned(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        rates: &EmployeeRates,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AppError> {
        Ok(
            assignment_repo::upsert_assigned(self.conn, booking_id, employee_user_id, rates, now)
                .await?,
        )
    }

    async fn cancel_assignment(
        &mut self,
        assignment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(assignment_repo::cancel(self.conn, assignment_id, now).await?)
    }

    async fn update_assignment_rates(
        &mut self,
        assignment_id: i64,
        worker_rate: Option<&BigDecimal>,
        customer_rate: Option<&BigDecimal>,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AppError> {
        Ok(
            assignment_repo::update_rates(self.conn, assignment_id, worker_rate, customer_rate, now)
                .await?,
        )
    }

    async fn active_waitlist(&mut self, booking_id: i64) -> Result<Vec<WaitlistEntry>, AppError> {
        Ok(waitlist_repo::list_active(self.conn, booking_id).await?)
    }

    async fn find_waitlist_entry(
        &mut self,
        entry_id: i64,
    ) -> Result<Option<WaitlistEntry>, AppError> {
        Ok(waitlist_repo::find_by_id(self.conn, entry_id).await?)
    }

    async fn upsert_waitlist_entry(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        position: i32,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, AppError> {
        Ok(
            waitlist_repo::upsert_active(self.conn, booking_id, employee_user_id, position, now)
                .await?,
        )
    }

    async fn mark_waitlist_left(
        &mut self,
        entry_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(waitlist_repo::mark_left(self.conn, entry_id, now).await?)
    }

    async fn set_waitlist_position(
        &mut self,
        entry_id: i64,
        position: i32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(waitlist_repo::update_position(self.conn, entry_id, position, now).await?)
    }

    async fn find_request(&mut self, request_id: i64) -> Result<Option<BookingRequest>, AppError> {
        Ok(request_repo::find_by_id(self.conn, request_id).await?)
    }

    async fn upsert_pending_request(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<BookingRequest, AppError> {
        Ok(request_repo::upsert_pending(self.conn, booking_id, employee_user_id, now).await?)
    }

    async fn set_request_status(
        &mut self,
        request_id: i64,
        status: RequestStatus,
        responded_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Ok(request_repo::update_status(self.conn, request_id, status, responded_at, now).await?)
    }

    async fn find_timesheet(&mut self, timesheet_id: i64) -> Result<Option<Timesheet>, AppError> {
        Ok(timesheet_repo::find_by_id(self.conn, timesheet_id).await?)
    }

    async fn find_timesheet_for(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<Option<Timesheet>, AppError> {
        Ok(timesheet_repo::find_for_employee(self.conn, booking_id, employee_user_id).await?)
    }

    async fn timesheets_for_booking(
        &mut self,
        booking_id: i64,
    ) -> Result<Vec<Timesheet>, AppError> {
        Ok(timesheet_repo::list_for_booking(self.conn, booking_id).await?)
    }

    async fn upsert_timesheet(
        &mut self,
        timesheet: &TimesheetUpsert,
        now: DateTime<Utc>,
    ) -> Result<Timesheet, AppError> {
        Ok(timesheet_repo::upsert(self.conn, timesheet, now).await?)
    }

    async fn default_rates(&mut self, employee_user_id: i64) -> Result<EmployeeRates, AppError> {
        Ok(employee_repo::default_rates(self.conn, employee_user_id).await?)
    }

    async fn employee_summaries(
        &mut self,
        employee_user_ids: &[i64],
    ) -> Result<Vec<EmployeeSummary>, AppError> {
        Ok(employee_repo::summaries(self.conn, employee_user_ids).await?)
    }
}

impl FinanceStore for PgStore<'_> {
    async fn lock_bookings(&mut self, booking_ids: &[i64]) -> Result<Vec<Booking>, AppError> {
        Ok(booking_repo::lock_many(self.conn, booking_ids).await?)
    }

    async fn insert_document(
        &mut self,
        document: &NewDocument,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError> {
        Ok(document_repo::insert(self.conn, document, now).await?)
    }

    async fn insert_document_line(
        &mut self,
        document_id: i64,
        line: &NewDocumentLine,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocumentLine, AppError> {
        Ok(document_repo::insert_line(self.conn, document_id, line, now).await?)
    }

    async fn sync_document_totals(
        &mut self,
        document_id: i64,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError> {
        Ok(document_repo::sync_totals(self.conn, document_id, now).await?)
    }

    async fn lock_document(
        &mut self,
        document_id: i64,
    ) -> Result<Option<FinanceDocument>, AppError> {
        Ok(document_repo::lock_by_id(self.conn, document_id).await?)
    }

    async fn document_lines(
        &mut self,
        document_id: i64,
    ) -> Result<Vec<FinanceDocumentLine>, AppError> {
        Ok(document_repo::lines(self.conn, document_id).await?)
    }

    async fn set_document_status(
        &mut self,
        document_id: i64,
        status: DocumentStatus,
        finalized_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError> {
        Ok(document_repo::update_status(self.conn, document_id, status, finalized_by, now).await?)
    }
}
