use std::collections::HashMap;

use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use crate::database::models::{
    Booking, BulkOutcome, DocumentWithLines, DraftOutcome, FinanceDocument, FinanceFilter,
    FinanceOverviewRow, RecordHoursInput, Timesheet, TimesheetStatus,
};
use crate::database::repositories::{
    assignment as assignment_repo, booking as booking_repo, company as company_repo,
    employee as employee_repo, finance_document as document_repo, timesheet as timesheet_repo,
};
use crate::database::transaction;
use crate::error::AppError;
use crate::services::export;
use crate::services::finance::{FinanceLedger, overview_row, rollup_booking};
use crate::services::lifecycle::{BookingLifecycle, dedup_ids};
use crate::services::store::PgStore;
use crate::services::timesheets::TimesheetWorkflow;

/// Which preview export to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Invoice,
    Payroll,
}

/// Finance overview, billing marks, timesheet approval, documents and
/// exports. Reads sweep due bookings into the executed state first.
#[derive(Clone)]
pub struct FinanceService {
    pool: PgPool,
}

impl FinanceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn overview(&self, filter: &FinanceFilter) -> Result<Vec<FinanceOverviewRow>, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
                .sweep()
                .await?;
            let bookings = booking_repo::list_executed(&mut tx, filter).await?;
            overview_rows(&mut tx, bookings).await
        }
        .await;
        transaction::finish(tx, result).await
    }

    /// Overview rows for the given bookings only, in id order. Bookings that
    /// are not executed are left out.
    async fn selected_rows(&self, booking_ids: &[i64]) -> Result<Vec<FinanceOverviewRow>, AppError> {
        let ids = dedup_ids(booking_ids);
        let mut tx = transaction::begin(&self.pool).await?;
        let result = async {
            BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
                .sweep()
                .await?;
            let bookings: Vec<Booking> = booking_repo::find_many(&mut tx, &ids)
                .await?
                .into_iter()
                .filter(|booking| booking.executed_at.is_some())
                .collect();
            overview_rows(&mut tx, bookings).await
        }
        .await;
        transaction::finish(tx, result).await
    }

    pub async fn mark_invoiced(&self, booking_id: i64) -> Result<Booking, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .mark_invoiced(booking_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn unmark_invoiced(&self, booking_id: i64) -> Result<Booking, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .unmark_invoiced(booking_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn mark_paid(&self, booking_id: i64) -> Result<Booking, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .mark_paid(booking_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn unmark_paid(&self, booking_id: i64) -> Result<Booking, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .unmark_paid(booking_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn bulk_mark_invoiced(&self, booking_ids: &[i64]) -> Result<BulkOutcome, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .bulk_mark_invoiced(booking_ids)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn bulk_mark_paid(&self, booking_ids: &[i64]) -> Result<BulkOutcome, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = BookingLifecycle::new(PgStore::new(&mut tx), Utc::now())
            .bulk_mark_paid(booking_ids)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn approve_timesheet(&self, timesheet_id: i64) -> Result<Timesheet, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = TimesheetWorkflow::new(PgStore::new(&mut tx), Utc::now())
            .approve(timesheet_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn reopen_timesheet(&self, timesheet_id: i64) -> Result<Timesheet, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = TimesheetWorkflow::new(PgStore::new(&mut tx), Utc::now())
            .reopen(timesheet_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn record_hours(
        &self,
        timesheet_id: i64,
        input: &RecordHoursInput,
    ) -> Result<Timesheet, AppError> {
        input.validate()?;

        let mut tx = transaction::begin(&self.pool).await?;
        let result = TimesheetWorkflow::new(PgStore::new(&mut tx), Utc::now())
            .record_hours(timesheet_id, &input.hours_worked)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn list_documents(&self) -> Result<Vec<FinanceDocument>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Ok(document_repo::list_recent(&mut conn).await?)
    }

    pub async fn get_document(&self, document_id: i64) -> Result<DocumentWithLines, AppError> {
        let mut conn = self.pool.acquire().await?;
        let document = document_repo::find_by_id(&mut conn, document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;
        let lines = document_repo::lines(&mut conn, document_id).await?;
        Ok(DocumentWithLines { document, lines })
    }

    pub async fn create_invoice_draft(
        &self,
        booking_ids: &[i64],
        created_by: i64,
    ) -> Result<DraftOutcome, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = FinanceLedger::new(PgStore::new(&mut tx), Utc::now())
            .create_invoice_draft(booking_ids, created_by)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn create_payroll_draft(
        &self,
        booking_ids: &[i64],
        created_by: i64,
    ) -> Result<DraftOutcome, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = FinanceLedger::new(PgStore::new(&mut tx), Utc::now())
            .create_payroll_draft(booking_ids, created_by)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn finalize_document(
        &self,
        document_id: i64,
        finalized_by: i64,
    ) -> Result<DocumentWithLines, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = FinanceLedger::new(PgStore::new(&mut tx), Utc::now())
            .finalize(document_id, finalized_by)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn cancel_document(&self, document_id: i64) -> Result<FinanceDocument, AppError> {
        let mut tx = transaction::begin(&self.pool).await?;
        let result = FinanceLedger::new(PgStore::new(&mut tx), Utc::now())
            .cancel(document_id)
            .await;
        transaction::finish(tx, result).await
    }

    pub async fn export_bookings(&self, filter: &FinanceFilter) -> Result<Vec<u8>, AppError> {
        let rows = self.overview(filter).await?;
        export::finance_bookings_csv(&rows)
    }

    pub async fn export_lines(&self, filter: &FinanceFilter) -> Result<Vec<u8>, AppError> {
        let rows = self.overview(filter).await?;
        export::finance_lines_csv(&rows)
    }

    /// Preview of what a draft would contain. Without ids the current
    /// overview is used.
    pub async fn export_preview(
        &self,
        kind: PreviewKind,
        booking_ids: &[i64],
    ) -> Result<Vec<u8>, AppError> {
        let rows = if booking_ids.is_empty() {
            self.overview(&FinanceFilter::default()).await?
        } else {
            self.selected_rows(booking_ids).await?
        };
        match kind {
            PreviewKind::Invoice => export::invoice_preview_csv(&rows),
            PreviewKind::Payroll => export::payroll_preview_csv(&rows),
        }
    }

    pub async fn export_document(&self, document_id: i64) -> Result<Vec<u8>, AppError> {
        let DocumentWithLines { document, lines } = self.get_document(document_id).await?;

        let company_ids = dedup_ids(&lines.iter().filter_map(|l| l.company_id).collect::<Vec<_>>());
        let employee_ids = dedup_ids(
            &lines
                .iter()
                .filter_map(|l| l.employee_user_id)
                .collect::<Vec<_>>(),
        );

        let mut conn = self.pool.acquire().await?;
        let companies: HashMap<i64, String> = company_repo::names(&mut conn, &company_ids)
            .await?
            .into_iter()
            .collect();
        let employees: HashMap<i64, String> = employee_repo::summaries(&mut conn, &employee_ids)
            .await?
            .into_iter()
            .map(|employee| (employee.id, employee.name))
            .collect();

        export::document_csv(&document, &lines, &companies, &employees)
    }
}

/// Roll up a batch of bookings with one query per related table.
async fn overview_rows(
    conn: &mut PgConnection,
    bookings: Vec<Booking>,
) -> Result<Vec<FinanceOverviewRow>, AppError> {
    if bookings.is_empty() {
        return Ok(Vec::new());
    }

    let booking_ids: Vec<i64> = bookings.iter().map(|booking| booking.id).collect();
    let company_ids = dedup_ids(&bookings.iter().map(|b| b.company_id).collect::<Vec<_>>());

    let assignments = assignment_repo::list_assigned_for_bookings(conn, &booking_ids).await?;
    let timesheets = timesheet_repo::list_for_bookings(conn, &booking_ids).await?;
    let employee_ids = dedup_ids(
        &assignments
            .iter()
            .map(|assignment| assignment.employee_user_id)
            .collect::<Vec<_>>(),
    );
    let employees = employee_repo::summaries(conn, &employee_ids).await?;
    let companies: HashMap<i64, String> = company_repo::names(conn, &company_ids)
        .await?
        .into_iter()
        .collect();

    let rows = bookings
        .into_iter()
        .map(|booking| {
            let statuses: Vec<TimesheetStatus> = timesheets
                .iter()
                .filter(|timesheet| timesheet.booking_id == booking.id)
                .map(|timesheet| timesheet.status)
                .collect();
            let company_name = companies.get(&booking.company_id).cloned();
            let rollup = rollup_booking(booking, &assignments, &timesheets, &employees, company_name);
            overview_row(rollup, &statuses)
        })
        .collect();

    Ok(rows)
}
