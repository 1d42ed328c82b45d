use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};

use crate::database::models::{
    Assignment, Booking, BookingRollup, DocumentStatus, DocumentType, DocumentWithLines,
    DraftOutcome, EmployeeSummary, FinanceDocument, FinanceOverviewRow, NewDocument,
    NewDocumentLine, RollupLine, Timesheet, TimesheetStatus,
    money::{self, line_total, round2},
};
use crate::error::AppError;
use crate::services::lifecycle::dedup_ids;
use crate::services::store::FinanceStore;

pub const UNKNOWN_EMPLOYEE: &str = "Unknown";
pub const PAY_BLOCK_REASON: &str =
    "all timesheets must be approved before payroll can be marked as paid";

/// Recorded total when the timesheet has one, otherwise hours times the
/// assignment rate, otherwise zero.
fn settled_total(
    recorded: Option<&BigDecimal>,
    hours_worked: &BigDecimal,
    rate: Option<&BigDecimal>,
) -> BigDecimal {
    match recorded {
        Some(total) => round2(total),
        None => line_total(hours_worked, rate).unwrap_or_else(money::zero),
    }
}

/// Financial view of a booking over its active assignments. Timesheet values
/// win over planned hours and assignment rates.
pub fn rollup_booking(
    booking: Booking,
    assignments: &[Assignment],
    timesheets: &[Timesheet],
    employees: &[EmployeeSummary],
    company_name: Option<String>,
) -> BookingRollup {
    let planned = booking.planned_hours();

    let lines: Vec<RollupLine> = assignments
        .iter()
        .filter(|assignment| assignment.booking_id == booking.id && assignment.is_assigned())
        .map(|assignment| {
            let timesheet = timesheets.iter().find(|timesheet| {
                timesheet.booking_id == booking.id
                    && timesheet.employee_user_id == assignment.employee_user_id
            });
            let employee = employees
                .iter()
                .find(|employee| employee.id == assignment.employee_user_id);

            let hours_worked =
                timesheet.map_or_else(|| planned.clone(), |t| round2(&t.hours_worked));
            let wage_total = settled_total(
                timesheet.and_then(|t| t.wage_total.as_ref()),
                &hours_worked,
                assignment.worker_rate.as_ref(),
            );
            let price_total = settled_total(
                timesheet.and_then(|t| t.price_total.as_ref()),
                &hours_worked,
                assignment.customer_rate.as_ref(),
            );

            RollupLine {
                assignment_id: assignment.id,
                employee_user_id: assignment.employee_user_id,
                employee_name: employee.map(|e| e.name.clone()),
                employee_email: employee.map(|e| e.email.clone()),
                margin_total: round2(&(&price_total - &wage_total)),
                hours_worked,
                worker_rate: assignment.worker_rate.clone(),
                customer_rate: assignment.customer_rate.clone(),
                wage_total,
                price_total,
                timesheet_status: timesheet.map(|t| t.status),
            }
        })
        .collect();

    let hours_total = money::sum(lines.iter().map(|line| &line.hours_worked));
    let wage_total = money::sum(lines.iter().map(|line| &line.wage_total));
    let price_total = money::sum(lines.iter().map(|line| &line.price_total));
    let has_blocking_timesheet = lines.iter().any(|line| {
        line.timesheet_status
            .is_some_and(|status| status != TimesheetStatus::Approved)
    });

    BookingRollup {
        workflow_status: booking.workflow_status(),
        booking,
        company_name,
        margin_total: round2(&(&price_total - &wage_total)),
        lines,
        hours_total,
        wage_total,
        price_total,
        has_blocking_timesheet,
    }
}

/// Attach the action flags. `timesheet_statuses` covers every timesheet row
/// of the booking, not only those of active assignments.
pub fn overview_row(
    rollup: BookingRollup,
    timesheet_statuses: &[TimesheetStatus],
) -> FinanceOverviewRow {
    let booking = &rollup.booking;
    let blocked = rollup.has_blocking_timesheet
        || timesheet_statuses
            .iter()
            .any(|status| *status != TimesheetStatus::Approved);

    FinanceOverviewRow {
        can_mark_invoiced: booking.can_be_invoiced(),
        can_unmark_invoiced: booking.can_invoice_be_removed(),
        can_mark_paid: booking.passes_payment_gate(timesheet_statuses) && !blocked,
        can_unmark_paid: booking.can_payment_be_removed(),
        pay_block_reason: blocked.then(|| PAY_BLOCK_REASON.to_string()),
        rollup,
    }
}

pub fn invoice_line(rollup: &BookingRollup) -> NewDocumentLine {
    NewDocumentLine {
        booking_id: rollup.booking.id,
        company_id: Some(rollup.booking.company_id),
        employee_user_id: None,
        description: rollup.booking.title.clone(),
        hours_worked: rollup.hours_total.clone(),
        wage_total: rollup.wage_total.clone(),
        price_total: rollup.price_total.clone(),
        margin_total: rollup.margin_total.clone(),
    }
}

pub fn payroll_lines(rollup: &BookingRollup) -> Vec<NewDocumentLine> {
    rollup
        .lines
        .iter()
        .map(|line| NewDocumentLine {
            booking_id: rollup.booking.id,
            company_id: Some(rollup.booking.company_id),
            employee_user_id: Some(line.employee_user_id),
            description: format!(
                "{} - {}",
                rollup.booking.title,
                line.employee_name.as_deref().unwrap_or(UNKNOWN_EMPLOYEE)
            ),
            hours_worked: line.hours_worked.clone(),
            wage_total: line.wage_total.clone(),
            price_total: line.price_total.clone(),
            margin_total: line.margin_total.clone(),
        })
        .collect()
}

/// First and last end date among the bookings.
pub fn document_period(bookings: &[&Booking]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let dates = bookings.iter().map(|booking| booking.ends_at.date_naive());
    (dates.clone().min(), dates.max())
}

/// Builds invoice and payroll drafts and moves them through finalization.
pub struct FinanceLedger<S> {
    store: S,
    now: DateTime<Utc>,
}

impl<S: FinanceStore> FinanceLedger<S> {
    pub fn new(store: S, now: DateTime<Utc>) -> Self {
        Self { store, now }
    }

    pub async fn create_invoice_draft(
        &mut self,
        booking_ids: &[i64],
        created_by: i64,
    ) -> Result<DraftOutcome, AppError> {
        self.create_draft(DocumentType::Invoice, booking_ids, created_by)
            .await
    }

    pub async fn create_payroll_draft(
        &mut self,
        booking_ids: &[i64],
        created_by: i64,
    ) -> Result<DraftOutcome, AppError> {
        self.create_draft(DocumentType::Payroll, booking_ids, created_by)
            .await
    }

    async fn create_draft(
        &mut self,
        document_type: DocumentType,
        booking_ids: &[i64],
        created_by: i64,
    ) -> Result<DraftOutcome, AppError> {
        let requested = dedup_ids(booking_ids);
        if requested.is_empty() {
            return Err(AppError::BadRequest("booking_ids is required".to_string()));
        }

        let swept = self.store.mark_executed_due(self.now).await?;
        if swept > 0 {
            log::info!("Marked {} bookings as executed before drafting", swept);
        }

        let mut rollups = Vec::new();
        for booking in self.store.lock_bookings(&requested).await? {
            if self.is_eligible(document_type, &booking).await? {
                rollups.push(self.rollup(booking).await?);
            }
        }
        if rollups.is_empty() {
            return Err(AppError::BadRequest(format!(
                "none of the selected bookings can be used for a {} draft",
                document_type
            )));
        }

        let included: Vec<i64> = rollups.iter().map(|rollup| rollup.booking.id).collect();
        let skipped: Vec<i64> = requested
            .iter()
            .copied()
            .filter(|id| !included.contains(id))
            .collect();

        let bookings: Vec<&Booking> = rollups.iter().map(|rollup| &rollup.booking).collect();
        let (period_from, period_to) = document_period(&bookings);
        let document = self
            .store
            .insert_document(
                &NewDocument {
                    document_type,
                    period_from,
                    period_to,
                    created_by: Some(created_by),
                },
                self.now,
            )
            .await?;

        let new_lines: Vec<NewDocumentLine> = match document_type {
            DocumentType::Invoice => rollups.iter().map(invoice_line).collect(),
            DocumentType::Payroll => rollups.iter().flat_map(payroll_lines).collect(),
        };
        for line in &new_lines {
            self.store
                .insert_document_line(document.id, line, self.now)
                .await?;
        }
        let document = self.store.sync_document_totals(document.id, self.now).await?;
        let lines = self.store.document_lines(document.id).await?;

        log::info!(
            "Created {} draft {} with {} bookings, {} skipped",
            document_type,
            document.id,
            included.len(),
            skipped.len()
        );
        Ok(DraftOutcome {
            document: DocumentWithLines { document, lines },
            included,
            skipped,
        })
    }

    /// Re-check every referenced booking and apply the billing flags, or
    /// reject with the bookings that no longer qualify.
    pub async fn finalize(
        &mut self,
        document_id: i64,
        finalized_by: i64,
    ) -> Result<DocumentWithLines, AppError> {
        let document = self.draft(document_id, "finalized").await?;
        let lines = self.store.document_lines(document_id).await?;
        let booking_ids = dedup_ids(&lines.iter().map(|line| line.booking_id).collect::<Vec<_>>());
        let bookings = self.store.lock_bookings(&booking_ids).await?;

        let mut stale = Vec::new();
        for booking_id in &booking_ids {
            let eligible = match bookings.iter().find(|booking| booking.id == *booking_id) {
                Some(booking) => self.is_eligible(document.document_type, booking).await?,
                None => false,
            };
            if !eligible {
                stale.push(*booking_id);
            }
        }
        if !stale.is_empty() {
            log::warn!(
                "Document {} cannot be finalized, stale bookings {:?}",
                document_id,
                stale
            );
            return Err(AppError::StaleEligibility { booking_ids: stale });
        }

        let is_paid = document.document_type == DocumentType::Payroll;
        for booking_id in &booking_ids {
            self.store
                .set_billing_flags(*booking_id, true, is_paid, self.now)
                .await?;
        }
        let document = self
            .store
            .set_document_status(
                document_id,
                DocumentStatus::Finalized,
                Some(finalized_by),
                self.now,
            )
            .await?;

        log::info!(
            "Finalized {} document {} over {} bookings",
            document.document_type,
            document_id,
            booking_ids.len()
        );
        Ok(DocumentWithLines { document, lines })
    }

    pub async fn cancel(&mut self, document_id: i64) -> Result<FinanceDocument, AppError> {
        self.draft(document_id, "cancelled").await?;
        let document = self
            .store
            .set_document_status(document_id, DocumentStatus::Cancelled, None, self.now)
            .await?;
        log::info!("Cancelled document {}", document_id);
        Ok(document)
    }

    async fn draft(&mut self, document_id: i64, action: &str) -> Result<FinanceDocument, AppError> {
        let document = self
            .store
            .lock_document(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;
        if document.status != DocumentStatus::Draft {
            return Err(AppError::Conflict(format!(
                "only drafts can be {}, document {} is {}",
                action, document_id, document.status
            )));
        }
        Ok(document)
    }

    async fn is_eligible(
        &mut self,
        document_type: DocumentType,
        booking: &Booking,
    ) -> Result<bool, AppError> {
        match document_type {
            DocumentType::Invoice => Ok(booking.can_be_invoiced()),
            DocumentType::Payroll => {
                let statuses: Vec<TimesheetStatus> = self
                    .store
                    .timesheets_for_booking(booking.id)
                    .await?
                    .into_iter()
                    .map(|timesheet| timesheet.status)
                    .collect();
                Ok(booking.passes_payment_gate(&statuses))
            }
        }
    }

    async fn rollup(&mut self, booking: Booking) -> Result<BookingRollup, AppError> {
        let assignments = self.store.assignments_for_booking(booking.id).await?;
        let timesheets = self.store.timesheets_for_booking(booking.id).await?;
        let employee_ids: Vec<i64> = assignments
            .iter()
            .filter(|assignment| assignment.is_assigned())
            .map(|assignment| assignment.employee_user_id)
            .collect();
        let employees = self.store.employee_summaries(&employee_ids).await?;
        Ok(rollup_booking(booking, &assignments, &timesheets, &employees, None))
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::WorkflowStatus;
    use crate::services::store::BookingStore;
    use crate::test_utils::{
        MemoryStore, assignment_fixture, booking_fixture, dec, executed_booking, test_now,
        timesheet_fixture,
    };
    use pretty_assertions::assert_eq;

    fn summary(id: i64, name: &str) -> EmployeeSummary {
        EmployeeSummary {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    #[test]
    fn rollup_prefers_timesheet_values_over_planned_figures() {
        let booking = executed_booking(1, 3);
        let planned = assignment_fixture(1, 1, 10, Some("200"), Some("300"));
        let recorded = assignment_fixture(2, 1, 11, Some("150"), Some("250"));
        let mut cancelled = assignment_fixture(3, 1, 12, Some("999"), Some("999"));
        cancelled.status = crate::database::models::AssignmentStatus::Cancelled;

        let mut timesheet = timesheet_fixture(1, 1, 11, "6");
        timesheet.wage_total = Some(dec("900"));

        let rollup = rollup_booking(
            booking,
            &[planned, recorded, cancelled],
            &[timesheet],
            &[summary(10, "Alice")],
            Some("Acme".to_string()),
        );

        assert_eq!(rollup.lines.len(), 2);
        let first = &rollup.lines[0];
        assert_eq!(first.hours_worked, dec("8.00"));
        assert_eq!(first.wage_total, dec("1600.00"));
        assert_eq!(first.price_total, dec("2400.00"));
        assert_eq!(first.employee_name.as_deref(), Some("Alice"));
        assert_eq!(first.timesheet_status, None);

        let second = &rollup.lines[1];
        assert_eq!(second.hours_worked, dec("6.00"));
        assert_eq!(second.wage_total, dec("900.00"));
        assert_eq!(second.price_total, dec("1500.00"));
        assert_eq!(second.margin_total, dec("600.00"));
        assert_eq!(second.employee_name, None);

        assert_eq!(rollup.hours_total, dec("14.00"));
        assert_eq!(rollup.wage_total, dec("2500.00"));
        assert_eq!(rollup.price_total, dec("3900.00"));
        assert_eq!(rollup.margin_total, dec("1400.00"));
        assert!(rollup.has_blocking_timesheet);
        assert_eq!(rollup.workflow_status, WorkflowStatus::Executed);
    }

    #[test]
    fn missing_rates_count_as_zero() {
        let booking = executed_booking(1, 1);
        let assignment = assignment_fixture(1, 1, 10, None, None);

        let rollup = rollup_booking(booking, &[assignment], &[], &[], None);

        assert_eq!(rollup.lines[0].wage_total, money::zero());
        assert_eq!(rollup.lines[0].price_total, money::zero());
        assert!(!rollup.has_blocking_timesheet);
    }

    #[test]
    fn overview_flags_follow_the_payment_gate() {
        let mut booking = executed_booking(1, 1);
        booking.is_invoiced = true;
        let rollup = rollup_booking(booking, &[], &[], &[], None);

        let blocked = overview_row(rollup.clone(), &[TimesheetStatus::Submitted]);
        assert!(!blocked.can_mark_paid);
        assert!(!blocked.can_mark_invoiced);
        assert!(blocked.can_unmark_invoiced);
        assert_eq!(blocked.pay_block_reason.as_deref(), Some(PAY_BLOCK_REASON));

        let clear = overview_row(rollup, &[TimesheetStatus::Approved]);
        assert!(clear.can_mark_paid);
        assert_eq!(clear.pay_block_reason, None);
    }

    #[test]
    fn payroll_lines_name_each_employee() {
        let booking = executed_booking(1, 2);
        let rollup = rollup_booking(
            booking,
            &[
                assignment_fixture(1, 1, 10, Some("100"), None),
                assignment_fixture(2, 1, 11, Some("100"), None),
            ],
            &[],
            &[summary(10, "Alice")],
            None,
        );

        let lines = payroll_lines(&rollup);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].description, "Booking 1 - Alice");
        assert_eq!(lines[1].description, "Booking 1 - Unknown");
        assert_eq!(lines[1].employee_user_id, Some(11));
        assert_eq!(invoice_line(&rollup).wage_total, dec("1600.00"));
    }

    fn staffed_booking(store: &mut MemoryStore, booking: Booking) -> Booking {
        let booking = store.insert_booking(booking);
        store.set_rates(10, Some("200"), Some("300"));
        store.add_employee(10, "Alice");
        store.assign(booking.id, 10);
        booking
    }

    #[tokio::test]
    async fn invoice_draft_takes_only_invoiceable_bookings() {
        let mut store = MemoryStore::new();
        let mut earlier = executed_booking(0, 1);
        earlier.starts_at -= chrono::Duration::days(3);
        earlier.ends_at -= chrono::Duration::days(3);
        let first = staffed_booking(&mut store, earlier);
        let later = staffed_booking(&mut store, executed_booking(0, 1));
        let open = staffed_booking(&mut store, booking_fixture(0, 1));

        let mut ledger = FinanceLedger::new(store, test_now());
        let outcome = ledger
            .create_invoice_draft(&[first.id, later.id, open.id, 999], 1)
            .await
            .unwrap();

        assert_eq!(outcome.included, vec![first.id, later.id]);
        assert_eq!(outcome.skipped, vec![open.id, 999]);
        let document = &outcome.document.document;
        assert_eq!(document.document_type, DocumentType::Invoice);
        assert_eq!(document.status, DocumentStatus::Draft);
        assert_eq!(document.period_from, Some(first.ends_at.date_naive()));
        assert_eq!(document.period_to, Some(later.ends_at.date_naive()));
        assert_eq!(document.wage_total, dec("3200.00"));
        assert_eq!(document.price_total, dec("4800.00"));
        assert_eq!(document.margin_total, dec("1600.00"));
        assert_eq!(outcome.document.lines.len(), 2);
        assert_eq!(outcome.document.lines[0].employee_user_id, None);
    }

    #[tokio::test]
    async fn draft_without_eligible_bookings_creates_nothing() {
        let mut store = MemoryStore::new();
        let open = staffed_booking(&mut store, booking_fixture(0, 1));

        let mut ledger = FinanceLedger::new(store, test_now());

        assert!(matches!(
            ledger.create_invoice_draft(&[open.id], 1).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            ledger.create_payroll_draft(&[], 1).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(ledger.store_mut().document_count(), 0);
    }

    #[tokio::test]
    async fn payroll_draft_waits_for_approved_timesheets() {
        let mut store = MemoryStore::new();
        let mut invoiced = executed_booking(0, 1);
        invoiced.is_invoiced = true;
        let booking = staffed_booking(&mut store, invoiced);
        let timesheet = store.insert_timesheet(timesheet_fixture(0, booking.id, 10, "7.5"));

        let mut ledger = FinanceLedger::new(store, test_now());
        assert!(matches!(
            ledger.create_payroll_draft(&[booking.id], 1).await,
            Err(AppError::BadRequest(_))
        ));

        ledger
            .store_mut()
            .set_timesheet_status(timesheet.id, TimesheetStatus::Approved);
        let outcome = ledger.create_payroll_draft(&[booking.id], 1).await.unwrap();

        let lines = &outcome.document.lines;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].employee_user_id, Some(10));
        assert_eq!(lines[0].description, format!("{} - Alice", booking.title));
        assert_eq!(lines[0].hours_worked, dec("7.50"));
        assert_eq!(lines[0].wage_total, dec("1500.00"));
    }

    #[tokio::test]
    async fn finalizing_an_invoice_marks_its_bookings_once() {
        let mut store = MemoryStore::new();
        let booking = staffed_booking(&mut store, executed_booking(0, 1));

        let mut ledger = FinanceLedger::new(store, test_now());
        let draft = ledger.create_invoice_draft(&[booking.id], 1).await.unwrap();
        let document_id = draft.document.document.id;

        let finalized = ledger.finalize(document_id, 2).await.unwrap();
        assert_eq!(finalized.document.status, DocumentStatus::Finalized);
        assert_eq!(finalized.document.finalized_by, Some(2));
        assert_eq!(finalized.document.finalized_at, Some(test_now()));

        let stored = ledger.store_mut().booking(booking.id);
        assert!(stored.is_invoiced);
        assert!(!stored.is_paid);

        assert!(matches!(
            ledger.finalize(document_id, 2).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn finalizing_payroll_marks_bookings_paid() {
        let mut store = MemoryStore::new();
        let mut invoiced = executed_booking(0, 1);
        invoiced.is_invoiced = true;
        let booking = staffed_booking(&mut store, invoiced);

        let mut ledger = FinanceLedger::new(store, test_now());
        let draft = ledger.create_payroll_draft(&[booking.id], 1).await.unwrap();
        ledger.finalize(draft.document.document.id, 1).await.unwrap();

        let stored = ledger.store_mut().booking(booking.id);
        assert!(stored.is_invoiced);
        assert!(stored.is_paid);
    }

    #[tokio::test]
    async fn stale_bookings_block_finalization_entirely() {
        let mut store = MemoryStore::new();
        let fresh = staffed_booking(&mut store, executed_booking(0, 1));
        let stale = staffed_booking(&mut store, executed_booking(0, 1));

        let mut ledger = FinanceLedger::new(store, test_now());
        let draft = ledger
            .create_invoice_draft(&[fresh.id, stale.id], 1)
            .await
            .unwrap();
        ledger
            .store_mut()
            .set_billing_flags(stale.id, true, false, test_now())
            .await
            .unwrap();

        let document_id = draft.document.document.id;
        match ledger.finalize(document_id, 1).await {
            Err(AppError::StaleEligibility { booking_ids }) => {
                assert_eq!(booking_ids, vec![stale.id])
            }
            other => panic!("expected stale eligibility, got {:?}", other),
        }

        let store = ledger.store_mut();
        assert!(!store.booking(fresh.id).is_invoiced);
        assert_eq!(store.document(document_id).status, DocumentStatus::Draft);
    }

    #[tokio::test]
    async fn only_drafts_can_be_cancelled() {
        let mut store = MemoryStore::new();
        let booking = staffed_booking(&mut store, executed_booking(0, 1));

        let mut ledger = FinanceLedger::new(store, test_now());
        let draft = ledger.create_invoice_draft(&[booking.id], 1).await.unwrap();
        let document_id = draft.document.document.id;

        let cancelled = ledger.cancel(document_id).await.unwrap();
        assert_eq!(cancelled.status, DocumentStatus::Cancelled);
        assert!(matches!(
            ledger.cancel(document_id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            ledger.finalize(document_id, 1).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            ledger.cancel(document_id + 100).await,
            Err(AppError::NotFound(_))
        ));
    }
}
