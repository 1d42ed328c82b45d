//! In-memory store and fixtures for service tests.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::database::models::{
    Assignment, AssignmentMode, AssignmentStatus, Booking, BookingInput, BookingRequest,
    BookingStatus, DocumentStatus, EmployeeRates, EmployeeSummary, FinanceDocument,
    FinanceDocumentLine, NewDocument, NewDocumentLine, RequestStatus, Timesheet, TimesheetStatus,
    TimesheetUpsert, WaitlistEntry, money,
};
use crate::error::AppError;
use crate::services::store::{BookingStore, FinanceStore};

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
}

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

/// An open, unapproved 8 hour booking starting tomorrow morning.
pub fn booking_fixture(id: i64, required_workers: i32) -> Booking {
    let starts_at = Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap();
    Booking {
        id,
        company_id: 1,
        company_address_id: None,
        created_by: Some(1),
        title: format!("Booking {}", id),
        description: None,
        starts_at,
        ends_at: starts_at + Duration::hours(8),
        required_workers,
        assignment_mode: AssignmentMode::SpecificEmployees,
        show_employee_names_to_company: false,
        status: BookingStatus::Open,
        approved_at: None,
        approved_by: None,
        executed_at: None,
        executed_by: None,
        is_invoiced: false,
        is_paid: false,
        created_at: test_now(),
        updated_at: test_now(),
    }
}

/// An approved 8 hour booking that ended yesterday and has been executed.
pub fn executed_booking(id: i64, required_workers: i32) -> Booking {
    let starts_at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    Booking {
        starts_at,
        ends_at: starts_at + Duration::hours(8),
        approved_at: Some(starts_at - Duration::days(2)),
        approved_by: Some(1),
        executed_at: Some(starts_at + Duration::hours(9)),
        status: BookingStatus::Completed,
        ..booking_fixture(id, required_workers)
    }
}

pub fn booking_input(booking: &Booking) -> BookingInput {
    BookingInput {
        company_id: booking.company_id,
        company_address_id: booking.company_address_id,
        title: booking.title.clone(),
        description: booking.description.clone(),
        starts_at: booking.starts_at,
        ends_at: booking.ends_at,
        required_workers: booking.required_workers,
        assignment_mode: booking.assignment_mode,
        show_employee_names_to_company: booking.show_employee_names_to_company,
    }
}

pub fn assignment_fixture(
    id: i64,
    booking_id: i64,
    employee_user_id: i64,
    worker_rate: Option<&str>,
    customer_rate: Option<&str>,
) -> Assignment {
    Assignment {
        id,
        booking_id,
        employee_user_id,
        status: AssignmentStatus::Assigned,
        assigned_at: Some(test_now()),
        cancelled_at: None,
        worker_rate: worker_rate.map(dec),
        customer_rate: customer_rate.map(dec),
        created_at: test_now(),
        updated_at: test_now(),
    }
}

pub fn timesheet_fixture(id: i64, booking_id: i64, employee_user_id: i64, hours: &str) -> Timesheet {
    Timesheet {
        id,
        booking_id,
        employee_user_id,
        hours_worked: dec(hours),
        hourly_wage: None,
        hourly_price: None,
        wage_total: None,
        price_total: None,
        status: TimesheetStatus::Draft,
        created_at: test_now(),
        updated_at: test_now(),
    }
}

/// Store backed by ordered maps. Row locks are no-ops: tests are single-threaded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bookings: BTreeMap<i64, Booking>,
    assignments: BTreeMap<i64, Assignment>,
    waitlist: BTreeMap<i64, WaitlistEntry>,
    requests: BTreeMap<i64, BookingRequest>,
    timesheets: BTreeMap<i64, Timesheet>,
    documents: BTreeMap<i64, FinanceDocument>,
    lines: BTreeMap<i64, FinanceDocumentLine>,
    rates: HashMap<i64, EmployeeRates>,
    employees: HashMap<i64, EmployeeSummary>,
    last_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    pub fn insert_booking(&mut self, mut booking: Booking) -> Booking {
        booking.id = self.next_id();
        self.bookings.insert(booking.id, booking.clone());
        booking
    }

    pub fn insert_timesheet(&mut self, mut timesheet: Timesheet) -> Timesheet {
        timesheet.id = self.next_id();
        self.timesheets.insert(timesheet.id, timesheet.clone());
        timesheet
    }

    /// Assign directly, bypassing capacity checks.
    pub fn assign(&mut self, booking_id: i64, employee_user_id: i64) -> Assignment {
        let mut assignment = assignment_fixture(0, booking_id, employee_user_id, None, None);
        if let Some(rates) = self.rates.get(&employee_user_id) {
            assignment.worker_rate = rates.hourly_wage.clone();
            assignment.customer_rate = rates.hourly_customer_rate.clone();
        }
        assignment.id = self.next_id();
        self.assignments.insert(assignment.id, assignment.clone());
        assignment
    }

    pub fn set_rates(&mut self, employee_user_id: i64, wage: Option<&str>, price: Option<&str>) {
        self.rates.insert(
            employee_user_id,
            EmployeeRates {
                hourly_wage: wage.map(dec),
                hourly_customer_rate: price.map(dec),
            },
        );
    }

    pub fn add_employee(&mut self, id: i64, name: &str) {
        self.employees.insert(
            id,
            EmployeeSummary {
                id,
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
            },
        );
    }

    pub fn set_required_workers(&mut self, booking_id: i64, required_workers: i32) {
        if let Some(booking) = self.bookings.get_mut(&booking_id) {
            booking.required_workers = required_workers;
        }
    }

    pub fn booking(&self, booking_id: i64) -> Booking {
        self.bookings[&booking_id].clone()
    }

    pub fn assignment(&self, assignment_id: i64) -> Assignment {
        self.assignments[&assignment_id].clone()
    }

    /// Employees holding an active assignment, in assignment order.
    pub fn assigned_employees(&self, booking_id: i64) -> Vec<i64> {
        self.assignments
            .values()
            .filter(|a| a.booking_id == booking_id && a.is_assigned())
            .map(|a| a.employee_user_id)
            .collect()
    }

    pub fn assignment_for(&self, booking_id: i64, employee_user_id: i64) -> Option<Assignment> {
        self.assignments
            .values()
            .find(|a| a.booking_id == booking_id && a.employee_user_id == employee_user_id)
            .cloned()
    }

    /// Active waitlist as (employee, position), in queue order.
    pub fn queue(&self, booking_id: i64) -> Vec<(i64, i32)> {
        self.active_entries(booking_id)
            .into_iter()
            .map(|entry| (entry.employee_user_id, entry.position))
            .collect()
    }

    pub fn waitlist_entry_for(&self, booking_id: i64, employee_user_id: i64) -> Option<WaitlistEntry> {
        self.waitlist
            .values()
            .find(|e| e.booking_id == booking_id && e.employee_user_id == employee_user_id)
            .cloned()
    }

    pub fn request_for(&self, booking_id: i64, employee_user_id: i64) -> Option<BookingRequest> {
        self.requests
            .values()
            .find(|r| r.booking_id == booking_id && r.employee_user_id == employee_user_id)
            .cloned()
    }

    pub fn timesheet_for(&self, booking_id: i64, employee_user_id: i64) -> Option<Timesheet> {
        self.timesheets
            .values()
            .find(|t| t.booking_id == booking_id && t.employee_user_id == employee_user_id)
            .cloned()
    }

    pub fn set_timesheet_status(&mut self, timesheet_id: i64, status: TimesheetStatus) {
        if let Some(timesheet) = self.timesheets.get_mut(&timesheet_id) {
            timesheet.status = status;
        }
    }

    pub fn document(&self, document_id: i64) -> FinanceDocument {
        self.documents[&document_id].clone()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn active_entries(&self, booking_id: i64) -> Vec<WaitlistEntry> {
        let mut entries: Vec<WaitlistEntry> = self
            .waitlist
            .values()
            .filter(|e| e.booking_id == booking_id && e.is_active())
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.position, e.id));
        entries
    }

    fn booking_mut(&mut self, booking_id: i64) -> Result<&mut Booking, AppError> {
        self.bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::booking_not_found(booking_id))
    }
}

impl BookingStore for MemoryStore {
    async fn lock_booking(&mut self, booking_id: i64) -> Result<Option<Booking>, AppError> {
        Ok(self.bookings.get(&booking_id).cloned())
    }

    async fn update_booking(
        &mut self,
        booking_id: i64,
        input: &BookingInput,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let booking = self.booking_mut(booking_id)?;
        booking.company_id = input.company_id;
        booking.company_address_id = input.company_address_id;
        booking.title = input.title.trim().to_string();
        booking.description = input.description.clone();
        booking.starts_at = input.starts_at;
        booking.ends_at = input.ends_at;
        booking.required_workers = input.required_workers;
        booking.assignment_mode = input.assignment_mode;
        booking.show_employee_names_to_company = input.show_employee_names_to_company;
        booking.updated_at = now;
        Ok(booking.clone())
    }

    async fn delete_booking(&mut self, booking_id: i64) -> Result<bool, AppError> {
        let existed = self.bookings.remove(&booking_id).is_some();
        self.assignments.retain(|_, a| a.booking_id != booking_id);
        self.waitlist.retain(|_, e| e.booking_id != booking_id);
        self.requests.retain(|_, r| r.booking_id != booking_id);
        self.timesheets.retain(|_, t| t.booking_id != booking_id);
        Ok(existed)
    }

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let booking = self.booking_mut(booking_id)?;
        booking.status = status;
        booking.updated_at = now;
        Ok(())
    }

    async fn approve_booking(
        &mut self,
        booking_id: i64,
        approved_by: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let booking = self.booking_mut(booking_id)?;
        booking.approved_at = Some(now);
        booking.approved_by = Some(approved_by);
        booking.updated_at = now;
        Ok(())
    }

    async fn revoke_booking_approval(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let booking = self.booking_mut(booking_id)?;
        booking.approved_at = None;
        booking.approved_by = None;
        booking.executed_at = None;
        booking.executed_by = None;
        booking.status = status;
        booking.updated_at = now;
        Ok(())
    }

    async fn set_billing_flags(
        &mut self,
        booking_id: i64,
        is_invoiced: bool,
        is_paid: bool,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let booking = self.booking_mut(booking_id)?;
        booking.is_invoiced = is_invoiced;
        booking.is_paid = is_paid;
        booking.updated_at = now;
        Ok(())
    }

    async fn mark_executed_due(&mut self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut executed = 0;
        for booking in self.bookings.values_mut() {
            if booking.is_due_for_execution(now) {
                booking.executed_at = Some(now);
                booking.status = BookingStatus::Completed;
                booking.updated_at = now;
                executed += 1;
            }
        }
        Ok(executed)
    }

    async fn count_assigned(&mut self, booking_id: i64) -> Result<i64, AppError> {
        Ok(self.assigned_employees(booking_id).len() as i64)
    }

    async fn assignments_for_booking(
        &mut self,
        booking_id: i64,
    ) -> Result<Vec<Assignment>, AppError> {
        Ok(self
            .assignments
            .values()
            .filter(|a| a.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn find_assignment(
        &mut self,
        assignment_id: i64,
    ) -> Result<Option<Assignment>, AppError> {
        Ok(self.assignments.get(&assignment_id).cloned())
    }

    async fn find_assignment_for(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<Option<Assignment>, AppError> {
        Ok(self.assignment_for(booking_id, employee_user_id))
    }

    async fn upsert_assigned(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        rates: &EmployeeRates,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AppError> {
        let id = match self.assignment_for(booking_id, employee_user_id) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let created_at = self.assignments.get(&id).map_or(now, |a| a.created_at);
        let assignment = Assignment {
            id,
            booking_id,
            employee_user_id,
            status: AssignmentStatus::Assigned,
            assigned_at: Some(now),
            cancelled_at: None,
            worker_rate: rates.hourly_wage.clone(),
            customer_rate: rates.hourly_customer_rate.clone(),
            created_at,
            updated_at: now,
        };
        self.assignments.insert(id, assignment.clone());
        Ok(assignment)
    }

    async fn cancel_assignment(
        &mut self,
        assignment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(assignment) = self.assignments.get_mut(&assignment_id) {
            assignment.status = AssignmentStatus::Cancelled;
            assignment.cancelled_at = Some(now);
            assignment.updated_at = now;
        }
        Ok(())
    }

    async fn update_assignment_rates(
        &mut self,
        assignment_id: i64,
        worker_rate: Option<&BigDecimal>,
        customer_rate: Option<&BigDecimal>,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AppError> {
        let assignment = self
            .assignments
            .get_mut(&assignment_id)
            .ok_or_else(|| AppError::NotFound(format!("Assignment {} not found", assignment_id)))?;
        assignment.worker_rate = worker_rate.cloned();
        assignment.customer_rate = customer_rate.cloned();
        assignment.updated_at = now;
        Ok(assignment.clone())
    }

    async fn active_waitlist(&mut self, booking_id: i64) -> Result<Vec<WaitlistEntry>, AppError> {
        Ok(self.active_entries(booking_id))
    }

    async fn find_waitlist_entry(
        &mut self,
        entry_id: i64,
    ) -> Result<Option<WaitlistEntry>, AppError> {
        Ok(self.waitlist.get(&entry_id).cloned())
    }

    async fn upsert_waitlist_entry(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        position: i32,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, AppError> {
        let id = match self.waitlist_entry_for(booking_id, employee_user_id) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let created_at = self.waitlist.get(&id).map_or(now, |e| e.created_at);
        let entry = WaitlistEntry {
            id,
            booking_id,
            employee_user_id,
            position,
            joined_at: Some(now),
            left_at: None,
            created_at,
            updated_at: now,
        };
        self.waitlist.insert(id, entry.clone());
        Ok(entry)
    }

    async fn mark_waitlist_left(
        &mut self,
        entry_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(entry) = self.waitlist.get_mut(&entry_id) {
            if entry.left_at.is_none() {
                entry.left_at = Some(now);
                entry.updated_at = now;
            }
        }
        Ok(())
    }

    async fn set_waitlist_position(
        &mut self,
        entry_id: i64,
        position: i32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(entry) = self.waitlist.get_mut(&entry_id) {
            entry.position = position;
            entry.updated_at = now;
        }
        Ok(())
    }

    async fn find_request(&mut self, request_id: i64) -> Result<Option<BookingRequest>, AppError> {
        Ok(self.requests.get(&request_id).cloned())
    }

    async fn upsert_pending_request(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<BookingRequest, AppError> {
        let id = match self.request_for(booking_id, employee_user_id) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let created_at = self.requests.get(&id).map_or(now, |r| r.created_at);
        let request = BookingRequest {
            id,
            booking_id,
            employee_user_id,
            status: RequestStatus::Pending,
            responded_at: None,
            created_at,
            updated_at: now,
        };
        self.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn set_request_status(
        &mut self,
        request_id: i64,
        status: RequestStatus,
        responded_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = status;
            request.responded_at = responded_at;
            request.updated_at = now;
        }
        Ok(())
    }

    async fn find_timesheet(&mut self, timesheet_id: i64) -> Result<Option<Timesheet>, AppError> {
        Ok(self.timesheets.get(&timesheet_id).cloned())
    }

    async fn find_timesheet_for(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<Option<Timesheet>, AppError> {
        Ok(self.timesheet_for(booking_id, employee_user_id))
    }

    async fn timesheets_for_booking(
        &mut self,
        booking_id: i64,
    ) -> Result<Vec<Timesheet>, AppError> {
        Ok(self
            .timesheets
            .values()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn upsert_timesheet(
        &mut self,
        timesheet: &TimesheetUpsert,
        now: DateTime<Utc>,
    ) -> Result<Timesheet, AppError> {
        let existing = self.timesheet_for(timesheet.booking_id, timesheet.employee_user_id);
        let id = match &existing {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let stored = Timesheet {
            id,
            booking_id: timesheet.booking_id,
            employee_user_id: timesheet.employee_user_id,
            hours_worked: timesheet.hours_worked.clone(),
            hourly_wage: timesheet.hourly_wage.clone(),
            hourly_price: timesheet.hourly_price.clone(),
            wage_total: timesheet.wage_total.clone(),
            price_total: timesheet.price_total.clone(),
            status: timesheet.status,
            created_at: existing.map_or(now, |t| t.created_at),
            updated_at: now,
        };
        self.timesheets.insert(id, stored.clone());
        Ok(stored)
    }

    async fn default_rates(&mut self, employee_user_id: i64) -> Result<EmployeeRates, AppError> {
        Ok(self.rates.get(&employee_user_id).cloned().unwrap_or_default())
    }

    async fn employee_summaries(
        &mut self,
        employee_user_ids: &[i64],
    ) -> Result<Vec<EmployeeSummary>, AppError> {
        Ok(employee_user_ids
            .iter()
            .filter_map(|id| self.employees.get(id).cloned())
            .collect())
    }
}

impl FinanceStore for MemoryStore {
    async fn lock_bookings(&mut self, booking_ids: &[i64]) -> Result<Vec<Booking>, AppError> {
        Ok(self
            .bookings
            .values()
            .filter(|b| booking_ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn insert_document(
        &mut self,
        document: &NewDocument,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError> {
        let stored = FinanceDocument {
            id: self.next_id(),
            document_type: document.document_type,
            status: DocumentStatus::Draft,
            period_from: document.period_from,
            period_to: document.period_to,
            wage_total: money::zero(),
            price_total: money::zero(),
            margin_total: money::zero(),
            finalized_at: None,
            created_by: document.created_by,
            finalized_by: None,
            created_at: now,
            updated_at: now,
        };
        self.documents.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_document_line(
        &mut self,
        document_id: i64,
        line: &NewDocumentLine,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocumentLine, AppError> {
        let stored = FinanceDocumentLine {
            id: self.next_id(),
            finance_document_id: document_id,
            booking_id: line.booking_id,
            company_id: line.company_id,
            employee_user_id: line.employee_user_id,
            description: line.description.clone(),
            hours_worked: line.hours_worked.clone(),
            wage_total: line.wage_total.clone(),
            price_total: line.price_total.clone(),
            margin_total: line.margin_total.clone(),
            created_at: now,
        };
        self.lines.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn sync_document_totals(
        &mut self,
        document_id: i64,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError> {
        let lines: Vec<FinanceDocumentLine> = self
            .lines
            .values()
            .filter(|l| l.finance_document_id == document_id)
            .cloned()
            .collect();
        let document = self
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;
        document.wage_total = money::sum(lines.iter().map(|l| &l.wage_total));
        document.price_total = money::sum(lines.iter().map(|l| &l.price_total));
        document.margin_total = money::sum(lines.iter().map(|l| &l.margin_total));
        document.updated_at = now;
        Ok(document.clone())
    }

    async fn lock_document(
        &mut self,
        document_id: i64,
    ) -> Result<Option<FinanceDocument>, AppError> {
        Ok(self.documents.get(&document_id).cloned())
    }

    async fn document_lines(
        &mut self,
        document_id: i64,
    ) -> Result<Vec<FinanceDocumentLine>, AppError> {
        Ok(self
            .lines
            .values()
            .filter(|l| l.finance_document_id == document_id)
            .cloned()
            .collect())
    }

    async fn set_document_status(
        &mut self,
        document_id: i64,
        status: DocumentStatus,
        finalized_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<FinanceDocument, AppError> {
        let document = self
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;
        document.status = status;
        if status == DocumentStatus::Finalized {
            document.finalized_at = Some(now);
        }
        if finalized_by.is_some() {
            document.finalized_by = finalized_by;
        }
        document.updated_at = now;
        Ok(document.clone())
    }
}
