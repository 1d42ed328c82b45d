use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::database::models::{
    AddEmployeeOutcome, Assignment, Booking, BookingRequest, RequestResponse, RequestStatus,
    WaitlistEntry,
};
use crate::error::AppError;
use crate::services::lifecycle::{dedup_ids, ensure_editable, resync_booking_status};
use crate::services::notifications::Notification;
use crate::services::store::BookingStore;
use crate::services::timesheets::sync_for_assignment;

/// Capacity-aware staffing of a booking: direct assignment, requests and the
/// waitlist. Every operation locks the booking row before it counts
/// assignments, and resyncs the booking status before returning.
pub struct StaffingEngine<S> {
    store: S,
    now: DateTime<Utc>,
    outbox: Vec<Notification>,
}

impl<S: BookingStore> StaffingEngine<S> {
    pub fn new(store: S, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            outbox: Vec::new(),
        }
    }

    /// Notifications raised so far; deliver only after the work is committed.
    pub fn into_notifications(self) -> Vec<Notification> {
        self.outbox
    }

    async fn booking(&mut self, booking_id: i64) -> Result<Booking, AppError> {
        self.store
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::booking_not_found(booking_id))
    }

    pub async fn add_employee(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<AddEmployeeOutcome, AppError> {
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;

        if self.is_assigned(booking_id, employee_user_id).await? {
            log::debug!(
                "Employee {} already assigned to booking {}",
                employee_user_id,
                booking_id
            );
            return Ok(AddEmployeeOutcome::AlreadyAssigned);
        }

        self.assign_or_waitlist(&booking, employee_user_id).await?;
        resync_booking_status(&mut self.store, booking_id, self.now).await?;

        if self.is_assigned(booking_id, employee_user_id).await? {
            Ok(AddEmployeeOutcome::Assigned)
        } else {
            Ok(AddEmployeeOutcome::Waitlisted)
        }
    }

    /// Send (or re-send) pending requests. Expects targets already resolved.
    pub async fn request_employees(
        &mut self,
        booking_id: i64,
        employee_user_ids: &[i64],
    ) -> Result<Vec<BookingRequest>, AppError> {
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;
        if !booking.is_approved() {
            return Err(AppError::Conflict(
                "booking must be approved before employees can be requested".to_string(),
            ));
        }

        let recipients = dedup_ids(employee_user_ids);
        if recipients.is_empty() {
            log::debug!("No request targets for booking {}", booking_id);
            return Ok(Vec::new());
        }

        let mut requests = Vec::with_capacity(recipients.len());
        for employee_user_id in &recipients {
            requests.push(
                self.store
                    .upsert_pending_request(booking_id, *employee_user_id, self.now)
                    .await?,
            );
        }
        resync_booking_status(&mut self.store, booking_id, self.now).await?;

        log::info!(
            "Requested {} employees for booking {}",
            recipients.len(),
            booking_id
        );
        self.outbox
            .push(Notification::booking_request(&booking, recipients));
        Ok(requests)
    }

    /// Apply an employee's answer. Returns false when the request was no
    /// longer pending. `employee_user_id` restricts the request to its owner.
    pub async fn respond_to_request(
        &mut self,
        request_id: i64,
        response: RequestResponse,
        employee_user_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let request = self.request(request_id, employee_user_id).await?;
        let booking = self.booking(request.booking_id).await?;
        let request = self.request(request_id, employee_user_id).await?;

        if request.status != RequestStatus::Pending {
            log::debug!(
                "Request {} already resolved as {}",
                request_id,
                request.status
            );
            return Ok(false);
        }
        if response == RequestResponse::Accepted {
            ensure_editable(&booking)?;
        }

        self.store
            .set_request_status(request_id, response.into(), Some(self.now), self.now)
            .await?;
        match response {
            RequestResponse::Accepted => {
                self.assign_or_waitlist(&booking, request.employee_user_id)
                    .await?
            }
            RequestResponse::Declined => {
                self.leave_waitlist_for(booking.id, request.employee_user_id)
                    .await?
            }
        }
        resync_booking_status(&mut self.store, booking.id, self.now).await?;

        log::info!(
            "Employee {} {:?} request {} for booking {}",
            request.employee_user_id,
            response,
            request_id,
            booking.id
        );
        Ok(true)
    }

    /// Cancel an active assignment and backfill from the waitlist. Returns
    /// false when the assignment was not active.
    pub async fn cancel_assignment(
        &mut self,
        assignment_id: i64,
        booking_scope: Option<i64>,
    ) -> Result<bool, AppError> {
        let booking_id = self.assignment(assignment_id, booking_scope).await?.booking_id;
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;

        let assignment = self.assignment(assignment_id, booking_scope).await?;
        if !assignment.is_assigned() {
            log::debug!("Assignment {} is already {}", assignment_id, assignment.status);
            return Ok(false);
        }

        self.store.cancel_assignment(assignment_id, self.now).await?;
        log::info!(
            "Assignment {} cancelled on booking {}",
            assignment_id,
            booking_id
        );
        self.promote_from_waitlist(&booking).await?;
        resync_booking_status(&mut self.store, booking_id, self.now).await?;
        Ok(true)
    }

    /// Overwrite the rate snapshots and resync the timesheet. Recorded hours
    /// are kept; only totals follow the new rates.
    pub async fn update_assignment_rates(
        &mut self,
        assignment_id: i64,
        booking_scope: Option<i64>,
        worker_rate: Option<&BigDecimal>,
        customer_rate: Option<&BigDecimal>,
    ) -> Result<Assignment, AppError> {
        let zero = BigDecimal::from(0);
        if worker_rate.is_some_and(|rate| *rate < zero)
            || customer_rate.is_some_and(|rate| *rate < zero)
        {
            return Err(AppError::BadRequest("rates must not be negative".to_string()));
        }

        let booking_id = self.assignment(assignment_id, booking_scope).await?.booking_id;
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;

        let assignment = self
            .store
            .update_assignment_rates(assignment_id, worker_rate, customer_rate, self.now)
            .await?;
        sync_for_assignment(&mut self.store, &booking, &assignment, self.now).await?;

        log::info!("Rates updated on assignment {}", assignment_id);
        Ok(assignment)
    }

    /// Promote one specific entry, ahead of anyone queued before it. Returns
    /// false when the entry already left or the booking has no free slot.
    pub async fn promote_waitlist_entry(
        &mut self,
        entry_id: i64,
        booking_scope: Option<i64>,
    ) -> Result<bool, AppError> {
        let booking_id = self.waitlist_entry(entry_id, booking_scope, None).await?.booking_id;
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;
        if !booking.is_approved() {
            return Err(AppError::Conflict(
                "booking must be approved before promoting from the waitlist".to_string(),
            ));
        }

        let entry = self.waitlist_entry(entry_id, booking_scope, None).await?;
        if !entry.is_active() {
            log::debug!("Waitlist entry {} already left", entry_id);
            return Ok(false);
        }
        if !self.has_open_slot(&booking).await? {
            log::debug!("Booking {} is full, cannot promote entry {}", booking_id, entry_id);
            return Ok(false);
        }

        self.store.mark_waitlist_left(entry_id, self.now).await?;
        self.assign(&booking, entry.employee_user_id).await?;
        self.reindex_waitlist(booking_id).await?;
        resync_booking_status(&mut self.store, booking_id, self.now).await?;

        log::info!(
            "Waitlist entry {} promoted on booking {}",
            entry_id,
            booking_id
        );
        Ok(true)
    }

    /// Admin removal of a waitlist entry.
    pub async fn remove_waitlist_entry(
        &mut self,
        entry_id: i64,
        booking_id: i64,
    ) -> Result<bool, AppError> {
        self.waitlist_entry(entry_id, Some(booking_id), None).await?;
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;

        self.depart(entry_id, Some(booking_id), None).await
    }

    /// An employee leaving their own waitlist entry.
    pub async fn leave_waitlist(
        &mut self,
        entry_id: i64,
        employee_user_id: i64,
    ) -> Result<bool, AppError> {
        let booking_id = self
            .waitlist_entry(entry_id, None, Some(employee_user_id))
            .await?
            .booking_id;
        self.booking(booking_id).await?;

        self.depart(entry_id, None, Some(employee_user_id)).await
    }

    async fn depart(
        &mut self,
        entry_id: i64,
        booking_scope: Option<i64>,
        owner: Option<i64>,
    ) -> Result<bool, AppError> {
        let entry = self.waitlist_entry(entry_id, booking_scope, owner).await?;
        if !entry.is_active() {
            log::debug!("Waitlist entry {} already left", entry_id);
            return Ok(false);
        }

        self.store.mark_waitlist_left(entry_id, self.now).await?;
        self.reindex_waitlist(entry.booking_id).await?;
        resync_booking_status(&mut self.store, entry.booking_id, self.now).await?;

        log::info!(
            "Employee {} left the waitlist of booking {}",
            entry.employee_user_id,
            entry.booking_id
        );
        Ok(true)
    }

    async fn assign_or_waitlist(
        &mut self,
        booking: &Booking,
        employee_user_id: i64,
    ) -> Result<(), AppError> {
        if self.is_assigned(booking.id, employee_user_id).await? {
            return Ok(());
        }

        if self.has_open_slot(booking).await? {
            self.assign(booking, employee_user_id).await?;
            self.leave_waitlist_for(booking.id, employee_user_id).await?;
        } else {
            self.add_to_waitlist(booking, employee_user_id).await?;
        }
        Ok(())
    }

    async fn assign(
        &mut self,
        booking: &Booking,
        employee_user_id: i64,
    ) -> Result<Assignment, AppError> {
        let rates = self.store.default_rates(employee_user_id).await?;
        let assignment = self
            .store
            .upsert_assigned(booking.id, employee_user_id, &rates, self.now)
            .await?;
        sync_for_assignment(&mut self.store, booking, &assignment, self.now).await?;

        log::info!(
            "Employee {} assigned to booking {}",
            employee_user_id,
            booking.id
        );
        Ok(assignment)
    }

    async fn add_to_waitlist(
        &mut self,
        booking: &Booking,
        employee_user_id: i64,
    ) -> Result<(), AppError> {
        let active = self.store.active_waitlist(booking.id).await?;
        if active
            .iter()
            .any(|entry| entry.employee_user_id == employee_user_id)
        {
            log::debug!(
                "Employee {} already waitlisted on booking {}",
                employee_user_id,
                booking.id
            );
            return Ok(());
        }

        let position = active.iter().map(|entry| entry.position).max().unwrap_or(0) + 1;
        self.store
            .upsert_waitlist_entry(booking.id, employee_user_id, position, self.now)
            .await?;
        self.outbox.push(Notification::booking_waitlisted(
            booking,
            employee_user_id,
            position,
        ));

        log::info!(
            "Employee {} waitlisted on booking {} at position {}",
            employee_user_id,
            booking.id,
            position
        );
        Ok(())
    }

    async fn leave_waitlist_for(
        &mut self,
        booking_id: i64,
        employee_user_id: i64,
    ) -> Result<(), AppError> {
        let active = self.store.active_waitlist(booking_id).await?;
        let mut departed = false;
        for entry in active
            .iter()
            .filter(|entry| entry.employee_user_id == employee_user_id)
        {
            self.store.mark_waitlist_left(entry.id, self.now).await?;
            departed = true;
        }
        if departed {
            self.reindex_waitlist(booking_id).await?;
        }
        Ok(())
    }

    /// Fill free slots from the head of the queue.
    async fn promote_from_waitlist(&mut self, booking: &Booking) -> Result<(), AppError> {
        while self.has_open_slot(booking).await? {
            let Some(next) = self.store.active_waitlist(booking.id).await?.into_iter().next()
            else {
                break;
            };
            self.store.mark_waitlist_left(next.id, self.now).await?;
            self.assign(booking, next.employee_user_id).await?;
        }
        self.reindex_waitlist(booking.id).await
    }

    /// Renumber active entries 1..N, writing only the ones that moved.
    async fn reindex_waitlist(&mut self, booking_id: i64) -> Result<(), AppError> {
        let active = self.store.active_waitlist(booking_id).await?;
        for (index, entry) in active.iter().enumerate() {
            let position = index as i32 + 1;
            if entry.position != position {
                self.store
                    .set_waitlist_position(entry.id, position, self.now)
                    .await?;
            }
        }
        Ok(())
    }

    async fn has_open_slot(&mut self, booking: &Booking) -> Result<bool, AppError> {
        let assigned = self.store.count_assigned(booking.id).await?;
        Ok(assigned < i64::from(booking.required_workers))
    }

    async fn is_assigned(&mut self, booking_id: i64, employee_user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .store
            .find_assignment_for(booking_id, employee_user_id)
            .await?
            .is_some_and(|assignment| assignment.is_assigned()))
    }

    async fn assignment(
        &mut self,
        assignment_id: i64,
        booking_scope: Option<i64>,
    ) -> Result<Assignment, AppError> {
        self.store
            .find_assignment(assignment_id)
            .await?
            .filter(|assignment| booking_scope.is_none_or(|id| assignment.booking_id == id))
            .ok_or_else(|| AppError::NotFound(format!("Assignment {} not found", assignment_id)))
    }

    async fn waitlist_entry(
        &mut self,
        entry_id: i64,
        booking_scope: Option<i64>,
        owner: Option<i64>,
    ) -> Result<WaitlistEntry, AppError> {
        self.store
            .find_waitlist_entry(entry_id)
            .await?
            .filter(|entry| booking_scope.is_none_or(|id| entry.booking_id == id))
            .filter(|entry| owner.is_none_or(|id| entry.employee_user_id == id))
            .ok_or_else(|| AppError::NotFound(format!("Waitlist entry {} not found", entry_id)))
    }

    async fn request(
        &mut self,
        request_id: i64,
        owner: Option<i64>,
    ) -> Result<BookingRequest, AppError> {
        self.store
            .find_request(request_id)
            .await?
            .filter(|request| owner.is_none_or(|id| request.employee_user_id == id))
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", request_id)))
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
