use chrono::{DateTime, Utc};

use crate::database::models::{Booking, BookingInput, BookingStatus, BulkOutcome};
use crate::error::AppError;
use crate::services::notifications::Notification;
use crate::services::store::BookingStore;

/// Recompute open/filled from the assigned count. Sticky statuses are left alone.
pub(crate) async fn resync_booking_status<S: BookingStore>(
    store: &mut S,
    booking_id: i64,
    now: DateTime<Utc>,
) -> Result<BookingStatus, AppError> {
    let booking = store
        .lock_booking(booking_id)
        .await?
        .ok_or_else(|| AppError::booking_not_found(booking_id))?;
    if booking.status.is_sticky() {
        return Ok(booking.status);
    }

    let assigned = store.count_assigned(booking_id).await?;
    let status = BookingStatus::from_staffing(assigned, booking.required_workers);
    if status != booking.status {
        store.set_booking_status(booking_id, status, now).await?;
        log::info!(
            "Booking {} status {} -> {}",
            booking_id,
            booking.status,
            status
        );
    }
    Ok(status)
}

pub(crate) fn ensure_editable(booking: &Booking) -> Result<(), AppError> {
    if booking.can_be_edited() {
        Ok(())
    } else {
        Err(AppError::locked())
    }
}

/// Approval, execution and billing transitions of a single booking.
pub struct BookingLifecycle<S> {
    store: S,
    now: DateTime<Utc>,
    outbox: Vec<Notification>,
}

impl<S: BookingStore> BookingLifecycle<S> {
    pub fn new(store: S, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            outbox: Vec::new(),
        }
    }

    pub fn into_notifications(self) -> Vec<Notification> {
        self.outbox
    }

    async fn booking(&mut self, booking_id: i64) -> Result<Booking, AppError> {
        self.store
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::booking_not_found(booking_id))
    }

    pub async fn update(&mut self, booking_id: i64, input: &BookingInput) -> Result<Booking, AppError> {
        input.validate()?;
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;

        let assigned = self.store.count_assigned(booking_id).await?;
        if i64::from(input.required_workers) < assigned {
            return Err(AppError::Conflict(format!(
                "booking has {} assigned employees; cancel assignments before lowering required_workers",
                assigned
            )));
        }

        self.store.update_booking(booking_id, input, self.now).await?;
        resync_booking_status(&mut self.store, booking_id, self.now).await?;
        log::info!("Booking {} updated", booking_id);
        self.booking(booking_id).await
    }

    pub async fn delete(&mut self, booking_id: i64) -> Result<(), AppError> {
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;

        self.store.delete_booking(booking_id).await?;
        log::info!("Booking {} deleted", booking_id);
        Ok(())
    }

    /// Approve the booking and notify `company_contacts` plus every assigned employee.
    pub async fn approve(
        &mut self,
        booking_id: i64,
        approved_by: i64,
        company_contacts: &[i64],
    ) -> Result<Booking, AppError> {
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;
        if !booking.can_be_approved() {
            return Err(AppError::Conflict("booking is already approved".to_string()));
        }

        self.store
            .approve_booking(booking_id, approved_by, self.now)
            .await?;
        let booking = self.booking(booking_id).await?;

        let mut recipients = company_contacts.to_vec();
        for assignment in self.store.assignments_for_booking(booking_id).await? {
            if assignment.is_assigned() && !recipients.contains(&assignment.employee_user_id) {
                recipients.push(assignment.employee_user_id);
            }
        }
        if !recipients.is_empty() {
            self.outbox
                .push(Notification::booking_approved(&booking, approved_by, recipients));
        }

        log::info!("Booking {} approved by user {}", booking_id, approved_by);
        Ok(booking)
    }

    /// Clear approval and execution and fall back to open/filled.
    pub async fn revoke_approval(&mut self, booking_id: i64) -> Result<Booking, AppError> {
        let booking = self.booking(booking_id).await?;
        ensure_editable(&booking)?;
        if !booking.can_approval_be_revoked() {
            return Err(AppError::Conflict("booking is not approved".to_string()));
        }

        let assigned = self.store.count_assigned(booking_id).await?;
        let status = BookingStatus::from_staffing(assigned, booking.required_workers);
        self.store
            .revoke_booking_approval(booking_id, status, self.now)
            .await?;

        log::info!("Approval revoked for booking {}", booking_id);
        self.booking(booking_id).await
    }

    /// Execute every approved booking whose end time has passed. Safe to repeat.
    pub async fn sweep(&mut self) -> Result<u64, AppError> {
        let executed = self.store.mark_executed_due(self.now).await?;
        if executed > 0 {
            log::info!("Marked {} bookings as executed", executed);
        } else {
            log::debug!("No bookings due for execution");
        }
        Ok(executed)
    }

    pub async fn mark_invoiced(&mut self, booking_id: i64) -> Result<Booking, AppError> {
        let booking = self.booking(booking_id).await?;
        if !booking.can_be_invoiced() {
            return Err(AppError::Conflict(
                "booking must be executed and not yet invoiced".to_string(),
            ));
        }
        self.store
            .set_billing_flags(booking_id, true, booking.is_paid, self.now)
            .await?;
        log::info!("Booking {} marked invoiced", booking_id);
        self.booking(booking_id).await
    }

    pub async fn unmark_invoiced(&mut self, booking_id: i64) -> Result<Booking, AppError> {
        let booking = self.booking(booking_id).await?;
        if !booking.can_invoice_be_removed() {
            return Err(AppError::Conflict(
                "only invoiced, unpaid bookings can be un-invoiced".to_string(),
            ));
        }
        self.store
            .set_billing_flags(booking_id, false, false, self.now)
            .await?;
        log::info!("Invoice mark removed from booking {}", booking_id);
        self.booking(booking_id).await
    }

    /// Whether the booking passes the payment gate, timesheets included.
    pub async fn can_pay(&mut self, booking: &Booking) -> Result<bool, AppError> {
        if !booking.can_be_paid() {
            return Ok(false);
        }
        let timesheets = self.store.timesheets_for_booking(booking.id).await?;
        Ok(booking.passes_payment_gate(timesheets.iter().map(|t| &t.status)))
    }

    pub async fn mark_paid(&mut self, booking_id: i64) -> Result<Booking, AppError> {
        let booking = self.booking(booking_id).await?;
        if !self.can_pay(&booking).await? {
            return Err(AppError::Conflict(
                "booking must be executed, invoiced, unpaid and have all timesheets approved"
                    .to_string(),
            ));
        }
        self.store
            .set_billing_flags(booking_id, true, true, self.now)
            .await?;
        log::info!("Booking {} marked paid", booking_id);
        self.booking(booking_id).await
    }

    pub async fn unmark_paid(&mut self, booking_id: i64) -> Result<Booking, AppError> {
        let booking = self.booking(booking_id).await?;
        if !booking.can_payment_be_removed() {
            return Err(AppError::Conflict("booking is not paid".to_string()));
        }
        self.store
            .set_billing_flags(booking_id, booking.is_invoiced, false, self.now)
            .await?;
        log::info!("Payment mark removed from booking {}", booking_id);
        self.booking(booking_id).await
    }

    pub async fn bulk_mark_invoiced(&mut self, booking_ids: &[i64]) -> Result<BulkOutcome, AppError> {
        let mut outcome = BulkOutcome {
            updated: 0,
            skipped: 0,
        };
        for booking_id in dedup_ids(booking_ids) {
            let Some(booking) = self.store.lock_booking(booking_id).await? else {
                continue;
            };
            if booking.can_be_invoiced() {
                self.store
                    .set_billing_flags(booking_id, true, booking.is_paid, self.now)
                    .await?;
                outcome.updated += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        finish_bulk(outcome, "invoiced")
    }

    pub async fn bulk_mark_paid(&mut self, booking_ids: &[i64]) -> Result<BulkOutcome, AppError> {
        let mut outcome = BulkOutcome {
            updated: 0,
            skipped: 0,
        };
        for booking_id in dedup_ids(booking_ids) {
            let Some(booking) = self.store.lock_booking(booking_id).await? else {
                continue;
            };
            if self.can_pay(&booking).await? {
                self.store
                    .set_billing_flags(booking_id, true, true, self.now)
                    .await?;
                outcome.updated += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        finish_bulk(outcome, "paid")
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Positive ids in first-seen order without repeats.
pub(crate) fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if *id > 0 && !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

fn finish_bulk(outcome: BulkOutcome, label: &str) -> Result<BulkOutcome, AppError> {
    if outcome.updated == 0 {
        return Err(AppError::BadRequest(format!(
            "none of the selected bookings could be marked {}",
            label
        )));
    }
    log::info!(
        "Marked {} bookings {} ({} skipped)",
        outcome.updated,
        label,
        outcome.skipped
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{TimesheetStatus, WorkflowStatus};
    use crate::services::notifications::NotificationEvent;
    use crate::test_utils::{
        MemoryStore, booking_fixture, booking_input, executed_booking, test_now, timesheet_fixture,
    };
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn sweep_executes_past_approved_bookings_once() {
        let mut store = MemoryStore::new();
        let mut due = booking_fixture(0, 1);
        due.starts_at = test_now() - Duration::hours(10);
        due.ends_at = test_now() - Duration::hours(2);
        due.approved_at = Some(test_now() - Duration::days(1));
        let due = store.insert_booking(due);

        let mut unapproved = booking_fixture(0, 1);
        unapproved.starts_at = due.starts_at;
        unapproved.ends_at = due.ends_at;
        let unapproved = store.insert_booking(unapproved);

        let mut lifecycle = BookingLifecycle::new(store, test_now());
        assert_eq!(lifecycle.sweep().await.unwrap(), 1);
        assert_eq!(lifecycle.sweep().await.unwrap(), 0);

        let store = lifecycle.store_mut();
        let due = store.booking(due.id);
        assert_eq!(due.executed_at, Some(test_now()));
        assert_eq!(due.status, BookingStatus::Completed);
        assert_eq!(due.workflow_status(), WorkflowStatus::Executed);
        assert_eq!(store.booking(unapproved.id).executed_at, None);
    }

    #[tokio::test]
    async fn approve_notifies_contacts_and_assigned_employees_once() {
        let mut store = MemoryStore::new();
        let booking = store.insert_booking(booking_fixture(0, 2));
        store.assign(booking.id, 10);
        store.assign(booking.id, 11);

        let mut lifecycle = BookingLifecycle::new(store, test_now());
        let approved = lifecycle.approve(booking.id, 1, &[5, 10]).await.unwrap();
        assert!(approved.is_approved());

        let again = lifecycle.approve(booking.id, 1, &[5]).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let notifications = lifecycle.into_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].recipients, vec![5, 10, 11]);
        assert!(matches!(
            notifications[0].event,
            NotificationEvent::BookingApproved { approved_by: 1, .. }
        ));
    }

    #[tokio::test]
    async fn revoke_recomputes_status_from_assignments() {
        let mut store = MemoryStore::new();
        let mut booking = booking_fixture(0, 1);
        booking.approved_at = Some(test_now());
        booking.approved_by = Some(1);
        booking.status = BookingStatus::Open;
        let booking = store.insert_booking(booking);
        store.assign(booking.id, 10);

        let mut lifecycle = BookingLifecycle::new(store, test_now());
        let revoked = lifecycle.revoke_approval(booking.id).await.unwrap();

        assert_eq!(revoked.approved_at, None);
        assert_eq!(revoked.approved_by, None);
        assert_eq!(revoked.status, BookingStatus::Filled);
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_assigned_count() {
        let mut store = MemoryStore::new();
        let booking = store.insert_booking(booking_fixture(0, 2));
        store.assign(booking.id, 10);
        store.assign(booking.id, 11);

        let mut lifecycle = BookingLifecycle::new(store, test_now());
        let mut input = booking_input(&booking);
        input.required_workers = 1;
        assert!(matches!(
            lifecycle.update(booking.id, &input).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(lifecycle.store_mut().booking(booking.id).required_workers, 2);

        input.required_workers = 3;
        input.title = "Night dock".to_string();
        let updated = lifecycle.update(booking.id, &input).await.unwrap();
        assert_eq!(updated.required_workers, 3);
        assert_eq!(updated.title, "Night dock");
        assert_eq!(updated.status, BookingStatus::Open);
        assert_eq!(lifecycle.store_mut().assigned_employees(booking.id), vec![10, 11]);
    }

    #[tokio::test]
    async fn executed_bookings_are_locked() {
        let mut store = MemoryStore::new();
        let booking = store.insert_booking(executed_booking(0, 1));

        let mut lifecycle = BookingLifecycle::new(store, test_now());

        assert!(matches!(
            lifecycle.revoke_approval(booking.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            lifecycle.delete(booking.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn payment_waits_for_every_timesheet() {
        let mut store = MemoryStore::new();
        let mut booking = executed_booking(0, 2);
        booking.is_invoiced = true;
        let booking = store.insert_booking(booking);
        let mut approved = timesheet_fixture(0, booking.id, 10, "8");
        approved.status = TimesheetStatus::Approved;
        store.insert_timesheet(approved);
        let pending = store.insert_timesheet(timesheet_fixture(0, booking.id, 11, "8"));

        let mut lifecycle = BookingLifecycle::new(store, test_now());
        assert!(matches!(
            lifecycle.mark_paid(booking.id).await,
            Err(AppError::Conflict(_))
        ));

        lifecycle
            .store_mut()
            .set_timesheet_status(pending.id, TimesheetStatus::Approved);
        let paid = lifecycle.mark_paid(booking.id).await.unwrap();
        assert!(paid.is_paid);
        assert!(paid.is_invoiced);

        let unpaid = lifecycle.unmark_paid(booking.id).await.unwrap();
        assert!(!unpaid.is_paid);
        assert!(unpaid.is_invoiced);
    }

    #[tokio::test]
    async fn invoice_marks_follow_their_gates() {
        let mut store = MemoryStore::new();
        let booking = store.insert_booking(executed_booking(0, 1));
        let open = store.insert_booking(booking_fixture(0, 1));

        let mut lifecycle = BookingLifecycle::new(store, test_now());
        assert!(matches!(
            lifecycle.mark_invoiced(open.id).await,
            Err(AppError::Conflict(_))
        ));

        let invoiced = lifecycle.mark_invoiced(booking.id).await.unwrap();
        assert!(invoiced.is_invoiced);
        assert!(matches!(
            lifecycle.mark_invoiced(booking.id).await,
            Err(AppError::Conflict(_))
        ));

        let cleared = lifecycle.unmark_invoiced(booking.id).await.unwrap();
        assert!(!cleared.is_invoiced);
    }

    #[tokio::test]
    async fn bulk_marks_report_updated_and_skipped() {
        let mut store = MemoryStore::new();
        let first = store.insert_booking(executed_booking(0, 1));
        let second = store.insert_booking(executed_booking(0, 1));
        let open = store.insert_booking(booking_fixture(0, 1));

        let mut lifecycle = BookingLifecycle::new(store, test_now());
        let outcome = lifecycle
            .bulk_mark_invoiced(&[first.id, second.id, open.id, first.id, 999])
            .await
            .unwrap();
        assert_eq!(outcome, BulkOutcome { updated: 2, skipped: 1 });

        let nothing = lifecycle.bulk_mark_invoiced(&[open.id]).await;
        assert!(matches!(nothing, Err(AppError::BadRequest(_))));

        let paid = lifecycle.bulk_mark_paid(&[first.id, second.id]).await.unwrap();
        assert_eq!(paid, BulkOutcome { updated: 2, skipped: 0 });
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        assert_eq!(dedup_ids(&[3, 1, 3, -2, 0, 1, 7]), vec![3, 1, 7]);
    }
}
