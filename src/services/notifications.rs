use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::database::models::Booking;
use crate::database::repositories::notification as notification_repo;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    BookingApproved {
        booking_id: i64,
        title: String,
        starts_at: DateTime<Utc>,
        approved_by: i64,
    },
    BookingRequest {
        booking_id: i64,
        title: String,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },
    BookingWaitlisted {
        booking_id: i64,
        title: String,
        position: i32,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::BookingApproved { .. } => "booking_approved",
            NotificationEvent::BookingRequest { .. } => "booking_request",
            NotificationEvent::BookingWaitlisted { .. } => "booking_waitlisted",
        }
    }
}

/// One event addressed to a set of users.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipients: Vec<i64>,
    pub event: NotificationEvent,
}

impl Notification {
    pub fn booking_approved(booking: &Booking, approved_by: i64, recipients: Vec<i64>) -> Self {
        Self {
            recipients,
            event: NotificationEvent::BookingApproved {
                booking_id: booking.id,
                title: booking.title.clone(),
                starts_at: booking.starts_at,
                approved_by,
            },
        }
    }

    pub fn booking_request(booking: &Booking, recipients: Vec<i64>) -> Self {
        Self {
            recipients,
            event: NotificationEvent::BookingRequest {
                booking_id: booking.id,
                title: booking.title.clone(),
                starts_at: booking.starts_at,
                ends_at: booking.ends_at,
            },
        }
    }

    pub fn booking_waitlisted(booking: &Booking, employee_user_id: i64, position: i32) -> Self {
        Self {
            recipients: vec![employee_user_id],
            event: NotificationEvent::BookingWaitlisted {
                booking_id: booking.id,
                title: booking.title.clone(),
                position,
            },
        }
    }
}

/// Persists notifications once the unit of work that raised them has committed.
/// Delivery failures are logged and never surface to the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    pool: PgPool,
}

impl NotificationDispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn dispatch(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!(
                    "Dropping {} notifications, no connection: {}",
                    notifications.len(),
                    e
                );
                return;
            }
        };

        let now = Utc::now();
        for notification in notifications {
            let data = match serde_json::to_value(&notification.event) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Failed to encode {} notification: {}", notification.event.kind(), e);
                    continue;
                }
            };
            for recipient in notification.recipients {
                if let Err(e) = notification_repo::insert(
                    &mut conn,
                    recipient,
                    notification.event.kind(),
                    &data,
                    now,
                )
                .await
                {
                    log::warn!(
                        "Failed to deliver {} notification to user {}: {}",
                        notification.event.kind(),
                        recipient,
                        e
                    );
                }
            }
        }
    }
}
