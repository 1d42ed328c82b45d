use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::{
    models::{BookingRequest, EmployeeRequestView, RequestStatus},
    utils::sql,
};

const REQUEST_COLUMNS: &str = r#"
    id,
    booking_id,
    employee_user_id,
    status,
    responded_at,
    created_at,
    updated_at
"#;

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<BookingRequest>> {
    let query = format!("SELECT {REQUEST_COLUMNS} FROM booking_requests WHERE id = ?");
    let request = sqlx::query_as::<_, BookingRequest>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(request)
}

pub async fn list_for_booking(
    conn: &mut PgConnection,
    booking_id: i64,
) -> Result<Vec<BookingRequest>> {
    let query = format!(
        "SELECT {REQUEST_COLUMNS} FROM booking_requests WHERE booking_id = ? ORDER BY id"
    );
    let requests = sqlx::query_as::<_, BookingRequest>(&sql(&query))
        .bind(booking_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(requests)
}

/// Create the request, or reset a previous one back to pending.
pub async fn upsert_pending(
    conn: &mut PgConnection,
    booking_id: i64,
    employee_user_id: i64,
    now: DateTime<Utc>,
) -> Result<BookingRequest> {
    let query = format!(
        r#"
        INSERT INTO
            booking_requests (
                booking_id,
                employee_user_id,
                status,
                responded_at,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, NULL, ?, ?)
        ON CONFLICT (booking_id, employee_user_id) DO UPDATE
        SET
            status = EXCLUDED.status,
            responded_at = NULL,
            updated_at = EXCLUDED.updated_at
        RETURNING {REQUEST_COLUMNS}
        "#
    );
    let request = sqlx::query_as::<_, BookingRequest>(&sql(&query))
        .bind(booking_id)
        .bind(employee_user_id)
        .bind(RequestStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(request)
}

pub async fn update_status(
    conn: &mut PgConnection,
    id: i64,
    status: RequestStatus,
    responded_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(&sql(r#"
        UPDATE
            booking_requests
        SET
            status = ?,
            responded_at = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(status)
    .bind(responded_at)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Requests addressed to one employee, with the booking and their current
/// waitlist position when they are queued.
pub async fn list_for_employee(
    conn: &mut PgConnection,
    employee_user_id: i64,
) -> Result<Vec<EmployeeRequestView>> {
    let requests = sqlx::query_as::<_, EmployeeRequestView>(&sql(r#"
        SELECT
            r.id,
            r.booking_id,
            r.status,
            r.responded_at,
            r.created_at,
            b.title AS booking_title,
            b.starts_at AS booking_starts_at,
            b.ends_at AS booking_ends_at,
            b.status AS booking_status,
            c.name AS company_name,
            w.id AS waitlist_entry_id,
            w.position AS waitlist_position
        FROM
            booking_requests r
            INNER JOIN bookings b ON b.id = r.booking_id
            INNER JOIN companies c ON c.id = b.company_id
            LEFT JOIN booking_waitlist w ON w.booking_id = r.booking_id
            AND w.employee_user_id = r.employee_user_id
            AND w.left_at IS NULL
        WHERE
            r.employee_user_id = ?
        ORDER BY
            b.starts_at DESC,
            r.id DESC
    "#))
    .bind(employee_user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(requests)
}
