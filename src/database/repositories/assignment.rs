use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::{
    models::{Assignment, AssignmentStatus, EmployeeRates},
    utils::sql,
};

const ASSIGNMENT_COLUMNS: &str = r#"
    id,
    booking_id,
    employee_user_id,
    status,
    assigned_at,
    cancelled_at,
    worker_rate,
    customer_rate,
    created_at,
    updated_at
"#;

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Assignment>> {
    let query = format!("SELECT {ASSIGNMENT_COLUMNS} FROM booking_assignments WHERE id = ?");
    let assignment = sqlx::query_as::<_, Assignment>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(assignment)
}

pub async fn find_for_employee(
    conn: &mut PgConnection,
    booking_id: i64,
    employee_user_id: i64,
) -> Result<Option<Assignment>> {
    let query = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM booking_assignments WHERE booking_id = ? AND employee_user_id = ?"
    );
    let assignment = sqlx::query_as::<_, Assignment>(&sql(&query))
        .bind(booking_id)
        .bind(employee_user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(assignment)
}

pub async fn count_assigned(conn: &mut PgConnection, booking_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&sql(r#"
        SELECT
            COUNT(*)
        FROM
            booking_assignments
        WHERE
            booking_id = ?
            AND status = ?
    "#))
    .bind(booking_id)
    .bind(AssignmentStatus::Assigned)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

pub async fn list_for_booking(conn: &mut PgConnection, booking_id: i64) -> Result<Vec<Assignment>> {
    let query = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM booking_assignments WHERE booking_id = ? ORDER BY id"
    );
    let assignments = sqlx::query_as::<_, Assignment>(&sql(&query))
        .bind(booking_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(assignments)
}

/// Assigned rows for a set of bookings, used by the finance rollups.
pub async fn list_assigned_for_bookings(
    conn: &mut PgConnection,
    booking_ids: &[i64],
) -> Result<Vec<Assignment>> {
    let query = format!(
        r#"
        SELECT {ASSIGNMENT_COLUMNS}
        FROM
            booking_assignments
        WHERE
            booking_id = ANY(?)
            AND status = ?
        ORDER BY
            booking_id,
            id
        "#
    );
    let assignments = sqlx::query_as::<_, Assignment>(&sql(&query))
        .bind(booking_ids)
        .bind(AssignmentStatus::Assigned)
        .fetch_all(&mut *conn)
        .await?;

    Ok(assignments)
}

/// Create or reactivate the (booking, employee) assignment with fresh rate snapshots.
pub async fn upsert_assigned(
    conn: &mut PgConnection,
    booking_id: i64,
    employee_user_id: i64,
    rates: &EmployeeRates,
    now: DateTime<Utc>,
) -> Result<Assignment> {
    let query = format!(
        r#"
        INSERT INTO
            booking_assignments (
                booking_id,
                employee_user_id,
                status,
                assigned_at,
                cancelled_at,
                worker_rate,
                customer_rate,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, NULL, ?, ?, ?, ?)
        ON CONFLICT (booking_id, employee_user_id) DO UPDATE
        SET
            status = EXCLUDED.status,
            assigned_at = EXCLUDED.assigned_at,
            cancelled_at = NULL,
            worker_rate = EXCLUDED.worker_rate,
            customer_rate = EXCLUDED.customer_rate,
            updated_at = EXCLUDED.updated_at
        RETURNING {ASSIGNMENT_COLUMNS}
        "#
    );
    let assignment = sqlx::query_as::<_, Assignment>(&sql(&query))
        .bind(booking_id)
        .bind(employee_user_id)
        .bind(AssignmentStatus::Assigned)
        .bind(now)
        .bind(&rates.hourly_wage)
        .bind(&rates.hourly_customer_rate)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(assignment)
}

pub async fn cancel(conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(&sql(r#"
        UPDATE
            booking_assignments
        SET
            status = ?,
            cancelled_at = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(AssignmentStatus::Cancelled)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn update_rates(
    conn: &mut PgConnection,
    id: i64,
    worker_rate: Option<&BigDecimal>,
    customer_rate: Option<&BigDecimal>,
    now: DateTime<Utc>,
) -> Result<Assignment> {
    let query = format!(
        r#"
        UPDATE
            booking_assignments
        SET
            worker_rate = ?,
            customer_rate = ?,
            updated_at = ?
        WHERE
            id = ?
        RETURNING {ASSIGNMENT_COLUMNS}
        "#
    );
    let assignment = sqlx::query_as::<_, Assignment>(&sql(&query))
        .bind(worker_rate)
        .bind(customer_rate)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(assignment)
}
