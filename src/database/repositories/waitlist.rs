use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::{models::WaitlistEntry, utils::sql};

const WAITLIST_COLUMNS: &str = r#"
    id,
    booking_id,
    employee_user_id,
    position,
    joined_at,
    left_at,
    created_at,
    updated_at
"#;

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<WaitlistEntry>> {
    let query = format!("SELECT {WAITLIST_COLUMNS} FROM booking_waitlist WHERE id = ?");
    let entry = sqlx::query_as::<_, WaitlistEntry>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(entry)
}

/// Active entries in queue order.
pub async fn list_active(conn: &mut PgConnection, booking_id: i64) -> Result<Vec<WaitlistEntry>> {
    let query = format!(
        r#"
        SELECT {WAITLIST_COLUMNS}
        FROM
            booking_waitlist
        WHERE
            booking_id = ?
            AND left_at IS NULL
        ORDER BY
            position,
            id
        "#
    );
    let entries = sqlx::query_as::<_, WaitlistEntry>(&sql(&query))
        .bind(booking_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(entries)
}

/// Insert the entry, or reactivate a departed one at the given position.
pub async fn upsert_active(
    conn: &mut PgConnection,
    booking_id: i64,
    employee_user_id: i64,
    position: i32,
    now: DateTime<Utc>,
) -> Result<WaitlistEntry> {
    let query = format!(
        r#"
        INSERT INTO
            booking_waitlist (
                booking_id,
                employee_user_id,
                position,
                joined_at,
                left_at,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, NULL, ?, ?)
        ON CONFLICT (booking_id, employee_user_id) DO UPDATE
        SET
            position = EXCLUDED.position,
            joined_at = EXCLUDED.joined_at,
            left_at = NULL,
            updated_at = EXCLUDED.updated_at
        RETURNING {WAITLIST_COLUMNS}
        "#
    );
    let entry = sqlx::query_as::<_, WaitlistEntry>(&sql(&query))
        .bind(booking_id)
        .bind(employee_user_id)
        .bind(position)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(entry)
}

pub async fn mark_left(conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(&sql(r#"
        UPDATE
            booking_waitlist
        SET
            left_at = ?,
            updated_at = ?
        WHERE
            id = ?
            AND left_at IS NULL
    "#))
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn update_position(
    conn: &mut PgConnection,
    id: i64,
    position: i32,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(&sql(
        "UPDATE booking_waitlist SET position = ?, updated_at = ? WHERE id = ?",
    ))
    .bind(position)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
