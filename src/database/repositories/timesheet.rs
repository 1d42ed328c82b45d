use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::{
    models::{Timesheet, TimesheetUpsert},
    utils::sql,
};

const TIMESHEET_COLUMNS: &str = r#"
    id,
    booking_id,
    employee_user_id,
    hours_worked,
    hourly_wage,
    hourly_price,
    wage_total,
    price_total,
    status,
    created_at,
    updated_at
"#;

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Timesheet>> {
    let query = format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE id = ?");
    let timesheet = sqlx::query_as::<_, Timesheet>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(timesheet)
}

pub async fn find_for_employee(
    conn: &mut PgConnection,
    booking_id: i64,
    employee_user_id: i64,
) -> Result<Option<Timesheet>> {
    let query = format!(
        "SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE booking_id = ? AND employee_user_id = ?"
    );
    let timesheet = sqlx::query_as::<_, Timesheet>(&sql(&query))
        .bind(booking_id)
        .bind(employee_user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(timesheet)
}

pub async fn list_for_booking(conn: &mut PgConnection, booking_id: i64) -> Result<Vec<Timesheet>> {
    let query =
        format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE booking_id = ? ORDER BY id");
    let timesheets = sqlx::query_as::<_, Timesheet>(&sql(&query))
        .bind(booking_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(timesheets)
}

pub async fn list_for_bookings(
    conn: &mut PgConnection,
    booking_ids: &[i64],
) -> Result<Vec<Timesheet>> {
    let query = format!(
        "SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE booking_id = ANY(?) ORDER BY booking_id, id"
    );
    let timesheets = sqlx::query_as::<_, Timesheet>(&sql(&query))
        .bind(booking_ids)
        .fetch_all(&mut *conn)
        .await?;

    Ok(timesheets)
}

pub async fn upsert(
    conn: &mut PgConnection,
    timesheet: &TimesheetUpsert,
    now: DateTime<Utc>,
) -> Result<Timesheet> {
    let query = format!(
        r#"
        INSERT INTO
            timesheets (
                booking_id,
                employee_user_id,
                hours_worked,
                hourly_wage,
                hourly_price,
                wage_total,
                price_total,
                status,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (booking_id, employee_user_id) DO UPDATE
        SET
            hours_worked = EXCLUDED.hours_worked,
            hourly_wage = EXCLUDED.hourly_wage,
            hourly_price = EXCLUDED.hourly_price,
            wage_total = EXCLUDED.wage_total,
            price_total = EXCLUDED.price_total,
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        RETURNING {TIMESHEET_COLUMNS}
        "#
    );
    let timesheet = sqlx::query_as::<_, Timesheet>(&sql(&query))
        .bind(timesheet.booking_id)
        .bind(timesheet.employee_user_id)
        .bind(&timesheet.hours_worked)
        .bind(&timesheet.hourly_wage)
        .bind(&timesheet.hourly_price)
        .bind(&timesheet.wage_total)
        .bind(&timesheet.price_total)
        .bind(timesheet.status)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(timesheet)
}
