use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::{
    models::{Booking, BookingInput, BookingStatus, FinanceFilter, FinanceStage},
    utils::sql,
};

const BOOKING_COLUMNS: &str = r#"
    id,
    company_id,
    company_address_id,
    created_by,
    title,
    description,
    starts_at,
    ends_at,
    required_workers,
    assignment_mode,
    show_employee_names_to_company,
    status,
    approved_at,
    approved_by,
    executed_at,
    executed_by,
    is_invoiced,
    is_paid,
    created_at,
    updated_at
"#;

/// Upper bound on rows returned by the finance listing.
pub const FINANCE_LISTING_LIMIT: i64 = 500;

pub async fn create(
    conn: &mut PgConnection,
    input: &BookingInput,
    created_by: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Booking> {
    let query = format!(
        r#"
        INSERT INTO
            bookings (
                company_id,
                company_address_id,
                created_by,
                title,
                description,
                starts_at,
                ends_at,
                required_workers,
                assignment_mode,
                show_employee_names_to_company,
                status,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {BOOKING_COLUMNS}
        "#
    );
    let booking = sqlx::query_as::<_, Booking>(&sql(&query))
        .bind(input.company_id)
        .bind(input.company_address_id)
        .bind(created_by)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.required_workers)
        .bind(input.assignment_mode)
        .bind(input.show_employee_names_to_company)
        .bind(BookingStatus::Open)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(booking)
}

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Booking>> {
    let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?");
    let booking = sqlx::query_as::<_, Booking>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(booking)
}

/// Read the booking and hold its row lock until the transaction ends.
/// Every capacity check runs behind this lock.
pub async fn lock_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Booking>> {
    let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ? FOR UPDATE");
    let booking = sqlx::query_as::<_, Booking>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(booking)
}

/// Lock several bookings in id order so concurrent callers cannot deadlock.
pub async fn lock_many(conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<Booking>> {
    let query = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ANY(?) ORDER BY id FOR UPDATE"
    );
    let bookings = sqlx::query_as::<_, Booking>(&sql(&query))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    Ok(bookings)
}

pub async fn update_details(
    conn: &mut PgConnection,
    id: i64,
    input: &BookingInput,
    now: DateTime<Utc>,
) -> Result<Booking> {
    let query = format!(
        r#"
        UPDATE
            bookings
        SET
            company_id = ?,
            company_address_id = ?,
            title = ?,
            description = ?,
            starts_at = ?,
            ends_at = ?,
            required_workers = ?,
            assignment_mode = ?,
            show_employee_names_to_company = ?,
            updated_at = ?
        WHERE
            id = ?
        RETURNING {BOOKING_COLUMNS}
        "#
    );
    let booking = sqlx::query_as::<_, Booking>(&sql(&query))
        .bind(input.company_id)
        .bind(input.company_address_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.required_workers)
        .bind(input.assignment_mode)
        .bind(input.show_employee_names_to_company)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(booking)
}

pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<bool> {
    let result = sqlx::query(&sql("DELETE FROM bookings WHERE id = ?"))
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_status(
    conn: &mut PgConnection,
    id: i64,
    status: BookingStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(&sql(
        "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?",
    ))
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn approve(
    conn: &mut PgConnection,
    id: i64,
    approved_by: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(&sql(r#"
        UPDATE
            bookings
        SET
            approved_at = ?,
            approved_by = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(now)
    .bind(approved_by)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Clear approval and execution fields and store the recomputed status.
pub async fn revoke_approval(
    conn: &mut PgConnection,
    id: i64,
    status: BookingStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(&sql(r#"
        UPDATE
            bookings
        SET
            approved_at = NULL,
            approved_by = NULL,
            executed_at = NULL,
            executed_by = NULL,
            status = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn set_billing_flags(
    conn: &mut PgConnection,
    id: i64,
    is_invoiced: bool,
    is_paid: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(&sql(r#"
        UPDATE
            bookings
        SET
            is_invoiced = ?,
            is_paid = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(is_invoiced)
    .bind(is_paid)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Mark every approved, unexecuted booking whose end has passed as executed.
/// Returns the number of bookings changed.
pub async fn mark_executed_due(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(&sql(r#"
        UPDATE
            bookings
        SET
            executed_at = ?,
            status = ?,
            updated_at = ?
        WHERE
            approved_at IS NOT NULL
            AND executed_at IS NULL
            AND ends_at < ?
    "#))
    .bind(now)
    .bind(BookingStatus::Completed)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Executed bookings for the finance overview, newest end first.
pub async fn list_executed(
    conn: &mut PgConnection,
    filter: &FinanceFilter,
) -> Result<Vec<Booking>> {
    let stage_clause = match filter.stage.unwrap_or_default() {
        FinanceStage::All => "",
        FinanceStage::Invoicing => "AND is_invoiced = FALSE",
        FinanceStage::Payroll => "AND is_invoiced = TRUE AND is_paid = FALSE",
    };
    let query = format!(
        r#"
        SELECT {BOOKING_COLUMNS}
        FROM
            bookings
        WHERE
            executed_at IS NOT NULL
            {stage_clause}
            AND (?::date IS NULL OR ends_at::date >= ?::date)
            AND (?::date IS NULL OR ends_at::date <= ?::date)
        ORDER BY
            ends_at DESC,
            id DESC
        LIMIT ?
        "#
    );
    let bookings = sqlx::query_as::<_, Booking>(&sql(&query))
        .bind(filter.from_date)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .bind(filter.to_date)
        .bind(FINANCE_LISTING_LIMIT)
        .fetch_all(&mut *conn)
        .await?;

    Ok(bookings)
}

pub async fn find_many(conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<Booking>> {
    let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ANY(?) ORDER BY id");
    let bookings = sqlx::query_as::<_, Booking>(&sql(&query))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    Ok(bookings)
}
