use anyhow::Result;
use sqlx::PgConnection;

use crate::database::{
    models::{EMPLOYEE_ROLE, EmployeeRates, EmployeeSummary},
    utils::sql,
};

/// Profile rates for the employee; both unset when there is no profile.
pub async fn default_rates(conn: &mut PgConnection, employee_user_id: i64) -> Result<EmployeeRates> {
    let rates = sqlx::query_as::<_, EmployeeRates>(&sql(r#"
        SELECT
            hourly_wage,
            hourly_customer_rate
        FROM
            employee_profiles
        WHERE
            user_id = ?
    "#))
    .bind(employee_user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(rates.unwrap_or_default())
}

pub async fn summaries(conn: &mut PgConnection, user_ids: &[i64]) -> Result<Vec<EmployeeSummary>> {
    let employees = sqlx::query_as::<_, EmployeeSummary>(&sql(r#"
        SELECT
            id,
            name,
            email
        FROM
            users
        WHERE
            id = ANY(?)
        ORDER BY
            id
    "#))
    .bind(user_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(employees)
}

pub async fn has_role(conn: &mut PgConnection, user_id: i64, role: &str) -> Result<bool> {
    let has_role: bool = sqlx::query_scalar(&sql(
        "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = ? AND role = ?)",
    ))
    .bind(user_id)
    .bind(role)
    .fetch_one(&mut *conn)
    .await?;

    Ok(has_role)
}

/// Holds the employee role and has an active profile.
pub async fn is_active_employee(conn: &mut PgConnection, user_id: i64) -> Result<bool> {
    let active: bool = sqlx::query_scalar(&sql(r#"
        SELECT
            EXISTS (
                SELECT
                    1
                FROM
                    user_roles r
                    INNER JOIN employee_profiles p ON p.user_id = r.user_id
                WHERE
                    r.user_id = ?
                    AND r.role = ?
                    AND p.is_active = TRUE
            )
    "#))
    .bind(user_id)
    .bind(EMPLOYEE_ROLE)
    .fetch_one(&mut *conn)
    .await?;

    Ok(active)
}

/// Filter the given ids down to active employees, keeping the input order.
pub async fn filter_active_employees(conn: &mut PgConnection, user_ids: &[i64]) -> Result<Vec<i64>> {
    let active: Vec<i64> = sqlx::query_scalar(&sql(r#"
        SELECT
            r.user_id
        FROM
            user_roles r
            INNER JOIN employee_profiles p ON p.user_id = r.user_id
        WHERE
            r.user_id = ANY(?)
            AND r.role = ?
            AND p.is_active = TRUE
    "#))
    .bind(user_ids)
    .bind(EMPLOYEE_ROLE)
    .fetch_all(&mut *conn)
    .await?;

    Ok(user_ids
        .iter()
        .copied()
        .filter(|id| active.contains(id))
        .collect())
}

pub async fn active_employee_ids(conn: &mut PgConnection) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(&sql(r#"
        SELECT
            r.user_id
        FROM
            user_roles r
            INNER JOIN employee_profiles p ON p.user_id = r.user_id
        WHERE
            r.role = ?
            AND p.is_active = TRUE
        ORDER BY
            r.user_id
    "#))
    .bind(EMPLOYEE_ROLE)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}
