use anyhow::Result;
use sqlx::PgConnection;

use crate::database::utils::sql;

pub async fn exists(conn: &mut PgConnection, company_id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(&sql(
        "SELECT EXISTS (SELECT 1 FROM companies WHERE id = ?)",
    ))
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

pub async fn address_belongs_to(
    conn: &mut PgConnection,
    address_id: i64,
    company_id: i64,
) -> Result<bool> {
    let belongs: bool = sqlx::query_scalar(&sql(r#"
        SELECT
            EXISTS (
                SELECT
                    1
                FROM
                    company_addresses
                WHERE
                    id = ?
                    AND company_id = ?
            )
    "#))
    .bind(address_id)
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(belongs)
}

/// Names for a set of companies, as (id, name) pairs.
pub async fn names(conn: &mut PgConnection, company_ids: &[i64]) -> Result<Vec<(i64, String)>> {
    let names = sqlx::query_as::<_, (i64, String)>(&sql(
        "SELECT id, name FROM companies WHERE id = ANY(?)",
    ))
    .bind(company_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(names)
}

/// Users attached to the company; they receive booking notifications.
pub async fn contact_user_ids(conn: &mut PgConnection, company_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(&sql(r#"
        SELECT
            user_id
        FROM
            company_user
        WHERE
            company_id = ?
        ORDER BY
            user_id
    "#))
    .bind(company_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}
