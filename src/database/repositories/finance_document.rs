use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::{
    models::{DocumentStatus, FinanceDocument, FinanceDocumentLine, NewDocument, NewDocumentLine},
    utils::sql,
};

const DOCUMENT_COLUMNS: &str = r#"
    id,
    type,
    status,
    period_from,
    period_to,
    wage_total,
    price_total,
    margin_total,
    finalized_at,
    created_by,
    finalized_by,
    created_at,
    updated_at
"#;

const LINE_COLUMNS: &str = r#"
    id,
    finance_document_id,
    booking_id,
    company_id,
    employee_user_id,
    description,
    hours_worked,
    wage_total,
    price_total,
    margin_total,
    created_at
"#;

pub const DOCUMENT_LISTING_LIMIT: i64 = 100;

pub async fn insert(
    conn: &mut PgConnection,
    document: &NewDocument,
    now: DateTime<Utc>,
) -> Result<FinanceDocument> {
    let query = format!(
        r#"
        INSERT INTO
            finance_documents (
                type,
                status,
                period_from,
                period_to,
                created_by,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, ?, ?, ?)
        RETURNING {DOCUMENT_COLUMNS}
        "#
    );
    let document = sqlx::query_as::<_, FinanceDocument>(&sql(&query))
        .bind(document.document_type)
        .bind(DocumentStatus::Draft)
        .bind(document.period_from)
        .bind(document.period_to)
        .bind(document.created_by)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(document)
}

pub async fn insert_line(
    conn: &mut PgConnection,
    document_id: i64,
    line: &NewDocumentLine,
    now: DateTime<Utc>,
) -> Result<FinanceDocumentLine> {
    let query = format!(
        r#"
        INSERT INTO
            finance_document_lines (
                finance_document_id,
                booking_id,
                company_id,
                employee_user_id,
                description,
                hours_worked,
                wage_total,
                price_total,
                margin_total,
                created_at
            )
        VALUES
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {LINE_COLUMNS}
        "#
    );
    let line = sqlx::query_as::<_, FinanceDocumentLine>(&sql(&query))
        .bind(document_id)
        .bind(line.booking_id)
        .bind(line.company_id)
        .bind(line.employee_user_id)
        .bind(&line.description)
        .bind(&line.hours_worked)
        .bind(&line.wage_total)
        .bind(&line.price_total)
        .bind(&line.margin_total)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(line)
}

/// Re-derive the document totals from its lines.
pub async fn sync_totals(
    conn: &mut PgConnection,
    document_id: i64,
    now: DateTime<Utc>,
) -> Result<FinanceDocument> {
    let query = format!(
        r#"
        UPDATE
            finance_documents d
        SET
            wage_total = totals.wage_total,
            price_total = totals.price_total,
            margin_total = totals.margin_total,
            updated_at = ?
        FROM
            (
                SELECT
                    COALESCE(SUM(wage_total), 0) AS wage_total,
                    COALESCE(SUM(price_total), 0) AS price_total,
                    COALESCE(SUM(margin_total), 0) AS margin_total
                FROM
                    finance_document_lines
                WHERE
                    finance_document_id = ?
            ) totals
        WHERE
            d.id = ?
        RETURNING {}
        "#,
        prefixed_document_columns()
    );
    let document = sqlx::query_as::<_, FinanceDocument>(&sql(&query))
        .bind(now)
        .bind(document_id)
        .bind(document_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(document)
}

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<FinanceDocument>> {
    let query = format!("SELECT {DOCUMENT_COLUMNS} FROM finance_documents WHERE id = ?");
    let document = sqlx::query_as::<_, FinanceDocument>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(document)
}

pub async fn lock_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<FinanceDocument>> {
    let query = format!("SELECT {DOCUMENT_COLUMNS} FROM finance_documents WHERE id = ? FOR UPDATE");
    let document = sqlx::query_as::<_, FinanceDocument>(&sql(&query))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(document)
}

pub async fn lines(conn: &mut PgConnection, document_id: i64) -> Result<Vec<FinanceDocumentLine>> {
    let query = format!(
        "SELECT {LINE_COLUMNS} FROM finance_document_lines WHERE finance_document_id = ? ORDER BY id"
    );
    let lines = sqlx::query_as::<_, FinanceDocumentLine>(&sql(&query))
        .bind(document_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lines)
}

pub async fn list_recent(conn: &mut PgConnection) -> Result<Vec<FinanceDocument>> {
    let query = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM finance_documents ORDER BY created_at DESC, id DESC LIMIT ?"
    );
    let documents = sqlx::query_as::<_, FinanceDocument>(&sql(&query))
        .bind(DOCUMENT_LISTING_LIMIT)
        .fetch_all(&mut *conn)
        .await?;

    Ok(documents)
}

pub async fn update_status(
    conn: &mut PgConnection,
    id: i64,
    status: DocumentStatus,
    finalized_by: Option<i64>,
    now: DateTime<Utc>,
) -> Result<FinanceDocument> {
    let finalized_at = (status == DocumentStatus::Finalized).then_some(now);
    let query = format!(
        r#"
        UPDATE
            finance_documents
        SET
            status = ?,
            finalized_at = COALESCE(?, finalized_at),
            finalized_by = COALESCE(?, finalized_by),
            updated_at = ?
        WHERE
            id = ?
        RETURNING {DOCUMENT_COLUMNS}
        "#
    );
    let document = sqlx::query_as::<_, FinanceDocument>(&sql(&query))
        .bind(status)
        .bind(finalized_at)
        .bind(finalized_by)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(document)
}

fn prefixed_document_columns() -> String {
    DOCUMENT_COLUMNS
        .split(',')
        .map(|column| format!("d.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
