use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::database::utils::sql;

pub async fn insert(
    conn: &mut PgConnection,
    user_id: i64,
    notification_type: &str,
    data: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(&sql(r#"
        INSERT INTO
            notifications (
                user_id,
                type,
                data,
                created_at
            )
        VALUES
            (?, ?, ?, ?)
    "#))
    .bind(user_id)
    .bind(notification_type)
    .bind(data)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
