use sqlx::{PgPool, Postgres, Transaction};

use crate::error::AppError;

pub type Tx = Transaction<'static, Postgres>;

pub async fn begin(pool: &PgPool) -> Result<Tx, AppError> {
    Ok(pool.begin().await?)
}

/// Commit on success; on failure roll back and hand the original error back.
pub async fn finish<T>(tx: Tx, result: Result<T, AppError>) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            log::warn!("Transaction failed with error: {}, rolling back", err);
            if let Err(rollback_err) = tx.rollback().await {
                log::error!(
                    "Rollback failed after error (orig: {}, rollback: {})",
                    err,
                    rollback_err
                );
            }
            Err(err)
        }
    }
}
