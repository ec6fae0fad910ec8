use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::otp::EmailRate;

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<EmailRate>, AppError> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT email, last_send_at FROM email_rates WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(|(email, stamp)| {
        let last_send_at = DateTime::parse_from_rfc3339(&stamp)
            .map_err(|e| AppError::Internal(format!("invalid send stamp for {email}: {e}")))?
            .with_timezone(&Utc);
        Ok(EmailRate {
            email,
            last_send_at,
        })
    })
    .transpose()
}

pub async fn upsert(pool: &SqlitePool, rate: &EmailRate) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO email_rates (email, last_send_at) VALUES (?, ?) \
         ON CONFLICT(email) DO UPDATE SET last_send_at = excluded.last_send_at",
    )
    .bind(&rate.email)
    .bind(rate.last_send_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_by_email(pool: &SqlitePool, email: &str) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM email_rates WHERE email = ?")
        .bind(email)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
