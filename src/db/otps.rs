use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::otp::{OtpChallenge, OtpCode};

type OtpRow = (String, String, i64, String);

fn otp_from_row(row: OtpRow) -> Result<OtpChallenge, AppError> {
    let code = u32::try_from(row.2)
        .ok()
        .and_then(OtpCode::new)
        .ok_or_else(|| AppError::Internal(format!("stored otp {} out of range", row.0)))?;

    Ok(OtpChallenge {
        id: row.0,
        invite_id: row.1,
        code,
        created_at: row.3,
    })
}

pub async fn save_otp(
    pool: &SqlitePool,
    invite_id: &str,
    code: OtpCode,
) -> Result<OtpChallenge, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();

    sqlx::query("INSERT INTO otps (id, invite_id, code, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(invite_id)
        .bind(i64::from(code.value()))
        .bind(&created_at)
        .execute(pool)
        .await?;

    Ok(OtpChallenge {
        id,
        invite_id: invite_id.to_string(),
        code,
        created_at,
    })
}

/// Latest challenge with this code whose invite is still live.
pub async fn find_by_code(
    pool: &SqlitePool,
    code: OtpCode,
) -> Result<Option<OtpChallenge>, AppError> {
    let row = sqlx::query_as::<_, OtpRow>(
        "SELECT o.id, o.invite_id, o.code, o.created_at FROM otps o \
         INNER JOIN invites i ON i.id = o.invite_id \
         WHERE o.code = ? AND i.deleted_at IS NULL \
         ORDER BY o.created_at DESC LIMIT 1",
    )
    .bind(i64::from(code.value()))
    .fetch_optional(pool)
    .await?;

    row.map(otp_from_row).transpose()
}

pub async fn delete_by_code(pool: &SqlitePool, code: OtpCode) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM otps WHERE code = ?")
        .bind(i64::from(code.value()))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
