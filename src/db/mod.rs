pub mod email_rates;
pub mod invites;
pub mod otps;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::models::invite::{CreateInvite, Invite};
use crate::models::otp::{EmailRate, OtpChallenge, OtpCode};

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    tracing::debug!("database ready at {database_url}");

    Ok(pool)
}

/// Persistence for invites, OTP challenges and email send stamps.
///
/// Invite lookups only ever see live (not deleted) invites.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_invite_by_email(&self, email: &str) -> Result<Option<Invite>, AppError>;
    async fn find_invite_by_id(&self, id: &str) -> Result<Option<Invite>, AppError>;
    async fn create_invite(&self, input: &CreateInvite, inviter: &str)
        -> Result<Invite, AppError>;
    /// Returns the number of invites deleted; zero when none was live.
    async fn delete_invite_by_email(&self, email: &str) -> Result<u64, AppError>;
    async fn list_invites_by_inviter(&self, inviter: &str) -> Result<Vec<Invite>, AppError>;
    async fn set_login_names(&self, invite_id: &str, names: &[String]) -> Result<(), AppError>;

    async fn save_otp(&self, invite_id: &str, code: OtpCode) -> Result<OtpChallenge, AppError>;
    async fn find_otp_by_code(&self, code: OtpCode) -> Result<Option<OtpChallenge>, AppError>;
    async fn delete_otp(&self, code: OtpCode) -> Result<u64, AppError>;

    async fn find_rate_by_email(&self, email: &str) -> Result<Option<EmailRate>, AppError>;
    async fn upsert_rate(&self, rate: &EmailRate) -> Result<(), AppError>;
    async fn delete_rate(&self, email: &str) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_invite_by_email(&self, email: &str) -> Result<Option<Invite>, AppError> {
        invites::find_by_email(&self.pool, email).await
    }

    async fn find_invite_by_id(&self, id: &str) -> Result<Option<Invite>, AppError> {
        invites::find_by_id(&self.pool, id).await
    }

    async fn create_invite(
        &self,
        input: &CreateInvite,
        inviter: &str,
    ) -> Result<Invite, AppError> {
        invites::create_invite(&self.pool, input, inviter).await
    }

    async fn delete_invite_by_email(&self, email: &str) -> Result<u64, AppError> {
        invites::delete_by_email(&self.pool, email).await
    }

    async fn list_invites_by_inviter(&self, inviter: &str) -> Result<Vec<Invite>, AppError> {
        invites::list_by_inviter(&self.pool, inviter).await
    }

    async fn set_login_names(&self, invite_id: &str, names: &[String]) -> Result<(), AppError> {
        invites::set_login_names(&self.pool, invite_id, names).await
    }

    async fn save_otp(&self, invite_id: &str, code: OtpCode) -> Result<OtpChallenge, AppError> {
        otps::save_otp(&self.pool, invite_id, code).await
    }

    async fn find_otp_by_code(&self, code: OtpCode) -> Result<Option<OtpChallenge>, AppError> {
        otps::find_by_code(&self.pool, code).await
    }

    async fn delete_otp(&self, code: OtpCode) -> Result<u64, AppError> {
        otps::delete_by_code(&self.pool, code).await
    }

    async fn find_rate_by_email(&self, email: &str) -> Result<Option<EmailRate>, AppError> {
        email_rates::find_by_email(&self.pool, email).await
    }

    async fn upsert_rate(&self, rate: &EmailRate) -> Result<(), AppError> {
        email_rates::upsert(&self.pool, rate).await
    }

    async fn delete_rate(&self, email: &str) -> Result<u64, AppError> {
        email_rates::delete_by_email(&self.pool, email).await
    }
}
