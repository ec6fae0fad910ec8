use chrono::{DateTime, Utc};

use crate::db::Store;
use crate::error::AppError;
use crate::models::otp::EmailRate;

/// Minimum gap between two OTP emails to the same address.
pub const COOLDOWN_SECS: i64 = 300;

/// Claims the right to send an email to `email` now.
///
/// Returns `true` and stamps the address when no email went out within the
/// cooldown window. Returns `false` and leaves the stamp untouched otherwise.
pub async fn try_reserve(store: &dyn Store, email: &str) -> Result<bool, AppError> {
    try_reserve_at(store, email, Utc::now()).await
}

pub async fn try_reserve_at(
    store: &dyn Store,
    email: &str,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    if let Some(rate) = store.find_rate_by_email(email).await? {
        if (now - rate.last_send_at).num_seconds() < COOLDOWN_SECS {
            tracing::debug!("email to {email} suppressed by cooldown");
            return Ok(false);
        }
    }

    store
        .upsert_rate(&EmailRate {
            email: email.to_string(),
            last_send_at: now,
        })
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, SqliteStore};
    use chrono::Duration;

    async fn store() -> SqliteStore {
        SqliteStore::new(create_pool("sqlite::memory:").await.unwrap())
    }

    #[tokio::test]
    async fn test_second_reserve_in_window_is_refused() {
        let store = store().await;
        let first = try_reserve(&store, "jane@example.com").await.unwrap();
        let second = try_reserve(&store, "jane@example.com").await.unwrap();
        assert_eq!((first, second), (true, false));
    }

    #[tokio::test]
    async fn test_refusal_does_not_move_stamp() {
        let store = store().await;
        let start = Utc::now();
        assert!(try_reserve_at(&store, "jane@example.com", start).await.unwrap());
        assert!(!try_reserve_at(&store, "jane@example.com", start + Duration::seconds(299))
            .await
            .unwrap());

        let rate = store.find_rate_by_email("jane@example.com").await.unwrap().unwrap();
        assert_eq!(rate.last_send_at, start);
    }

    #[tokio::test]
    async fn test_reserve_allowed_again_after_cooldown() {
        let store = store().await;
        let start = Utc::now();
        assert!(try_reserve_at(&store, "jane@example.com", start).await.unwrap());

        let later = start + Duration::seconds(COOLDOWN_SECS);
        assert!(try_reserve_at(&store, "jane@example.com", later).await.unwrap());
        let rate = store.find_rate_by_email("jane@example.com").await.unwrap().unwrap();
        assert_eq!(rate.last_send_at, later);
    }

    #[tokio::test]
    async fn test_addresses_are_independent() {
        let store = store().await;
        assert!(try_reserve(&store, "a@example.com").await.unwrap());
        assert!(try_reserve(&store, "b@example.com").await.unwrap());
    }
}
