use rand::rngs::OsRng;

use crate::db::Store;
use crate::error::AppError;
use crate::models::otp::OtpCode;

/// Issues a fresh code for the live invite of `email`.
pub async fn issue(store: &dyn Store, email: &str) -> Result<OtpCode, AppError> {
    let invite = store
        .find_invite_by_email(email)
        .await?
        .ok_or_else(|| AppError::NotFound("invite not found".to_string()))?;

    let code = OtpCode::random(&mut OsRng);
    store.save_otp(&invite.id, code).await?;
    tracing::info!(invite_id = %invite.id, "otp issued");
    Ok(code)
}

/// Returns the invite id the code was issued for, or `None` when no live
/// challenge carries that code.
///
/// Matching is by code alone; `email` is not consulted.
pub async fn validate(
    store: &dyn Store,
    _email: &str,
    code: &str,
) -> Result<Option<String>, AppError> {
    let Some(code) = OtpCode::parse(code) else {
        return Ok(None);
    };

    Ok(store
        .find_otp_by_code(code)
        .await?
        .map(|challenge| challenge.invite_id))
}

/// Consumes the code and clears the send stamp for `email`. Repeatable.
pub async fn claim(store: &dyn Store, email: &str, code: &str) -> Result<(), AppError> {
    if let Some(code) = OtpCode::parse(code) {
        store.delete_otp(code).await?;
    }
    store.delete_rate(email).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, SqliteStore};
    use crate::email_rate;
    use crate::models::invite::CreateInvite;

    async fn store_with_invite(email: &str) -> (SqliteStore, String) {
        let store = SqliteStore::new(create_pool("sqlite::memory:").await.unwrap());
        let invite = store
            .create_invite(
                &CreateInvite {
                    first_name: "Jane".to_string(),
                    last_name: "Doe".to_string(),
                    email: email.to_string(),
                    state: "Ontario".to_string(),
                    country: "CAN".to_string(),
                    affiliation: "guest".to_string(),
                    optional_groups: vec![],
                },
                "sponsor",
            )
            .await
            .unwrap();
        (store, invite.id)
    }

    #[tokio::test]
    async fn test_issue_then_validate_then_claim() {
        let (store, invite_id) = store_with_invite("jane.doe@example.com").await;
        let code = issue(&store, "jane.doe@example.com").await.unwrap();
        let entered = code.to_string();

        let found = validate(&store, "jane.doe@example.com", &entered)
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some(invite_id.as_str()));

        // Validation alone does not consume the code.
        assert!(validate(&store, "jane.doe@example.com", &entered)
            .await
            .unwrap()
            .is_some());

        claim(&store, "jane.doe@example.com", &entered).await.unwrap();
        assert!(validate(&store, "jane.doe@example.com", &entered)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_issue_without_invite_is_not_found() {
        let (store, _) = store_with_invite("jane.doe@example.com").await;
        let err = issue(&store, "nobody@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_code_is_invalid() {
        let (store, _) = store_with_invite("jane.doe@example.com").await;
        issue(&store, "jane.doe@example.com").await.unwrap();
        assert!(validate(&store, "jane.doe@example.com", "abc")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_claim_clears_rate_stamp_and_is_repeatable() {
        let (store, _) = store_with_invite("jane.doe@example.com").await;
        let code = issue(&store, "jane.doe@example.com").await.unwrap();
        assert!(email_rate::try_reserve(&store, "jane.doe@example.com")
            .await
            .unwrap());

        claim(&store, "jane.doe@example.com", &code.to_string())
            .await
            .unwrap();
        claim(&store, "jane.doe@example.com", &code.to_string())
            .await
            .unwrap();

        assert!(store
            .find_rate_by_email("jane.doe@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
