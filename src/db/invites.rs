use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::invite::{CreateInvite, Invite};

type InviteRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
);

const INVITE_COLUMNS: &str = "id, first_name, last_name, email, state, country, affiliation, inviter, optional_groups, login_names, created_at";

fn decode_list(raw: &str, column: &str) -> Result<Vec<String>, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("invalid {column} column: {e}")))
}

fn invite_from_row(row: InviteRow) -> Result<Invite, AppError> {
    let optional_groups = decode_list(&row.8, "optional_groups")?;
    let login_names = row
        .9
        .as_deref()
        .map(|raw| decode_list(raw, "login_names"))
        .transpose()?;

    Ok(Invite {
        id: row.0,
        first_name: row.1,
        last_name: row.2,
        email: row.3,
        state: row.4,
        country: row.5,
        affiliation: row.6,
        inviter: row.7,
        optional_groups,
        login_names,
        created_at: row.10,
    })
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Invite>, AppError> {
    let row = sqlx::query_as::<_, InviteRow>(&format!(
        "SELECT {INVITE_COLUMNS} FROM invites WHERE email = ? AND deleted_at IS NULL"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(invite_from_row).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Invite>, AppError> {
    let row = sqlx::query_as::<_, InviteRow>(&format!(
        "SELECT {INVITE_COLUMNS} FROM invites WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(invite_from_row).transpose()
}

pub async fn list_by_inviter(pool: &SqlitePool, inviter: &str) -> Result<Vec<Invite>, AppError> {
    let rows = sqlx::query_as::<_, InviteRow>(&format!(
        "SELECT {INVITE_COLUMNS} FROM invites WHERE inviter = ? AND deleted_at IS NULL ORDER BY created_at ASC"
    ))
    .bind(inviter)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(invite_from_row).collect()
}

pub async fn list_live(pool: &SqlitePool) -> Result<Vec<Invite>, AppError> {
    let rows = sqlx::query_as::<_, InviteRow>(&format!(
        "SELECT {INVITE_COLUMNS} FROM invites WHERE deleted_at IS NULL ORDER BY created_at ASC"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(invite_from_row).collect()
}

pub async fn create_invite(
    pool: &SqlitePool,
    input: &CreateInvite,
    inviter: &str,
) -> Result<Invite, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let optional_groups = serde_json::to_string(&input.optional_groups)
        .map_err(|e| AppError::Internal(format!("failed to encode optional groups: {e}")))?;

    let result = sqlx::query(
        "INSERT INTO invites (id, first_name, last_name, email, state, country, affiliation, inviter, optional_groups, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.state)
    .bind(&input.country)
    .bind(&input.affiliation)
    .bind(inviter)
    .bind(&optional_groups)
    .bind(now())
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(AppError::Conflict("User already invited".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("invite {id} vanished after insert")))
}

/// Soft-deletes the live invite for `email`. Safe to repeat.
pub async fn delete_by_email(pool: &SqlitePool, email: &str) -> Result<u64, AppError> {
    let result =
        sqlx::query("UPDATE invites SET deleted_at = ? WHERE email = ? AND deleted_at IS NULL")
            .bind(now())
            .bind(email)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

pub async fn set_login_names(
    pool: &SqlitePool,
    invite_id: &str,
    names: &[String],
) -> Result<(), AppError> {
    let encoded = serde_json::to_string(names)
        .map_err(|e| AppError::Internal(format!("failed to encode login names: {e}")))?;

    let result =
        sqlx::query("UPDATE invites SET login_names = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(&encoded)
            .bind(invite_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("invite not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    fn input(email: &str) -> CreateInvite {
        CreateInvite {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            state: "Ontario".to_string(),
            country: "CAN".to_string(),
            affiliation: "guest".to_string(),
            optional_groups: vec!["vpn".to_string(), "lab".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let created = create_invite(&pool, &input("jane@example.com"), "sponsor")
            .await
            .unwrap();

        let by_email = find_by_email(&pool, "jane@example.com").await.unwrap().unwrap();
        assert_eq!(by_email, created);
        assert_eq!(by_email.optional_groups, vec!["vpn", "lab"]);
        assert!(by_email.login_names.is_none());

        let by_id = find_by_id(&pool, &created.id).await.unwrap().unwrap();
        assert_eq!(by_id.inviter, "sponsor");
    }

    #[tokio::test]
    async fn test_one_live_invite_per_email() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        create_invite(&pool, &input("jane@example.com"), "sponsor")
            .await
            .unwrap();

        let err = create_invite(&pool, &input("jane@example.com"), "other")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Once the first one is gone the address can be invited again.
        assert_eq!(delete_by_email(&pool, "jane@example.com").await.unwrap(), 1);
        create_invite(&pool, &input("jane@example.com"), "other")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_hides_invite() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let created = create_invite(&pool, &input("jane@example.com"), "sponsor")
            .await
            .unwrap();

        assert_eq!(delete_by_email(&pool, "jane@example.com").await.unwrap(), 1);
        assert_eq!(delete_by_email(&pool, "jane@example.com").await.unwrap(), 0);
        assert!(find_by_id(&pool, &created.id).await.unwrap().is_none());
        assert!(list_by_inviter(&pool, "sponsor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_login_names() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let created = create_invite(&pool, &input("jane@example.com"), "sponsor")
            .await
            .unwrap();

        let names = vec!["janedoe".to_string(), "jadoe".to_string()];
        set_login_names(&pool, &created.id, &names).await.unwrap();

        let invite = find_by_id(&pool, &created.id).await.unwrap().unwrap();
        assert_eq!(invite.login_names, Some(names));

        let err = set_login_names(&pool, "missing", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_by_inviter() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        create_invite(&pool, &input("a@example.com"), "alice").await.unwrap();
        create_invite(&pool, &input("b@example.com"), "alice").await.unwrap();
        create_invite(&pool, &input("c@example.com"), "bob").await.unwrap();

        let alice = list_by_inviter(&pool, "alice").await.unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(list_live(&pool).await.unwrap().len(), 3);
    }
}
