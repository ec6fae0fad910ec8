use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::countries;
use crate::error::AppError;
use crate::models::invite::CreateInvite;
use crate::models::sponsor::Sponsor;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RevokeInvite {
    pub email: String,
}

pub async fn invite_options(
    state: State<AppState>,
    sponsor: Sponsor,
) -> Result<Json<serde_json::Value>, AppError> {
    let groups = state
        .directory
        .grantable_groups(&sponsor, &state.config.optional_groups)
        .await?;
    let affiliations: Vec<_> = state
        .config
        .affiliations
        .iter()
        .map(|(key, name)| json!({ "key": key, "name": name }))
        .collect();

    Ok(Json(json!({
        "data": {
            "affiliations": affiliations,
            "countries": countries::all(),
            "optional_groups": groups,
        }
    })))
}

pub async fn create_invite(
    state: State<AppState>,
    sponsor: Sponsor,
    Json(input): Json<CreateInvite>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let input = input.normalized();
    input.validate(&state.config.affiliations)?;

    if state.store.find_invite_by_email(&input.email).await?.is_some() {
        return Err(AppError::Conflict("User already invited".to_string()));
    }
    if state.directory.email_exists(&input.email).await? {
        return Err(AppError::Conflict("User already has an account".to_string()));
    }

    if !input.optional_groups.is_empty() {
        let grantable = state
            .directory
            .grantable_groups(&sponsor, &state.config.optional_groups)
            .await?;
        if let Some(denied) = input
            .optional_groups
            .iter()
            .find(|key| !grantable.iter().any(|g| &g.key == *key))
        {
            tracing::warn!(sponsor = %sponsor.identity, group = %denied, "ungrantable group requested");
            return Err(AppError::Forbidden(format!(
                "you may not add invitees to {denied}"
            )));
        }
    }

    let invite = state.store.create_invite(&input, &sponsor.identity).await?;
    tracing::info!(invite_id = %invite.id, sponsor = %sponsor.identity, "invite created");

    // The invite stands even if the email fails; the invitee can still
    // request a code from the activation page.
    let email_sent = match state.mailer.send_invite_email(&invite.email, &invite).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(invite_id = %invite.id, "invite email not sent: {e}");
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": { "invite": invite, "email_sent": email_sent } })),
    ))
}

pub async fn list_sent(
    state: State<AppState>,
    sponsor: Sponsor,
) -> Result<Json<serde_json::Value>, AppError> {
    let invites = state.store.list_invites_by_inviter(&sponsor.identity).await?;
    Ok(Json(json!({ "data": invites })))
}

pub async fn revoke_invite(
    state: State<AppState>,
    sponsor: Sponsor,
    Json(input): Json<RevokeInvite>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = input.email.trim().to_lowercase();
    let invite = state
        .store
        .find_invite_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("invite not found".to_string()))?;

    if invite.inviter != sponsor.identity {
        return Err(AppError::Forbidden("Not your invite".to_string()));
    }

    state.store.delete_invite_by_email(&email).await?;
    tracing::info!(invite_id = %invite.id, sponsor = %sponsor.identity, "invite revoked");
    Ok(Json(json!({ "data": null })))
}
