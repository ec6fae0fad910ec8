use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::activation::session::{clear_cookie, set_cookie, ActivationSession};
use crate::error::AppError;
use crate::middleware::auth::ActivationCookie;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpSubmission {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub invite_id: String,
    pub login_name: String,
}

fn session_cookie(state: &AppState, session: &ActivationSession) -> Result<String, AppError> {
    let sealed = state.sealer.seal(session)?;
    Ok(set_cookie(
        &sealed,
        state.sealer.ttl_secs(),
        state.secure_cookies(),
    ))
}

pub async fn request_otp(
    state: State<AppState>,
    Json(input): Json<OtpRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = state.activation().request_otp(&input.email).await?;
    Ok(Json(json!({
        "data": {
            "email": outcome.email,
            "email_not_resent": outcome.email_not_resent,
        }
    })))
}

pub async fn verify_otp(
    state: State<AppState>,
    Json(input): Json<OtpSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let verified = state
        .activation()
        .verify_otp(&input.email, &input.code)
        .await?;
    let cookie = session_cookie(&state, &verified.session)?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({
            "data": {
                "invite_id": verified.invite_id,
                "login_names": verified.login_names,
            }
        })),
    ))
}

pub async fn create_account(
    state: State<AppState>,
    ActivationCookie(session): ActivationCookie,
    Json(input): Json<AccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .activation()
        .finalize_account(session.as_ref(), &input.invite_id, &input.login_name)
        .await?;

    let cookie = session_cookie(&state, &ActivationSession::provisioned(&input.invite_id))?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({
            "data": {
                "invite_id": input.invite_id,
                "next": format!("/api/v1/activate/success/{}", input.invite_id),
            }
        })),
    ))
}

pub async fn account_created(
    state: State<AppState>,
    Path(invite_id): Path<String>,
    ActivationCookie(session): ActivationCookie,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .activation()
        .take_credential(session.as_ref(), &invite_id)?;

    Ok((
        [(SET_COOKIE, clear_cookie(state.secure_cookies()))],
        Json(json!({
            "data": {
                "first_name": account.first_name,
                "login_name": account.login_name,
                "password": account.password,
                "login_redirect": state.config.site.login_redirect,
            }
        })),
    ))
}
