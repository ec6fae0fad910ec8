use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::activation::session::{read_cookie, ActivationSession, ACTIVATION_COOKIE};
use crate::config::SponsorHeaders;
use crate::models::sponsor::Sponsor;
use crate::state::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reads the sponsor identity the authenticating proxy put on the request.
pub fn sponsor_from_headers(headers: &HeaderMap, names: &SponsorHeaders) -> Option<Sponsor> {
    let identity = header_str(headers, &names.user_header)?.to_string();
    let groups = header_str(headers, &names.groups_header)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Sponsor { identity, groups })
}

/// Rejection type for when auth fails.
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": "unauthorized",
                "message": "sign in to manage invites"
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for Sponsor {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        sponsor_from_headers(&parts.headers, &state.config.sponsor).ok_or(AuthRejection)
    }
}

/// The invitee's activation session, if the request carries a valid one.
/// Never rejects; a missing, tampered or expired cookie reads as `None`.
pub struct ActivationCookie(pub Option<ActivationSession>);

impl FromRequestParts<AppState> for ActivationCookie {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = read_cookie(&parts.headers, ACTIVATION_COOKIE)
            .and_then(|value| state.sealer.open(&value));
        Ok(ActivationCookie(session))
    }
}
