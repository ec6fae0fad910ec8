mod activate;
mod health;
mod invites;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Invitee activation (public)
        .route("/activate", post(activate::request_otp))
        .route("/activate/otp", post(activate::verify_otp))
        .route("/activate/account", post(activate::create_account))
        .route(
            "/activate/success/{invite_id}",
            get(activate::account_created),
        )
        // Sponsor invites (proxy identity required)
        .route("/invites", post(invites::create_invite))
        .route("/invites/options", get(invites::invite_options))
        .route("/invites/sent", get(invites::list_sent))
        .route("/invites/sent/delete", post(invites::revoke_invite))
        // Version
        .route("/version", get(health::version))
}
