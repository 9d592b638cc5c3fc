mod admin;
mod auth;
mod client_auth;
pub(crate) mod oauth;
mod users;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Cookie holding the single-slot post-login redirect. Overwritten on
/// every authorization attempt, cleared once consumed.
pub(crate) const REDIRECT_COOKIE: &str = "post_auth_redirect";

/// Combines all routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/discord", get(auth::login))
        .route("/auth/discord/callback", get(auth::callback))
        .route("/auth/fail", get(auth::fail))
        .route("/auth/logout", get(auth::logout))
        .merge(oauth::router())
        .route("/api/userinfo", get(users::userinfo))
        .route("/api/userByJiraKey", get(users::user_by_jira_key))
        .route("/api/userByDiscordId", get(users::user_by_discord_id))
        .route(
            "/admin/application",
            post(admin::create_application)
                .get(admin::get_application)
                .delete(admin::delete_application),
        )
        .route(
            "/admin/groupLink",
            post(admin::create_group_link)
                .get(admin::get_group_link)
                .delete(admin::delete_group_link),
        )
}
