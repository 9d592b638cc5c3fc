//! Login, callback, and logout routes: the identity gate.
//!
//! Login is delegated to Discord's authorization-code flow. The callback
//! is where the gate sits: the user must be a member of the configured
//! guild and hold the role flagged as base role in the mapping table.
//! Passing the gate upserts the local user record and runs a full group
//! reconciliation before the login response is sent.

use crate::api::REDIRECT_COOKIE;
use crate::discord::DiscordError;
use crate::errors::ApiError;
use crate::models::User;
use crate::session::SESSION_COOKIE;
use crate::state::AppState;
use crate::store::{StoreBackend, StoreError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::{error, info, warn};
use serde::Deserialize;
use thiserror::Error;
use time::Duration as TimeDuration;

/// CSRF state cookie for the Discord login round-trip.
const AUTH_STATE_COOKIE: &str = "auth_state";

/// Message shown whenever the gate denies a login.
const PERMISSION_DENIED: &str =
    "Sign in failed, you possibly don't have the required permissions to login";

/// Gate outcomes. "Not allowed" and "could not determine" are distinct
/// variants so the boundary can answer 401 for one and 500 for the other.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("user does not hold the base role")]
    InsufficientPermission,
    #[error(transparent)]
    Upstream(DiscordError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Check that the user is a guild member holding the base role.
async fn identity_gate(state: &AppState, discord_id: &str) -> Result<(), GateError> {
    let member = match state
        .discord
        .guild_member(&state.config.discord.guild_id, discord_id)
        .await
    {
        Ok(member) => member,
        Err(DiscordError::NotAMember) => return Err(GateError::InsufficientPermission),
        Err(err) => return Err(GateError::Upstream(err)),
    };

    match state.store.base_role_link().await? {
        Some(link) if member.has_role(&link.id) => Ok(()),
        Some(_) => Err(GateError::InsufficientPermission),
        // No base role configured: nobody passes
        None => Err(GateError::InsufficientPermission),
    }
}

/// Begins the Discord login flow.
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (auth_url, login_state) = match state.discord_oauth.authorization_url() {
        Ok(pair) => pair,
        Err(err) => {
            error!("Failed to build Discord authorization URL: {err}");
            return ApiError::internal("Failed to begin login").into_response();
        }
    };

    let state_cookie = Cookie::build((AUTH_STATE_COOKIE, login_state.csrf_token))
        .path("/")
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10))
        .build();

    (jar.add(state_cookie), Redirect::to(&auth_url)).into_response()
}

/// Query parameters Discord sends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

/// Completes the Discord login: code exchange, identity gate, user
/// upsert, blocking group reconciliation, then the session cookie. The
/// parked redirect slot is replayed and cleared when present.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let Some(auth_state) = jar.get(AUTH_STATE_COOKIE) else {
        return ApiError::bad_request("Missing login state").into_response();
    };
    if auth_state.value() != query.state {
        warn!("Login state mismatch on Discord callback");
        return ApiError::bad_request("Login state mismatch").into_response();
    }

    let user_token = match state.discord_oauth.exchange_code(&query.code).await {
        Ok(token) => token,
        Err(err) => {
            error!("Discord code exchange failed: {err}");
            return ApiError::internal("Internal Server Error").into_response();
        }
    };
    let discord_user = match state.discord.current_user(&user_token).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to fetch Discord user: {err}");
            return ApiError::internal("Internal Server Error").into_response();
        }
    };

    match identity_gate(&state, &discord_user.id).await {
        Ok(()) => {}
        Err(GateError::InsufficientPermission) => {
            info!("Login denied for Discord user {}", discord_user.id);
            return (StatusCode::UNAUTHORIZED, PERMISSION_DENIED).into_response();
        }
        Err(err) => {
            error!("Identity gate could not be evaluated: {err}");
            return ApiError::internal("Internal Server Error").into_response();
        }
    }

    if let Err(err) = state
        .store
        .upsert_user(User::new(
            discord_user.id.clone(),
            discord_user.username.clone(),
        ))
        .await
    {
        error!("Failed to upsert user record: {err}");
        return ApiError::internal("Internal Server Error").into_response();
    }

    // Login blocks on reconciliation; its failure is the login's failure
    if let Err(err) = state.group_sync().sync_user(&discord_user.id).await {
        error!("Reconciliation during login failed: {err}");
        return ApiError::internal("Group reconciliation failed").into_response();
    }

    let session_id = state.sessions.create(&discord_user.id).await;
    info!("Discord user {} signed in", discord_user.id);

    let session_cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(state.config.session.ttl_secs as i64))
        .build();

    let parked_redirect = jar.get(REDIRECT_COOKIE).map(|c| c.value().to_string());
    let jar = jar
        .add(session_cookie)
        .remove(Cookie::build((AUTH_STATE_COOKIE, "")).path("/").build());

    // Replay and clear the single-slot redirect
    if let Some(redirect) = parked_redirect {
        let jar = jar.remove(Cookie::build((REDIRECT_COOKIE, "")).path("/").build());
        return (jar, Redirect::to(&redirect)).into_response();
    }
    (jar, (StatusCode::OK, "Signed in")).into_response()
}

/// Landing page for failed logins.
pub async fn fail() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, PERMISSION_DENIED).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    #[serde(rename = "redirectUrl")]
    redirect_url: Option<String>,
}

/// Clears the session, optionally redirecting afterwards.
pub async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
    jar: CookieJar,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value()).await;
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());

    match query.redirect_url {
        Some(url) => (jar, Redirect::to(&url)).into_response(),
        None => (jar, (StatusCode::OK, "Signed out")).into_response(),
    }
}
