//! OAuth 2.0 endpoint handlers

use crate::api::client_auth::client_from_request;
use crate::api::oauth::codes::{TokenError, TokenManager};
use crate::api::oauth::models::{AuthorizeRequest, OAuthError, TokenRequest, TokenResponse};
use crate::api::REDIRECT_COOKIE;
use crate::session::SESSION_COOKIE;
use crate::state::AppState;
use crate::store::StoreBackend;
use axum::extract::{OriginalUri, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use http::HeaderMap;
use log::{info, warn};
use url::Url;

/// OAuth 2.0 Authorization endpoint (RFC 6749 Section 4.1.1).
///
/// Requires an authenticated session; without one the full original URL
/// is parked in the single-slot redirect cookie and the user is bounced
/// to the Discord login. With a session, the client and redirect URI are
/// validated and a fresh single-use code is handed back via redirect.
/// The authenticated session is the consent; there is no separate
/// decision screen.
pub async fn authorize(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    Query(request): Query<AuthorizeRequest>,
    jar: CookieJar,
) -> Response {
    let session = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions.get(cookie.value()).await,
        None => None,
    };
    let Some(session) = session else {
        // Park the requested URL for post-login replay; each new attempt
        // overwrites the slot
        let redirect_cookie = Cookie::build((REDIRECT_COOKIE, original_uri.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        return (jar.add(redirect_cookie), Redirect::to("/auth/discord")).into_response();
    };

    if let Some(response_type) = request.response_type.as_deref() {
        if response_type != "code" {
            return error_response(
                StatusCode::BAD_REQUEST,
                OAuthError::unsupported_response_type(),
            );
        }
    }
    let (Some(client_id), Some(redirect_uri)) = (&request.client_id, &request.redirect_uri) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("client_id and redirect_uri are required"),
        );
    };

    let application = match state.store.application(client_id).await {
        Ok(Some(application)) => application,
        Ok(None) => {
            warn!("Authorization attempt for unknown client '{client_id}'");
            return error_response(
                StatusCode::FORBIDDEN,
                OAuthError::access_denied("Unknown client"),
            );
        }
        Err(err) => {
            warn!("Client lookup failed: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                OAuthError::server_error("Client lookup failed"),
            );
        }
    };

    // Exact match only; on mismatch nothing is issued and nothing
    // redirects to the supplied URI
    if application.redirect_url != *redirect_uri {
        warn!("Redirect URI mismatch for client '{client_id}'");
        return error_response(
            StatusCode::FORBIDDEN,
            OAuthError::access_denied("redirect_uri does not match the registered redirect URL"),
        );
    }

    let manager = TokenManager::new(state.store.clone());
    let code = match manager
        .issue_code(&application.id, &application.redirect_url, &session.user_id)
        .await
    {
        Ok(code) => code,
        Err(err) => {
            warn!("Failed to issue authorization code: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                OAuthError::server_error("Failed to issue authorization code"),
            );
        }
    };

    let mut location = match Url::parse(&application.redirect_url) {
        Ok(url) => url,
        Err(err) => {
            warn!("Registered redirect URL for client '{client_id}' is invalid: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                OAuthError::server_error("Registered redirect URL is invalid"),
            );
        }
    };
    location.query_pairs_mut().append_pair("code", &code);

    info!(
        "Issued authorization code for user '{}' via client '{}'",
        session.user_id, application.id
    );
    Redirect::to(location.as_str()).into_response()
}

/// OAuth 2.0 Token endpoint (RFC 6749 Section 4.1.3).
///
/// Client authentication accepts HTTP Basic or body credentials; both
/// run the same check. Redemption failures all collapse into one
/// invalid_grant answer so the response does not reveal whether the
/// code, the client binding, or the redirect URI was wrong.
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    let application = match client_from_request(
        &state,
        &headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )
    .await
    {
        Ok(application) => application,
        Err(err) if err.status_code == StatusCode::UNAUTHORIZED => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                OAuthError::invalid_client("Invalid client credentials"),
            );
        }
        Err(_) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                OAuthError::server_error("Client authentication failed"),
            );
        }
    };

    if request.grant_type != "authorization_code" {
        warn!(
            "Unsupported grant type '{}' from client '{}'",
            request.grant_type, application.id
        );
        return error_response(StatusCode::BAD_REQUEST, OAuthError::unsupported_grant_type());
    }

    let (Some(code), Some(redirect_uri)) = (&request.code, &request.redirect_uri) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("code and redirect_uri are required"),
        );
    };

    let manager = TokenManager::new(state.store.clone());
    let token = match manager
        .redeem_code(code, &application.id, redirect_uri)
        .await
    {
        Ok(token) => token,
        Err(TokenError::Store(err)) => {
            warn!("Code redemption failed on the store: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                OAuthError::server_error("Failed to redeem authorization code"),
            );
        }
        Err(err) => {
            // CodeNotFound / ClientMismatch / RedirectUriMismatch all look
            // the same from outside
            warn!("Code redemption denied for client '{}': {err}", application.id);
            return error_response(
                StatusCode::BAD_REQUEST,
                OAuthError::invalid_grant("Invalid authorization code"),
            );
        }
    };

    info!(
        "Issued access token for user '{}' via client '{}'",
        token.user_id, application.id
    );
    Json(TokenResponse {
        access_token: token.token,
        token_type: "Bearer".to_string(),
    })
    .into_response()
}

/// Helper function to create OAuth error responses
fn error_response(status: StatusCode, error: OAuthError) -> Response {
    (status, Json(error)).into_response()
}
