//! Resource endpoints under /api.
//!
//! Bearer resolution re-runs group reconciliation synchronously before
//! anything is returned, so these endpoints inherit reconciliation's
//! latency and failure modes by design. The lookup endpoints are for
//! registered clients and authenticate with HTTP Basic.

use crate::api::client_auth::client_from_basic;
use crate::errors::ApiError;
use crate::jira::JiraUser;
use crate::models::{AccessToken, User};
use crate::state::AppState;
use crate::store::StoreBackend;
use axum::extract::{Query, State};
use axum::{Json, response::IntoResponse, response::Response};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use log::warn;
use serde::{Deserialize, Serialize};

/// The user record merged with live Jira identity, as served to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub jira_username: String,
    pub jira_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserInfoResponse {
    fn merge(user: &User, jira_user: &JiraUser) -> Self {
        Self {
            id: user.discord_id.clone(),
            username: jira_user.name.clone(),
            display_name: jira_user
                .display_name
                .clone()
                .unwrap_or_else(|| jira_user.name.clone()),
            jira_username: jira_user.name.clone(),
            jira_key: jira_user.key.clone(),
            email: user.mailcow_email.clone(),
        }
    }
}

/// Resolve a bearer token to its access-token record and local user.
/// An unknown token is "unauthenticated", never an error.
async fn authenticate_bearer(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(AccessToken, User), ApiError> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| value.to_lowercase().starts_with("bearer "))
        .map(|value| value[7..].to_string());
    let Some(bearer) = bearer else {
        return Err(ApiError::unauthorized("Unauthenticated"));
    };

    let Some(token) = state.store.token(&bearer).await? else {
        warn!("Bearer resolution failed: unknown token");
        return Err(ApiError::unauthorized("Unauthenticated"));
    };
    let Some(user) = state.store.user_by_discord_id(&token.user_id).await? else {
        warn!("Bearer token references a missing user record");
        return Err(ApiError::unauthorized("Unauthenticated"));
    };
    Ok((token, user))
}

/// GET /api/userinfo, the OAuth resource endpoint.
pub async fn userinfo(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserInfoResponse>, ApiError> {
    let (_token, user) = authenticate_bearer(&state, &headers).await?;

    // Resource access re-runs reconciliation before it resolves
    state.group_sync().sync_user(&user.discord_id).await?;

    // Re-read: reconciliation may have just provisioned the account
    let user = state
        .store
        .user_by_discord_id(&user.discord_id)
        .await?
        .ok_or_else(|| ApiError::internal("User record vanished during reconciliation"))?;
    let key = user
        .jira_key
        .clone()
        .ok_or_else(|| ApiError::internal("User has no Jira account"))?;

    let jira_user = state
        .jira
        .user_by_key(&key)
        .await
        .map_err(|err| ApiError::internal(format!("Jira lookup failed: {err}")))?;

    Ok(Json(UserInfoResponse::merge(&user, &jira_user)))
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    key: String,
}

/// GET /api/userByJiraKey: client-basic lookup by Jira key. A miss is a
/// JSON null body, matching the behavior clients already depend on.
pub async fn user_by_jira_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Option<User>>, ApiError> {
    client_from_basic(&state, &headers).await?;
    let user = state.store.user_by_jira_key(&query.key).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: String,
}

/// GET /api/userByDiscordId: client-basic lookup by Discord id, merged
/// with the live Jira display name.
pub async fn user_by_discord_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    client_from_basic(&state, &headers).await?;

    let user = state
        .store
        .user_by_discord_id(&query.id)
        .await?
        .ok_or_else(|| ApiError::internal("No such user"))?;
    let key = user
        .jira_key
        .clone()
        .ok_or_else(|| ApiError::internal("User has no Jira account"))?;
    let jira_user = state
        .jira
        .user_by_key(&key)
        .await
        .map_err(|err| ApiError::internal(format!("Jira lookup failed: {err}")))?;

    let mut body = serde_json::to_value(&user)
        .map_err(|err| ApiError::internal(format!("Serialization failed: {err}")))?;
    body["username"] = serde_json::Value::String(jira_user.name);
    Ok(Json(body).into_response())
}
