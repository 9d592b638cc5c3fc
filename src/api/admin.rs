//! Admin CRUD for OAuth applications and group links.
//!
//! Guarded by exact match of the Authorization header against the
//! configured admin token. Application ids and client secrets are
//! generated server-side; group links are keyed by the Discord role id
//! they map.

use crate::api::client_auth::constant_time_compare;
use crate::api::oauth::codes::generate_opaque_token;
use crate::errors::ApiError;
use crate::models::{Application, GroupLink};
use crate::state::AppState;
use crate::store::StoreBackend;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use log::info;
use serde::Deserialize;
use ulid::Ulid;

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let supplied = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if state.config.admin_token.is_empty()
        || !constant_time_compare(supplied, &state.config.admin_token)
    {
        return Err(ApiError::forbidden("Forbidden"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub name: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub struct IdBody {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: String,
}

pub async fn create_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateApplicationRequest>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;

    let application = Application {
        id: Ulid::new().to_string(),
        name: request.name,
        client_secret: generate_opaque_token(16),
        redirect_url: request.redirect_url,
    };
    state.store.put_application(application.clone()).await?;
    info!("Registered OAuth application '{}'", application.id);
    Ok((StatusCode::CREATED, Json(application)).into_response())
}

pub async fn get_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;

    match state.store.application(&query.id).await? {
        Some(application) => Ok(Json(application).into_response()),
        None => Err(ApiError::not_found("No such application")),
    }
}

pub async fn delete_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<IdBody>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;

    match state.store.delete_application(&request.id).await? {
        Some(application) => {
            info!("Deleted OAuth application '{}'", application.id);
            Ok(Json(application).into_response())
        }
        None => Err(ApiError::not_found("No such application")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupLinkRequest {
    /// Discord role id
    pub id: String,
    /// Jira group name the role maps to
    pub jira_name: String,
    #[serde(default)]
    pub base_role: bool,
}

pub async fn create_group_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateGroupLinkRequest>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;

    let link = GroupLink {
        id: request.id,
        jira_name: request.jira_name,
        base_role: request.base_role,
    };
    state.store.put_group_link(link.clone()).await?;
    info!("Linked Discord role '{}' to Jira group '{}'", link.id, link.jira_name);
    Ok((StatusCode::CREATED, Json(link)).into_response())
}

pub async fn get_group_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;

    match state.store.group_link(&query.id).await? {
        Some(link) => Ok(Json(link).into_response()),
        None => Err(ApiError::not_found("No such group link")),
    }
}

pub async fn delete_group_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<IdBody>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;

    match state.store.delete_group_link(&request.id).await? {
        Some(link) => Ok(Json(link).into_response()),
        None => Err(ApiError::not_found("No such group link")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestFixture;

    #[tokio::test]
    async fn test_application_lifecycle() {
        let fixture = TestFixture::new().await;
        let admin = [("authorization", fixture.config.admin_token.as_str())];

        let created = fixture
            .post_json(
                "/admin/application",
                &serde_json::json!({ "name": "ci", "redirectUrl": "https://ci.example.com/cb" }),
                &admin,
            )
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json["id"].as_str().unwrap().to_string();
        assert_eq!(created.json["clientSecret"].as_str().unwrap().len(), 16);

        let fetched = fixture
            .get_with_headers(&format!("/admin/application?id={id}"), &admin)
            .await;
        fetched.assert_ok();
        assert_eq!(fetched.json["name"], "ci");

        let deleted = fixture
            .delete_json("/admin/application", &serde_json::json!({ "id": id }), &admin)
            .await;
        deleted.assert_ok();

        let gone = fixture
            .get_with_headers(&format!("/admin/application?id={id}"), &admin)
            .await;
        gone.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_group_link_lifecycle() {
        let fixture = TestFixture::new().await;
        let admin = [("authorization", "test_admin_token")];

        let created = fixture
            .post_json(
                "/admin/groupLink",
                &serde_json::json!({ "id": "role-1", "jiraName": "grp-1", "baseRole": true }),
                &admin,
            )
            .await;
        created.assert_status(StatusCode::CREATED);

        let fetched = fixture
            .get_with_headers("/admin/groupLink?id=role-1", &admin)
            .await;
        fetched.assert_ok();
        assert_eq!(fetched.json["jiraName"], "grp-1");
        assert_eq!(fetched.json["baseRole"], true);

        let deleted = fixture
            .delete_json("/admin/groupLink", &serde_json::json!({ "id": "role-1" }), &admin)
            .await;
        deleted.assert_ok();
    }

    #[tokio::test]
    async fn test_admin_routes_require_the_admin_token() {
        let fixture = TestFixture::new().await;

        let no_token = fixture.get("/admin/application?id=x").await;
        no_token.assert_status(StatusCode::FORBIDDEN);

        let wrong_token = fixture
            .get_with_headers("/admin/application?id=x", &[("authorization", "nope")])
            .await;
        wrong_token.assert_status(StatusCode::FORBIDDEN);
    }
}
