use crate::api::oauth::codes::{generate_opaque_token, TokenManager};
use crate::config::GatewayConfig;
use crate::create_app;
use crate::models::{AccessToken, Application, GroupLink, User};
use crate::state::AppState;
use crate::store::{Store, StoreBackend};
use axum::body::Body;
use axum::Router;
use chrono::Utc;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test fixture wiring the real router against mock Discord, Jira, and
/// Mailcow servers, with helpers for seeding records and firing requests.
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub config: GatewayConfig,
    /// Application state backing the router
    pub state: AppState,
    /// Store handle shared with the router
    pub store: Store,
    /// Mock server standing in for Discord
    pub discord_mock: MockServer,
    /// Mock server standing in for Jira
    pub jira_mock: MockServer,
    /// Mock server standing in for Mailcow
    pub mailcow_mock: MockServer,
}

impl TestFixture {
    pub async fn new() -> Self {
        // Initialize test logger
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let discord_mock = MockServer::start().await;
        let jira_mock = MockServer::start().await;
        let mailcow_mock = MockServer::start().await;

        let config = GatewayConfig::for_test_with_mocks(&discord_mock, &jira_mock, &mailcow_mock);
        let state = AppState::for_testing(&config);
        let store = state.store.clone();
        let app = create_app(state.clone()).await;

        Self {
            app,
            config,
            state,
            store,
            discord_mock,
            jira_mock,
            mailcow_mock,
        }
    }

    pub async fn seed_application(&self, id: &str, secret: &str, redirect_url: &str) {
        self.store
            .put_application(Application {
                id: id.to_string(),
                name: format!("{id} test app"),
                client_secret: secret.to_string(),
                redirect_url: redirect_url.to_string(),
            })
            .await
            .expect("Failed to seed application");
    }

    pub async fn seed_user(&self, discord_id: &str, username: &str) {
        self.store
            .upsert_user(User::new(discord_id, username))
            .await
            .expect("Failed to seed user");
    }

    /// A user that already went through provisioning: key and mailbox set.
    pub async fn seed_provisioned_user(&self, discord_id: &str, username: &str, jira_key: &str) {
        self.seed_user(discord_id, username).await;
        self.store
            .set_jira_key_if_unset(discord_id, jira_key)
            .await
            .expect("Failed to seed Jira key");
        self.store
            .set_mailcow_email_if_unset(discord_id, &format!("{username}@example.com"))
            .await
            .expect("Failed to seed mailbox address");
    }

    pub async fn seed_group_link(&self, role_id: &str, jira_name: &str) {
        self.store
            .put_group_link(GroupLink {
                id: role_id.to_string(),
                jira_name: jira_name.to_string(),
                base_role: false,
            })
            .await
            .expect("Failed to seed group link");
    }

    pub async fn seed_base_role_link(&self, role_id: &str, jira_name: &str) {
        self.store
            .put_group_link(GroupLink {
                id: role_id.to_string(),
                jira_name: jira_name.to_string(),
                base_role: true,
            })
            .await
            .expect("Failed to seed base role link");
    }

    /// Issue a bearer token for the user as if a code exchange happened.
    pub async fn seed_token(&self, client_id: &str, user_id: &str) -> String {
        let token = generate_opaque_token(256);
        self.store
            .put_token(AccessToken {
                token: token.clone(),
                client_id: client_id.to_string(),
                user_id: user_id.to_string(),
                issued_at: Utc::now(),
            })
            .await
            .expect("Failed to seed token");
        token
    }

    /// Issue an authorization code bound to the client's registered
    /// redirect URL.
    pub async fn issue_code(&self, client_id: &str, user_id: &str) -> String {
        let application = self
            .store
            .application(client_id)
            .await
            .expect("Store lookup failed")
            .expect("Client must be seeded before issuing codes");
        TokenManager::new(self.store.clone())
            .issue_code(client_id, &application.redirect_url, user_id)
            .await
            .expect("Failed to issue code")
    }

    /// Create a session for the user, returning the Cookie header value.
    pub async fn login_session(&self, user_id: &str) -> String {
        let session_id = self.state.sessions.create(user_id).await;
        format!("session={session_id}")
    }

    pub async fn mock_guild_member(&self, user_id: &str, roles: &[&str]) {
        Mock::given(method("GET"))
            .and(path(format!("/guilds/guild-1/members/{user_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "roles": roles,
            })))
            .mount(&self.discord_mock)
            .await;
    }

    pub async fn mock_jira_user_by_key(&self, key: &str, name: &str, groups: &[&str]) {
        let items: Vec<_> = groups
            .iter()
            .map(|g| serde_json::json!({ "name": g }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/rest/api/latest/user"))
            .and(query_param("key", key))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": key,
                "name": name,
                "displayName": name,
                "groups": { "size": items.len(), "items": items }
            })))
            .mount(&self.jira_mock)
            .await;
    }

    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        self.get_with_headers(uri, &[]).await
    }

    pub async fn get_with_headers(
        &self,
        uri: impl AsRef<str>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(uri.as_ref());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn post_json<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.send_json(Method::POST, uri, body, headers).await
    }

    pub async fn delete_json<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.send_json(Method::DELETE, uri, body, headers).await
    }

    async fn send_json<T: Serialize>(
        &self,
        http_method: Method,
        uri: impl AsRef<str>,
        body: &T,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let mut builder = Request::builder()
            .method(http_method)
            .uri(uri.as_ref())
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::from(json_body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// POST a urlencoded form, the token endpoint's native shape.
    pub async fn post_form(
        &self,
        uri: impl AsRef<str>,
        fields: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let body = fields
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header("content-type", "application/x-www-form-urlencoded");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body).to_string();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            json,
            text,
        }
    }
}

/// Response from a test request with convenient access to status,
/// headers, and body.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
    pub text: String,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {} but got {} with body: {}",
            expected, self.status, self.text
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// All values of a header, joined. Panics when the header is absent.
    pub fn header(&self, name: &str) -> String {
        let values: Vec<_> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert!(!values.is_empty(), "Header '{name}' missing from response");
        values.join("; ")
    }
}
