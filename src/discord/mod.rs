//! Discord REST and OAuth2 login clients.
//!
//! The REST client authenticates with the bot token and covers the three
//! things the gateway needs from Discord: guild member lookups, direct
//! messages, and reading replies out of a DM channel. The login client
//! drives the authorization-code flow users go through at /auth/discord.

use crate::config::DiscordConfig;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use log::debug;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub mod collector;

/// Errors that can occur when talking to Discord
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("failed to send request to Discord: {0}")]
    Request(#[from] reqwest::Error),
    #[error("user is not a member of the guild")]
    NotAMember,
    #[error("Discord request failed with status: {0}")]
    InvalidStatus(StatusCode),
    #[error("login code exchange failed: {0}")]
    TokenExchange(String),
    #[error("Discord configuration error: {0}")]
    Config(String),
}

/// A Discord user as returned by /users/@me
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
}

/// A guild member's role assignments
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl GuildMember {
    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }
}

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

/// A message read back from a DM channel
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub author: MessageAuthor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
}

/// Discord REST client authenticated with the bot token
#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    api_url: String,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Result<Self, DiscordError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            format!("Bot {}", config.bot_token)
                .parse()
                .map_err(|_| DiscordError::Config("invalid bot token".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(Duration::from_secs(config.client_timeout))
            .connect_timeout(Duration::from_secs(2))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the authenticated user for a login access token.
    pub async fn current_user(&self, user_token: &str) -> Result<DiscordUser, DiscordError> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.api_url))
            .header(AUTHORIZATION, format!("Bearer {user_token}"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscordError::InvalidStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Fetch a guild member by user id. A 404 means the user is not in the
    /// guild, which callers treat as a permission outcome, not a transport
    /// failure.
    pub async fn guild_member(
        &self,
        guild_id: &str,
        user_id: &str,
    ) -> Result<GuildMember, DiscordError> {
        let response = self
            .http
            .get(format!(
                "{}/guilds/{}/members/{}",
                self.api_url, guild_id, user_id
            ))
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(DiscordError::NotAMember),
            status => Err(DiscordError::InvalidStatus(status)),
        }
    }

    /// Open (or reuse) the DM channel with a user and send a message.
    /// Returns the channel id and the sent message's id so callers can
    /// keep talking on the channel and anchor reads after the message.
    pub async fn send_dm(
        &self,
        user_id: &str,
        content: &str,
    ) -> Result<(String, String), DiscordError> {
        let channel = self.dm_channel(user_id).await?;
        let message = self.send_message(&channel, content).await?;
        Ok((channel, message))
    }

    async fn dm_channel(&self, user_id: &str) -> Result<String, DiscordError> {
        let response = self
            .http
            .post(format!("{}/users/@me/channels", self.api_url))
            .json(&json!({ "recipient_id": user_id }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscordError::InvalidStatus(response.status()));
        }
        let channel: DmChannel = response.json().await?;
        Ok(channel.id)
    }

    /// Send a message to a channel, returning its id.
    pub async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<String, DiscordError> {
        debug!("Sending message to channel {channel_id}");
        let response = self
            .http
            .post(format!("{}/channels/{}/messages", self.api_url, channel_id))
            .json(&json!({ "content": content }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscordError::InvalidStatus(response.status()));
        }
        let message: Message = response.json().await?;
        Ok(message.id)
    }

    /// List channel messages sent after the given message id, oldest first.
    pub async fn messages_after(
        &self,
        channel_id: &str,
        after: &str,
    ) -> Result<Vec<Message>, DiscordError> {
        let response = self
            .http
            .get(format!("{}/channels/{}/messages", self.api_url, channel_id))
            .query(&[("after", after), ("limit", "50")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscordError::InvalidStatus(response.status()));
        }
        // Discord returns newest first; flip so callers see replies in order
        let mut messages: Vec<Message> = response.json().await?;
        messages.reverse();
        Ok(messages)
    }
}

/// State carried through the login round-trip via cookie.
#[derive(Debug, Clone)]
pub struct LoginState {
    pub csrf_token: String,
}

/// OAuth2 client for the Discord login flow.
///
/// The typed client is rebuilt per call so this struct stays free of the
/// oauth2 crate's endpoint type-state parameters.
#[derive(Clone)]
pub struct DiscordOAuth {
    config: DiscordConfig,
    http: Client,
}

impl DiscordOAuth {
    pub fn new(config: &DiscordConfig) -> Result<Self, DiscordError> {
        // Disable redirects: the token endpoint must never bounce us around
        let http = Client::builder()
            .timeout(Duration::from_secs(config.client_timeout))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            config: config.clone(),
            http,
        })
    }

    /// Build the authorization URL the user is redirected to, plus the
    /// CSRF state to validate on callback.
    pub fn authorization_url(&self) -> Result<(String, LoginState), DiscordError> {
        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(self.config.authorize_url.clone())
                    .map_err(|e| DiscordError::Config(format!("invalid authorize URL: {e}")))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(self.config.redirect_uri.clone())
                    .map_err(|e| DiscordError::Config(format!("invalid redirect URI: {e}")))?,
            );

        let (auth_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("identify".to_string()))
            .url();

        Ok((
            auth_url.to_string(),
            LoginState {
                csrf_token: csrf_token.secret().clone(),
            },
        ))
    }

    /// Exchange the callback code for the user's access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, DiscordError> {
        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(self.config.token_url.clone())
                    .map_err(|e| DiscordError::Config(format!("invalid token URL: {e}")))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(self.config.redirect_uri.clone())
                    .map_err(|e| DiscordError::Config(format!("invalid redirect URI: {e}")))?,
            );

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| DiscordError::TokenExchange(e.to_string()))?;

        Ok(token.access_token().secret().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> DiscordConfig {
        DiscordConfig {
            api_url: server.uri(),
            authorize_url: format!("{}/oauth2/authorize", server.uri()),
            token_url: format!("{}/oauth2/token", server.uri()),
            client_id: "gateway-app".to_string(),
            client_secret: "gateway-secret".to_string(),
            redirect_uri: "http://localhost/auth/discord/callback".to_string(),
            bot_token: "bot-token".to_string(),
            guild_id: "guild-1".to_string(),
            client_timeout: 5,
        }
    }

    #[tokio::test]
    async fn test_guild_member_roles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/guild-1/members/user-1"))
            .and(header("authorization", "Bot bot-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "roles": ["role-a", "role-b"],
                "user": { "id": "user-1", "username": "alice" }
            })))
            .mount(&server)
            .await;

        let client = DiscordClient::new(&test_config(&server)).unwrap();
        let member = client.guild_member("guild-1", "user-1").await.unwrap();
        assert!(member.has_role("role-a"));
        assert!(!member.has_role("role-z"));
    }

    #[tokio::test]
    async fn test_guild_member_not_found_is_not_a_member() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/guild-1/members/user-2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = DiscordClient::new(&test_config(&server)).unwrap();
        let err = client.guild_member("guild-1", "user-2").await.unwrap_err();
        assert!(matches!(err, DiscordError::NotAMember));
    }

    #[tokio::test]
    async fn test_send_dm_opens_channel_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "dm-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/dm-1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": "msg-1",
                    "content": "hello",
                    "author": { "id": "bot" }
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = DiscordClient::new(&test_config(&server)).unwrap();
        let (channel, message) = client.send_dm("user-1", "hello").await.unwrap();
        assert_eq!(channel, "dm-1");
        assert_eq!(message, "msg-1");
    }

    #[tokio::test]
    async fn test_authorization_url_carries_client_and_state() {
        let server = MockServer::start().await;
        let oauth = DiscordOAuth::new(&test_config(&server)).unwrap();
        let (url, state) = oauth.authorization_url().unwrap();

        assert!(url.contains("client_id=gateway-app"));
        assert!(url.contains("scope=identify"));
        assert!(url.contains(&format!("state={}", state.csrf_token)));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "user-access-token",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;

        let oauth = DiscordOAuth::new(&test_config(&server)).unwrap();
        let token = oauth.exchange_code("login-code").await.unwrap();
        assert_eq!(token, "user-access-token");
    }
}
