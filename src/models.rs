//! Persisted records owned by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Discord user known to the gateway.
///
/// `jira_key` and `mailcow_email` start out unset and are written exactly
/// once by provisioning; they are never overwritten afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Discord user id (primary key)
    pub discord_id: String,
    /// Discord username at first login
    pub username: String,
    /// Jira account key, set on first provisioning
    pub jira_key: Option<String>,
    /// Mailcow mailbox address, set on first provisioning
    pub mailcow_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(discord_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            discord_id: discord_id.into(),
            username: username.into(),
            jira_key: None,
            mailcow_email: None,
            created_at: Utc::now(),
        }
    }
}

/// A registered OAuth 2.0 client application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub name: String,
    pub client_secret: String,
    /// The only redirect URI this client may use; compared by exact match.
    pub redirect_url: String,
}

/// A single-use authorization code bound to the issuing grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationCode {
    pub token: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
}

/// An opaque bearer token. Tokens have no expiry and no refresh
/// counterpart; once issued they are only invalidated by store loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub client_id: String,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
}

/// Maps a Discord role id to a Jira group name.
///
/// At most one record carries `base_role = true`; that role gates login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupLink {
    /// Discord role id (primary key)
    pub id: String,
    /// Jira group name the role maps to
    pub jira_name: String,
    #[serde(default)]
    pub base_role: bool,
}
