//! Jira REST client.
//!
//! Covers user lookup (with group expansion), user creation, and group
//! membership changes, authenticated with the fixed service credential.
//! Group additions distinguish "user is already a member" from real
//! failures because reconciliation treats additions as idempotent.

use crate::config::JiraConfig;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to Jira
#[derive(Debug, Error)]
pub enum JiraError {
    #[error("failed to send request to Jira: {0}")]
    Request(#[from] reqwest::Error),
    #[error("no Jira user matches the query")]
    UserNotFound,
    #[error("user is already a member of the group")]
    AlreadyMember,
    #[error("Jira request failed with status: {0}")]
    InvalidStatus(StatusCode),
}

/// A Jira user with expanded group memberships
#[derive(Debug, Clone, Deserialize)]
pub struct JiraUser {
    pub key: String,
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub groups: JiraGroups,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraGroups {
    #[serde(default)]
    pub items: Vec<JiraGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraGroup {
    pub name: String,
}

impl JiraUser {
    /// Names of the groups the user currently belongs to
    pub fn group_names(&self) -> Vec<String> {
        self.groups.items.iter().map(|g| g.name.clone()).collect()
    }
}

/// The record returned by user creation; only the key is interesting
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedJiraUser {
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct JiraErrorBody {
    #[serde(rename = "errorMessages", default)]
    error_messages: Vec<String>,
}

/// Jira REST API client
#[derive(Clone)]
pub struct JiraClient {
    http: Client,
    rest_url: String,
    username: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self, JiraError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.client_timeout))
            .connect_timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            http,
            rest_url: config.rest_url(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// Look up a user by username, with group memberships expanded.
    pub async fn user_by_name(&self, username: &str) -> Result<JiraUser, JiraError> {
        self.fetch_user(&[("username", username), ("expand", "groups")])
            .await
    }

    /// Look up a user by account key, with group memberships expanded.
    pub async fn user_by_key(&self, key: &str) -> Result<JiraUser, JiraError> {
        self.fetch_user(&[("key", key), ("expand", "groups")]).await
    }

    async fn fetch_user(&self, query: &[(&str, &str)]) -> Result<JiraUser, JiraError> {
        let response = self
            .http
            .get(format!("{}/user", self.rest_url))
            .query(query)
            .basic_auth(&self.username, Some(&self.api_token))
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(JiraError::UserNotFound),
            status => Err(JiraError::InvalidStatus(status)),
        }
    }

    /// Create a user with access to the Jira software application.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
    ) -> Result<CreatedJiraUser, JiraError> {
        debug!("Creating Jira user '{username}'");
        let response = self
            .http
            .post(format!("{}/user", self.rest_url))
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&json!({
                "name": username,
                "emailAddress": email,
                "displayName": username,
                "applicationKeys": ["jira-software"],
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JiraError::InvalidStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Add a user to a group. Jira answers an "already a member" error
    /// when the membership exists; that is surfaced as its own variant so
    /// callers can treat the addition as idempotent.
    pub async fn add_group_member(
        &self,
        group_name: &str,
        username: &str,
    ) -> Result<(), JiraError> {
        let response = self
            .http
            .post(format!("{}/group/user", self.rest_url))
            .query(&[("groupname", group_name)])
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&json!({ "name": username }))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: JiraErrorBody = response.json().await.unwrap_or(JiraErrorBody {
            error_messages: vec![],
        });
        if body
            .error_messages
            .iter()
            .any(|m| m.to_lowercase().contains("already a member"))
        {
            return Err(JiraError::AlreadyMember);
        }
        Err(JiraError::InvalidStatus(status))
    }

    /// Remove a user from a group.
    pub async fn remove_group_member(
        &self,
        group_name: &str,
        username: &str,
    ) -> Result<(), JiraError> {
        let response = self
            .http
            .delete(format!("{}/group/user", self.rest_url))
            .query(&[("groupname", group_name), ("username", username)])
            .basic_auth(&self.username, Some(&self.api_token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JiraError::InvalidStatus(response.status()));
        }
        Ok(())
    }
}
