//! Mailcow REST client for mailbox creation.

use crate::config::MailcowConfig;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use log::info;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to Mailcow
#[derive(Debug, Error)]
pub enum MailcowError {
    #[error("failed to send request to Mailcow: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mailcow request failed with status: {0}")]
    InvalidStatus(StatusCode),
    #[error("Mailcow configuration error: {0}")]
    Config(String),
}

/// Mailcow API client
#[derive(Clone)]
pub struct MailcowClient {
    http: Client,
    base_url: String,
    domain: String,
}

impl MailcowClient {
    pub fn new(config: &MailcowConfig) -> Result<Self, MailcowError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-API-Key",
            config
                .api_key
                .parse()
                .map_err(|_| MailcowError::Config("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(Duration::from_secs(config.client_timeout))
            .connect_timeout(Duration::from_secs(2))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            domain: config.domain.clone(),
        })
    }

    /// The domain new mailboxes land under.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Create a mailbox for `local_part` and return the full address.
    /// The account starts with a forced password change.
    pub async fn create_mailbox(
        &self,
        local_part: &str,
        password: &str,
    ) -> Result<String, MailcowError> {
        let response = self
            .http
            .post(format!("{}/api/v1/add/mailbox", self.base_url))
            .json(&json!({
                "active": 1,
                "domain": self.domain,
                "local_part": local_part,
                "password": password,
                "password2": password,
                "quota": 3072,
                "force_pw_update": 1,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MailcowError::InvalidStatus(response.status()));
        }

        let address = format!("{}@{}", local_part, self.domain);
        info!("Created mailbox {address}");
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> MailcowClient {
        MailcowClient::new(&MailcowConfig {
            url: server.uri(),
            api_key: "mailcow-api-key".to_string(),
            domain: "example.com".to_string(),
            client_timeout: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_mailbox() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/add/mailbox"))
            .and(header("X-API-Key", "mailcow-api-key"))
            .and(body_partial_json(serde_json::json!({
                "domain": "example.com",
                "local_part": "alice",
                "quota": 3072,
                "force_pw_update": 1,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "type": "success", "msg": ["mailbox_added", "alice@example.com"] }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let address = client(&server)
            .create_mailbox("alice", "s3cret-pass-1")
            .await
            .unwrap();
        assert_eq!(address, "alice@example.com");
    }

    #[tokio::test]
    async fn test_create_mailbox_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/add/mailbox"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_mailbox("alice", "s3cret-pass-1")
            .await
            .unwrap_err();
        assert!(matches!(err, MailcowError::InvalidStatus(_)));
    }
}
