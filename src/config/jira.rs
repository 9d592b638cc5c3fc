use serde::Deserialize;

/// Configuration for the Jira REST API
#[derive(Debug, Deserialize, Clone)]
pub struct JiraConfig {
    /// Base URL of the Jira instance (default: http://localhost:8080)
    #[serde(default = "default_url")]
    pub url: String,

    /// Service account username for basic authentication
    #[serde(default)]
    pub username: String,

    /// API token paired with the service account
    #[serde(default)]
    pub api_token: String,

    /// Timeout for Jira REST calls in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub client_timeout: u64,
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            api_token: String::new(),
            client_timeout: default_timeout(),
        }
    }
}

impl JiraConfig {
    /// Returns the REST API root for this instance
    pub fn rest_url(&self) -> String {
        format!("{}/rest/api/latest", self.url.trim_end_matches('/'))
    }
}
