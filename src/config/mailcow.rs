use serde::Deserialize;

/// Configuration for the Mailcow mail system
#[derive(Debug, Deserialize, Clone)]
pub struct MailcowConfig {
    /// Base URL of the Mailcow instance (default: http://localhost:8443)
    #[serde(default = "default_url")]
    pub url: String,

    /// Mailcow API key
    #[serde(default)]
    pub api_key: String,

    /// Domain new mailboxes are created under
    #[serde(default)]
    pub domain: String,

    /// Timeout for Mailcow REST calls in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub client_timeout: u64,
}

fn default_url() -> String {
    "http://localhost:8443".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for MailcowConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: String::new(),
            domain: String::new(),
            client_timeout: default_timeout(),
        }
    }
}
