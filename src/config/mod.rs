pub use crate::config::discord::DiscordConfig;
pub use crate::config::jira::JiraConfig;
pub use crate::config::mailcow::MailcowConfig;
use config::{Config as ConfigCrate, ConfigError};
use serde::Deserialize;

pub mod discord;
pub mod jira;
pub mod mailcow;

/// Main configuration structure for the SSO gateway
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// The port the gateway will listen to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Token the external admin surface authenticates with (exact match)
    #[serde(default)]
    pub admin_token: String,

    /// Discord integration configuration
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Jira REST API configuration
    #[serde(default)]
    pub jira: JiraConfig,

    /// Mailcow REST API configuration
    #[serde(default)]
    pub mailcow: MailcowConfig,

    /// Browser session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Mailbox provisioning configuration
    #[serde(default)]
    pub provision: ProvisionConfig,
}

/// Configuration for browser sessions
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Session lifetime in seconds (default: 7 days)
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Whether session cookies carry the Secure attribute (default: false)
    #[serde(default)]
    pub secure_cookies: bool,
}

/// Configuration for interactive mailbox provisioning
#[derive(Debug, Deserialize, Clone)]
pub struct ProvisionConfig {
    /// How long the reply collection window stays open, in seconds (default: 60)
    #[serde(default = "default_reply_window")]
    pub reply_window_secs: u64,

    /// Interval between reply polls, in milliseconds (default: 2000)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_millis: u64,

    /// Where users are sent when the collection window elapses
    #[serde(default = "default_request_channel")]
    pub request_channel_url: String,
}

fn default_port() -> u16 {
    8080
}

fn default_session_ttl() -> u64 {
    60 * 60 * 24 * 7
}

fn default_reply_window() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_request_channel() -> String {
    "https://servicedesk.example.com/portal/3".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            admin_token: String::new(),
            discord: DiscordConfig::default(),
            jira: JiraConfig::default(),
            mailcow: MailcowConfig::default(),
            session: SessionConfig::default(),
            provision: ProvisionConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            secure_cookies: false,
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            reply_window_secs: default_reply_window(),
            poll_interval_millis: default_poll_interval(),
            request_channel_url: default_request_channel(),
        }
    }
}

impl GatewayConfig {
    /// Creates a new Config instance from environment variables
    pub fn new() -> Result<Self, String> {
        ConfigCrate::builder()
            .add_source(
                config::Environment::with_prefix("SSO")
                    .prefix_separator("_")
                    .separator("_")
                    .convert_case(config::Case::Snake),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(
        discord_mock: &wiremock::MockServer,
        jira_mock: &wiremock::MockServer,
        mailcow_mock: &wiremock::MockServer,
    ) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            admin_token: "test_admin_token".to_string(),
            discord: DiscordConfig {
                api_url: discord_mock.uri(),
                authorize_url: format!("{}/oauth2/authorize", discord_mock.uri()),
                token_url: format!("{}/oauth2/token", discord_mock.uri()),
                client_id: "gateway-app".to_string(),
                client_secret: "gateway-secret".to_string(),
                redirect_uri: "http://localhost/auth/discord/callback".to_string(),
                bot_token: "test-bot-token".to_string(),
                guild_id: "guild-1".to_string(),
                client_timeout: 5,
            },
            jira: JiraConfig {
                url: jira_mock.uri(),
                username: "jira-svc".to_string(),
                api_token: "jira-api-token".to_string(),
                client_timeout: 5,
            },
            mailcow: MailcowConfig {
                url: mailcow_mock.uri(),
                api_key: "mailcow-api-key".to_string(),
                domain: "example.com".to_string(),
                client_timeout: 5,
            },
            session: SessionConfig {
                ttl_secs: 3600,
                secure_cookies: false,
            },
            provision: ProvisionConfig {
                reply_window_secs: 1,
                poll_interval_millis: 20,
                request_channel_url: "https://servicedesk.example.com/portal/3".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.discord.api_url, "https://discord.com/api/v10");
        assert_eq!(config.discord.authorize_url, "https://discord.com/oauth2/authorize");
        assert_eq!(config.jira.url, "http://localhost:8080");
        assert_eq!(config.jira.client_timeout, 10);
        assert_eq!(config.mailcow.domain, "");
        assert_eq!(config.session.ttl_secs, 60 * 60 * 24 * 7);
        assert_eq!(config.provision.reply_window_secs, 60);
        assert_eq!(config.provision.poll_interval_millis, 2000);
    }

    #[test]
    fn test_jira_rest_url_strips_trailing_slash() {
        let jira = JiraConfig {
            url: "https://jira.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(jira.rest_url(), "https://jira.example.com/rest/api/latest");
    }
}
