use serde::Deserialize;

/// Configuration for the Discord integration
#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    /// Base URL of the Discord REST API (default: https://discord.com/api/v10)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// OAuth2 authorization endpoint users are redirected to
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    /// OAuth2 token endpoint for the login code exchange
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth2 client id of the gateway's Discord application
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret of the gateway's Discord application
    #[serde(default)]
    pub client_secret: String,

    /// Redirect URI registered with Discord, pointing at /auth/discord/callback
    #[serde(default)]
    pub redirect_uri: String,

    /// Bot token used for guild member lookups and direct messages
    #[serde(default)]
    pub bot_token: String,

    /// The guild whose roles gate access
    #[serde(default)]
    pub guild_id: String,

    /// Timeout for Discord REST calls in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub client_timeout: u64,
}

fn default_api_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_authorize_url() -> String {
    "https://discord.com/oauth2/authorize".to_string()
}

fn default_token_url() -> String {
    "https://discord.com/api/oauth2/token".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            bot_token: String::new(),
            guild_id: String::new(),
            client_timeout: default_timeout(),
        }
    }
}
